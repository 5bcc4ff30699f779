//! The façade through which a presentation layer reads and writes expense data.

use crate::error::{ErrorType, IntoResult};
use crate::model::{
    default_categories, Amount, Category, CategoryId, CategoryWithExpenses, Expense, ExpenseId,
};
use crate::observe::Live;
use crate::store::Store;
use crate::{query, Result};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Exposes the live query results and the write operations of a `Store`, without revealing how the
/// store shapes its queries.
///
/// The `Live` returning methods spawn a task, so they must be called within a tokio runtime.
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn Store>,
}

impl Debug for Repository {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository").finish_non_exhaustive()
    }
}

impl Repository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn all_categories(&self) -> Live<Vec<Category>> {
        query::all_categories(&self.store)
    }

    pub fn categories_with_expenses(&self) -> Live<Vec<CategoryWithExpenses>> {
        query::categories_with_expenses(&self.store)
    }

    pub fn all_expenses(&self) -> Live<Vec<Expense>> {
        query::all_expenses(&self.store)
    }

    pub fn expenses_by_category(&self, id: CategoryId) -> Live<Vec<Expense>> {
        query::expenses_by_category(&self.store, id)
    }

    pub fn total_expenses(&self) -> Live<Option<Amount>> {
        query::total_expenses(&self.store)
    }

    pub fn category_total(&self, id: CategoryId) -> Live<Option<Amount>> {
        query::category_total(&self.store, id)
    }

    pub async fn insert_category(&self, category: &Category) -> Result<CategoryId> {
        self.store
            .insert_category(category)
            .await
            .pub_result(ErrorType::Database)
    }

    pub async fn insert_expense(&self, expense: &Expense) -> Result<ExpenseId> {
        self.store
            .insert_expense(expense)
            .await
            .pub_result(ErrorType::Database)
    }

    /// Returns false if the category is not stored.
    pub async fn delete_category(&self, category: &Category) -> Result<bool> {
        match category.id() {
            Some(id) => self.delete_category_by_id(id).await,
            None => Ok(false),
        }
    }

    /// Returns false if no category has this id.
    pub async fn delete_category_by_id(&self, id: CategoryId) -> Result<bool> {
        self.store
            .delete_category(id)
            .await
            .pub_result(ErrorType::Database)
    }

    /// Returns false if the expense is not stored.
    pub async fn delete_expense(&self, expense: &Expense) -> Result<bool> {
        match expense.id() {
            Some(id) => self.delete_expense_by_id(id).await,
            None => Ok(false),
        }
    }

    /// Returns false if no expense has this id.
    pub async fn delete_expense_by_id(&self, id: ExpenseId) -> Result<bool> {
        self.store
            .delete_expense(id)
            .await
            .pub_result(ErrorType::Database)
    }

    /// Inserts the default categories if the store has no categories. Returns how many were added.
    pub async fn seed_default_categories(&self) -> Result<u64> {
        self.store
            .seed_categories(&default_categories())
            .await
            .pub_result(ErrorType::Database)
    }
}
