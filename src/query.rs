//! Live projections of the store's contents.
//!
//! Each function returns a `Live` that emits a full snapshot now and again whenever a table that
//! the projection reads is written.

use crate::model::{Amount, Category, CategoryId, CategoryWithExpenses, Expense};
use crate::observe::Live;
use crate::store::{Scope, Store};
use std::sync::Arc;

/// All categories, in no particular order.
pub(crate) fn all_categories(store: &Arc<dyn Store>) -> Live<Vec<Category>> {
    let source = store.clone();
    Live::spawn("categories", store.changes(), Scope::CATEGORIES, move || {
        let store = source.clone();
        async move { store.categories().await }
    })
}

/// Every category paired with its expenses.
pub(crate) fn categories_with_expenses(store: &Arc<dyn Store>) -> Live<Vec<CategoryWithExpenses>> {
    let source = store.clone();
    Live::spawn(
        "categories with expenses",
        store.changes(),
        Scope::ALL,
        move || {
            let store = source.clone();
            async move { store.categories_with_expenses().await }
        },
    )
}

/// All expenses, most recent first.
pub(crate) fn all_expenses(store: &Arc<dyn Store>) -> Live<Vec<Expense>> {
    let source = store.clone();
    Live::spawn("expenses", store.changes(), Scope::EXPENSES, move || {
        let store = source.clone();
        async move { store.expenses().await }
    })
}

/// The expenses of one category, most recent first.
pub(crate) fn expenses_by_category(store: &Arc<dyn Store>, id: CategoryId) -> Live<Vec<Expense>> {
    let source = store.clone();
    Live::spawn(
        "expenses by category",
        store.changes(),
        Scope::EXPENSES,
        move || {
            let store = source.clone();
            async move { store.expenses_by_category(id).await }
        },
    )
}

/// The sum of all expenses; `None` while there are none.
pub(crate) fn total_expenses(store: &Arc<dyn Store>) -> Live<Option<Amount>> {
    let source = store.clone();
    Live::spawn("total expenses", store.changes(), Scope::EXPENSES, move || {
        let store = source.clone();
        async move { store.total_expenses().await }
    })
}

/// The sum of one category's expenses; `None` while it has none.
pub(crate) fn category_total(store: &Arc<dyn Store>, id: CategoryId) -> Live<Option<Amount>> {
    let source = store.clone();
    Live::spawn("category total", store.changes(), Scope::EXPENSES, move || {
        let store = source.clone();
        async move { store.category_total(id).await }
    })
}
