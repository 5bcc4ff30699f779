//! The `Store` trait is the seam between the repository and a concrete persistence engine.
//!
//! Every read is a one-shot snapshot; live observation is layered on top by the query layer, which
//! re-runs a read whenever `changes()` reports that a table it depends on was written.

use crate::error::Res;
use crate::model::{Amount, Category, CategoryId, CategoryWithExpenses, Expense, ExpenseId};
use tokio::sync::watch;

/// The tables held by a `Store`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Table {
    Categories,
    Expenses,
}

/// A write generation per table. A store bumps the counter of a table after every committed write
/// to it, so two `Changes` values can be compared to learn which tables were written in between.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct Changes {
    categories: u64,
    expenses: u64,
}

impl Changes {
    pub fn generation(&self, table: Table) -> u64 {
        match table {
            Table::Categories => self.categories,
            Table::Expenses => self.expenses,
        }
    }

    pub(crate) fn bump(&mut self, table: Table) {
        match table {
            Table::Categories => self.categories += 1,
            Table::Expenses => self.expenses += 1,
        }
    }
}

/// The set of tables that a query reads.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Scope(&'static [Table]);

impl Scope {
    pub const CATEGORIES: Scope = Scope(&[Table::Categories]);
    pub const EXPENSES: Scope = Scope(&[Table::Expenses]);
    pub const ALL: Scope = Scope(&[Table::Categories, Table::Expenses]);

    /// Returns true if any table in this scope was written between `before` and `after`.
    pub fn touched(&self, before: &Changes, after: &Changes) -> bool {
        self.0
            .iter()
            .any(|&table| before.generation(table) != after.generation(table))
    }
}

/// Durable storage for categories and expenses.
///
/// Inserts have upsert-by-id semantics: a record without an id is created with a freshly allocated
/// one, a record with an id replaces (or creates) the row at that id. Implementations must publish
/// a new `Changes` value after each write is committed, never before.
#[async_trait::async_trait]
pub trait Store: Send + Sync + 'static {
    async fn insert_category(&self, category: &Category) -> Res<CategoryId>;

    async fn insert_expense(&self, expense: &Expense) -> Res<ExpenseId>;

    /// Returns false if no category had the given id.
    async fn delete_category(&self, id: CategoryId) -> Res<bool>;

    /// Returns false if no expense had the given id.
    async fn delete_expense(&self, id: ExpenseId) -> Res<bool>;

    /// Inserts all of `categories` if, and only if, the store holds no categories. The check and
    /// the insert are one atomic operation. Returns the number of categories inserted.
    async fn seed_categories(&self, categories: &[Category]) -> Res<u64>;

    async fn categories(&self) -> Res<Vec<Category>>;

    /// Every category with its expenses, read from a single consistent snapshot.
    async fn categories_with_expenses(&self) -> Res<Vec<CategoryWithExpenses>>;

    /// All expenses, most recent first.
    async fn expenses(&self) -> Res<Vec<Expense>>;

    /// The expenses of one category, most recent first.
    async fn expenses_by_category(&self, id: CategoryId) -> Res<Vec<Expense>>;

    /// `None` when there are no expenses.
    async fn total_expenses(&self) -> Res<Option<Amount>>;

    /// `None` when the category has no expenses.
    async fn category_total(&self, id: CategoryId) -> Res<Option<Amount>>;

    fn changes(&self) -> watch::Receiver<Changes>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_touched() {
        let before = Changes::default();
        let mut after = before;
        after.bump(Table::Expenses);

        assert!(Scope::EXPENSES.touched(&before, &after));
        assert!(Scope::ALL.touched(&before, &after));
        assert!(!Scope::CATEGORIES.touched(&before, &after));
        assert!(!Scope::ALL.touched(&after, &after));
    }
}
