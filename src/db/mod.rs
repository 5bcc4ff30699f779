//! This module is responsible for reading, writing and managing the SQLite database.

mod migrations;

use crate::error::Res;
use crate::model::{Amount, Category, CategoryId, CategoryWithExpenses, Expense, ExpenseId};
use crate::store::{Changes, Store, Table};
use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, trace};

const CATEGORY_COLUMNS: &str = "id, name, icon, color, budget_cents";
const EXPENSE_COLUMNS: &str = "id, amount_cents, category_id, date_ms, note";

/// The SQLite-backed `Store`. Cloning is cheap; clones share the connection pool and the change
/// channel.
#[derive(Debug, Clone)]
pub(crate) struct Db {
    pool: SqlitePool,
    changes: Arc<watch::Sender<Changes>>,
}

impl Db {
    /// - Validates that there is a SQLite file at `path`
    /// - Opens a connection pool
    /// - Updates the database schema with migrations if it is out-of-date
    pub(crate) async fn load(path: impl AsRef<Path>, max_connections: u32) -> Res<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            bail!("The database file is missing '{}'", path.display());
        }
        let db = Self::connect(path, max_connections, false).await?;
        let version = migrations::version(&db.pool).await?;
        if version > migrations::CURRENT_VERSION {
            bail!(
                "The database schema is at version {version} but this program only understands \
                up to version {}",
                migrations::CURRENT_VERSION
            );
        }
        migrations::run(&db.pool, version, migrations::CURRENT_VERSION).await?;
        Ok(db)
    }

    /// - Validates that no file currently exists at `path`
    /// - Creates a new SQLite file at `path`
    /// - Initializes the database schema
    pub(crate) async fn init(path: impl AsRef<Path>, max_connections: u32) -> Res<Self> {
        let path = path.as_ref();
        if path.exists() {
            bail!("A database already exists at '{}'", path.display());
        }
        let db = Self::connect(path, max_connections, true).await?;
        migrations::bootstrap(&db.pool).await?;
        migrations::run(&db.pool, 0, migrations::CURRENT_VERSION).await?;
        debug!("Created database at {}", path.display());
        Ok(db)
    }

    async fn connect(path: &Path, max_connections: u32, create: bool) -> Res<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(create)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .with_context(|| format!("Unable to open SQLite database at {}", path.display()))?;
        let (changes, _) = watch::channel(Changes::default());
        Ok(Self {
            pool,
            changes: Arc::new(changes),
        })
    }

    /// Publishes a write to `table`. Must only be called after the write has been committed.
    fn notify(&self, table: Table) {
        trace!("{table:?} changed");
        self.changes.send_modify(|changes| changes.bump(table));
    }

    /// Writes an expense row as-is, bypassing the model, and publishes the change.
    #[cfg(test)]
    pub(crate) async fn plant_expense(&self, category_id: CategoryId, date_ms: i64) {
        sqlx::query(
            "INSERT INTO expenses (amount_cents, category_id, date_ms, note) VALUES (100, ?, ?, NULL)",
        )
        .bind(category_id.get())
        .bind(date_ms)
        .execute(&self.pool)
        .await
        .unwrap();
        self.notify(Table::Expenses);
    }

    async fn fetch_expenses(
        &self,
        executor: impl sqlx::Executor<'_, Database = Sqlite>,
    ) -> Res<Vec<Expense>> {
        let rows: Vec<ExpenseRow> = sqlx::query_as(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses ORDER BY date_ms DESC, id DESC"
        ))
        .fetch_all(executor)
        .await
        .context("Failed to query expenses")?;
        rows.into_iter().map(Expense::try_from).collect()
    }

    async fn fetch_categories(
        &self,
        executor: impl sqlx::Executor<'_, Database = Sqlite>,
    ) -> Res<Vec<Category>> {
        let rows: Vec<CategoryRow> =
            sqlx::query_as(&format!("SELECT {CATEGORY_COLUMNS} FROM categories"))
                .fetch_all(executor)
                .await
                .context("Failed to query categories")?;
        Ok(rows.into_iter().map(Category::from).collect())
    }
}

#[async_trait::async_trait]
impl Store for Db {
    async fn insert_category(&self, category: &Category) -> Res<CategoryId> {
        let budget = category.budget().cents()?;
        let id = match category.id() {
            Some(id) => {
                sqlx::query(
                    "INSERT INTO categories (id, name, icon, color, budget_cents) \
                    VALUES (?, ?, ?, ?, ?) \
                    ON CONFLICT(id) DO UPDATE SET name = excluded.name, icon = excluded.icon, \
                    color = excluded.color, budget_cents = excluded.budget_cents",
                )
                .bind(id.get())
                .bind(category.name())
                .bind(category.icon())
                .bind(category.color())
                .bind(budget)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to upsert category {id}"))?;
                id
            }
            None => {
                let result = sqlx::query(
                    "INSERT INTO categories (name, icon, color, budget_cents) VALUES (?, ?, ?, ?)",
                )
                .bind(category.name())
                .bind(category.icon())
                .bind(category.color())
                .bind(budget)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to insert category '{}'", category.name()))?;
                CategoryId::new(result.last_insert_rowid())
            }
        };
        self.notify(Table::Categories);
        debug!("Stored category {id} '{}'", category.name());
        Ok(id)
    }

    async fn insert_expense(&self, expense: &Expense) -> Res<ExpenseId> {
        let amount = expense.amount().cents()?;
        let date = expense.date().timestamp_millis();
        let id = match expense.id() {
            Some(id) => {
                sqlx::query(
                    "INSERT INTO expenses (id, amount_cents, category_id, date_ms, note) \
                    VALUES (?, ?, ?, ?, ?) \
                    ON CONFLICT(id) DO UPDATE SET amount_cents = excluded.amount_cents, \
                    category_id = excluded.category_id, date_ms = excluded.date_ms, \
                    note = excluded.note",
                )
                .bind(id.get())
                .bind(amount)
                .bind(expense.category_id().get())
                .bind(date)
                .bind(expense.note())
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to upsert expense {id}"))?;
                id
            }
            None => {
                let result = sqlx::query(
                    "INSERT INTO expenses (amount_cents, category_id, date_ms, note) \
                    VALUES (?, ?, ?, ?)",
                )
                .bind(amount)
                .bind(expense.category_id().get())
                .bind(date)
                .bind(expense.note())
                .execute(&self.pool)
                .await
                .context("Failed to insert expense")?;
                ExpenseId::new(result.last_insert_rowid())
            }
        };
        self.notify(Table::Expenses);
        debug!("Stored expense {id} of {}", expense.amount());
        Ok(id)
    }

    async fn delete_category(&self, id: CategoryId) -> Res<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id.get())
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to delete category {id}"))?;
        let deleted = result.rows_affected() > 0;
        if deleted {
            self.notify(Table::Categories);
        }
        Ok(deleted)
    }

    async fn delete_expense(&self, id: ExpenseId) -> Res<bool> {
        let result = sqlx::query("DELETE FROM expenses WHERE id = ?")
            .bind(id.get())
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to delete expense {id}"))?;
        let deleted = result.rows_affected() > 0;
        if deleted {
            self.notify(Table::Expenses);
        }
        Ok(deleted)
    }

    async fn seed_categories(&self, categories: &[Category]) -> Res<u64> {
        if categories.is_empty() {
            return Ok(0);
        }
        let mut rows = Vec::with_capacity(categories.len());
        for category in categories {
            rows.push((
                category.name().to_string(),
                category.icon().to_string(),
                category.color().to_string(),
                category.budget().cents()?,
            ));
        }

        // A single statement, so the emptiness check and the inserts cannot interleave with
        // another writer. SQLite buffers the SELECT because it reads the target table.
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO categories (name, icon, color, budget_cents) \
            SELECT column1, column2, column3, column4 FROM (",
        );
        query.push_values(rows, |mut row, (name, icon, color, budget)| {
            row.push_bind(name)
                .push_bind(icon)
                .push_bind(color)
                .push_bind(budget);
        });
        query.push(") WHERE NOT EXISTS (SELECT 1 FROM categories)");

        let inserted = query
            .build()
            .execute(&self.pool)
            .await
            .context("Failed to seed categories")?
            .rows_affected();
        if inserted > 0 {
            self.notify(Table::Categories);
        }
        Ok(inserted)
    }

    async fn categories(&self) -> Res<Vec<Category>> {
        self.fetch_categories(&self.pool).await
    }

    async fn categories_with_expenses(&self) -> Res<Vec<CategoryWithExpenses>> {
        // Both reads share one transaction so they see the same snapshot.
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin read transaction")?;
        let categories = self.fetch_categories(&mut *tx).await?;
        let expenses = self.fetch_expenses(&mut *tx).await?;
        tx.commit()
            .await
            .context("Failed to end read transaction")?;

        let mut by_category: BTreeMap<CategoryId, Vec<Expense>> = BTreeMap::new();
        for expense in expenses {
            by_category
                .entry(expense.category_id())
                .or_default()
                .push(expense);
        }

        Ok(categories
            .into_iter()
            .map(|category| {
                let expenses = category
                    .id()
                    .and_then(|id| by_category.remove(&id))
                    .unwrap_or_default();
                CategoryWithExpenses::new(category, expenses)
            })
            .collect())
    }

    async fn expenses(&self) -> Res<Vec<Expense>> {
        self.fetch_expenses(&self.pool).await
    }

    async fn expenses_by_category(&self, id: CategoryId) -> Res<Vec<Expense>> {
        let rows: Vec<ExpenseRow> = sqlx::query_as(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE category_id = ? \
            ORDER BY date_ms DESC, id DESC"
        ))
        .bind(id.get())
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to query expenses of category {id}"))?;
        rows.into_iter().map(Expense::try_from).collect()
    }

    async fn total_expenses(&self) -> Res<Option<Amount>> {
        let cents: Option<i64> = sqlx::query_scalar("SELECT SUM(amount_cents) FROM expenses")
            .fetch_one(&self.pool)
            .await
            .context("Failed to sum expenses")?;
        Ok(cents.map(Amount::from_cents))
    }

    async fn category_total(&self, id: CategoryId) -> Res<Option<Amount>> {
        let cents: Option<i64> =
            sqlx::query_scalar("SELECT SUM(amount_cents) FROM expenses WHERE category_id = ?")
                .bind(id.get())
                .fetch_one(&self.pool)
                .await
                .with_context(|| format!("Failed to sum expenses of category {id}"))?;
        Ok(cents.map(Amount::from_cents))
    }

    fn changes(&self) -> watch::Receiver<Changes> {
        self.changes.subscribe()
    }
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: i64,
    name: String,
    icon: String,
    color: String,
    budget_cents: i64,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category::new(
            row.name,
            row.icon,
            row.color,
            Amount::from_cents(row.budget_cents),
        )
        .with_id(CategoryId::new(row.id))
    }
}

#[derive(sqlx::FromRow)]
struct ExpenseRow {
    id: i64,
    amount_cents: i64,
    category_id: i64,
    date_ms: i64,
    note: Option<String>,
}

impl TryFrom<ExpenseRow> for Expense {
    type Error = anyhow::Error;

    fn try_from(row: ExpenseRow) -> Res<Self> {
        let date = DateTime::<Utc>::from_timestamp_millis(row.date_ms)
            .with_context(|| format!("Expense {} has an invalid date {}", row.id, row.date_ms))?;
        let expense = Expense::new(
            Amount::from_cents(row.amount_cents),
            CategoryId::new(row.category_id),
        )
        .with_id(ExpenseId::new(row.id))
        .with_date(date);
        Ok(match row.note {
            Some(note) => expense.with_note(note),
            None => expense,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    async fn create_test_db() -> (TempDir, Db) {
        let temp_dir = TempDir::new().unwrap();
        let db = Db::init(temp_dir.path().join("expenses.sqlite"), 2)
            .await
            .unwrap();
        (temp_dir, db)
    }

    fn dollars(d: i64) -> Amount {
        Amount::from_cents(d * 100)
    }

    async fn food(db: &Db) -> CategoryId {
        db.insert_category(&Category::new("Food", "diet", "category_food", dollars(500)))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_init_refuses_existing_file() {
        let (temp_dir, _db) = create_test_db().await;
        let result = Db::init(temp_dir.path().join("expenses.sqlite"), 1).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_load_requires_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = Db::load(temp_dir.path().join("missing.sqlite"), 1).await;
        assert!(result.unwrap_err().to_string().contains("missing"));
    }

    #[tokio::test]
    async fn test_load_existing() {
        let (temp_dir, db) = create_test_db().await;
        let id = food(&db).await;
        db.pool.close().await;

        let db = Db::load(temp_dir.path().join("expenses.sqlite"), 1)
            .await
            .unwrap();
        let categories = db.categories().await.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].id(), Some(id));
    }

    #[tokio::test]
    async fn test_insert_category_round_trip() {
        let (_t, db) = create_test_db().await;
        let category = Category::new("Pets", "paw", "category_pets", dollars(75));
        let id = db.insert_category(&category).await.unwrap();

        let stored = db.categories().await.unwrap();
        assert_eq!(stored, vec![category.with_id(id)]);
    }

    #[tokio::test]
    async fn test_insert_category_allocates_unique_ids() {
        let (_t, db) = create_test_db().await;
        let a = food(&db).await;
        let b = food(&db).await;
        assert_ne!(a, b);

        // A deleted id is not handed out again.
        assert!(db.delete_category(b).await.unwrap());
        let c = food(&db).await;
        assert!(c.get() > b.get());
    }

    #[tokio::test]
    async fn test_insert_category_with_id_replaces() {
        let (_t, db) = create_test_db().await;
        let id = food(&db).await;
        let renamed = Category::new("Groceries", "cart", "category_food", dollars(650)).with_id(id);

        let returned = db.insert_category(&renamed).await.unwrap();

        assert_eq!(returned, id);
        assert_eq!(db.categories().await.unwrap(), vec![renamed]);
    }

    #[tokio::test]
    async fn test_insert_category_with_unknown_id_creates() {
        let (_t, db) = create_test_db().await;
        let category = Category::new("Gifts", "gift", "category_gifts", dollars(50))
            .with_id(CategoryId::new(77));
        assert_eq!(
            db.insert_category(&category).await.unwrap(),
            CategoryId::new(77)
        );
        assert_eq!(db.categories().await.unwrap(), vec![category]);
    }

    #[tokio::test]
    async fn test_insert_expense_round_trip() {
        let (_t, db) = create_test_db().await;
        let category_id = food(&db).await;
        let date = Utc.with_ymd_and_hms(2024, 3, 1, 18, 30, 0).unwrap();
        let expense = Expense::new(Amount::from_cents(1250), category_id)
            .with_date(date)
            .with_note("lunch");

        let id = db.insert_expense(&expense).await.unwrap();

        assert_eq!(db.expenses().await.unwrap(), vec![expense.with_id(id)]);
    }

    #[tokio::test]
    async fn test_insert_expense_with_id_replaces() {
        let (_t, db) = create_test_db().await;
        let category_id = food(&db).await;
        let id = db
            .insert_expense(&Expense::new(dollars(10), category_id))
            .await
            .unwrap();
        let replacement = Expense::new(dollars(12), category_id).with_id(id);

        db.insert_expense(&replacement).await.unwrap();

        assert_eq!(db.expenses().await.unwrap(), vec![replacement]);
    }

    #[tokio::test]
    async fn test_insert_expense_requires_category() {
        let (_t, db) = create_test_db().await;
        let result = db
            .insert_expense(&Expense::new(dollars(10), CategoryId::new(999)))
            .await;
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("FOREIGN KEY constraint failed"), "{message}");
    }

    #[tokio::test]
    async fn test_delete_missing_is_noop() {
        let (_t, db) = create_test_db().await;
        let mut changes = db.changes();
        assert!(!db.delete_expense(ExpenseId::new(5)).await.unwrap());
        assert!(!db.delete_category(CategoryId::new(5)).await.unwrap());
        assert!(!changes.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_delete_category_with_expenses_is_restricted() {
        let (_t, db) = create_test_db().await;
        let category_id = food(&db).await;
        db.insert_expense(&Expense::new(dollars(10), category_id))
            .await
            .unwrap();
        assert!(db.delete_category(category_id).await.is_err());
        assert_eq!(db.categories().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_totals() {
        let (_t, db) = create_test_db().await;
        assert_eq!(db.total_expenses().await.unwrap(), None);

        let food = food(&db).await;
        let bills = db
            .insert_category(&Category::new("Bills", "bill", "category_bills", dollars(1000)))
            .await
            .unwrap();
        assert_eq!(db.category_total(food).await.unwrap(), None);

        db.insert_expense(&Expense::new(Amount::from_cents(1050), food))
            .await
            .unwrap();
        db.insert_expense(&Expense::new(Amount::from_cents(525), food))
            .await
            .unwrap();
        let rent = db
            .insert_expense(&Expense::new(dollars(900), bills))
            .await
            .unwrap();

        assert_eq!(
            db.total_expenses().await.unwrap(),
            Some(Amount::from_cents(91575))
        );
        assert_eq!(
            db.category_total(food).await.unwrap(),
            Some(Amount::from_cents(1575))
        );

        assert!(db.delete_expense(rent).await.unwrap());
        assert_eq!(
            db.total_expenses().await.unwrap(),
            Some(Amount::from_cents(1575))
        );
        assert_eq!(db.category_total(bills).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_categories_with_expenses() {
        let (_t, db) = create_test_db().await;
        let food = food(&db).await;
        let bills = db
            .insert_category(&Category::new("Bills", "bill", "category_bills", dollars(1000)))
            .await
            .unwrap();
        let early = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 3, 2, 9, 0, 0).unwrap();
        let a = db
            .insert_expense(&Expense::new(dollars(10), food).with_date(early))
            .await
            .unwrap();
        let b = db
            .insert_expense(&Expense::new(dollars(5), food).with_date(late))
            .await
            .unwrap();

        let joined = db.categories_with_expenses().await.unwrap();

        assert_eq!(joined.len(), 2);
        let food_entry = joined
            .iter()
            .find(|c| c.category().id() == Some(food))
            .unwrap();
        let ids: Vec<_> = food_entry.expenses().iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec![Some(b), Some(a)]);
        assert_eq!(food_entry.total_amount(), dollars(15));
        let bills_entry = joined
            .iter()
            .find(|c| c.category().id() == Some(bills))
            .unwrap();
        assert!(bills_entry.expenses().is_empty());
        assert_eq!(bills_entry.total_amount(), Amount::ZERO);
    }

    #[tokio::test]
    async fn test_expenses_by_category() {
        let (_t, db) = create_test_db().await;
        let food = food(&db).await;
        let other = db
            .insert_category(&Category::new("Other", "menu", "category_other", dollars(200)))
            .await
            .unwrap();
        db.insert_expense(&Expense::new(dollars(3), other))
            .await
            .unwrap();
        let mine = db
            .insert_expense(&Expense::new(dollars(4), food))
            .await
            .unwrap();

        let expenses = db.expenses_by_category(food).await.unwrap();
        assert_eq!(expenses.len(), 1);
        assert_eq!(expenses[0].id(), Some(mine));
    }

    #[tokio::test]
    async fn test_seed_categories_only_when_empty() {
        let (_t, db) = create_test_db().await;
        let defaults = crate::model::default_categories();

        assert_eq!(db.seed_categories(&defaults).await.unwrap(), 8);
        assert_eq!(db.seed_categories(&defaults).await.unwrap(), 0);

        let stored = db.categories().await.unwrap();
        assert_eq!(stored.len(), 8);
        let names: Vec<_> = stored.iter().map(|c| c.name()).collect();
        assert_eq!(
            names,
            vec![
                "Food",
                "Transportation",
                "Entertainment",
                "Shopping",
                "Bills",
                "Health",
                "Education",
                "Other"
            ]
        );
        assert_eq!(stored[4].budget(), dollars(1000));
    }

    #[tokio::test]
    async fn test_seed_categories_skips_non_empty_store() {
        let (_t, db) = create_test_db().await;
        food(&db).await;
        let inserted = db
            .seed_categories(&crate::model::default_categories())
            .await
            .unwrap();
        assert_eq!(inserted, 0);
        assert_eq!(db.categories().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_seeding_inserts_once() {
        let (_t, db) = create_test_db().await;
        let defaults = crate::model::default_categories();
        let (a, b) = tokio::join!(db.seed_categories(&defaults), db.seed_categories(&defaults));
        assert_eq!(a.unwrap() + b.unwrap(), 8);
        assert_eq!(db.categories().await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_writes_publish_changes() {
        let (_t, db) = create_test_db().await;
        let mut changes = db.changes();
        let before = *changes.borrow_and_update();

        let id = food(&db).await;
        assert!(changes.has_changed().unwrap());
        let after_category = *changes.borrow_and_update();
        assert_eq!(after_category.generation(Table::Categories), 1);
        assert_eq!(
            after_category.generation(Table::Expenses),
            before.generation(Table::Expenses)
        );

        db.insert_expense(&Expense::new(dollars(1), id))
            .await
            .unwrap();
        let after_expense = *changes.borrow_and_update();
        assert_eq!(after_expense.generation(Table::Expenses), 1);
    }
}
