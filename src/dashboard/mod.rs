//! Derived state for a budgeting dashboard.
//!
//! The `Dashboard` keeps a de-duplicated list of categories with their expenses and the grand total
//! up-to-date by observing the `Repository`. Budget progress and the daily breakdown are computed
//! from that published state on demand and are never stored.

mod daily;
mod progress;

pub use daily::CalendarMonth;
pub use progress::{BudgetStatus, CategoryProgress, MonthlyProgress};

use crate::error::{Error, ErrorType};
use crate::model::{
    Amount, Category, CategoryId, CategoryWithExpenses, DailyExpense, Expense, ExpenseId,
};
use crate::observe::Live;
use crate::{Repository, Result};
use chrono::{DateTime, Local, TimeZone, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

/// The state that the `Dashboard` publishes.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct DashboardState {
    categories: Vec<CategoryWithExpenses>,
    total: Amount,
}

impl DashboardState {
    fn new(categories: Vec<CategoryWithExpenses>) -> Self {
        let categories = dedup_by_category(categories);
        let total = categories.iter().map(|c| c.total_amount()).sum();
        Self { categories, total }
    }

    /// Each stored category once, with its expenses.
    pub fn categories(&self) -> &[CategoryWithExpenses] {
        &self.categories
    }

    /// The sum of every expense. Zero while there are none.
    pub fn total(&self) -> Amount {
        self.total
    }
}

/// The input to `Dashboard::add_expense`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NewExpense {
    pub amount: Amount,
    pub category_id: CategoryId,
    pub note: Option<String>,
    /// Defaults to now.
    pub date: Option<DateTime<Utc>>,
}

impl NewExpense {
    pub fn new(amount: Amount, category_id: CategoryId) -> Self {
        Self {
            amount,
            category_id,
            note: None,
            date: None,
        }
    }
}

/// The input to `Dashboard::add_category`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NewCategory {
    pub name: String,
    pub icon: String,
    pub color: String,
    pub budget: Amount,
}

/// Observes a `Repository` and publishes the de-duplicated categories and the grand total.
///
/// The background tasks are aborted when the `Dashboard` is dropped.
#[derive(Debug)]
pub struct Dashboard {
    repository: Repository,
    state: watch::Receiver<DashboardState>,
    tasks: Vec<JoinHandle<()>>,
}

impl Dashboard {
    /// Starts observing `repository` and returns once the first state has been published.
    ///
    /// When `seed_defaults` is true and the category set is observed empty, the default categories
    /// are inserted. This happens at most once for the life of the `Dashboard`.
    pub async fn start(repository: Repository, seed_defaults: bool) -> Result<Self> {
        let mut seeding = None;
        if seed_defaults {
            let seeded = Arc::new(AtomicBool::new(false));
            let mut categories = repository.all_categories();
            let first = categories.next().await.ok_or_else(stopped)??;
            if first.is_empty() {
                seed_once(&repository, &seeded).await?;
            }
            seeding = Some((seeded, categories));
        }

        // The total is summed from the published categories.
        let mut categories = repository.categories_with_expenses();
        let initial = DashboardState::new(categories.next().await.ok_or_else(stopped)??);
        let (tx, state) = watch::channel(initial);

        let mut tasks = Vec::new();
        if let Some((seeded, categories)) = seeding {
            tasks.push(tokio::spawn(seed_when_empty(
                repository.clone(),
                seeded,
                categories,
            )));
        }
        tasks.push(tokio::spawn(async move {
            while let Some(snapshot) = categories.next().await {
                match snapshot {
                    Ok(snapshot) => {
                        tx.send_replace(DashboardState::new(snapshot));
                    }
                    Err(e) => debug!("Keeping the last dashboard state: {e}"),
                }
            }
            trace!("Stopped publishing the dashboard state");
        }));

        debug!("Dashboard started");
        Ok(Self {
            repository,
            state,
            tasks,
        })
    }

    /// A copy of the currently published state.
    pub fn state(&self) -> DashboardState {
        self.state.borrow().clone()
    }

    /// A receiver that is notified whenever the published state changes.
    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.state.clone()
    }

    pub fn categories_with_expenses(&self) -> Vec<CategoryWithExpenses> {
        self.state.borrow().categories.clone()
    }

    pub fn total_expenses(&self) -> Amount {
        self.state.borrow().total
    }

    /// Validates and stores a new expense.
    ///
    /// # Errors
    /// - `Validation` if the amount is not positive or the category does not exist
    /// - `Database` if the store fails
    pub async fn add_expense(&self, new: NewExpense) -> Result<ExpenseId> {
        if !new.amount.is_positive() {
            return Err(Error::validation(format!(
                "The amount must be greater than zero, got {}",
                new.amount
            )));
        }
        if new.amount.cents().is_err() {
            return Err(Error::validation(format!("The amount {} is too large", new.amount)));
        }
        let mut expense = Expense::new(new.amount, new.category_id);
        if let Some(date) = new.date {
            expense = expense.with_date(date);
        }
        if let Some(note) = new.note.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            expense = expense.with_note(note);
        }

        match self.repository.insert_expense(&expense).await {
            Ok(id) => {
                info!("Added expense {id} of {}", expense.amount());
                Ok(id)
            }
            Err(e) if e.is_foreign_key_violation() => Err(Error::validation(format!(
                "Category {} does not exist",
                new.category_id
            ))),
            Err(e) => Err(e),
        }
    }

    /// Validates and stores a new category. The name is trimmed.
    ///
    /// # Errors
    /// - `Validation` if the name is blank or the budget is not positive
    /// - `Database` if the store fails
    pub async fn add_category(&self, new: NewCategory) -> Result<CategoryId> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(Error::validation("The category name must not be empty"));
        }
        if !new.budget.is_positive() {
            return Err(Error::validation(format!(
                "The budget must be greater than zero, got {}",
                new.budget
            )));
        }
        if new.budget.cents().is_err() {
            return Err(Error::validation(format!("The budget {} is too large", new.budget)));
        }
        let category = Category::new(name, new.icon, new.color, new.budget);
        let id = self.repository.insert_category(&category).await?;
        info!("Added category {id} '{name}'");
        Ok(id)
    }

    /// Overall spending against the combined budget of every category.
    pub fn monthly_progress(&self) -> MonthlyProgress {
        let state = self.state.borrow();
        progress::monthly_progress(&state.categories, state.total)
    }

    /// Spending against the budget of each category.
    pub fn category_progress(&self) -> Vec<CategoryProgress> {
        progress::category_progress(&self.state.borrow().categories)
    }

    /// The categories sorted by name, as offered when picking one for a new expense.
    pub fn category_choices(&self) -> Vec<Category> {
        let mut choices: Vec<Category> = self
            .state
            .borrow()
            .categories
            .iter()
            .map(|c| c.category().clone())
            .collect();
        choices.sort_by(|a, b| a.name().cmp(b.name()));
        choices
    }

    /// The first category, by name order, whose name is exactly `name`.
    pub fn find_category(&self, name: &str) -> Option<Category> {
        self.category_choices().into_iter().find(|c| c.name() == name)
    }

    /// The expenses of `month`, grouped by their date in `tz`, most recent day first.
    pub fn daily_expenses<Tz: TimeZone>(&self, month: CalendarMonth, tz: &Tz) -> Vec<DailyExpense> {
        let expenses: Vec<Expense> = self
            .state
            .borrow()
            .categories
            .iter()
            .flat_map(|c| c.expenses().iter().cloned())
            .collect();
        daily::group_by_day(expenses, month, tz)
    }

    /// Like `daily_expenses` in the system's local time zone.
    pub fn daily_expenses_local(&self, month: CalendarMonth) -> Vec<DailyExpense> {
        self.daily_expenses(month, &Local)
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Keeps the first entry for each category id, in upstream order.
pub(crate) fn dedup_by_category(
    categories: Vec<CategoryWithExpenses>,
) -> Vec<CategoryWithExpenses> {
    let mut seen = HashSet::new();
    categories
        .into_iter()
        .filter(|c| match c.category().id() {
            Some(id) => seen.insert(id),
            None => true,
        })
        .collect()
}

/// Seeds the default categories unless `seeded` is already set.
async fn seed_once(repository: &Repository, seeded: &AtomicBool) -> Result<u64> {
    if seeded.swap(true, Ordering::SeqCst) {
        return Ok(0);
    }
    let inserted = repository.seed_default_categories().await.inspect_err(|_| {
        // Allow a retry on the next empty observation.
        seeded.store(false, Ordering::SeqCst);
    })?;
    if inserted > 0 {
        info!("Added {inserted} default categories");
    }
    Ok(inserted)
}

async fn seed_when_empty(
    repository: Repository,
    seeded: Arc<AtomicBool>,
    mut categories: Live<Vec<Category>>,
) {
    while let Some(snapshot) = categories.next().await {
        let Ok(snapshot) = snapshot else {
            continue;
        };
        if snapshot.is_empty() && !seeded.load(Ordering::SeqCst) {
            if let Err(e) = seed_once(&repository, &seeded).await {
                error!("Unable to add the default categories: {e}");
            }
        }
    }
}

fn stopped() -> Error {
    Error::new(
        ErrorType::Service,
        anyhow::anyhow!("A query stopped before publishing its first result"),
    )
}
