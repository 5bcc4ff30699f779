//! Read-only reports: the budget summary and the daily breakdown.

use crate::args::DailyArgs;
use crate::commands::Out;
use crate::dashboard::{CalendarMonth, CategoryProgress, MonthlyProgress};
use crate::model::{Amount, DailyExpense};
use crate::{Config, Dashboard, Result};
use chrono::Local;
use serde::Serialize;
use std::fmt::Write;

/// The output of the `summary` command.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    total: Amount,
    monthly: MonthlyProgress,
    categories: Vec<CategoryProgress>,
}

impl Summary {
    pub fn total(&self) -> Amount {
        self.total
    }

    pub fn monthly(&self) -> MonthlyProgress {
        self.monthly
    }

    pub fn categories(&self) -> &[CategoryProgress] {
        &self.categories
    }
}

/// Reports the grand total, the overall budget progress and the progress of each category.
pub async fn summary(config: Config) -> Result<Out<Summary>> {
    let dashboard = Dashboard::start(config.repository(), config.seed_default_categories()).await?;
    let monthly = dashboard.monthly_progress();
    let mut categories = dashboard.category_progress();
    categories.sort_by(|a, b| a.category().name().cmp(b.category().name()));

    let mut message = format!(
        "Spent {} of {} ({}%, {})",
        monthly.total_spent(),
        monthly.total_budget(),
        monthly.percent(),
        monthly.status()
    );
    for progress in &categories {
        let _ = write!(
            message,
            "\n  {}: {} of {} ({}%, {})",
            progress.category().name(),
            progress.spent(),
            progress.category().budget(),
            progress.percent(),
            progress.status()
        );
    }

    Ok(Out::new(
        message,
        Summary {
            total: dashboard.total_expenses(),
            monthly,
            categories,
        },
    ))
}

/// Reports the expenses of a month, by default the current one, grouped by local day.
pub async fn daily(config: Config, args: DailyArgs) -> Result<Out<Vec<DailyExpense>>> {
    let dashboard = Dashboard::start(config.repository(), config.seed_default_categories()).await?;
    let month = args
        .month()
        .unwrap_or_else(|| CalendarMonth::current(&Local));
    let days = dashboard.daily_expenses_local(month);

    if days.is_empty() {
        return Ok(Out::new(format!("No expenses in {month}"), days));
    }
    let total: Amount = days.iter().map(|d| d.total_amount()).sum();
    let mut message = format!("Spent {total} in {month}");
    for day in &days {
        let count = day.expenses().len();
        let _ = write!(
            message,
            "\n  {}: {} ({} expense{})",
            day.date(),
            day.total_amount(),
            count,
            if count == 1 { "" } else { "s" }
        );
    }
    Ok(Out::new(message, days))
}
