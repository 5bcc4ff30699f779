//! Budget progress calculations.

use crate::model::{Amount, Category, CategoryWithExpenses};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// How close spending is to its budget.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    /// Below 70% of the budget.
    Good,
    /// From 70% up to, but not including, 90%.
    Warning,
    /// 90% or more.
    Over,
}

serde_plain::derive_display_from_serialize!(BudgetStatus);
serde_plain::derive_fromstr_from_deserialize!(BudgetStatus);

impl BudgetStatus {
    pub fn from_percent(percent: u32) -> Self {
        match percent {
            0..=69 => BudgetStatus::Good,
            70..=89 => BudgetStatus::Warning,
            _ => BudgetStatus::Over,
        }
    }
}

/// Overall spending measured against the combined budget of every category.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct MonthlyProgress {
    total_budget: Amount,
    total_spent: Amount,
    percent: u8,
}

impl MonthlyProgress {
    pub fn total_budget(&self) -> Amount {
        self.total_budget
    }

    pub fn total_spent(&self) -> Amount {
        self.total_spent
    }

    /// Spending as a percentage of the budget, clamped to `0..=100`.
    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn status(&self) -> BudgetStatus {
        BudgetStatus::from_percent(u32::from(self.percent))
    }
}

/// One category's spending measured against its own budget.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct CategoryProgress {
    category: Category,
    spent: Amount,
    percent: u32,
}

impl CategoryProgress {
    pub fn category(&self) -> &Category {
        &self.category
    }

    pub fn spent(&self) -> Amount {
        self.spent
    }

    /// Spending as a percentage of the category budget. Not clamped, so overspending shows as more
    /// than 100. Zero when the category has no budget.
    pub fn percent(&self) -> u32 {
        self.percent
    }

    pub fn status(&self) -> BudgetStatus {
        BudgetStatus::from_percent(self.percent)
    }
}

/// Computes the overall progress from a de-duplicated category list and the grand total.
pub(crate) fn monthly_progress(
    categories: &[CategoryWithExpenses],
    total_spent: Amount,
) -> MonthlyProgress {
    let total_budget: Amount = categories.iter().map(|c| c.category().budget()).sum();
    let percent = percent_of(total_spent, total_budget)
        .map(|p| p.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED))
        .and_then(|p| p.to_u8())
        .unwrap_or(0);
    MonthlyProgress {
        total_budget,
        total_spent,
        percent,
    }
}

pub(crate) fn category_progress(categories: &[CategoryWithExpenses]) -> Vec<CategoryProgress> {
    categories
        .iter()
        .map(|entry| {
            let spent = entry.total_amount();
            let percent = percent_of(spent, entry.category().budget())
                .and_then(|p| p.max(Decimal::ZERO).to_u32())
                .unwrap_or(0);
            CategoryProgress {
                category: entry.category().clone(),
                spent,
                percent,
            }
        })
        .collect()
}

/// `part / whole * 100`, rounded half away from zero. `None` unless `whole` is positive.
fn percent_of(part: Amount, whole: Amount) -> Option<Decimal> {
    if !whole.is_positive() {
        return None;
    }
    part.value()
        .checked_div(whole.value())?
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|p| p.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
}
