//! Computed values that are derived from stored rows and never persisted.

use crate::model::{Amount, Category, Expense};
use chrono::NaiveDate;
use serde::Serialize;

/// A category together with every expense recorded against it, most recent first.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct CategoryWithExpenses {
    category: Category,
    expenses: Vec<Expense>,
}

impl CategoryWithExpenses {
    pub fn new(category: Category, expenses: Vec<Expense>) -> Self {
        Self { category, expenses }
    }

    pub fn category(&self) -> &Category {
        &self.category
    }

    pub fn expenses(&self) -> &[Expense] {
        &self.expenses
    }

    /// The sum of this category's expenses.
    pub fn total_amount(&self) -> Amount {
        self.expenses.iter().map(Expense::amount).sum()
    }
}

/// All expenses that fall on one calendar day.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct DailyExpense {
    date: NaiveDate,
    total_amount: Amount,
    expenses: Vec<Expense>,
}

impl DailyExpense {
    pub fn new(date: NaiveDate, expenses: Vec<Expense>) -> Self {
        let total_amount = expenses.iter().map(Expense::amount).sum();
        Self {
            date,
            total_amount,
            expenses,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn total_amount(&self) -> Amount {
        self.total_amount
    }

    pub fn expenses(&self) -> &[Expense] {
        &self.expenses
    }
}
