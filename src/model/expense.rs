use crate::model::{Amount, CategoryId};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The identity of a stored `Expense`, assigned by the database.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpenseId(i64);

impl ExpenseId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl Display for ExpenseId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// A single expense recorded against a category.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Expense {
    id: Option<ExpenseId>,
    amount: Amount,
    category_id: CategoryId,
    date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
}

impl Expense {
    /// Creates an expense dated now.
    pub fn new(amount: Amount, category_id: CategoryId) -> Self {
        Self {
            id: None,
            amount,
            category_id,
            date: Utc::now().trunc_subsecs(3),
            note: None,
        }
    }

    pub fn with_id(mut self, id: ExpenseId) -> Self {
        self.id = Some(id);
        self
    }

    /// Dates are kept at millisecond precision, the resolution of the database column.
    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = date.trunc_subsecs(3);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn id(&self) -> Option<ExpenseId> {
        self.id
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn category_id(&self) -> CategoryId {
        self.category_id
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }
}
