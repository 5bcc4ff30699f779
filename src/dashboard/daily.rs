//! Grouping of a month's expenses by calendar day.

use crate::error::{Error, Res};
use crate::model::{DailyExpense, Expense};
use crate::Result;
use anyhow::Context;
use chrono::{Datelike, Months, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::ops::Range;
use std::str::FromStr;

/// A calendar month of a specific year, e.g. `2024-03`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawMonth")]
pub struct CalendarMonth {
    year: i32,
    month: u32,
}

#[derive(Deserialize)]
struct RawMonth {
    year: i32,
    month: u32,
}

impl TryFrom<RawMonth> for CalendarMonth {
    type Error = Error;

    fn try_from(raw: RawMonth) -> Result<Self> {
        Self::new(raw.year, raw.month)
    }
}

impl CalendarMonth {
    /// Fails if `month` is not within `1..=12` or the year is out of range.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        first_day(year, month)
            .map(|_| Self { year, month })
            .ok_or_else(|| Error::validation(format!("Invalid month {year}-{month:02}")))
    }

    /// The month that contains `date`.
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The current month in the time zone `tz`.
    pub fn current<Tz: TimeZone>(tz: &Tz) -> Self {
        Self::containing(Utc::now().with_timezone(tz).date_naive())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The days of this month, from the first up to, but not including, the first of the next.
    pub fn days(&self) -> Res<Range<NaiveDate>> {
        let start = first_day(self.year, self.month)
            .with_context(|| format!("Invalid month {self}"))?;
        let end = start
            .checked_add_months(Months::new(1))
            .with_context(|| format!("The month after {self} is out of range"))?;
        Ok(start..end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

fn first_day(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

impl Display for CalendarMonth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for CalendarMonth {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::validation(format!("Expected a month like 2024-03, got '{s}'"));
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        Self::new(year, month)
    }
}

/// Keeps the expenses whose date, seen in `tz`, falls within `month` and groups them by day. Days
/// are ordered most recent first, as are the expenses within a day.
pub(crate) fn group_by_day<Tz: TimeZone>(
    expenses: impl IntoIterator<Item = Expense>,
    month: CalendarMonth,
    tz: &Tz,
) -> Vec<DailyExpense> {
    let mut days: BTreeMap<NaiveDate, Vec<Expense>> = BTreeMap::new();
    for expense in expenses {
        let day = expense.date().with_timezone(tz).date_naive();
        if month.contains(day) {
            days.entry(day).or_default().push(expense);
        }
    }

    days.into_iter()
        .rev()
        .map(|(day, mut expenses)| {
            expenses.sort_by(|a, b| b.date().cmp(&a.date()));
            DailyExpense::new(day, expenses)
        })
        .collect()
}
