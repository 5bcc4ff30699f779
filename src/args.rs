//! These structs provide the CLI interface for the expenses CLI.

use crate::dashboard::CalendarMonth;
use crate::model::{Amount, CategoryId, ExpenseId};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing::level_filters::LevelFilter;

/// expenses: A command-line tool for tracking spending against category budgets.
///
/// Expenses are recorded against categories, each with a monthly budget. The data lives in a
/// SQLite database inside the expenses home directory. Run `expenses init` first.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory, its configuration file and an empty database.
    ///
    /// The directory is --expenses-home, by default $HOME/expenses. The default categories are
    /// added the first time any other command opens the database.
    Init,
    /// Add a category with a monthly budget.
    AddCategory(AddCategoryArgs),
    /// Record an expense against a category.
    AddExpense(AddExpenseArgs),
    /// Show the total spent and the progress against each budget.
    Summary,
    /// Show the expenses of a month grouped by day.
    Daily(DailyArgs),
    /// Delete an expense.
    DeleteExpense(DeleteExpenseArgs),
    /// Delete a category. Fails while any expense still references it.
    DeleteCategory(DeleteCategoryArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where the expenses database and configuration are held. Defaults to
    /// ~/expenses
    #[arg(long, env = "EXPENSES_HOME", default_value_t = default_expenses_home())]
    expenses_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, expenses_home: PathBuf) -> Self {
        Self {
            log_level,
            expenses_home: expenses_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn expenses_home(&self) -> &DisplayPath {
        &self.expenses_home
    }
}

/// Args for the `expenses add-category` command.
#[derive(Debug, Parser, Clone)]
pub struct AddCategoryArgs {
    /// The name of the category, e.g. "Groceries"
    #[arg(long)]
    name: String,

    /// A token naming the icon to show for the category
    #[arg(long, default_value = "menu")]
    icon: String,

    /// A token naming the color to show for the category
    #[arg(long, default_value = "category_other")]
    color: String,

    /// The monthly budget, e.g. 250 or $1,200.00
    #[arg(long)]
    budget: Amount,
}

impl AddCategoryArgs {
    pub fn new(
        name: impl Into<String>,
        icon: impl Into<String>,
        color: impl Into<String>,
        budget: Amount,
    ) -> Self {
        Self {
            name: name.into(),
            icon: icon.into(),
            color: color.into(),
            budget,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn icon(&self) -> &str {
        &self.icon
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn budget(&self) -> Amount {
        self.budget
    }
}

/// Args for the `expenses add-expense` command.
#[derive(Debug, Parser, Clone)]
pub struct AddExpenseArgs {
    /// The amount spent, e.g. 12.50
    #[arg(long)]
    amount: Amount,

    /// The exact name of the category
    #[arg(long)]
    category: String,

    /// An optional note
    #[arg(long)]
    note: Option<String>,

    /// The day of the expense as YYYY-MM-DD. Defaults to now.
    #[arg(long)]
    date: Option<NaiveDate>,
}

impl AddExpenseArgs {
    pub fn new(
        amount: Amount,
        category: impl Into<String>,
        note: Option<String>,
        date: Option<NaiveDate>,
    ) -> Self {
        Self {
            amount,
            category: category.into(),
            note,
            date,
        }
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }
}

/// Args for the `expenses daily` command.
#[derive(Debug, Parser, Clone)]
pub struct DailyArgs {
    /// The month to show as YYYY-MM. Defaults to the current month.
    #[arg(long)]
    month: Option<CalendarMonth>,
}

impl DailyArgs {
    pub fn new(month: Option<CalendarMonth>) -> Self {
        Self { month }
    }

    pub fn month(&self) -> Option<CalendarMonth> {
        self.month
    }
}

/// Args for the `expenses delete-expense` command.
#[derive(Debug, Parser, Clone)]
pub struct DeleteExpenseArgs {
    /// The ID of the expense
    #[arg(long)]
    id: i64,
}

impl DeleteExpenseArgs {
    pub fn new(id: ExpenseId) -> Self {
        Self { id: id.get() }
    }

    pub fn id(&self) -> ExpenseId {
        ExpenseId::new(self.id)
    }
}

/// Args for the `expenses delete-category` command.
#[derive(Debug, Parser, Clone)]
pub struct DeleteCategoryArgs {
    /// The ID of the category
    #[arg(long)]
    id: i64,
}

impl DeleteCategoryArgs {
    pub fn new(id: CategoryId) -> Self {
        Self { id: id.get() }
    }

    pub fn id(&self) -> CategoryId {
        CategoryId::new(self.id)
    }
}

fn default_expenses_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("expenses"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --expenses-home or EXPENSES_HOME instead of relying on the \
                default expenses home directory. If you continue using the program right now, you \
                may have problems!",
            );
            PathBuf::from("expenses")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}
