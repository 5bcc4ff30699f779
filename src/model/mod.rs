//! Types that represent the core data model, such as `Category` and `Expense`.
mod amount;
mod category;
mod expense;
mod views;

pub use amount::{Amount, AmountError};
pub use category::{default_categories, Category, CategoryId};
pub use expense::{Expense, ExpenseId};
pub use views::{CategoryWithExpenses, DailyExpense};
