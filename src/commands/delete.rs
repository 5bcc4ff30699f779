//! Delete command handlers.

use crate::args::{DeleteCategoryArgs, DeleteExpenseArgs};
use crate::commands::Out;
use crate::error::Error;
use crate::model::{CategoryId, ExpenseId};
use crate::{Config, Result};

/// Deletes one expense by ID. Fails if no expense has that ID.
pub async fn delete_expense(config: Config, args: DeleteExpenseArgs) -> Result<Out<ExpenseId>> {
    let id = args.id();
    if !config.repository().delete_expense_by_id(id).await? {
        return Err(Error::validation(format!("There is no expense with id {id}")));
    }
    Ok(Out::new(format!("Deleted expense {id}"), id))
}

/// Deletes one category by ID. Fails if no category has that ID.
///
/// Due to the `ON DELETE RESTRICT` foreign key constraint, a category cannot be deleted while any
/// expense references it. Those expenses must be removed first.
pub async fn delete_category(config: Config, args: DeleteCategoryArgs) -> Result<Out<CategoryId>> {
    let id = args.id();
    if !config.repository().delete_category_by_id(id).await? {
        return Err(Error::validation(format!("There is no category with id {id}")));
    }
    Ok(Out::new(format!("Deleted category {id}"), id))
}
