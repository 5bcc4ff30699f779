//! Insert command handlers.

use crate::args::{AddCategoryArgs, AddExpenseArgs};
use crate::commands::Out;
use crate::dashboard::{NewCategory, NewExpense};
use crate::error::Error;
use crate::model::{CategoryId, ExpenseId};
use crate::{Config, Dashboard, Result};
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};

/// Adds a category with the given name, icon, color and budget. Returns the new ID.
pub async fn add_category(config: Config, args: AddCategoryArgs) -> Result<Out<CategoryId>> {
    let dashboard = Dashboard::start(config.repository(), config.seed_default_categories()).await?;
    let id = dashboard
        .add_category(NewCategory {
            name: args.name().to_string(),
            icon: args.icon().to_string(),
            color: args.color().to_string(),
            budget: args.budget(),
        })
        .await?;
    Ok(Out::new(
        format!(
            "Added category '{}' with a budget of {} (id {id})",
            args.name().trim(),
            args.budget()
        ),
        id,
    ))
}

/// Records an expense against the category named in `args`. Returns the new ID.
///
/// A `--date` is stored as noon local time on that day.
pub async fn add_expense(config: Config, args: AddExpenseArgs) -> Result<Out<ExpenseId>> {
    let dashboard = Dashboard::start(config.repository(), config.seed_default_categories()).await?;
    let category = dashboard.find_category(args.category()).ok_or_else(|| {
        let names: Vec<String> = dashboard
            .category_choices()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        Error::validation(format!(
            "There is no category named '{}'. The categories are: {}",
            args.category(),
            names.join(", ")
        ))
    })?;
    let category_id = category
        .id()
        .ok_or_else(|| Error::validation(format!("Category '{}' has no id", category.name())))?;

    let mut new = NewExpense::new(args.amount(), category_id);
    new.note = args.note().map(str::to_string);
    new.date = args.date().map(local_noon).transpose()?;
    let id = dashboard.add_expense(new).await?;

    Ok(Out::new(
        format!(
            "Added an expense of {} to '{}' (id {id})",
            args.amount(),
            category.name()
        ),
        id,
    ))
}

fn local_noon(date: NaiveDate) -> Result<DateTime<Utc>> {
    date.and_hms_opt(12, 0, 0)
        .and_then(|noon| Local.from_local_datetime(&noon).earliest())
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| Error::validation(format!("{date} noon does not exist in the local time zone")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Amount;
    use crate::test::TestEnv;
    use chrono::{Datelike, Timelike};

    fn dollars(d: i64) -> Amount {
        Amount::from_cents(d * 100)
    }

    #[tokio::test]
    async fn test_add_category() {
        let env = TestEnv::new().await;
        let out = add_category(
            env.config(),
            AddCategoryArgs::new("Pets", "paw", "category_pets", dollars(80)),
        )
        .await
        .unwrap();
        assert!(out.message().contains("Pets"));
        assert!(out.structure().is_some());
    }

    #[tokio::test]
    async fn test_add_expense_by_category_name() {
        let env = TestEnv::new().await;
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let out = add_expense(
            env.config(),
            AddExpenseArgs::new(dollars(10), "Food", Some("lunch".to_string()), Some(date)),
        )
        .await
        .unwrap();
        let id = *out.structure().unwrap();

        let expenses = env.repository().all_expenses().next().await.unwrap().unwrap();
        let stored = expenses.iter().find(|e| e.id() == Some(id)).unwrap();
        assert_eq!(stored.amount(), dollars(10));
        assert_eq!(stored.note(), Some("lunch"));
        let local = stored.date().with_timezone(&Local);
        assert_eq!(local.day(), 1);
        assert_eq!(local.hour(), 12);
    }

    #[tokio::test]
    async fn test_add_expense_unknown_category() {
        let env = TestEnv::new().await;
        let err = add_expense(
            env.config(),
            AddExpenseArgs::new(dollars(10), "Pets", None, None),
        )
        .await
        .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("Food"));
    }
}
