use crate::commands::Out;
use crate::{Config, Result};
use std::path::Path;

/// Creates the data directory with an initial `config.json` and an empty database.
///
/// # Arguments
/// - `expenses_home` - The directory that will be the root of data directory, e.g.
///   `$HOME/expenses`
///
/// # Errors
/// - Returns an error if any file operations fail or if the directory already holds a database.
pub async fn init(expenses_home: &Path) -> Result<Out<()>> {
    let config = Config::create(expenses_home).await?;
    Ok(format!(
        "Successfully created the expenses directory at {}",
        config.root().display()
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init() {
        let temp_dir = TempDir::new().unwrap();
        let home = temp_dir.path().join("expenses");
        let out = init(&home).await.unwrap();
        assert!(out.message().starts_with("Successfully created"));
        assert!(home.join("config.json").is_file());
        assert!(home.join("expenses.sqlite").is_file());

        let err = init(&home).await.unwrap_err();
        assert_eq!(err.error_type(), crate::ErrorType::Config);
    }
}
