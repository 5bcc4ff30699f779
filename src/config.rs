//! Configuration file handling.
//!
//! The configuration file is stored at `$EXPENSES_HOME/config.json` next to the SQLite database.

use crate::db::Db;
use crate::error::{ErrorType, IntoResult, Res};
use crate::store::Store;
use crate::{utils, Repository, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const APP_NAME: &str = "expenses";
const CONFIG_VERSION: u8 = 1;
const MAX_CONNECTIONS: u32 = 4;
const CONFIG_JSON: &str = "config.json";
const EXPENSES_SQLITE: &str = "expenses.sqlite";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$EXPENSES_HOME` and from there it loads `$EXPENSES_HOME/config.json` and opens the
/// database.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    db: Db,
    sqlite_path: PathBuf,
}

impl Config {
    /// Creates the data directory, an initial `config.json` with default settings and an empty
    /// database.
    ///
    /// # Errors
    /// - Returns an error if any file operations fail or if a database already exists.
    pub async fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        Self::create_inner(dir.into())
            .await
            .pub_result(ErrorType::Config)
    }

    async fn create_inner(maybe_relative: PathBuf) -> Res<Self> {
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the expenses home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        // An existing home keeps its config file when the database cannot be created.
        let config_file = ConfigFile::default();
        let sqlite_path = root.join(EXPENSES_SQLITE);
        let db = Db::init(&sqlite_path, config_file.max_connections)
            .await
            .context("Unable to create SQLite DB")?;

        let config_path = root.join(CONFIG_JSON);
        config_file.save(&config_path).await?;

        Ok(Self {
            root,
            config_path,
            config_file,
            db,
            sqlite_path,
        })
    }

    /// This will
    /// - validate that `expenses_home` exists and that the config file exists
    /// - load the config file
    /// - open the database, migrating it if needed
    pub async fn load(expenses_home: impl Into<PathBuf>) -> Result<Self> {
        Self::load_inner(expenses_home.into())
            .await
            .pub_result(ErrorType::Config)
    }

    async fn load_inner(maybe_relative: PathBuf) -> Res<Self> {
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The expenses home directory is missing, run 'expenses init' first")?;
        let _ = utils::read_dir(&root).await?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let sqlite_path = root.join(EXPENSES_SQLITE);
        let db = Db::load(&sqlite_path, config_file.max_connections)
            .await
            .context("Unable to load SQLite DB")?;

        Ok(Self {
            root,
            config_path,
            config_file,
            db,
            sqlite_path,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn sqlite_path(&self) -> &Path {
        &self.sqlite_path
    }

    /// Whether the default categories are added when the category set is empty.
    pub fn seed_default_categories(&self) -> bool {
        self.config_file.seed_default_categories
    }

    pub fn max_connections(&self) -> u32 {
        self.config_file.max_connections
    }

    #[cfg(test)]
    pub(crate) fn db(&self) -> &Db {
        &self.db
    }

    /// A `Repository` over this configuration's database.
    pub fn repository(&self) -> Repository {
        let store: Arc<dyn Store> = Arc::new(self.db.clone());
        Repository::new(store)
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "expenses",
///   "config_version": 1,
///   "seed_default_categories": true,
///   "max_connections": 4
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "expenses"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// Add the default categories when the category set is empty
    #[serde(default = "default_true")]
    seed_default_categories: bool,

    /// Size of the SQLite connection pool
    #[serde(default = "default_max_connections")]
    max_connections: u32,
}

fn default_true() -> bool {
    true
}

fn default_max_connections() -> u32 {
    MAX_CONNECTIONS
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            seed_default_categories: true,
            max_connections: MAX_CONNECTIONS,
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if it belongs to another app or a
    /// newer version of this one.
    async fn load(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path).await?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        anyhow::ensure!(
            config.config_version <= CONFIG_VERSION,
            "The config file version {} is newer than this program supports ({})",
            config.config_version,
            CONFIG_VERSION
        );
        anyhow::ensure!(
            config.max_connections > 0,
            "max_connections must be at least 1"
        );

        Ok(config)
    }

    async fn save(&self, path: impl AsRef<Path>) -> Res<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }
}
