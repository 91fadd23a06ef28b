//! Configuration loading and validation.

use crate::error::MigrateError;
use crate::error::Result;
use crate::migration::DialectKind;
use crate::spreadsheet::ReadOptions;
use regex::Regex;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use std::sync::LazyLock;

/// Database location opening a transient in-memory store.
pub const MEMORY_DATABASE: &str = ":memory:";

/// Schema DuckDB selects on connect.
pub const DEFAULT_SCHEMA: &str = "main";

pub const DEFAULT_BATCH_SIZE: usize = 1000;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 3306;
pub const DEFAULT_USER: &str = "root";

static SCHEMA_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Hardcode regex pattern"));

/// Top-level configuration file.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// How the workbook is read.
    pub read: ReadOptions,
    /// Where the migration goes.
    pub target: TargetConfig,
}

/// Target store descriptor: which store to use and how to reach it.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Target kind, `mariadb` or `duckdb`
    #[serde(rename = "type")]
    pub kind: DialectKind,
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
    /// MariaDB database name, or DuckDB database file (`:memory:` for a transient one)
    pub database: String,
    /// Schema DuckDB tables are created in
    pub schema: String,
    /// Rows per insert call
    pub batch_size: usize,
}

impl Default for TargetConfig {
    fn default() -> Self {
        TargetConfig {
            kind: DialectKind::default(),
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            user: DEFAULT_USER.to_owned(),
            password: String::new(),
            database: String::new(),
            schema: DEFAULT_SCHEMA.to_owned(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl TargetConfig {
    /// A transient in-memory DuckDB target.
    pub fn memory() -> Self {
        TargetConfig {
            kind: DialectKind::DuckDb,
            database: MEMORY_DATABASE.to_owned(),
            ..TargetConfig::default()
        }
    }

    /// Checks the fields needed to open a connection.
    pub fn validate_connection(&self) -> Result<()> {
        if self.database.trim().is_empty() {
            return Err(MigrateError::config("target.database is required"));
        }
        if self.kind == DialectKind::MariaDb {
            if self.host.trim().is_empty() {
                return Err(MigrateError::config("target.host is required"));
            }
            if self.user.trim().is_empty() {
                return Err(MigrateError::config("target.user is required"));
            }
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml).map_err(|e| MigrateError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration. Connection fields are checked by
    /// [`TargetConfig::validate_connection`] once a store is about to be opened.
    pub fn validate(&self) -> Result<()> {
        if !SCHEMA_NAME.is_match(&self.target.schema) {
            return Err(MigrateError::config(format!(
                "target.schema must be a plain identifier, got '{}'",
                self.target.schema
            )));
        }
        if self.target.port == 0 {
            return Err(MigrateError::config("target.port must be between 1 and 65535"));
        }
        if self.target.batch_size == 0 {
            return Err(MigrateError::config("target.batch_size must be at least 1"));
        }
        if let Err(e) = self.read.criteria() {
            return Err(MigrateError::config(format!("read.sheets: {}", e)));
        }
        Ok(())
    }
}
