use crate::migration::PlanError;
use crate::spreadsheet::SpreadsheetError;
use crate::store::StoreError;
use thiserror::Error;

/// Main error type for the sheet migration engine.
/// Aggregates errors from the workbook reader, the target store and the configuration layer.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// The input is not a readable workbook.
    #[error("Input format error: {0}")]
    Format(#[from] SpreadsheetError),

    /// Every sheet was empty, unreadable or filtered out.
    #[error("No valid data found in workbook '{0}'")]
    NoUsableData(String),

    #[error("Failed to create table '{table}': {message}")]
    SchemaCreation { table: String, message: String },

    #[error("Failed to load table '{table}' after {inserted} rows: {message}")]
    Load {
        table: String,
        inserted: usize,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid migration plan: {0}")]
    Plan(#[from] PlanError),

    #[error("{0}")]
    Store(#[from] StoreError),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),
}

impl MigrateError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        MigrateError::Config(message.into())
    }

    /// Creates a fatal table creation error.
    pub fn schema_creation(table: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::SchemaCreation {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Creates a fatal load error carrying the rows that made it into the table.
    pub fn load(table: impl Into<String>, inserted: usize, message: impl ToString) -> Self {
        MigrateError::Load {
            table: table.into(),
            inserted,
            message: message.to_string(),
        }
    }

    /// Returns true when nothing reached the target store.
    pub fn is_input_error(&self) -> bool {
        matches!(self, MigrateError::Format(_) | MigrateError::NoUsableData(_))
    }

    /// Formats the error with a hint about where it happened.
    pub fn format_detailed(&self) -> String {
        match self {
            MigrateError::Format(_) | MigrateError::NoUsableData(_) => {
                format!("Error: {}\n  Nothing was written to the target store.", self)
            }
            MigrateError::SchemaCreation { .. } => {
                format!("Error: {}\n  Migration stopped before any rows were loaded.", self)
            }
            MigrateError::Load { inserted, .. } if *inserted > 0 => {
                format!("Error: {}\n  The load transaction was rolled back.", self)
            }
            _ => format!("Error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, MigrateError>;

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for std::result::Result<T, SpreadsheetError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| SpreadsheetError::WithContextError(format!("{}: {}", message, e)))
    }
}
