//! # Target Stores
//!
//! A target store executes plan statements and receives the loaded rows. The
//! connection is owned by the store and released when the store is dropped.
//! MariaDB is the primary target; DuckDB serves local files and in-memory runs.

pub mod duckdb;
pub mod mariadb;

pub use self::duckdb::DuckDbStore;
pub use self::mariadb::MariaDbStore;

use crate::config::TargetConfig;
use crate::database::TableSchema;
use crate::migration::Dialect;
use crate::migration::DialectKind;
use crate::spreadsheet::CellValue;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0}")]
    DuckDbError(#[from] ::duckdb::Error),

    #[error("{0}")]
    MariaDbError(#[from] ::mysql::Error),

    /// The store refused input it cannot write.
    #[error("{0}")]
    Rejected(String),
}

/// Opens the store `target` describes.
pub fn open(target: &TargetConfig) -> Result<Box<dyn TargetStore>, StoreError> {
    Ok(match target.kind {
        DialectKind::MariaDb => Box::new(MariaDbStore::connect(target)?),
        DialectKind::DuckDb => Box::new(DuckDbStore::open(target)?),
    })
}

/// Failure of a bulk insert, with the rows written before it.
#[derive(Error, Debug)]
#[error("{source}")]
pub struct InsertError {
    pub inserted: usize,
    #[source]
    pub source: StoreError,
}

impl InsertError {
    pub fn new(inserted: usize, source: impl Into<StoreError>) -> Self {
        InsertError {
            inserted,
            source: source.into(),
        }
    }
}

/// A relational store that migrations run against.
pub trait TargetStore {
    /// Human readable store description used in reports.
    fn name(&self) -> String;

    /// Dialect the store's statements are rendered in.
    fn dialect(&self) -> &dyn Dialect;

    /// Executes one schema statement.
    fn execute(&mut self, sql: &str) -> Result<(), StoreError>;

    /// Whether `table` exists in the target database or schema.
    fn table_exists(&mut self, table: &str) -> Result<bool, StoreError>;

    /// Inserts rows into `table`, values in column order.
    ///
    /// # Returns
    ///
    /// The number of rows inserted.
    fn insert_rows(&mut self, table: &TableSchema, rows: &[Vec<CellValue>]) -> Result<usize, InsertError>;

    fn begin(&mut self) -> Result<(), StoreError>;

    fn commit(&mut self) -> Result<(), StoreError>;

    fn rollback(&mut self) -> Result<(), StoreError>;
}
