//! # Spreadsheet Schema Migration
//!
//! Infers a relational schema from the sheets of an Excel workbook and migrates
//! the workbook into a SQL store.
//!
//! ## Features
//!
//! - **Workbook reading**: `.xlsx`, `.xlsm` and legacy `.xls` files or bytes, shared
//!   strings, styled dates and times, both workbook date systems
//! - **Normalization**: SQL-safe, unique table and column names; empty rows, columns
//!   and sheets dropped
//! - **Type inference**: narrowest integer type, `DECIMAL`, `DATETIME`, `BOOLEAN`,
//!   sized `VARCHAR` or `TEXT`, with nullability
//! - **Key detection**: single-column primary keys and cross-sheet foreign keys found
//!   from value containment and naming conventions
//! - **Migration**: ordered `CREATE TABLE`, unique and foreign key statements for
//!   MariaDB or DuckDB, followed by a transactional bulk load into the same store
//!
//! ## Entry points
//!
//! - [`analyze`], [`analyze_bytes`], [`analyze_sheets`]: infer the schema without side effects
//! - [`migrate`], [`PreparedWorkbook::migrate_into`]: create and load the tables in a store

pub mod config;
pub mod database;
pub mod error;
mod helpers;
pub mod inference;
pub mod migration;
pub mod pipeline;
pub mod spreadsheet;
pub mod store;

pub use config::Config;
pub use config::TargetConfig;
pub use database::Schema;
pub use error::MigrateError;
pub use error::Result;
pub use pipeline::analyze;
pub use pipeline::analyze_bytes;
pub use pipeline::analyze_sheets;
pub use pipeline::migrate;
pub use pipeline::Analysis;
pub use pipeline::MigrationReport;
pub use pipeline::PreparedWorkbook;
pub use spreadsheet::CellValue;
pub use spreadsheet::RawSheet;
pub use spreadsheet::ReadOptions;
pub use store::DuckDbStore;
pub use store::MariaDbStore;
pub use store::TargetStore;
