//! # Migration
//!
//! Turns an inferred schema into dialect-rendered statements, applies them to a
//! target store phase by phase and bulk-loads the table rows.

pub mod dialect;
pub mod executor;
pub mod loader;
pub mod plan;

pub use dialect::Dialect;
pub use dialect::DialectKind;
pub use dialect::DuckDbDialect;
pub use dialect::MariaDbDialect;
pub use executor::execute_plan;
pub use executor::PlanOutcome;
pub use executor::SkippedConstraint;
pub use loader::load_tables;
pub use plan::MigrationPlan;
pub use plan::Phase;
pub use plan::PlanError;
pub use plan::Statement;
pub use plan::StatementKind;
