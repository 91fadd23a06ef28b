//! Relational model shared by the inference pipeline, the planner and the stores.

pub mod column;
pub mod schema;
pub mod table;

pub use column::ColumnSchema;
pub use column::ColumnType;
pub use schema::Schema;
pub use schema::TableSchema;
pub use table::Column;
pub use table::Table;
