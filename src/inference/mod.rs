//! # Schema Inference
//!
//! Derives a relational schema from normalized tables: column types and
//! nullability, single-column primary keys, and foreign keys found from value
//! containment and naming conventions.

pub mod builder;
pub mod graph;
pub mod keys;
pub mod normalize;
pub mod relationships;
pub mod types;

pub use graph::DependencyGraph;
pub use relationships::Evidence;
pub use relationships::NamingRule;
pub use relationships::Relationship;
pub use types::TypeRule;

use crate::database::Schema;
use crate::database::Table;
use tracing::info;

/// Runs type, key and relationship detection over the tables.
pub fn infer_schema(tables: &[Table]) -> Schema {
    let relationships = relationships::detect_relationships(tables);
    let schema = builder::build_schema(tables, relationships);
    info!(
        tables = schema.tables.len(),
        relationships = schema.relationships.len(),
        "Inferred schema"
    );
    schema
}
