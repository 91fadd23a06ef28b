use crate::database::column::ColumnSchema;
use crate::inference::graph::DependencyGraph;
use crate::inference::relationships::Relationship;
use serde::Serialize;

/// Structural metadata of one table.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
    pub primary_key: Option<String>,
    pub row_count: usize,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Columns carrying a foreign key, in column order.
    pub fn foreign_keys(&self) -> impl Iterator<Item = &ColumnSchema> {
        self.columns.iter().filter(|column| column.is_foreign_key)
    }

    pub fn is_primary_key(&self, column: &str) -> bool {
        self.primary_key.as_deref() == Some(column)
    }
}

/// The inferred relational schema of a workbook.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Schema {
    /// Tables in workbook order
    pub tables: Vec<TableSchema>,
    /// Detected foreign keys in enumeration order
    pub relationships: Vec<Relationship>,
}

impl Schema {
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|table| table.name == name)
    }

    /// Table-level dependency graph built from the relationships.
    pub fn graph(&self) -> DependencyGraph {
        DependencyGraph::new(self.tables.iter().map(|table| table.name.as_str()), &self.relationships)
    }
}
