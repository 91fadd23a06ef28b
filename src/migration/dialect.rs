//! SQL dialects (Strategy pattern).
//!
//! A dialect renders plan statements for one target: identifier quoting, type
//! names, auto-increment support and constraint syntax.

use crate::database::ColumnSchema;
use crate::database::ColumnType;
use crate::database::TableSchema;
use serde::Deserialize;
use serde::Serialize;
use std::fmt::Display;
use std::str::FromStr;

/// Referential actions attached to every foreign key.
pub const ON_DELETE: &str = "SET NULL";
pub const ON_UPDATE: &str = "CASCADE";

/// Name of the uniqueness constraint on `table.column`.
pub fn unique_constraint_name(table: &str, column: &str) -> String {
    format!("unique_{}_{}", table, column)
}

/// Name of the foreign key constraint on `table.column`.
pub fn foreign_key_name(table: &str, column: &str) -> String {
    format!("fk_{}_{}", table, column)
}

/// SQL syntax of one target store.
pub trait Dialect {
    /// Get the dialect identifier (e.g., "mariadb", "duckdb").
    fn name(&self) -> &str;

    /// Quote an identifier (table name, column name, etc.).
    fn quote_ident(&self, name: &str) -> String;

    /// Quote a table name, qualified with the target schema where the dialect has one.
    fn qualify_table(&self, table: &str) -> String {
        self.quote_ident(table)
    }

    /// Type name used in column definitions.
    fn column_type(&self, column_type: ColumnType) -> String;

    /// Keyword making an integer primary key auto-incrementing, if supported.
    fn auto_increment(&self) -> Option<&'static str> {
        None
    }

    /// Whether `ALTER TABLE ... ADD FOREIGN KEY` is accepted on existing tables.
    fn supports_added_foreign_keys(&self) -> bool {
        true
    }

    /// Whether a rollback also undoes `CREATE TABLE`.
    fn transactional_ddl(&self) -> bool {
        true
    }

    /// `CREATE TABLE IF NOT EXISTS` with every column and the inline primary key.
    /// Foreign key columns are left nullable so their constraint can set them to null.
    fn create_table(&self, table: &TableSchema) -> String {
        let columns = table
            .columns
            .iter()
            .map(|column| {
                let mut definition = format!(
                    "  {} {}",
                    self.quote_ident(&column.name),
                    self.column_type(column.column_type)
                );
                // ON DELETE SET NULL needs a nullable referencing column
                let sets_null = column.is_foreign_key && !column.is_primary_key;
                if !column.nullable && !sets_null {
                    definition.push_str(" NOT NULL");
                }
                if column.is_primary_key {
                    definition.push_str(" PRIMARY KEY");
                    if let Some(keyword) = self.auto_increment().filter(|_| column.column_type.is_integer()) {
                        definition.push(' ');
                        definition.push_str(keyword);
                    }
                }
                definition
            })
            .collect::<Vec<_>>();
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
            self.qualify_table(&table.name),
            columns.join(",\n")
        )
    }

    fn drop_table(&self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", self.qualify_table(table))
    }

    /// Uniqueness constraint on one column.
    fn add_unique(&self, table: &TableSchema, column: &ColumnSchema) -> String;

    /// Foreign key from `table.column` to `target_table.target_column`.
    fn add_foreign_key(&self, table: &str, column: &str, target_table: &str, target_column: &str) -> String {
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
            self.qualify_table(table),
            self.quote_ident(&foreign_key_name(table, column)),
            self.quote_ident(column),
            self.qualify_table(target_table),
            self.quote_ident(target_column),
            ON_DELETE,
            ON_UPDATE
        )
    }
}

/// MySQL/MariaDB dialect, the DDL of the script output.
#[derive(Debug, Clone, Default)]
pub struct MariaDbDialect;

impl Dialect for MariaDbDialect {
    fn name(&self) -> &str {
        "mariadb"
    }

    fn quote_ident(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn column_type(&self, column_type: ColumnType) -> String {
        column_type.to_string()
    }

    fn auto_increment(&self) -> Option<&'static str> {
        Some("AUTO_INCREMENT")
    }

    // DDL commits implicitly
    fn transactional_ddl(&self) -> bool {
        false
    }

    fn add_unique(&self, table: &TableSchema, column: &ColumnSchema) -> String {
        // TEXT columns can only be indexed on a prefix
        let key = match column.column_type {
            ColumnType::Text => format!("{}(255)", self.quote_ident(&column.name)),
            _ => self.quote_ident(&column.name),
        };
        format!(
            "ALTER TABLE {} ADD UNIQUE KEY {} ({})",
            self.qualify_table(&table.name),
            self.quote_ident(&unique_constraint_name(&table.name, &column.name)),
            key
        )
    }
}

/// DuckDB dialect, optionally qualifying tables with a schema.
#[derive(Debug, Clone, Default)]
pub struct DuckDbDialect {
    schema: Option<String>,
}

impl DuckDbDialect {
    pub fn new(schema: Option<&str>) -> Self {
        DuckDbDialect {
            schema: schema.map(str::to_owned),
        }
    }
}

impl Dialect for DuckDbDialect {
    fn name(&self) -> &str {
        "duckdb"
    }

    fn quote_ident(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn qualify_table(&self, table: &str) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", self.quote_ident(schema), self.quote_ident(table)),
            None => self.quote_ident(table),
        }
    }

    fn column_type(&self, column_type: ColumnType) -> String {
        match column_type {
            ColumnType::Int => "INTEGER".to_owned(),
            ColumnType::DateTime => "TIMESTAMP".to_owned(),
            other => other.to_string(),
        }
    }

    // foreign keys are only accepted inside CREATE TABLE
    fn supports_added_foreign_keys(&self) -> bool {
        false
    }

    fn add_unique(&self, table: &TableSchema, column: &ColumnSchema) -> String {
        format!(
            "CREATE UNIQUE INDEX {} ON {} ({})",
            self.quote_ident(&unique_constraint_name(&table.name, &column.name)),
            self.qualify_table(&table.name),
            self.quote_ident(&column.name)
        )
    }
}

/// Target kinds selectable from configuration and the command line.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    #[default]
    MariaDb,
    DuckDb,
}

impl DialectKind {
    /// Builds the dialect, qualifying tables with `schema` where the dialect supports it.
    pub fn dialect(self, schema: Option<&str>) -> Box<dyn Dialect> {
        match self {
            DialectKind::MariaDb => Box::new(MariaDbDialect),
            DialectKind::DuckDb => Box::new(DuckDbDialect::new(schema)),
        }
    }
}

impl FromStr for DialectKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "mariadb" | "mysql" => Ok(DialectKind::MariaDb),
            "duckdb" => Ok(DialectKind::DuckDb),
            other => Err(format!("unknown dialect '{}', expected mariadb or duckdb", other)),
        }
    }
}

impl Display for DialectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DialectKind::MariaDb => f.write_str("mariadb"),
            DialectKind::DuckDb => f.write_str("duckdb"),
        }
    }
}
