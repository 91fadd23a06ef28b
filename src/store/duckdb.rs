//! DuckDB target store.

use crate::config::TargetConfig;
use crate::config::DEFAULT_SCHEMA;
use crate::config::MEMORY_DATABASE;
use crate::database::TableSchema;
use crate::migration::Dialect;
use crate::migration::DuckDbDialect;
use crate::spreadsheet::CellValue;
use crate::store::InsertError;
use crate::store::StoreError;
use crate::store::TargetStore;
use ::duckdb::params_from_iter;
use ::duckdb::types::TimeUnit;
use ::duckdb::types::Value;
use ::duckdb::Connection;
use tracing::debug;

/// A DuckDB database, file-backed or in memory.
pub struct DuckDbStore {
    connection: Connection,
    location: String,
    schema: String,
    dialect: DuckDbDialect,
}

impl DuckDbStore {
    /// Opens the database described by `target` and selects its schema.
    pub fn open(target: &TargetConfig) -> Result<Self, StoreError> {
        let connection = if target.database == MEMORY_DATABASE {
            Connection::open_in_memory()?
        } else {
            Connection::open(&target.database)?
        };
        Self::from_connection(connection, &target.database, &target.schema)
    }

    /// Wraps an existing connection, creating `schema` when it is not the default one.
    pub fn from_connection(connection: Connection, location: &str, schema: &str) -> Result<Self, StoreError> {
        let dialect = if schema == DEFAULT_SCHEMA {
            DuckDbDialect::new(None)
        } else {
            let dialect = DuckDbDialect::new(Some(schema));
            let quoted = dialect.quote_ident(schema);
            connection.execute_batch(&format!("CREATE SCHEMA IF NOT EXISTS {}", quoted))?;
            connection.execute_batch(&format!("SET schema = '{}'", schema.replace('\'', "''")))?;
            dialect
        };
        debug!(database = location, schema, "Opened DuckDB store");
        Ok(DuckDbStore {
            connection,
            location: location.to_owned(),
            schema: schema.to_owned(),
            dialect,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }
}

impl TargetStore for DuckDbStore {
    fn name(&self) -> String {
        format!("duckdb:{}", self.location)
    }

    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn execute(&mut self, sql: &str) -> Result<(), StoreError> {
        self.connection.execute_batch(sql)?;
        Ok(())
    }

    fn table_exists(&mut self, table: &str) -> Result<bool, StoreError> {
        let count: i64 = self.connection.query_row(
            "SELECT count(*) FROM information_schema.tables WHERE table_schema = ? AND table_name = ?",
            [self.schema.as_str(), table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn insert_rows(&mut self, table: &TableSchema, rows: &[Vec<CellValue>]) -> Result<usize, InsertError> {
        let columns = table
            .columns
            .iter()
            .map(|column| self.dialect.quote_ident(&column.name))
            .collect::<Vec<_>>();
        let placeholders = vec!["?"; columns.len()];
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.dialect.qualify_table(&table.name),
            columns.join(", "),
            placeholders.join(", ")
        );

        let mut statement = self.connection.prepare(&sql).map_err(|e| InsertError::new(0, e))?;
        let mut inserted = 0;
        for row in rows {
            statement
                .execute(params_from_iter(row.iter().map(to_value)))
                .map_err(|e| InsertError::new(inserted, e))?;
            inserted += 1;
        }
        Ok(inserted)
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        self.connection.execute_batch("BEGIN TRANSACTION")?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.connection.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        self.connection.execute_batch("ROLLBACK")?;
        Ok(())
    }
}

/// Converts a cell value to a DuckDB parameter.
fn to_value(value: &CellValue) -> Value {
    match value {
        CellValue::Null => Value::Null,
        CellValue::Bool(value) => Value::Boolean(*value),
        CellValue::Int(value) => Value::BigInt(*value),
        CellValue::Float(value) => Value::Double(*value),
        CellValue::DateTime(value) => Value::Timestamp(TimeUnit::Microsecond, value.and_utc().timestamp_micros()),
        CellValue::Text(value) => Value::Text(value.clone()),
    }
}
