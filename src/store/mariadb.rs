//! MariaDB target store, also usable against MySQL servers.
//!
//! Rows go in as multi-row `INSERT` statements sized to the server's
//! placeholder limit. Schema statements commit implicitly on this server, so
//! only row loads are covered by transactions.

use crate::config::TargetConfig;
use crate::database::TableSchema;
use crate::migration::Dialect;
use crate::migration::MariaDbDialect;
use crate::spreadsheet::CellValue;
use crate::store::InsertError;
use crate::store::StoreError;
use crate::store::TargetStore;
use chrono::Datelike;
use chrono::Timelike;
use mysql::prelude::Queryable;
use mysql::Conn;
use mysql::OptsBuilder;
use mysql::Value;
use tracing::debug;
use tracing::info;

/// Placeholders one prepared statement may carry.
const MAX_PLACEHOLDERS: usize = 65535;

/// A connection to one database on a MariaDB server.
pub struct MariaDbStore {
    connection: Conn,
    location: String,
    dialect: MariaDbDialect,
}

impl MariaDbStore {
    /// Connects to the server in `target` and selects its database, creating it when missing.
    pub fn connect(target: &TargetConfig) -> Result<Self, StoreError> {
        let password = Some(target.password.as_str()).filter(|password| !password.is_empty());
        let opts = OptsBuilder::new()
            .ip_or_hostname(Some(target.host.as_str()))
            .tcp_port(target.port)
            .user(Some(target.user.as_str()))
            .pass(password)
            .init(vec!["SET NAMES utf8mb4"]);
        let mut connection = Conn::new(opts)?;

        let dialect = MariaDbDialect;
        let database = dialect.quote_ident(&target.database);
        connection.query_drop(format!(
            "CREATE DATABASE IF NOT EXISTS {} CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci",
            database
        ))?;
        connection.query_drop(format!("USE {}", database))?;

        let location = format!("mariadb://{}@{}:{}/{}", target.user, target.host, target.port, target.database);
        info!(store = %location, "Connected to MariaDB");
        Ok(MariaDbStore {
            connection,
            location,
            dialect,
        })
    }

    pub fn connection(&mut self) -> &mut Conn {
        &mut self.connection
    }
}

impl TargetStore for MariaDbStore {
    fn name(&self) -> String {
        self.location.clone()
    }

    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn execute(&mut self, sql: &str) -> Result<(), StoreError> {
        self.connection.query_drop(sql)?;
        Ok(())
    }

    fn table_exists(&mut self, table: &str) -> Result<bool, StoreError> {
        let count = self.connection.exec_first::<i64, _, _>(
            "SELECT COUNT(*) FROM information_schema.TABLES WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?",
            (table.to_owned(),),
        )?;
        Ok(count.unwrap_or(0) > 0)
    }

    fn insert_rows(&mut self, table: &TableSchema, rows: &[Vec<CellValue>]) -> Result<usize, InsertError> {
        let width = table.columns.len();
        if width == 0 || rows.is_empty() {
            return Ok(0);
        }
        if let Some(row) = rows.iter().find(|row| row.len() != width) {
            let message = format!("row has {} values, table '{}' has {} columns", row.len(), table.name, width);
            return Err(InsertError::new(0, StoreError::Rejected(message)));
        }

        let mut inserted = 0;
        for chunk in rows.chunks(rows_per_statement(width)) {
            let sql = insert_sql(&self.dialect, table, chunk.len());
            let params = chunk.iter().flatten().map(to_value).collect::<Vec<_>>();
            // a multi-row INSERT is all or nothing
            self.connection
                .exec_drop(sql, params)
                .map_err(|e| InsertError::new(inserted, e))?;
            inserted += chunk.len();
        }
        debug!(table = %table.name, rows = inserted, "Inserted rows");
        Ok(inserted)
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        self.connection.query_drop("START TRANSACTION")?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.connection.query_drop("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        self.connection.query_drop("ROLLBACK")?;
        Ok(())
    }
}

fn rows_per_statement(width: usize) -> usize {
    (MAX_PLACEHOLDERS / width.max(1)).max(1)
}

/// `INSERT` of `rows` rows into every column of `table`.
fn insert_sql(dialect: &MariaDbDialect, table: &TableSchema, rows: usize) -> String {
    let columns = table
        .columns
        .iter()
        .map(|column| dialect.quote_ident(&column.name))
        .collect::<Vec<_>>();
    let tuple = format!("({})", vec!["?"; columns.len()].join(", "));
    format!(
        "INSERT INTO {} ({}) VALUES {}",
        dialect.qualify_table(&table.name),
        columns.join(", "),
        vec![tuple; rows].join(", ")
    )
}

/// Converts a cell value to a MariaDB parameter.
fn to_value(value: &CellValue) -> Value {
    match value {
        CellValue::Null => Value::NULL,
        CellValue::Bool(value) => Value::Int(i64::from(*value)),
        CellValue::Int(value) => Value::Int(*value),
        CellValue::Float(value) => Value::Double(*value),
        CellValue::DateTime(value) => Value::Date(
            value.year() as u16,
            value.month() as u8,
            value.day() as u8,
            value.hour() as u8,
            value.minute() as u8,
            value.second() as u8,
            value.nanosecond() / 1_000,
        ),
        CellValue::Text(value) => Value::Bytes(value.as_bytes().to_vec()),
    }
}
