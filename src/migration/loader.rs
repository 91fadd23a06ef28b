use crate::database::ColumnType;
use crate::database::Schema;
use crate::database::Table;
use crate::error::MigrateError;
use crate::spreadsheet::CellValue;
use crate::store::TargetStore;
use std::collections::HashMap;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// Converts a value to the representation its column stores.
pub fn coerce(value: &CellValue, column_type: ColumnType) -> CellValue {
    match (column_type, value) {
        (_, CellValue::Null) => CellValue::Null,
        (ColumnType::Decimal, CellValue::Int(value)) => CellValue::Float(*value as f64),
        (column_type, value) if column_type.is_string() => CellValue::Text(value.to_string()),
        (_, value) => value.clone(),
    }
}

/// Inserts every table's rows inside one transaction, referenced tables first.
///
/// # Arguments
///
/// * `batch_size` - rows handed to the store per insert call
///
/// # Returns
///
/// Inserted row count per table name. On failure the transaction is rolled back
/// and the error names the table and the rows inserted into it before the failure.
pub fn load_tables(
    schema: &Schema,
    tables: &[Table],
    store: &mut dyn TargetStore,
    batch_size: usize,
) -> Result<HashMap<String, usize>, MigrateError> {
    let batch_size = batch_size.max(1);
    let mut counts = HashMap::new();

    store.begin()?;
    for name in schema.graph().load_order() {
        let (Some(table_schema), Some(table)) = (schema.table(&name), tables.iter().find(|t| t.name == name)) else {
            continue;
        };

        let rows = (0..table.row_count())
            .map(|index| {
                table
                    .row(index)
                    .into_iter()
                    .zip(&table_schema.columns)
                    .map(|(value, column)| coerce(value, column.column_type))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();

        let mut inserted = 0;
        for batch in rows.chunks(batch_size) {
            match store.insert_rows(table_schema, batch) {
                Ok(count) => inserted += count,
                Err(e) => {
                    inserted += e.inserted;
                    if let Err(rollback) = store.rollback() {
                        warn!(error = %rollback, "Failed to roll back load");
                    }
                    return Err(MigrateError::load(name, inserted, e.source));
                }
            }
        }
        debug!(table = %name, rows = inserted, "Loaded table");
        counts.insert(name, inserted);
    }
    store.commit()?;

    info!(
        tables = counts.len(),
        rows = counts.values().sum::<usize>(),
        "Loaded data"
    );
    Ok(counts)
}
