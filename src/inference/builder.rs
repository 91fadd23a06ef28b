use crate::database::ColumnSchema;
use crate::database::Schema;
use crate::database::Table;
use crate::database::TableSchema;
use crate::inference::keys::detect_primary_key;
use crate::inference::relationships::Relationship;
use crate::inference::types::infer_column_type;

/// Assembles the schema from per-table type and key facts and the detected relationships.
pub fn build_schema(tables: &[Table], relationships: Vec<Relationship>) -> Schema {
    let tables = tables
        .iter()
        .map(|table| build_table(table, &relationships))
        .collect();
    Schema { tables, relationships }
}

fn build_table(table: &Table, relationships: &[Relationship]) -> TableSchema {
    let primary_key = detect_primary_key(table).map(|index| table.columns[index].name.clone());
    let columns = table
        .columns
        .iter()
        .map(|column| {
            let inferred = infer_column_type(&column.values);
            let mut schema = ColumnSchema::new(&column.name, inferred.column_type, inferred.nullable);
            schema.is_primary_key = primary_key.as_deref() == Some(column.name.as_str());
            if let Some(relationship) = relationships
                .iter()
                .find(|r| r.source_table == table.name && r.source_column == column.name)
            {
                schema.is_foreign_key = true;
                schema.references_table = Some(relationship.target_table.clone());
                schema.references_column = Some(relationship.target_column.clone());
            }
            schema
        })
        .collect();

    TableSchema {
        name: table.name.clone(),
        columns,
        primary_key,
        row_count: table.row_count(),
    }
}
