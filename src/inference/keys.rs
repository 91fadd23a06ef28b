use crate::database::Table;

/// Indexes of columns with no missing values and no repeated values.
pub fn unique_columns(table: &Table) -> Vec<usize> {
    table
        .columns
        .iter()
        .enumerate()
        .filter(|(_, column)| column.is_unique())
        .map(|(index, _)| index)
        .collect()
}

/// Picks a single-column primary key: the first unique column whose name contains `id`,
/// otherwise the first unique column.
pub fn detect_primary_key(table: &Table) -> Option<usize> {
    let unique = unique_columns(table);
    unique
        .iter()
        .copied()
        .find(|&index| table.columns[index].name.to_lowercase().contains("id"))
        .or_else(|| unique.first().copied())
}
