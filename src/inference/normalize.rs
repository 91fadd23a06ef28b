//! Turns raw sheets into tables with SQL-safe names and no degenerate rows or columns.

use crate::database::Column;
use crate::database::Table;
use crate::spreadsheet::CellValue;
use crate::spreadsheet::RawSheet;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

/// Name given to columns whose header is missing or blank.
pub const UNNAMED_COLUMN: &str = "unnamed_column";

/// Name given to sheets whose name is blank.
pub const UNNAMED_TABLE: &str = "unnamed_table";

static NON_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_]").expect("Hardcode regex pattern"));

/// Cleans a name into `[a-z0-9_]`, prefixing names that start with a digit.
fn clean_name(name: &str, prefix: &str, placeholder: &str) -> String {
    if name.trim().is_empty() {
        return placeholder.to_owned();
    }
    let cleaned = NON_IDENTIFIER.replace_all(name, "_");
    let cleaned = if cleaned.starts_with(|c: char| c.is_ascii_digit()) {
        format!("{}{}", prefix, cleaned)
    } else {
        cleaned.into_owned()
    };
    cleaned.to_lowercase()
}

/// Cleans a sheet name into a table name.
pub fn clean_table_name(name: &str) -> String {
    clean_name(name, "table_", UNNAMED_TABLE)
}

/// Cleans a header cell into a column name.
pub fn clean_column_name(header: &CellValue) -> String {
    match header.render() {
        Some(name) => clean_name(&name, "col_", UNNAMED_COLUMN),
        None => UNNAMED_COLUMN.to_owned(),
    }
}

/// Makes names unique by suffixing repeats with `_2`, `_3`, ... in order of appearance.
pub(crate) fn deduplicate(names: Vec<String>) -> Vec<String> {
    let mut taken = HashSet::<String>::new();
    let mut result = Vec::with_capacity(names.len());
    for name in names {
        let mut candidate = name.clone();
        let mut suffix = 2usize;
        while taken.contains(&candidate) {
            candidate = format!("{}_{}", name, suffix);
            suffix += 1;
        }
        taken.insert(candidate.clone());
        result.push(candidate);
    }
    result
}

/// Normalizes one sheet. Returns `None` when nothing is left after dropping
/// fully empty rows and columns.
pub fn normalize_sheet(sheet: &RawSheet) -> Option<Table> {
    let width = sheet.width();
    let rows = (0..sheet.rows.len())
        .filter(|&row| (0..width).any(|col| !sheet.value(row, col).is_null()))
        .collect::<Vec<_>>();
    let cols = (0..width)
        .filter(|&col| rows.iter().any(|&row| !sheet.value(row, col).is_null()))
        .collect::<Vec<_>>();
    if rows.is_empty() || cols.is_empty() {
        debug!(sheet = %sheet.name, "Skipping empty sheet");
        return None;
    }

    let names = cols
        .iter()
        .map(|&col| clean_column_name(sheet.header.get(col).unwrap_or(&CellValue::Null)))
        .collect();
    let columns = deduplicate(names)
        .into_iter()
        .zip(&cols)
        .map(|(name, &col)| {
            let values = rows.iter().map(|&row| sheet.value(row, col).clone()).collect();
            Column::new(name, values)
        })
        .collect::<Vec<_>>();

    let table = Table::new(clean_table_name(&sheet.name), columns);
    debug!(
        sheet = %sheet.name,
        table = %table.name,
        rows = table.row_count(),
        columns = table.columns.len(),
        "Normalized sheet"
    );
    Some(table)
}

/// Normalizes every sheet in order, dropping empty ones and keeping table names unique.
pub fn normalize_sheets(sheets: &[RawSheet]) -> Vec<Table> {
    let mut tables = sheets.iter().filter_map(normalize_sheet).collect::<Vec<_>>();
    let names = deduplicate(tables.iter().map(|table| table.name.clone()).collect());
    for (table, name) in tables.iter_mut().zip(names) {
        table.name = name;
    }
    tables
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> CellValue {
        CellValue::from(value)
    }

    #[test]
    fn table_names() {
        assert_eq!(clean_table_name("2024 Sales!"), "table_2024_sales_");
        assert_eq!(clean_table_name("Students"), "students");
        assert_eq!(clean_table_name("Order-Items"), "order_items");
        assert_eq!(clean_table_name("Café"), "caf_");
        assert_eq!(clean_table_name("  "), UNNAMED_TABLE);
    }

    #[test]
    fn column_names() {
        assert_eq!(clean_column_name(&CellValue::Null), UNNAMED_COLUMN);
        assert_eq!(clean_column_name(&text("   ")), UNNAMED_COLUMN);
        assert_eq!(clean_column_name(&text("Student ID")), "student_id");
        assert_eq!(clean_column_name(&text("1st Place")), "col_1st_place");
        assert_eq!(clean_column_name(&CellValue::Int(2024)), "col_2024");
    }

    #[test]
    fn duplicate_names_get_suffixes() {
        let names = vec!["a".to_owned(), "b".to_owned(), "a".to_owned(), "a".to_owned(), "a_2".to_owned()];
        assert_eq!(deduplicate(names), vec!["a", "b", "a_2", "a_3", "a_2_2"]);
    }

    #[test]
    fn empty_rows_and_columns_are_dropped() {
        let sheet = RawSheet::new(
            "People",
            vec![text("Name"), text("Notes"), CellValue::Null],
            vec![
                vec![text("ann"), CellValue::Null, CellValue::Int(1)],
                vec![CellValue::Null, CellValue::Null, CellValue::Null],
                vec![text("bob")],
            ],
        );
        let table = normalize_sheet(&sheet).unwrap();

        assert_eq!(table.name, "people");
        let names = table.columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["name", UNNAMED_COLUMN]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.columns[1].values, vec![CellValue::Int(1), CellValue::Null]);
    }

    #[test]
    fn header_only_sheet_is_discarded() {
        let sheet = RawSheet::new("Empty", vec![text("id"), text("name")], vec![vec![CellValue::Null]]);
        assert!(normalize_sheet(&sheet).is_none());
        assert!(normalize_sheets(&[sheet]).is_empty());
    }

    #[test]
    fn table_names_stay_unique() {
        let row = vec![vec![CellValue::Int(1)]];
        let sheets = vec![
            RawSheet::new("Sales 2024", vec![text("id")], row.clone()),
            RawSheet::new("Sales-2024", vec![text("id")], row),
        ];
        let names = normalize_sheets(&sheets).into_iter().map(|t| t.name).collect::<Vec<_>>();
        assert_eq!(names, vec!["sales_2024", "sales_2024_2"]);
    }
}
