use crate::spreadsheet::CellValue;
use std::collections::HashSet;

/// A normalized table: cleaned names and column-major values.
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    /// SQL-safe table name, unique within the workbook
    pub name: String,
    /// Columns in declared order, all of the same length
    pub columns: Vec<Column>,
}

/// One column of a normalized table with its full value sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    /// SQL-safe column name, unique within its table
    pub name: String,
    pub values: Vec<CellValue>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Table {
        Table {
            name: name.into(),
            columns,
        }
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|column| column.values.len()).unwrap_or(0)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Returns one row in column order.
    pub fn row(&self, index: usize) -> Vec<&CellValue> {
        self.columns.iter().map(|column| &column.values[index]).collect()
    }
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<CellValue>) -> Column {
        Column {
            name: name.into(),
            values,
        }
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|value| value.is_null()).count()
    }

    /// Distinct rendered forms of the present values.
    pub fn distinct_values(&self) -> HashSet<String> {
        self.values.iter().filter_map(CellValue::render).collect()
    }

    /// True when no value is missing and every value is distinct.
    pub fn is_unique(&self) -> bool {
        !self.values.is_empty() && self.missing_count() == 0 && self.distinct_values().len() == self.values.len()
    }
}
