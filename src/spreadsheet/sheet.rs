use crate::spreadsheet::cell::CellValue;
use std::collections::BTreeMap;

/// A single non-empty cell at a zero-based position.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Cell {
    pub(crate) row: usize,
    pub(crate) col: usize,
    pub(crate) value: CellValue,
}

/// One sheet as a rectangular grid: a header row and the data rows below it.
///
/// Rows may be shorter than the header; missing trailing cells read as `Null`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawSheet {
    /// Sheet name as it appears in the workbook
    pub name: String,
    /// Header cells, one per column
    pub header: Vec<CellValue>,
    /// Data rows in sheet order
    pub rows: Vec<Vec<CellValue>>,
}

impl RawSheet {
    pub fn new(name: impl Into<String>, header: Vec<CellValue>, rows: Vec<Vec<CellValue>>) -> RawSheet {
        RawSheet {
            name: name.into(),
            header,
            rows,
        }
    }

    /// Assembles a grid from scattered cells. The first row holding any cell is the header
    /// and the grid spans the used column range.
    pub(crate) fn from_cells(name: &str, cells: Vec<Cell>) -> RawSheet {
        let col_lower = cells.iter().map(|cell| cell.col).min();
        let col_upper = cells.iter().map(|cell| cell.col).max();
        let (col_lower, col_upper) = match col_lower.zip(col_upper) {
            Some(bounds) => bounds,
            None => return RawSheet::new(name, Vec::new(), Vec::new()),
        };
        let width = col_upper - col_lower + 1;

        let mut grid = BTreeMap::<usize, Vec<CellValue>>::new();
        for cell in cells {
            let row = grid.entry(cell.row).or_insert_with(|| vec![CellValue::Null; width]);
            row[cell.col - col_lower] = cell.value;
        }

        let mut rows = grid.into_values();
        let header = rows.next().unwrap_or_default();
        RawSheet::new(name, header, rows.collect())
    }

    /// Number of columns spanned by the header and the rows.
    pub fn width(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.header.len()))
            .max()
            .unwrap_or(0)
    }

    /// Returns the value at a position, `Null` outside the stored cells.
    pub fn value(&self, row: usize, col: usize) -> &CellValue {
        const NULL: &CellValue = &CellValue::Null;
        self.rows.get(row).and_then(|cells| cells.get(col)).unwrap_or(NULL)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
