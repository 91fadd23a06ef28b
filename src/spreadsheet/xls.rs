use crate::helpers::biff8::Biff8Reader;
use crate::helpers::cfb::Cfb;
use crate::helpers::reader::WorkbookSource;
use crate::match_biff8_records;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::cell::NumberStyle;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::sheet::Cell;
use crate::spreadsheet::sheet::RawSheet;
use crate::spreadsheet::SpreadsheetError;
use encoding_rs::UTF_16BE;
use encoding_rs::UTF_16LE;
use encoding_rs::WINDOWS_1252;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

// BIFF8 record types
const FORMULA: u16 = 6;
const EOF: u16 = 10;
const DATE1904: u16 = 34;
const FILE_PASS: u16 = 47;
const CODE_PAGE: u16 = 66;
const BOUND_SHEET8: u16 = 133;
const MUL_RK: u16 = 189;
const XF: u16 = 224;
const SST: u16 = 252;
const LABEL_SST: u16 = 253;
const NUMBER: u16 = 515;
const LABEL: u16 = 516;
const BOOL_ERR: u16 = 517;
const STRING: u16 = 519;
const RK: u16 = 638;
const FORMAT: u16 = 1054;
const BOF: u16 = 2057;

/// Sheet type of worksheets in BOUND_SHEET8; charts and macro sheets are skipped
const WORKSHEET: u8 = 0;

#[derive(Error, Debug)]
pub enum XlsError {
    #[error("Invalid Code page '{0}'")]
    CodePageError(u16),

    #[error("Invalid Formula value '{0}'")]
    FormulaValueError(u64),

    #[error("Workbook is password protected")]
    PasswordProtected,

    #[error("Missing workbook stream")]
    MissingWorkbookStream,
}

/// A cell value before number styles and null literals are applied
enum RawValue {
    Number { style: usize, number: f64 },
    Text(String),
    SharedString(usize),
    Bool(bool),
    Missing,
}

/// An opened Excel 97-2003 workbook
pub(crate) struct XlsWorkbook {
    reader: Biff8Reader,
    shared_strings: Vec<String>,
    number_styles: Vec<NumberStyle>,
    /// Worksheets as (name, BOF position) pairs in workbook order
    sheets: Vec<(String, usize)>,
    is_1904: bool,
}

impl XlsWorkbook {
    /// Opens the compound file and reads the workbook globals substream
    pub(crate) fn open(mut source: WorkbookSource) -> Result<XlsWorkbook, SpreadsheetError> {
        let cfb = Cfb::new(&mut source)?;
        let stream = match cfb.read("Workbook")? {
            Some(stream) => stream,
            None => cfb.read("Book")?.ok_or(XlsError::MissingWorkbookStream)?,
        };
        let mut reader = Biff8Reader::new(stream);

        let mut is_1904 = false;
        let mut shared_strings = Vec::new();
        let mut custom_formats = HashMap::<String, NumberStyle>::new();
        let mut format_indexes = Vec::<String>::new();
        let mut sheets = Vec::<(String, usize)>::new();
        match_biff8_records!(reader => {
            EOF => break,
            FILE_PASS => Err(XlsError::PasswordProtected)?,
            DATE1904 => is_1904 = reader.read_u16()? == 1,
            CODE_PAGE => {
                let code_page = reader.read_u16()?;
                let encoding = codepage::to_encoding(code_page).ok_or(XlsError::CodePageError(code_page))?;
                // UTF-16 workbooks still store compressed strings as single bytes
                reader.encoding = if encoding == UTF_16LE || encoding == UTF_16BE {
                    WINDOWS_1252
                } else {
                    encoding
                };
            }
            FORMAT => {
                let id = reader.read_u16()?;
                let format = reader.read_xl_unicode_string()?;
                custom_formats.insert(id.to_string(), NumberStyle::parse_custom_number_format(&format));
            }
            XF => {
                reader.skip(2)?;
                format_indexes.push(reader.read_u16()?.to_string());
            }
            SST => shared_strings = load_shared_strings(&mut reader)?,
            BOUND_SHEET8 => {
                let pointer = reader.read_usize()?;
                reader.skip(1)?;
                let sheet_type = reader.read_u8()?;
                let name = reader.read_short_xl_unicode_string()?;
                if sheet_type == WORKSHEET {
                    sheets.push((name, pointer));
                } else {
                    debug!(sheet = %name, sheet_type, "Skipping non-worksheet sheet");
                }
            }
        });
        if sheets.is_empty() {
            Err(SpreadsheetError::EmptyWorkbook)?;
        }

        let number_styles = format_indexes
            .iter()
            .map(|id| {
                custom_formats
                    .get(id)
                    .copied()
                    .or_else(|| NumberStyle::parse_builtin_number_format_id(id))
                    .unwrap_or_default()
            })
            .collect::<Vec<_>>();
        debug!(
            sheets = sheets.len(),
            styles = number_styles.len(),
            shared_strings = shared_strings.len(),
            is_1904,
            "Opened xls workbook"
        );

        Ok(XlsWorkbook {
            reader,
            shared_strings,
            number_styles,
            sheets,
            is_1904,
        })
    }

    pub(crate) fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.to_owned()).collect()
    }

    /// Reads one worksheet substream into a grid
    pub(crate) fn read_sheet(&mut self, sheet_name: &str, criteria: &Criteria) -> Result<RawSheet, SpreadsheetError> {
        let pointer = self
            .sheets
            .iter()
            .find(|(name, _)| name == sheet_name)
            .map(|(_, pointer)| *pointer)
            .ok_or_else(|| SpreadsheetError::SheetNotFound(sheet_name.to_owned()))?;

        self.reader.goto(pointer);
        // the substream's own BOF
        self.reader.next()?;

        let mut cells = Vec::<Cell>::new();
        while let Some(kind) = self.reader.next()? {
            match kind {
                BOF | EOF => break,
                MUL_RK => {
                    let row = self.reader.read_u16()? as usize;
                    let col_lower = self.reader.read_u16()? as usize;
                    let col_upper = self.reader.get_u16_back(2)? as usize;
                    for col in col_lower..=col_upper {
                        let style = self.reader.read_u16()? as usize;
                        let number = self.reader.read_rk_number()?;
                        self.push(&mut cells, row, col, RawValue::Number { style, number }, criteria);
                    }
                }
                BOOL_ERR | NUMBER | RK | LABEL_SST | LABEL | FORMULA => {
                    let row = self.reader.read_u16()? as usize;
                    let col = self.reader.read_u16()? as usize;
                    let value = match kind {
                        BOOL_ERR => read_bool_or_error_cell(&mut self.reader)?,
                        NUMBER => {
                            let style = self.reader.read_u16()? as usize;
                            let number = self.reader.read_f64()?;
                            RawValue::Number { style, number }
                        }
                        RK => {
                            let style = self.reader.read_u16()? as usize;
                            let number = self.reader.read_rk_number()?;
                            RawValue::Number { style, number }
                        }
                        LABEL_SST => {
                            self.reader.skip(2)?;
                            RawValue::SharedString(self.reader.read_usize()?)
                        }
                        LABEL => {
                            self.reader.skip(2)?;
                            RawValue::Text(self.reader.read_xl_unicode_string()?)
                        }
                        _ => read_formula_cell(&mut self.reader)?,
                    };
                    self.push(&mut cells, row, col, value, criteria);
                }
                _ => (),
            }
        }

        Ok(RawSheet::from_cells(sheet_name, cells))
    }

    /// Resolves a raw value and keeps it unless it reads as missing
    fn push(&self, cells: &mut Vec<Cell>, row: usize, col: usize, value: RawValue, criteria: &Criteria) {
        let value = match value {
            RawValue::Number { style, number } => {
                let style = self.number_styles.get(style).copied().unwrap_or_default();
                style.to_value(number, self.is_1904)
            }
            RawValue::SharedString(index) => match self.shared_strings.get(index) {
                Some(text) if !criteria.is_null(text) => CellValue::Text(text.to_owned()),
                _ => CellValue::Null,
            },
            RawValue::Text(text) if !criteria.is_null(&text) => CellValue::Text(text),
            RawValue::Bool(value) => CellValue::Bool(value),
            RawValue::Text(_) | RawValue::Missing => CellValue::Null,
        };
        if !value.is_null() {
            cells.push(Cell { row, col, value });
        }
    }
}

fn load_shared_strings(reader: &mut Biff8Reader) -> Result<Vec<String>, SpreadsheetError> {
    // total count, then unique count
    reader.skip(4)?;
    let count = reader.read_usize()?;
    let mut shared_strings = Vec::with_capacity(count.min(u16::MAX as usize));
    for _ in 0..count {
        shared_strings.push(reader.read_xl_unicode_rich_extended_string()?);
    }
    Ok(shared_strings)
}

/// Booleans keep their value; error codes read as missing
fn read_bool_or_error_cell(reader: &mut Biff8Reader) -> Result<RawValue, SpreadsheetError> {
    reader.skip(2)?;
    let value = reader.read_u8()?;
    let is_error = reader.read_u8()? != 0;
    Ok(if is_error { RawValue::Missing } else { RawValue::Bool(value != 0) })
}

/// Reads the cached result of a formula; string results follow in a STRING record
fn read_formula_cell(reader: &mut Biff8Reader) -> Result<RawValue, SpreadsheetError> {
    let style = reader.read_u16()? as usize;
    let formula = reader.read_u64()?;
    let is_number = (formula & 0xFFFF_0000_0000_0000) != 0xFFFF_0000_0000_0000;
    if is_number {
        return Ok(RawValue::Number {
            style,
            number: f64::from_bits(formula),
        });
    }
    match formula & 0xFF {
        0 => match reader.next()? {
            Some(STRING) => Ok(RawValue::Text(reader.read_xl_unicode_string()?)),
            _ => Err(XlsError::FormulaValueError(formula))?,
        },
        1 => Ok(RawValue::Bool((formula & 0xFF_0000) > 0)),
        2 | 3 => Ok(RawValue::Missing),
        _ => Err(XlsError::FormulaValueError(formula))?,
    }
}
