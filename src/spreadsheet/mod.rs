//! # Spreadsheet Reading Module
//!
//! Reads Excel workbooks (`.xlsx`, `.xlsm`, `.xls`) from a path or from bytes and turns every
//! sheet into a [`RawSheet`]: a header row plus typed data rows. Cell styles and the
//! workbook date system decide whether a number is read as a number, a datetime or a
//! time of day.
pub(crate) mod cell;
pub(crate) mod criteria;
pub(crate) mod reference;
pub(crate) mod sheet;
pub(crate) mod xls;
pub(crate) mod xlsx;

pub use cell::CellValue;
pub use criteria::ReadOptions;
pub use criteria::DEFAULT_NULL_LITERALS;
pub use sheet::RawSheet;

use crate::helpers::biff8::Biff8Error;
use crate::helpers::cfb::has_signature;
use crate::helpers::cfb::CfbError;
use crate::helpers::reader::WorkbookSource;
use crate::helpers::xml::XmlError;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::xls::XlsError;
use crate::spreadsheet::xls::XlsWorkbook;
use crate::spreadsheet::xlsx::XlsxWorkbook;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::Path;
use thiserror::Error;
use tracing::debug;
use tracing::warn;

/// File extensions the reader accepts.
const SUPPORTED_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls"];

/// Errors raised while opening or reading a workbook.
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("{0}")]
    WithContextError(String),

    #[error("Unsupported file format '{0}', expected .xlsx, .xlsm or .xls")]
    UnsupportedFormat(String),

    #[error("Missing workbook part '{0}'")]
    MissingPart(String),

    #[error("Workbook contains no sheets")]
    EmptyWorkbook,

    #[error("Sheet '{0}' not found")]
    SheetNotFound(String),

    #[error("Invalid cell value at {0}: {1}")]
    CellValueError(String, String),

    #[error("{0}")]
    PatternError(#[from] glob::PatternError),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    // Third-party library errors
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    #[error("{0}")]
    XlsError(#[from] XlsError),

    // Helper module errors
    #[error("{0}")]
    XmlHelperError(#[from] XmlError),

    #[error("{0}")]
    CfbError(#[from] CfbError),

    #[error("{0}")]
    Biff8Error(#[from] Biff8Error),
}

/// The container format behind a workbook.
enum Backend {
    Xlsx(XlsxWorkbook),
    Xls(XlsWorkbook),
}

impl Backend {
    /// Picks the reader from the leading bytes: a compound file is `.xls`, anything else is
    /// tried as an xlsx zip container.
    fn open(mut source: WorkbookSource) -> Result<Backend, SpreadsheetError> {
        let mut signature = [0u8; 8];
        let size = source.read(&mut signature)?;
        source.seek(SeekFrom::Start(0))?;
        if has_signature(&signature[..size]) {
            Ok(Backend::Xls(XlsWorkbook::open(source)?))
        } else {
            Ok(Backend::Xlsx(XlsxWorkbook::open(source)?))
        }
    }

    fn format(&self) -> &'static str {
        match self {
            Backend::Xlsx(_) => "xlsx",
            Backend::Xls(_) => "xls",
        }
    }

    fn sheet_names(&self) -> Vec<String> {
        match self {
            Backend::Xlsx(workbook) => workbook.sheet_names(),
            Backend::Xls(workbook) => workbook.sheet_names(),
        }
    }

    fn read_sheet(&mut self, name: &str, criteria: &Criteria) -> Result<RawSheet, SpreadsheetError> {
        match self {
            Backend::Xlsx(workbook) => workbook.read_sheet(name, criteria),
            Backend::Xls(workbook) => workbook.read_sheet(name, criteria),
        }
    }
}

/// An opened workbook.
pub struct Workbook {
    name: String,
    backend: Backend,
}

impl Workbook {
    /// Opens a workbook file, rejecting extensions other than `.xlsx`, `.xlsm` and `.xls`.
    pub fn open(path: impl AsRef<Path>) -> Result<Workbook, SpreadsheetError> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(|extension| extension.to_ascii_lowercase())
            .unwrap_or_default();
        if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(SpreadsheetError::UnsupportedFormat(name));
        }

        let source = WorkbookSource::open(path)?;
        Self::from_source(name, source)
    }

    /// Opens a workbook held in memory. `name` is only used in logs and reports.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Workbook, SpreadsheetError> {
        Self::from_source(name.into(), WorkbookSource::from_bytes(bytes))
    }

    fn from_source(name: String, source: WorkbookSource) -> Result<Workbook, SpreadsheetError> {
        let backend = Backend::open(source).map_err(|e| match e {
            SpreadsheetError::ZipError(error) => {
                SpreadsheetError::WithContextError(format!("{}: not an xlsx or xls workbook ({})", name, error))
            }
            error => SpreadsheetError::WithContextError(format!("{}: {}", name, error)),
        })?;
        debug!(workbook = %name, format = backend.format(), sheets = ?backend.sheet_names(), "Workbook opened");
        Ok(Workbook { name, backend })
    }

    /// Workbook name: the file path, or the caller-supplied name for in-memory workbooks.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sheet names in workbook order.
    pub fn sheet_names(&self) -> Vec<String> {
        self.backend.sheet_names()
    }

    /// Reads one sheet by name.
    pub fn read_sheet(&mut self, name: &str, options: &ReadOptions) -> Result<RawSheet, SpreadsheetError> {
        let criteria = options.criteria()?;
        self.backend.read_sheet(name, &criteria)
    }

    /// Reads every sheet selected by the options, in workbook order.
    ///
    /// A sheet that fails to read is logged and reported in the second list; it does
    /// not stop the remaining sheets.
    pub fn read_sheets(
        &mut self,
        options: &ReadOptions,
    ) -> Result<(Vec<RawSheet>, Vec<(String, SpreadsheetError)>), SpreadsheetError> {
        let criteria = options.criteria()?;
        let mut sheets = Vec::new();
        let mut failures = Vec::new();
        for name in self.backend.sheet_names() {
            if !criteria.accept(&name) {
                debug!(sheet = %name, "Sheet not selected");
                continue;
            }
            match self.backend.read_sheet(&name, &criteria) {
                Ok(sheet) => sheets.push(sheet),
                Err(error) => {
                    warn!(workbook = %self.name, sheet = %name, error = %error, "Skipping unreadable sheet");
                    failures.push((name, error));
                }
            }
        }
        Ok((sheets, failures))
    }
}
