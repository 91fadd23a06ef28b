use crate::error::ResultMessage;
use crate::helpers::reader::WorkbookSource;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::cell::NumberStyle;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::sheet::Cell;
use crate::spreadsheet::sheet::RawSheet;
use crate::spreadsheet::SpreadsheetError;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::collections::HashMap;
use tracing::debug;
use zip::ZipArchive;

// XML tag names for parsing Excel XLSX format
const TAG_CUSTOM_FORMATS: QName = QName(b"numFmts"); // Custom number formats container
const TAG_CUSTOM_FORMAT: QName = QName(b"numFmt"); // Individual custom number format
const TAG_FORMAT_INDEXES: QName = QName(b"cellXfs"); // Cell format indexes container
const TAG_FORMAT_INDEX: QName = QName(b"xf"); // Individual cell format index
const TAG_SHARED_STRING_ITEM: QName = QName(b"si"); // Shared string table item
const TAG_PHONETIC_TEXT: QName = QName(b"rPh"); // Phonetic text for Asian languages
const TAG_TEXT: QName = QName(b"t"); // Text content within strings
const TAG_WORKBOOK_PROPERTIES: QName = QName(b"workbookPr"); // Workbook properties
const TAG_SHEET: QName = QName(b"sheet"); // Worksheet definition
const TAG_ROW: QName = QName(b"row"); // Row in worksheet
const TAG_CELL: QName = QName(b"c"); // Cell in worksheet
const TAG_INLINE_STRING: QName = QName(b"is"); // Inline string value
const TAG_VALUE: QName = QName(b"v"); // Cell value content
const TAG_RELATIONSHIP: &[u8] = b"Relationship";

const PART_WORKBOOK: &str = "xl/workbook.xml";
const PART_RELATIONSHIPS: &str = "xl/_rels/workbook.xml.rels";
const PART_STYLES: &str = "xl/styles.xml";
const PART_SHARED_STRINGS: &str = "xl/sharedStrings.xml";

/// Cell data type from the `t` attribute of a cell
#[derive(Copy, Clone, Debug, Default, PartialEq)]
enum CellKind {
    #[default]
    Number,
    SharedString,
    InlineString,
    Boolean,
    IsoDateTime,
    Error,
}

impl CellKind {
    fn parse(kind: Option<&str>) -> Self {
        match kind {
            Some("s") => CellKind::SharedString,
            Some("inlineStr") | Some("str") => CellKind::InlineString,
            Some("b") => CellKind::Boolean,
            Some("d") => CellKind::IsoDateTime,
            Some("e") => CellKind::Error,
            _ => CellKind::Number,
        }
    }
}

/// An opened Excel XLSX workbook
pub(crate) struct XlsxWorkbook {
    /// ZIP archive containing the XLSX parts
    zip: ZipArchive<WorkbookSource>,
    /// Worksheets as (name, zip_path) pairs in workbook order
    sheets: Vec<(String, String)>,
    /// Number style per cell style index
    number_styles: Vec<NumberStyle>,
    /// Shared string table
    shared_strings: Vec<String>,
    /// Whether the workbook uses the 1904 date system
    is_1904: bool,
}

impl XlsxWorkbook {
    /// Opens an XLSX container and loads the workbook-level parts
    ///
    /// # Arguments
    /// * `source` - Seekable reader over the container bytes
    ///
    /// # Returns
    /// The workbook ready for sheet reads, or a format error
    pub(crate) fn open(source: WorkbookSource) -> Result<XlsxWorkbook, SpreadsheetError> {
        let mut zip = ZipArchive::new(source)?;
        let (sheets, is_1904) = load_workbook(&mut zip)?;
        if sheets.is_empty() {
            Err(SpreadsheetError::EmptyWorkbook)?;
        }
        let number_styles = load_number_styles(&mut zip).with_prefix(PART_STYLES)?;
        let shared_strings = load_shared_strings(&mut zip).with_prefix(PART_SHARED_STRINGS)?;
        debug!(
            sheets = sheets.len(),
            styles = number_styles.len(),
            shared_strings = shared_strings.len(),
            is_1904,
            "Opened xlsx workbook"
        );
        Ok(XlsxWorkbook {
            zip,
            sheets,
            number_styles,
            shared_strings,
            is_1904,
        })
    }

    /// Sheet names in workbook order
    pub(crate) fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.to_owned()).collect()
    }

    /// Reads one worksheet into a grid
    ///
    /// Empty cells and cells holding a null literal are left out; error cells read as missing.
    pub(crate) fn read_sheet(&mut self, sheet_name: &str, criteria: &Criteria) -> Result<RawSheet, SpreadsheetError> {
        let zip_path = self
            .sheets
            .iter()
            .find(|(name, _)| name == sheet_name)
            .map(|(_, path)| path.to_owned())
            .ok_or_else(|| SpreadsheetError::SheetNotFound(sheet_name.to_owned()))?;
        let xml = self
            .zip
            .read_text(&zip_path)?
            .ok_or_else(|| SpreadsheetError::MissingPart(zip_path.to_owned()))?;

        let mut cells = Vec::<Cell>::new();
        let mut row_count = 0usize;
        let mut col_count = 0usize;
        let mut row = 0usize;
        let mut col = 0usize;
        let mut kind = CellKind::default();
        let mut style = NumberStyle::default();
        let mut value = None::<String>;
        let mut reader = XmlReader::new(&xml);
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TAG_ROW => {
                if let Some(index) = event.parse_attribute_value::<usize>("r")? {
                    row_count = index.saturating_sub(1);
                }
                col_count = 0;
            }
            Event::End(event) if event.name() == TAG_ROW => {
                row_count += 1;
            }
            Event::Start(event) if event.name() == TAG_CELL => {
                (row, col) = event
                    .get_attribute_value("r")?
                    .and_then(|reference| reference_to_index(&reference))
                    .unwrap_or((row_count, col_count));
                col_count = col + 1;
                kind = CellKind::parse(event.get_attribute_value("t")?.as_deref());
                style = match event.parse_attribute_value::<usize>("s")? {
                    Some(index) => self.number_styles.get(index).copied().unwrap_or_default(),
                    None => NumberStyle::General,
                };
                value = None;
            }
            Event::Start(event) if event.name() == TAG_INLINE_STRING => {
                value = Some(read_string_value(&mut reader, TAG_INLINE_STRING, false)?);
            }
            Event::Start(event) if event.name() == TAG_VALUE => {
                value = Some(read_string_value(&mut reader, TAG_VALUE, true)?);
            }
            Event::End(event) if event.name() == TAG_CELL => {
                if let Some(raw) = value.take() {
                    let cell = self.to_cell_value(kind, style, raw, criteria).map_err(|message| {
                        SpreadsheetError::CellValueError(index_to_reference(row, col), message)
                    })?;
                    if !cell.is_null() {
                        cells.push(Cell { row, col, value: cell });
                    }
                }
            }
        });

        Ok(RawSheet::from_cells(sheet_name, cells))
    }

    /// Converts the raw text of a cell according to its kind and number style
    fn to_cell_value(&self, kind: CellKind, style: NumberStyle, raw: String, criteria: &Criteria) -> Result<CellValue, String> {
        let text = match kind {
            CellKind::Error => return Ok(CellValue::Null),
            CellKind::Boolean => return Ok(CellValue::Bool(raw == "1" || raw.eq_ignore_ascii_case("true"))),
            CellKind::Number if raw.is_empty() => return Ok(CellValue::Null),
            CellKind::Number => {
                let number = raw
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| format!("'{}' is not a number", raw))?;
                return Ok(style.to_value(number, self.is_1904));
            }
            CellKind::IsoDateTime => match parse_iso_datetime(&raw) {
                Some(datetime) => return Ok(CellValue::DateTime(datetime)),
                None => raw,
            },
            CellKind::SharedString => {
                let index = raw
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| format!("'{}' is not a shared string index", raw))?;
                self.shared_strings
                    .get(index)
                    .cloned()
                    .ok_or_else(|| format!("shared string {} does not exist", index))?
            }
            CellKind::InlineString => raw,
        };

        if criteria.is_null(&text) {
            Ok(CellValue::Null)
        } else {
            Ok(CellValue::Text(text))
        }
    }
}

/// Parses the ISO 8601 values written for `t="d"` cells
fn parse_iso_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim().trim_end_matches('Z');
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Loads worksheet relationships of the workbook part
///
/// # Returns
/// Mapping of relationship IDs to worksheet paths inside the archive
fn load_relationships(zip: &mut ZipArchive<WorkbookSource>) -> Result<HashMap<String, String>, SpreadsheetError> {
    let xml = zip
        .read_text(PART_RELATIONSHIPS)?
        .ok_or_else(|| SpreadsheetError::MissingPart(PART_RELATIONSHIPS.to_owned()))?;
    let mut reader = XmlReader::new(&xml);
    let mut relationships = HashMap::<String, String>::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            // Only process worksheet relationships
            if kind.map(|it| it.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id, to_zip_path(&target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Loads worksheet names and paths in workbook order, and the date system
///
/// # Returns
/// Tuple of (worksheets, is_1904_date_system) where worksheets are (name, zip_path) pairs
fn load_workbook(zip: &mut ZipArchive<WorkbookSource>) -> Result<(Vec<(String, String)>, bool), SpreadsheetError> {
    let relationships = load_relationships(zip).with_prefix(PART_RELATIONSHIPS)?;
    let xml = zip
        .read_text(PART_WORKBOOK)?
        .ok_or_else(|| SpreadsheetError::MissingPart(PART_WORKBOOK.to_owned()))?;
    let mut reader = XmlReader::new(&xml);
    let mut sheets = Vec::<(String, String)>::new();
    let mut is_1904 = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let name = event.get_attribute_value("name")?;
            let id = event.get_local_attribute_value("id")?;
            if let Some((name, id)) = name.zip(id) {
                match relationships.get(&id) {
                    Some(path) => sheets.push((name, path.to_owned())),
                    None => debug!(sheet = %name, "Skipping sheet without worksheet relationship"),
                }
            }
        }
        Event::Start(event) if event.name() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = event
                .get_attribute_value("date1904")?
                .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
                .unwrap_or(false);
        }
    });
    Ok((sheets, is_1904))
}

/// Loads cell styles and classifies each one by its number format
///
/// # Returns
/// Vector of number styles indexed by cell style ID
fn load_number_styles(zip: &mut ZipArchive<WorkbookSource>) -> Result<Vec<NumberStyle>, SpreadsheetError> {
    let xml = match zip.read_text(PART_STYLES)? {
        Some(xml) => xml,
        None => return Ok(Vec::new()),
    };

    let mut custom_formats_context = false;
    let mut custom_formats = HashMap::<String, NumberStyle>::new();
    let mut format_indexes_context = false;
    let mut format_indexes = Vec::<String>::new();

    let mut reader = XmlReader::new(&xml);
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = true,
        Event::End(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = false,
        Event::Start(event) if custom_formats_context && event.name() == TAG_CUSTOM_FORMAT => {
            let id = event.get_attribute_value("numFmtId")?;
            let format = event.get_attribute_value("formatCode")?;
            if let Some((id, format)) = id.zip(format) {
                custom_formats.insert(id, NumberStyle::parse_custom_number_format(&format));
            }
        }
        Event::Start(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = true,
        Event::End(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = false,
        Event::Start(event) if format_indexes_context && event.name() == TAG_FORMAT_INDEX => {
            format_indexes.push(event.get_attribute_value("numFmtId")?.unwrap_or_default());
        }
    });

    let styles = format_indexes
        .iter()
        .map(|id| {
            custom_formats
                .get(id)
                .copied()
                .or_else(|| NumberStyle::parse_builtin_number_format_id(id))
                .unwrap_or_default()
        })
        .collect();
    Ok(styles)
}

/// Loads the shared string table, concatenating rich text runs
fn load_shared_strings(zip: &mut ZipArchive<WorkbookSource>) -> Result<Vec<String>, SpreadsheetError> {
    let xml = match zip.read_text(PART_SHARED_STRINGS)? {
        Some(xml) => xml,
        None => return Ok(Vec::new()),
    };
    let mut shared_strings = Vec::<String>::new();
    let mut reader = XmlReader::new(&xml);
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
            shared_strings.push(read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?);
        }
    });
    Ok(shared_strings)
}

/// Reads string value from XML content, handling text and CDATA sections
///
/// Extracts string content from XML elements, skipping phonetic text annotations.
///
/// # Arguments
/// * `reader` - XML reader positioned just after the start tag
/// * `end_tag` - XML tag that marks the end of the string content
/// * `is_text_content` - Whether text directly inside the element counts
///
/// # Returns
/// Extracted string value
fn read_string_value(reader: &mut XmlReader<'_>, end_tag: QName, is_text_content: bool) -> Result<String, SpreadsheetError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = is_text_content,
        Event::Text(event) if is_text => text.push_str(&event.xml_content()?),
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}

/// Normalizes a relationship target to a path inside the archive
fn to_zip_path(path: &str) -> String {
    if let Some(stripped) = path.strip_prefix('/') {
        stripped.to_owned()
    } else if path.starts_with("xl/") {
        path.to_owned()
    } else {
        format!("xl/{path}")
    }
}
