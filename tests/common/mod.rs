//! In-memory xlsx workbooks for integration tests.
#![allow(dead_code)]

use std::io::Cursor;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// A cell written into a test workbook.
#[derive(Clone, Debug)]
pub enum Value {
    Empty,
    Number(f64),
    /// Shared string
    Text(String),
    /// Inline string
    Inline(String),
    Bool(bool),
    /// Serial number styled as a date
    Date(f64),
    /// Serial number styled as a datetime
    DateTime(f64),
    /// Serial number styled with a custom time format
    Time(f64),
    Error,
    /// Formula with a cached text result
    Formula(String),
}

pub fn n(value: f64) -> Value {
    Value::Number(value)
}

pub fn t(value: &str) -> Value {
    Value::Text(value.to_owned())
}

pub fn row(values: &[&str]) -> Vec<Value> {
    values.iter().map(|value| t(value)).collect()
}

#[derive(Default)]
pub struct WorkbookBuilder {
    sheets: Vec<(String, Vec<Vec<Value>>)>,
    date1904: bool,
}

impl WorkbookBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheet(mut self, name: &str, rows: Vec<Vec<Value>>) -> Self {
        self.sheets.push((name.to_owned(), rows));
        self
    }

    pub fn date1904(mut self) -> Self {
        self.date1904 = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut shared_strings = Vec::<String>::new();
        let mut worksheets = Vec::new();
        for (_, rows) in &self.sheets {
            worksheets.push(worksheet(rows, &mut shared_strings));
        }

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        let mut part = |name: &str, content: String| {
            zip.start_file(name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        };

        part("[Content_Types].xml", content_types(self.sheets.len()));
        part("xl/workbook.xml", self.workbook());
        part("xl/_rels/workbook.xml.rels", relationships(self.sheets.len()));
        part("xl/styles.xml", STYLES.to_owned());
        part("xl/sharedStrings.xml", shared_string_table(&shared_strings));
        for (index, xml) in worksheets.into_iter().enumerate() {
            part(&format!("xl/worksheets/sheet{}.xml", index + 1), xml);
        }
        zip.finish().unwrap().into_inner()
    }

    /// Builds the same workbook as an Excel 97-2003 `.xls` compound file.
    pub fn build_xls(&self) -> Vec<u8> {
        let mut shared_strings = Vec::<String>::new();
        let substreams = self
            .sheets
            .iter()
            .map(|(_, rows)| biff_sheet(rows, &mut shared_strings))
            .collect::<Vec<_>>();

        let mut globals = record(BOF, &bof(0x0005));
        globals.extend(record(CODE_PAGE, &1200u16.to_le_bytes()));
        globals.extend(record(DATE1904, &u16::from(self.date1904).to_le_bytes()));
        let mut format = 164u16.to_le_bytes().to_vec();
        format.extend(xl_string(XLS_TIME_FORMAT, false));
        globals.extend(record(FORMAT, &format));
        for format_id in [0u16, 14, 22, 164] {
            let mut xf = vec![0u8; 20];
            xf[2..4].copy_from_slice(&format_id.to_le_bytes());
            globals.extend(record(XF, &xf));
        }
        let mut sst = (shared_strings.len() as u32).to_le_bytes().to_vec();
        sst.extend((shared_strings.len() as u32).to_le_bytes());
        for string in &shared_strings {
            sst.extend(xl_string(string, false));
        }
        globals.extend(record(SST, &sst));

        // sheet offsets are only known once the sheet records are sized
        let bound_sheets = self
            .sheets
            .iter()
            .map(|(name, _)| {
                let mut data = vec![0u8; 6];
                data.extend(xl_string(name, true));
                data
            })
            .collect::<Vec<_>>();
        let mut offset = globals.len() + bound_sheets.iter().map(|data| data.len() + 4).sum::<usize>() + 4;
        for (data, substream) in bound_sheets.iter().zip(&substreams) {
            let mut data = data.clone();
            data[0..4].copy_from_slice(&(offset as u32).to_le_bytes());
            globals.extend(record(BOUND_SHEET8, &data));
            offset += substream.len();
        }
        globals.extend(record(EOF, &[]));

        let mut stream = globals;
        for substream in substreams {
            stream.extend(substream);
        }
        compound_file(stream)
    }

    /// Writes the workbook into `dir` and returns its path.
    pub fn write(&self, dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        let bytes = if file_name.ends_with(".xls") { self.build_xls() } else { self.build() };
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn workbook(&self) -> String {
        let sheets = self
            .sheets
            .iter()
            .enumerate()
            .map(|(index, (name, _))| {
                format!(
                    r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
                    escape(name),
                    index + 1,
                    index + 1
                )
            })
            .collect::<String>();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><workbookPr date1904="{}"/><sheets>{}</sheets></workbook>"#,
            if self.date1904 { "1" } else { "0" },
            sheets
        )
    }
}

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><numFmts count="1"><numFmt numFmtId="164" formatCode="hh:mm:ss"/></numFmts><cellXfs count="4"><xf numFmtId="0"/><xf numFmtId="14"/><xf numFmtId="22"/><xf numFmtId="164"/></cellXfs></styleSheet>"#;

fn column_name(mut index: usize) -> String {
    let mut name = String::new();
    loop {
        name.insert(0, (b'A' + (index % 26) as u8) as char);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    name
}

fn worksheet(rows: &[Vec<Value>], shared_strings: &mut Vec<String>) -> String {
    let mut data = String::new();
    for (row_index, values) in rows.iter().enumerate() {
        data.push_str(&format!(r#"<row r="{}">"#, row_index + 1));
        for (col_index, value) in values.iter().enumerate() {
            let reference = format!("{}{}", column_name(col_index), row_index + 1);
            let cell = match value {
                Value::Empty => continue,
                Value::Number(number) => format!(r#"<c r="{}"><v>{}</v></c>"#, reference, number),
                Value::Text(text) => {
                    let index = match shared_strings.iter().position(|s| s == text) {
                        Some(index) => index,
                        None => {
                            shared_strings.push(text.clone());
                            shared_strings.len() - 1
                        }
                    };
                    format!(r#"<c r="{}" t="s"><v>{}</v></c>"#, reference, index)
                }
                Value::Inline(text) => format!(
                    r#"<c r="{}" t="inlineStr"><is><t>{}</t></is></c>"#,
                    reference,
                    escape(text)
                ),
                Value::Bool(value) => format!(r#"<c r="{}" t="b"><v>{}</v></c>"#, reference, u8::from(*value)),
                Value::Date(serial) => format!(r#"<c r="{}" s="1"><v>{}</v></c>"#, reference, serial),
                Value::DateTime(serial) => format!(r#"<c r="{}" s="2"><v>{}</v></c>"#, reference, serial),
                Value::Time(serial) => format!(r#"<c r="{}" s="3"><v>{}</v></c>"#, reference, serial),
                Value::Error => format!(r#"<c r="{}" t="e"><v>#DIV/0!</v></c>"#, reference),
                Value::Formula(text) => format!(r#"<c r="{}" t="str"><v>{}</v></c>"#, reference, escape(text)),
            };
            data.push_str(&cell);
        }
        data.push_str("</row>");
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{}</sheetData></worksheet>"#,
        data
    )
}

fn shared_string_table(strings: &[String]) -> String {
    let items = strings
        .iter()
        .map(|s| format!(r#"<si><t xml:space="preserve">{}</t></si>"#, escape(s)))
        .collect::<String>();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{0}" uniqueCount="{0}">{1}</sst>"#,
        strings.len(),
        items
    )
}

fn relationships(count: usize) -> String {
    let items = (1..=count)
        .map(|index| {
            format!(
                r#"<Relationship Id="rId{0}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{0}.xml"/>"#,
                index
            )
        })
        .collect::<String>();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{}<Relationship Id="rIdStyles" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#,
        items
    )
}

fn content_types(count: usize) -> String {
    let sheets = (1..=count)
        .map(|index| {
            format!(
                r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
                index
            )
        })
        .collect::<String>();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>{}</Types>"#,
        sheets
    )
}

// BIFF8 record types
const FORMULA: u16 = 0x0006;
const EOF: u16 = 0x000A;
const DATE1904: u16 = 0x0022;
const CODE_PAGE: u16 = 0x0042;
const BOUND_SHEET8: u16 = 0x0085;
const XF: u16 = 0x00E0;
const SST: u16 = 0x00FC;
const LABEL_SST: u16 = 0x00FD;
const NUMBER: u16 = 0x0203;
const LABEL: u16 = 0x0204;
const BOOL_ERR: u16 = 0x0205;
const STRING: u16 = 0x0207;
const RK: u16 = 0x027E;
const FORMAT: u16 = 0x041E;
const BOF: u16 = 0x0809;

const XLS_TIME_FORMAT: &str = "hh:mm:ss";

fn record(kind: u16, data: &[u8]) -> Vec<u8> {
    let mut bytes = kind.to_le_bytes().to_vec();
    bytes.extend((data.len() as u16).to_le_bytes());
    bytes.extend(data);
    bytes
}

fn bof(substream_type: u16) -> Vec<u8> {
    let mut data = 0x0600u16.to_le_bytes().to_vec();
    data.extend(substream_type.to_le_bytes());
    data.extend([0u8; 12]);
    data
}

/// Character count, flags and characters; Latin-1 text is stored compressed.
fn xl_string(value: &str, short: bool) -> Vec<u8> {
    let chars = value.chars().collect::<Vec<_>>();
    let mut bytes = if short {
        vec![chars.len() as u8]
    } else {
        (chars.len() as u16).to_le_bytes().to_vec()
    };
    if chars.iter().all(|c| (*c as u32) < 0x80 || ((*c as u32) >= 0xA0 && (*c as u32) < 0x100)) {
        bytes.push(0);
        bytes.extend(chars.iter().map(|c| *c as u32 as u8));
    } else {
        bytes.push(1);
        bytes.extend(value.encode_utf16().flat_map(u16::to_le_bytes));
    }
    bytes
}

fn cell_header(row: usize, col: usize, style: u16) -> Vec<u8> {
    let mut data = (row as u16).to_le_bytes().to_vec();
    data.extend((col as u16).to_le_bytes());
    data.extend(style.to_le_bytes());
    data
}

fn number_record(row: usize, col: usize, style: u16, number: f64) -> Vec<u8> {
    let mut data = cell_header(row, col, style);
    data.extend(number.to_le_bytes());
    record(NUMBER, &data)
}

fn biff_sheet(rows: &[Vec<Value>], shared_strings: &mut Vec<String>) -> Vec<u8> {
    let mut stream = record(BOF, &bof(0x0010));
    for (row, values) in rows.iter().enumerate() {
        for (col, value) in values.iter().enumerate() {
            let bytes = match value {
                Value::Empty => continue,
                // small integers use the compressed RK form
                Value::Number(number) if number.fract() == 0.0 && number.abs() < 1e8 => {
                    let mut data = cell_header(row, col, 0);
                    data.extend(((*number as i32) << 2 | 0x02).to_le_bytes());
                    record(RK, &data)
                }
                Value::Number(number) => number_record(row, col, 0, *number),
                Value::Text(text) => {
                    let index = match shared_strings.iter().position(|s| s == text) {
                        Some(index) => index,
                        None => {
                            shared_strings.push(text.clone());
                            shared_strings.len() - 1
                        }
                    };
                    let mut data = cell_header(row, col, 0);
                    data.extend((index as u32).to_le_bytes());
                    record(LABEL_SST, &data)
                }
                Value::Inline(text) => {
                    let mut data = cell_header(row, col, 0);
                    data.extend(xl_string(text, false));
                    record(LABEL, &data)
                }
                Value::Bool(value) => {
                    let mut data = cell_header(row, col, 0);
                    data.extend([u8::from(*value), 0]);
                    record(BOOL_ERR, &data)
                }
                Value::Date(serial) => number_record(row, col, 1, *serial),
                Value::DateTime(serial) => number_record(row, col, 2, *serial),
                Value::Time(serial) => number_record(row, col, 3, *serial),
                Value::Error => {
                    let mut data = cell_header(row, col, 0);
                    data.extend([0x07, 1]);
                    record(BOOL_ERR, &data)
                }
                Value::Formula(text) => {
                    // cached string result: marker bytes, then the STRING record
                    let mut data = cell_header(row, col, 0);
                    data.extend([0, 0, 0, 0, 0, 0, 0xFF, 0xFF]);
                    data.extend([0u8; 6]);
                    let mut bytes = record(FORMULA, &data);
                    bytes.extend(record(STRING, &xl_string(text, false)));
                    bytes
                }
            };
            stream.extend(bytes);
        }
    }
    stream.extend(record(EOF, &[]));
    stream
}

const SECTOR: usize = 512;
const END_OF_CHAIN: u32 = 0xFFFF_FFFE;
const FAT_SECTOR: u32 = 0xFFFF_FFFD;
const FREE_SECTOR: u32 = 0xFFFF_FFFF;

fn directory_entry(name: &str, entry_type: u8, child: u32, start: u32, size: u32) -> Vec<u8> {
    let mut entry = vec![0u8; 128];
    if name.is_empty() {
        entry[68..80].copy_from_slice(&[0xFF; 12]);
        return entry;
    }
    let encoded = name.encode_utf16().flat_map(u16::to_le_bytes).collect::<Vec<_>>();
    entry[..encoded.len()].copy_from_slice(&encoded);
    entry[64..66].copy_from_slice(&((encoded.len() + 2) as u16).to_le_bytes());
    entry[66] = entry_type;
    entry[67] = 1;
    entry[68..72].copy_from_slice(&FREE_SECTOR.to_le_bytes());
    entry[72..76].copy_from_slice(&FREE_SECTOR.to_le_bytes());
    entry[76..80].copy_from_slice(&child.to_le_bytes());
    entry[116..120].copy_from_slice(&start.to_le_bytes());
    entry[120..124].copy_from_slice(&size.to_le_bytes());
    entry
}

/// Wraps a workbook stream in a version 3 compound file: stream sectors, one directory
/// sector and one FAT sector. The stream is padded past the mini stream cutoff.
fn compound_file(mut stream: Vec<u8>) -> Vec<u8> {
    if stream.len() < 4096 {
        stream.resize(4096, 0);
    }
    let stream_size = stream.len();
    let stream_sectors = stream_size.div_ceil(SECTOR);
    let directory_sector = stream_sectors as u32;
    let fat_sector = directory_sector + 1;
    assert!(stream_sectors + 2 <= SECTOR / 4, "test workbook too large");

    let mut header = vec![0u8; SECTOR];
    header[0..8].copy_from_slice(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]);
    header[24..26].copy_from_slice(&0x003Eu16.to_le_bytes());
    header[26..28].copy_from_slice(&3u16.to_le_bytes());
    header[28..30].copy_from_slice(&0xFFFEu16.to_le_bytes());
    header[30..32].copy_from_slice(&9u16.to_le_bytes());
    header[32..34].copy_from_slice(&6u16.to_le_bytes());
    header[44..48].copy_from_slice(&1u32.to_le_bytes());
    header[48..52].copy_from_slice(&directory_sector.to_le_bytes());
    header[56..60].copy_from_slice(&4096u32.to_le_bytes());
    header[60..64].copy_from_slice(&END_OF_CHAIN.to_le_bytes());
    header[68..72].copy_from_slice(&END_OF_CHAIN.to_le_bytes());
    for slot in header[76..].chunks_exact_mut(4) {
        slot.copy_from_slice(&FREE_SECTOR.to_le_bytes());
    }
    header[76..80].copy_from_slice(&fat_sector.to_le_bytes());

    stream.resize(stream_sectors * SECTOR, 0);

    let mut directory = directory_entry("Root Entry", 5, 1, END_OF_CHAIN, 0);
    directory.extend(directory_entry("Workbook", 2, FREE_SECTOR, 0, stream_size as u32));
    directory.extend(directory_entry("", 0, 0, 0, 0));
    directory.extend(directory_entry("", 0, 0, 0, 0));

    let mut fat = Vec::with_capacity(SECTOR);
    for sector in 0..stream_sectors as u32 {
        let next = if sector + 1 == directory_sector { END_OF_CHAIN } else { sector + 1 };
        fat.extend(next.to_le_bytes());
    }
    fat.extend(END_OF_CHAIN.to_le_bytes());
    fat.extend(FAT_SECTOR.to_le_bytes());
    fat.resize(SECTOR, 0xFF);

    let mut bytes = header;
    bytes.extend(stream);
    bytes.extend(directory);
    bytes.extend(fat);
    bytes
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Students, courses and enrollments referencing both.
pub fn school() -> WorkbookBuilder {
    WorkbookBuilder::new()
        .sheet(
            "Students",
            vec![
                row(&["student_id", "Name", "Enrolled On"]),
                vec![n(1.0), t("Ann"), Value::Date(45292.0)],
                vec![n(2.0), t("Bob"), Value::Date(45293.0)],
                vec![n(3.0), t("Cid"), Value::Date(45294.0)],
                vec![n(4.0), t("Dee"), Value::Empty],
                vec![n(5.0), t("Eve"), Value::Date(45296.0)],
            ],
        )
        .sheet(
            "Courses",
            vec![
                row(&["course_code", "title", "credits"]),
                vec![t("MATH"), t("Algebra"), n(3.5)],
                vec![t("ART"), t("Drawing"), n(2.0)],
                vec![t("BIO"), t("Biology"), n(4.0)],
            ],
        )
        .sheet(
            "Enrollments",
            vec![
                row(&["enrollment_no", "student_id", "course_code", "passed"]),
                vec![n(100.0), n(1.0), t("MATH"), Value::Bool(true)],
                vec![n(101.0), n(1.0), t("ART"), Value::Bool(false)],
                vec![n(102.0), n(2.0), t("MATH"), Value::Bool(true)],
                vec![n(103.0), n(5.0), t("BIO"), Value::Empty],
            ],
        )
}
