//! ZIP archive helper utilities for Excel (.xlsx) workbooks
//! Provides convenient methods for accessing parts within the container

use crate::spreadsheet::SpreadsheetError;
use std::io::Read;
use std::io::Seek;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::ZipArchive;

/// Helper trait for ZIP archive operations
pub(crate) trait ZipHelper<RS: Read + Seek> {
    /// Gets a file from the ZIP archive by name (case-insensitive, path separator agnostic)
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, SpreadsheetError>;

    /// Reads a whole part as UTF-8 text, `None` when the part does not exist
    fn read_text(&mut self, name: &str) -> Result<Option<String>, SpreadsheetError>;
}

impl<RS: Read + Seek> ZipHelper<RS> for ZipArchive<RS> {
    /// Gets a file from the ZIP archive by name with case-insensitive matching
    /// and path separator normalization (backslash to forward slash)
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, SpreadsheetError> {
        let pattern = name.replace('\\', "/");
        let path = self
            .file_names()
            .find(|file_name| pattern.eq_ignore_ascii_case(file_name))
            .map(|file_name| file_name.to_owned());
        match path.map(|file_name| self.by_name(&file_name)).transpose() {
            Ok(Some(file)) => Ok(Some(file)),
            Ok(None) | Err(ZipError::FileNotFound) => Ok(None),
            Err(error) => Err(error)?,
        }
    }

    fn read_text(&mut self, name: &str) -> Result<Option<String>, SpreadsheetError> {
        match self.file(name)? {
            Some(mut file) => {
                let mut text = String::with_capacity(file.size() as usize);
                file.read_to_string(&mut text)?;
                Ok(Some(text))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn archive(entries: &[(&str, &str)]) -> ZipArchive<Cursor<Vec<u8>>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        let cursor = writer.finish().unwrap();
        ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap()
    }

    #[test]
    fn file_lookup_ignores_case_and_separators() {
        let mut zip = archive(&[("xl/Workbook.xml", "<workbook/>")]);
        assert_eq!(zip.read_text("xl\\workbook.xml").unwrap().as_deref(), Some("<workbook/>"));
        assert_eq!(zip.read_text("XL/WORKBOOK.XML").unwrap().as_deref(), Some("<workbook/>"));
        assert!(zip.read_text("xl/styles.xml").unwrap().is_none());
    }
}
