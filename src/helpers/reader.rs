use std::fs::File;
use std::io::BufReader;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::path::Path;

/// A seekable workbook source backed by either a local file or an in-memory buffer
pub(crate) enum WorkbookSource {
    /// Local file reader
    File(BufReader<File>),
    /// Caller-supplied bytes
    Memory(Cursor<Vec<u8>>),
}

impl WorkbookSource {
    /// Opens a local workbook file
    pub(crate) fn open(path: &Path) -> std::io::Result<WorkbookSource> {
        let file = File::open(path)?;
        Ok(WorkbookSource::File(BufReader::new(file)))
    }

    /// Wraps workbook bytes already held in memory
    pub(crate) fn from_bytes(bytes: Vec<u8>) -> WorkbookSource {
        WorkbookSource::Memory(Cursor::new(bytes))
    }
}

impl Read for WorkbookSource {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            WorkbookSource::File(reader) => reader.read(buf),
            WorkbookSource::Memory(reader) => reader.read(buf),
        }
    }
}

impl Seek for WorkbookSource {
    fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
        match self {
            WorkbookSource::File(reader) => reader.seek(pos),
            WorkbookSource::Memory(reader) => reader.seek(pos),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_local_file() {
        let result = WorkbookSource::open(Path::new("Cargo.toml"));
        assert!(result.is_ok(), "Failed to open local file: {:?}", result.err());

        let result = WorkbookSource::open(Path::new("non_existent_file.xlsx"));
        assert!(result.is_err(), "Should fail to open non-existent file");
    }

    #[test]
    fn memory_source_reads_back() {
        let mut source = WorkbookSource::from_bytes(b"PK\x03\x04".to_vec());
        let mut buffer = Vec::new();
        source.read_to_end(&mut buffer).unwrap();
        assert_eq!(buffer, b"PK\x03\x04");

        source.seek(std::io::SeekFrom::Start(2)).unwrap();
        buffer.clear();
        source.read_to_end(&mut buffer).unwrap();
        assert_eq!(buffer, b"\x03\x04");
    }
}
