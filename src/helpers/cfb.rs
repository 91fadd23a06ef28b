//! OLE Compound File Binary (CFB) container of legacy `.xls` workbooks.
//! The whole container is loaded into memory; streams are read by following sector chains.

use crate::helpers::bytes::to_u16;
use crate::helpers::bytes::to_u64;
use crate::helpers::bytes::to_usize;
use crate::helpers::bytes::to_usize_iter;
use crate::spreadsheet::SpreadsheetError;
use encoding_rs::UTF_16LE;
use std::collections::HashMap;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use thiserror::Error;

const MAX_REG_SECT: usize = 0xFFFFFFFB;
const SIGNATURE: u64 = 0xE11A_B1A1_E011_CFD0;
const HEADER_SIZE: usize = 512;
const DIRECTORY_ENTRY_SIZE: usize = 128;
const MINI_SECTOR_SIZE: usize = 64;
/// Streams smaller than this live in the mini stream.
const MINI_STREAM_CUTOFF: usize = 4096;
const ROOT_ENTRY: &str = "Root Entry";

/// Errors specific to Compound File Binary parsing
#[derive(Error, Debug)]
pub enum CfbError {
    #[error("The file is corrupted or has an invalid CFB structure")]
    FileFormatError,

    #[error("Invalid OLE signature (not an office document?)")]
    OleSignatureError,

    #[error("Invalid Sector size '2 ^ {1}' for major version '{0}'")]
    SectorSizeError(u16, u16),

    #[error("The number of double indirect file allocation table error: expect '{0}', actual '{1}'")]
    DoubleIndirectFileAllocationTableError(usize, usize),

    #[error("The number of file allocation table error: expect '{0}', actual '{1}'")]
    FileAllocationTableError(usize, usize),

    #[error("Empty Root directory")]
    RootDirectoryError,
}

/// Returns true when the bytes start with the CFB signature.
pub(crate) fn has_signature(bytes: &[u8]) -> bool {
    bytes.len() >= 8 && to_u64(&bytes[..8]) == SIGNATURE
}

/// A parsed compound file
pub(crate) struct Cfb {
    /// Stream name to directory entry
    directories: HashMap<String, Directory>,
    file_allocation_table: Vec<usize>,
    sectors: Sectors,
    mini_file_allocation_table: Vec<usize>,
    mini_sectors: Sectors,
}

impl Cfb {
    /// Reads and parses a whole compound file
    pub(crate) fn new<RS: Read + Seek>(reader: &mut RS) -> Result<Cfb, SpreadsheetError> {
        let size = reader.seek(SeekFrom::End(0))? as usize;
        if size < HEADER_SIZE {
            Err(CfbError::FileFormatError)?;
        }
        reader.seek(SeekFrom::Start(0))?;
        let mut data = vec![0u8; size];
        reader.read_exact(&mut data)?;

        let header = Header::new(&data[..HEADER_SIZE])?;
        let sectors = Sectors {
            size: header.sector_size()?,
            data,
        };
        let file_allocation_table = Self::load_file_allocation_table(&sectors, &header)?;
        let directories = Self::load_directories(&file_allocation_table, &sectors, header.directory_shift)?;
        let mini_file_allocation_table = if header.mini_file_allocation_table_sector_count > 0 {
            let bytes = read_chain(&file_allocation_table, &sectors, header.mini_file_allocation_table_sector_shift)?;
            to_usize_iter(&bytes).collect()
        } else {
            Vec::new()
        };
        let mini_sectors = match directories.get(ROOT_ENTRY) {
            Some(root) => {
                let mut data = read_chain(&file_allocation_table, &sectors, root.index)?;
                data.truncate(root.count);
                Sectors { data, size: MINI_SECTOR_SIZE }
            }
            None => Sectors { data: Vec::new(), size: MINI_SECTOR_SIZE },
        };

        Ok(Cfb {
            directories,
            file_allocation_table,
            sectors,
            mini_file_allocation_table,
            mini_sectors,
        })
    }

    /// Reads a stream by name, `None` when the container has no such stream
    pub(crate) fn read(&self, name: &str) -> Result<Option<Vec<u8>>, SpreadsheetError> {
        let directory = match self.directories.get(name) {
            Some(directory) => directory,
            None => return Ok(None),
        };
        let mut bytes = if directory.count < MINI_STREAM_CUTOFF {
            read_chain(&self.mini_file_allocation_table, &self.mini_sectors, directory.index)?
        } else {
            read_chain(&self.file_allocation_table, &self.sectors, directory.index)?
        };
        bytes.truncate(directory.count);
        Ok(Some(bytes))
    }

    /// Collects the file allocation table through the double indirect table
    fn load_file_allocation_table(sectors: &Sectors, header: &Header) -> Result<Vec<usize>, SpreadsheetError> {
        let mut double_indirect = to_usize_iter(&sectors.data[76..HEADER_SIZE]).collect::<Vec<_>>();

        let mut count = 0usize;
        let mut index = header.double_indirect_file_allocation_table_shift;
        while index < MAX_REG_SECT {
            if count > header.double_indirect_file_allocation_table_count {
                break;
            }
            double_indirect.extend(to_usize_iter(sectors.get(index)));
            // the last entry of each sector links to the next one
            index = double_indirect.pop().ok_or(CfbError::FileFormatError)?;
            count += 1;
        }
        if count != header.double_indirect_file_allocation_table_count {
            Err(CfbError::DoubleIndirectFileAllocationTableError(
                header.double_indirect_file_allocation_table_count,
                count,
            ))?
        }

        let mut file_allocation_table = Vec::<usize>::new();
        let mut count = 0usize;
        for index in double_indirect.into_iter().filter(|index| *index < MAX_REG_SECT) {
            file_allocation_table.extend(to_usize_iter(sectors.get(index)));
            count += 1;
        }
        if count != header.file_allocation_table_count {
            Err(CfbError::FileAllocationTableError(header.file_allocation_table_count, count))?
        }
        Ok(file_allocation_table)
    }

    fn load_directories(
        file_allocation_table: &[usize],
        sectors: &Sectors,
        index: usize,
    ) -> Result<HashMap<String, Directory>, SpreadsheetError> {
        let bytes = read_chain(file_allocation_table, sectors, index)?;
        let directories = bytes
            .chunks_exact(DIRECTORY_ENTRY_SIZE)
            .map(Directory::new)
            .collect::<HashMap<_, _>>();
        if !directories.contains_key(ROOT_ENTRY) {
            Err(CfbError::RootDirectoryError)?
        }
        Ok(directories)
    }
}

/// Follows a sector chain from `index` and concatenates the sectors
fn read_chain(file_allocation_table: &[usize], sectors: &Sectors, index: usize) -> Result<Vec<u8>, SpreadsheetError> {
    let mut content = Vec::new();
    let mut index = index;
    let mut visited = 0usize;
    while index < MAX_REG_SECT {
        // a chain longer than the table has a loop
        if visited > file_allocation_table.len() {
            Err(CfbError::FileFormatError)?
        }
        content.extend_from_slice(sectors.get(index));
        index = *file_allocation_table.get(index).ok_or(CfbError::FileFormatError)?;
        visited += 1;
    }
    Ok(content)
}

/// Fixed-size sectors over the container bytes
struct Sectors {
    data: Vec<u8>,
    size: usize,
}

impl Sectors {
    /// Data of sector `index`; the header occupies the first sector slot
    fn get(&self, index: usize) -> &[u8] {
        let source = (index + 1).saturating_mul(self.size);
        let target = self.data.len().min((index + 2).saturating_mul(self.size));
        self.data.get(source..target).unwrap_or(&[])
    }
}

struct Header {
    major_version: u16,
    sector_shift: u16,
    file_allocation_table_count: usize,
    directory_shift: usize,
    mini_file_allocation_table_sector_shift: usize,
    mini_file_allocation_table_sector_count: usize,
    double_indirect_file_allocation_table_shift: usize,
    double_indirect_file_allocation_table_count: usize,
}

impl Header {
    fn new(data: &[u8]) -> Result<Self, SpreadsheetError> {
        if to_u64(&data[0..8]) != SIGNATURE {
            Err(CfbError::OleSignatureError)?;
        }
        Ok(Header {
            major_version: to_u16(&data[26..28]),
            sector_shift: to_u16(&data[30..32]),
            file_allocation_table_count: to_usize(&data[44..48]),
            directory_shift: to_usize(&data[48..52]),
            mini_file_allocation_table_sector_shift: to_usize(&data[60..64]),
            mini_file_allocation_table_sector_count: to_usize(&data[64..68]),
            double_indirect_file_allocation_table_shift: to_usize(&data[68..72]),
            double_indirect_file_allocation_table_count: to_usize(&data[72..76]),
        })
    }

    fn sector_size(&self) -> Result<usize, SpreadsheetError> {
        match (self.major_version, self.sector_shift) {
            (3, 9) => Ok(512),
            // version 4 pads the header to a full 4096 byte sector
            (4, 12) => Ok(4096),
            (major, shift) => Err(CfbError::SectorSizeError(major, shift))?,
        }
    }
}

/// Start sector and byte length of one stream
struct Directory {
    index: usize,
    count: usize,
}

impl Directory {
    fn new(bytes: &[u8]) -> (String, Directory) {
        let size = (to_u16(&bytes[64..66]) as usize).min(64);
        let (name, _, _) = UTF_16LE.decode(&bytes[..size]);
        let name = match name.find('\0') {
            Some(position) => name[..position].to_owned(),
            None => name.into_owned(),
        };
        let index = to_usize(&bytes[116..120]);
        let count = to_u64(&bytes[120..128]) as usize;
        (name, Directory { index, count })
    }
}
