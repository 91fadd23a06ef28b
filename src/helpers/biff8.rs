//! Record reader for the BIFF8 stream of Excel 97-2003 workbooks.
//! A record's data may continue over CONTINUE records; reads cross those boundaries transparently.

use crate::helpers::bytes::to_f64;
use crate::helpers::bytes::to_u16;
use crate::helpers::bytes::to_u32;
use crate::helpers::bytes::to_u64;
use crate::helpers::bytes::to_usize;
use crate::spreadsheet::SpreadsheetError;
use encoding_rs::Encoding;
use encoding_rs::UTF_16LE;
use encoding_rs::WINDOWS_1252;
use thiserror::Error;

const CONTINUE: u16 = 60;

#[derive(Error, Debug)]
pub enum Biff8Error {
    #[error("Fewer than {0} bytes remaining")]
    NoEnoughDataError(usize),
}

pub(crate) struct Biff8Reader {
    /// Encoding of compressed (8-bit) strings, from the workbook code page
    pub(crate) encoding: &'static Encoding,
    buffer: Vec<u8>,
    /// Position of the next record header
    pointer: usize,
    /// Data ranges of the current record and its continuations
    chunks: Vec<(usize, usize)>,
    index: usize,
    offset: usize,
}

impl Biff8Reader {
    pub(crate) fn new(data: Vec<u8>) -> Biff8Reader {
        Biff8Reader {
            encoding: WINDOWS_1252,
            buffer: data,
            pointer: 0,
            chunks: Vec::new(),
            index: 0,
            offset: 0,
        }
    }

    /// Advances to the next record and returns its type, `None` at the end of the stream
    pub(crate) fn next(&mut self) -> Result<Option<u16>, SpreadsheetError> {
        if self.pointer + 4 > self.buffer.len() {
            return Ok(None);
        }
        self.index = 0;
        self.offset = 0;
        self.chunks.clear();

        let kind = self.get_u16_at(self.pointer)?;
        self.push_chunk()?;
        while self.pointer + 4 <= self.buffer.len() && self.get_u16_at(self.pointer)? == CONTINUE {
            self.push_chunk()?;
        }
        Ok(Some(kind))
    }

    fn push_chunk(&mut self) -> Result<(), SpreadsheetError> {
        let size = self.get_u16_at(self.pointer + 2)? as usize;
        let lower = self.pointer + 4;
        let upper = (lower + size).min(self.buffer.len());
        self.chunks.push((lower, upper));
        self.pointer = lower + size;
        Ok(())
    }

    /// Moves to an absolute stream position, such as a sheet's BOF record
    pub(crate) fn goto(&mut self, pointer: usize) {
        self.pointer = pointer;
    }

    fn read_exact(&mut self, length: usize) -> Result<&[u8], SpreadsheetError> {
        let (lower, upper) = self.read_range(length);
        if upper - lower == length {
            Ok(&self.buffer[lower..upper])
        } else {
            Err(Biff8Error::NoEnoughDataError(length))?
        }
    }

    /// Reads up to `length` bytes of the current chunk
    fn read_range(&mut self, length: usize) -> (usize, usize) {
        if let Some((lower, upper)) = self.chunks.get(self.index).copied() {
            let source = upper.min(lower + self.offset);
            let target = upper.min(source + length);
            if source < upper {
                if target == upper {
                    self.index += 1;
                    self.offset = 0;
                } else {
                    self.offset += target - source;
                }
                return (source, target);
            }
        }
        (0, 0)
    }

    pub(crate) fn skip(&mut self, length: usize) -> Result<(), SpreadsheetError> {
        self.read_exact(length).map(|_| ())
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, SpreadsheetError> {
        self.read_exact(1).map(|data| data[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, SpreadsheetError> {
        self.read_exact(2).map(to_u16)
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, SpreadsheetError> {
        self.read_exact(4).map(to_u32)
    }

    pub(crate) fn read_usize(&mut self) -> Result<usize, SpreadsheetError> {
        self.read_exact(4).map(to_usize)
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64, SpreadsheetError> {
        self.read_exact(8).map(to_u64)
    }

    pub(crate) fn read_f64(&mut self) -> Result<f64, SpreadsheetError> {
        self.read_exact(8).map(to_f64)
    }

    /// Gets the 16-bit value `offset` bytes before the end of the current record
    pub(crate) fn get_u16_back(&self, offset: usize) -> Result<u16, SpreadsheetError> {
        let mut offset = offset;
        for (lower, upper) in self.chunks.iter().rev() {
            if lower + offset <= *upper {
                return self.get_u16_at(upper - offset);
            }
            offset -= upper - lower;
        }
        Err(Biff8Error::NoEnoughDataError(2))?
    }

    fn get_u16_at(&self, index: usize) -> Result<u16, SpreadsheetError> {
        match self.buffer.get(index..index + 2) {
            Some(bytes) => Ok(to_u16(bytes)),
            None => Err(Biff8Error::NoEnoughDataError(2))?,
        }
    }

    /// Reads an RK number, the compressed 30-bit form of integers and doubles
    pub(crate) fn read_rk_number(&mut self) -> Result<f64, SpreadsheetError> {
        let value = self.read_u32()?;
        let is_percentage = (value & 0x01) != 0;
        let is_integer = (value & 0x02) != 0;
        let number = if is_integer {
            ((value as i32) >> 2) as f64
        } else {
            f64::from_bits(((value & 0xFFFF_FFFC) as u64) << 32)
        };
        Ok(if is_percentage { number / 100.0 } else { number })
    }

    /// Reads a string with a one-byte character count
    pub(crate) fn read_short_xl_unicode_string(&mut self) -> Result<String, SpreadsheetError> {
        let mut string = String::new();
        let chars = self.read_u8()? as usize;
        self.read_string_into(chars, false, &mut string)?;
        Ok(string)
    }

    /// Reads a string with a two-byte character count
    pub(crate) fn read_xl_unicode_string(&mut self) -> Result<String, SpreadsheetError> {
        let mut string = String::new();
        let chars = self.read_u16()? as usize;
        self.read_string_into(chars, false, &mut string)?;
        Ok(string)
    }

    /// Reads a shared string table entry, which may be split over CONTINUE records
    pub(crate) fn read_xl_unicode_rich_extended_string(&mut self) -> Result<String, SpreadsheetError> {
        let mut string = String::new();
        let mut expected = self.read_u16()? as usize;
        let mut actual = self.read_string_into(expected, true, &mut string)?;
        while actual < expected {
            expected -= actual;
            // each continuation starts with its own compression flag
            actual = self.read_string_into(expected, false, &mut string)?;
        }
        Ok(string)
    }

    /// Appends up to `chars` characters and returns how many were read before the chunk ended
    fn read_string_into(&mut self, chars: usize, is_extended: bool, content: &mut String) -> Result<usize, SpreadsheetError> {
        let flag = self.read_u8()?;
        let is_high_byte = (flag & 0x1) > 0;
        let rich_run_count = if is_extended && (flag & 0x8) > 0 {
            self.read_u16()? as usize
        } else {
            0
        };
        let phonetic_size = if is_extended && (flag & 0x4) > 0 {
            self.read_usize()?
        } else {
            0
        };

        let expected = if is_high_byte { chars << 1 } else { chars };
        let (lower, upper) = self.read_range(expected);
        let bytes = &self.buffer[lower..upper];
        let encoding = if is_high_byte { UTF_16LE } else { self.encoding };
        let (string, _) = encoding.decode_without_bom_handling(bytes);
        content.push_str(&string);

        self.skip(4 * rich_run_count)?;
        self.skip(phonetic_size)?;
        let size = upper - lower;
        Ok(if is_high_byte { size >> 1 } else { size })
    }
}

#[macro_export]
#[doc(hidden)]
macro_rules! match_biff8_records {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(kind) = $reader.next()? {
            match kind {
                $($arms)*
                _ => (),
            }
        }
    };
}
