//! Binary Interchange File Format 8 (BIFF8)
//! Record reader for the workbook stream of Excel 97-2003 files

use crate::helpers::bytes::decode_latin1;
use crate::helpers::bytes::decode_utf16;
use crate::helpers::bytes::u16_at;
use crate::spreadsheet::SpreadsheetError;
use thiserror::Error;

const CONTINUE: u16 = 60;

/// Errors specific to BIFF8 record parsing
#[derive(Error, Debug)]
pub enum Biff8Error {
    #[error("Fewer than {0} bytes remaining in record")]
    NoEnoughDataError(usize),
}

/// Reader over the records of a workbook stream. A record and the
/// `CONTINUE` records following it are read as one logical record.
pub(crate) struct Biff8Reader {
    buffer: Vec<u8>,
    /// Position of the next record header
    pointer: usize,
    /// Current record chunks as (start, end) positions
    chunks: Vec<(usize, usize)>,
    index: usize,
    offset: usize,
}

impl Biff8Reader {
    pub(crate) fn new(buffer: Vec<u8>) -> Biff8Reader {
        Biff8Reader {
            buffer,
            pointer: 0,
            chunks: Vec::new(),
            index: 0,
            offset: 0,
        }
    }

    /// Moves to the next record and returns its type, None at the end of the stream
    pub(crate) fn next(&mut self) -> Result<Option<u16>, SpreadsheetError> {
        let Some((kind, lower, upper)) = self.header_at(self.pointer) else {
            return Ok(None);
        };
        self.index = 0;
        self.offset = 0;
        self.chunks.clear();
        self.chunks.push((lower, upper));
        self.pointer = upper;
        while let Some((CONTINUE, lower, upper)) = self.header_at(self.pointer) {
            self.chunks.push((lower, upper));
            self.pointer = upper;
        }
        Ok(Some(kind))
    }

    /// Record type and body bounds at a position, None past the last whole record
    fn header_at(&self, pointer: usize) -> Option<(u16, usize, usize)> {
        let kind = u16_at(&self.buffer, pointer)?;
        let size = usize::from(u16_at(&self.buffer, pointer + 2)?);
        let lower = pointer + 4;
        let upper = lower + size;
        (upper <= self.buffer.len()).then_some((kind, lower, upper))
    }

    /// Positions the reader on the record header at an absolute stream offset
    pub(crate) fn goto(&mut self, pointer: usize) {
        self.pointer = pointer;
        self.chunks.clear();
    }

    /// Reads up to `length` bytes without crossing into the next chunk
    fn read(&mut self, length: usize) -> &[u8] {
        let Some((lower, upper)) = self.chunks.get(self.index).copied() else {
            return &[];
        };
        let source = upper.min(lower + self.offset);
        let target = upper.min(source + length);
        if target == upper {
            self.index += 1;
            self.offset = 0;
        } else {
            self.offset += target - source;
        }
        &self.buffer[source..target]
    }

    /// Reads exactly N bytes, crossing chunk boundaries when needed
    fn take<const N: usize>(&mut self) -> Result<[u8; N], SpreadsheetError> {
        let mut bytes = [0u8; N];
        let mut length = 0;
        while length < N {
            if self.index >= self.chunks.len() {
                Err(Biff8Error::NoEnoughDataError(N))?
            }
            let data = self.read(N - length);
            bytes[length..length + data.len()].copy_from_slice(data);
            length += data.len();
        }
        Ok(bytes)
    }

    pub(crate) fn skip(&mut self, length: usize) -> Result<(), SpreadsheetError> {
        let mut remaining = length;
        while remaining > 0 {
            if self.index >= self.chunks.len() {
                Err(Biff8Error::NoEnoughDataError(length))?
            }
            remaining -= self.read(remaining).len();
        }
        Ok(())
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, SpreadsheetError> {
        self.take::<1>().map(|bytes| bytes[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, SpreadsheetError> {
        self.take().map(u16::from_le_bytes)
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, SpreadsheetError> {
        self.take().map(u32::from_le_bytes)
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64, SpreadsheetError> {
        self.take().map(u64::from_le_bytes)
    }

    pub(crate) fn read_f64(&mut self) -> Result<f64, SpreadsheetError> {
        self.take().map(f64::from_le_bytes)
    }

    /// Gets the 16-bit value `offset` bytes before the end of the record
    pub(crate) fn get_u16_back(&self, offset: usize) -> Result<u16, SpreadsheetError> {
        let mut offset = offset;
        for (lower, upper) in self.chunks.iter().rev() {
            if *lower + offset <= *upper {
                return Ok(u16_at(&self.buffer, *upper - offset).ok_or(Biff8Error::NoEnoughDataError(2))?);
            }
            offset -= *upper - *lower;
        }
        Err(Biff8Error::NoEnoughDataError(2))?
    }

    /// Reads an RK number
    pub(crate) fn read_rk_number(&mut self) -> Result<f64, SpreadsheetError> {
        self.read_u32().map(decode_rk)
    }

    /// Reads a string with an 8-bit character count
    pub(crate) fn read_short_xl_unicode_string(&mut self) -> Result<String, SpreadsheetError> {
        let chars = usize::from(self.read_u8()?);
        self.read_string(chars, false)
    }

    /// Reads a string with a 16-bit character count
    pub(crate) fn read_xl_unicode_string(&mut self) -> Result<String, SpreadsheetError> {
        let chars = usize::from(self.read_u16()?);
        self.read_string(chars, false)
    }

    /// Reads a shared string table entry, dropping its formatting runs and phonetic data
    pub(crate) fn read_xl_unicode_rich_extended_string(&mut self) -> Result<String, SpreadsheetError> {
        let chars = usize::from(self.read_u16()?);
        self.read_string(chars, true)
    }

    fn read_string(&mut self, chars: usize, is_extended: bool) -> Result<String, SpreadsheetError> {
        let flag = self.read_u8()?;
        let runs = if is_extended && flag & 0x08 != 0 {
            usize::from(self.read_u16()?)
        } else {
            0
        };
        let phonetic_size = if is_extended && flag & 0x04 != 0 {
            self.read_u32()? as usize
        } else {
            0
        };

        let mut string = String::new();
        let mut is_high_byte = flag & 0x01 != 0;
        let mut remaining = chars;
        loop {
            let unit = if is_high_byte { 2 } else { 1 };
            let bytes = self.read(remaining * unit);
            if is_high_byte {
                string.push_str(&decode_utf16(bytes));
            } else {
                string.push_str(&decode_latin1(bytes));
            }
            remaining -= bytes.len() / unit;
            if remaining == 0 {
                break;
            }
            // Characters continued in the next chunk carry their own width flag
            is_high_byte = self.read_u8()? & 0x01 != 0;
        }

        self.skip(4 * runs + phonetic_size)?;
        Ok(string)
    }
}

/// Decodes an RK number: a 30-bit integer or the high bits of a double,
/// optionally divided by 100
pub(crate) fn decode_rk(rk: u32) -> f64 {
    let mut value = if rk & 0x02 != 0 {
        f64::from((rk as i32) >> 2)
    } else {
        f64::from_bits(u64::from(rk & 0xFFFF_FFFC) << 32)
    };
    if rk & 0x01 != 0 {
        value /= 100.0;
    }
    value
}

#[macro_export]
macro_rules! match_biff8_record {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(kind) = $reader.next()? {
            match kind {
                $($arms)*
                _ => (),
            }
        }
    };
}
