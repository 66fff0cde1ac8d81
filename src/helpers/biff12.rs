//! Binary Interchange File Format 12 (BIFF12)
//! Record reader for the parts of Excel 2007+ binary workbooks (.xlsb)

use crate::helpers::bytes::decode_utf16;
use crate::helpers::bytes::f64_at;
use crate::helpers::bytes::u16_at;
use crate::helpers::bytes::u32_at;
use crate::helpers::bytes::usize_at;
use crate::spreadsheet::SpreadsheetError;
use std::io::BufRead;
use std::io::ErrorKind;
use thiserror::Error;

/// Errors specific to BIFF12 record parsing
#[derive(Error, Debug)]
pub enum Biff12Error {
    #[error("No enough data: expect '{0}' bytes, actual '{1}' bytes")]
    NoEnoughData(usize, usize),
}

/// Reader over the records of one part. Each record is a variable-length
/// type and size followed by its body, which is kept in `buffer`.
pub(crate) struct Biff12Reader<R: BufRead> {
    reader: R,
    pub(crate) buffer: Vec<u8>,
}

impl<R: BufRead> Biff12Reader<R> {
    pub(crate) fn new(reader: R) -> Biff12Reader<R> {
        Biff12Reader {
            reader,
            buffer: Vec::with_capacity(1024),
        }
    }

    fn missing(&self, at: usize, length: usize) -> Biff12Error {
        Biff12Error::NoEnoughData(at.saturating_add(length), self.buffer.len())
    }

    pub(crate) fn get_u8(&self, at: usize) -> Result<u8, SpreadsheetError> {
        Ok(*self.buffer.get(at).ok_or_else(|| self.missing(at, 1))?)
    }

    pub(crate) fn get_u16(&self, at: usize) -> Result<u16, SpreadsheetError> {
        Ok(u16_at(&self.buffer, at).ok_or_else(|| self.missing(at, 2))?)
    }

    pub(crate) fn get_u32(&self, at: usize) -> Result<u32, SpreadsheetError> {
        Ok(u32_at(&self.buffer, at).ok_or_else(|| self.missing(at, 4))?)
    }

    pub(crate) fn get_usize(&self, at: usize) -> Result<usize, SpreadsheetError> {
        Ok(usize_at(&self.buffer, at).ok_or_else(|| self.missing(at, 4))?)
    }

    pub(crate) fn get_f64(&self, at: usize) -> Result<f64, SpreadsheetError> {
        Ok(f64_at(&self.buffer, at).ok_or_else(|| self.missing(at, 8))?)
    }

    /// Reads a 24-bit style index
    pub(crate) fn get_style(&self, at: usize) -> Result<usize, SpreadsheetError> {
        let bytes = self.buffer.get(at..at + 3).ok_or_else(|| self.missing(at, 3))?;
        Ok(usize::from(bytes[0]) | usize::from(bytes[1]) << 8 | usize::from(bytes[2]) << 16)
    }

    /// Reads a length-prefixed UTF-16 string and the position after it.
    /// A length of 0xFFFFFFFF marks a null string.
    pub(crate) fn get_str_and_bound(&self, at: usize) -> Result<(String, usize), SpreadsheetError> {
        let size = self.get_u32(at)?;
        let lower_bound = at + 4;
        if size == u32::MAX {
            return Ok((String::new(), lower_bound));
        }
        let upper_bound = (size as usize)
            .checked_mul(2)
            .and_then(|length| length.checked_add(lower_bound))
            .filter(|upper_bound| *upper_bound <= self.buffer.len())
            .ok_or_else(|| self.missing(lower_bound, (size as usize).saturating_mul(2)))?;
        Ok((decode_utf16(&self.buffer[lower_bound..upper_bound]), upper_bound))
    }

    pub(crate) fn get_str(&self, at: usize) -> Result<String, SpreadsheetError> {
        self.get_str_and_bound(at).map(|(string, _)| string)
    }

    /// Reads an integer stored 7 bits per byte, high bit set while more bytes follow.
    /// None at a clean end of the part.
    fn read_7bit_continuation_integer(&mut self, limit: usize) -> Result<Option<usize>, SpreadsheetError> {
        let mut integer = 0usize;
        let mut byte = [0u8; 1];
        for index in 0..limit {
            match self.reader.read_exact(&mut byte) {
                Ok(()) => (),
                Err(error) if index == 0 && error.kind() == ErrorKind::UnexpectedEof => return Ok(None),
                Err(error) => Err(error)?,
            }
            integer |= usize::from(byte[0] & 0x7F) << (7 * index);
            if byte[0] & 0x80 == 0 {
                break;
            }
        }
        Ok(Some(integer))
    }

    /// Reads the next record into the buffer, returning its type.
    /// None at the end of the part.
    pub(crate) fn next(&mut self) -> Result<Option<u16>, SpreadsheetError> {
        let Some(kind) = self.read_7bit_continuation_integer(2)? else {
            return Ok(None);
        };
        let size = self.read_7bit_continuation_integer(4)?
            .ok_or(Biff12Error::NoEnoughData(1, 0))?;
        self.buffer.resize(size, 0);
        self.reader.read_exact(&mut self.buffer)?;
        Ok(Some(kind as u16))
    }

    /// Moves to the next record of the target type, skipping whole blocks
    /// that open with one of the `skips` begin records up to their end record.
    /// False when the part ends first.
    pub(crate) fn find_with(&mut self, target: u16, skips: &[(u16, u16)]) -> Result<bool, SpreadsheetError> {
        let mut expected = target;
        while let Some(actual) = self.next()? {
            if actual == expected && expected == target {
                return Ok(true);
            } else if actual == expected {
                expected = target;
            } else if expected == target {
                if let Some((_, ending)) = skips.iter().find(|(beginning, _)| actual == *beginning) {
                    expected = *ending;
                }
            }
        }
        Ok(false)
    }

    pub(crate) fn find(&mut self, target: u16) -> Result<bool, SpreadsheetError> {
        self.find_with(target, &[])
    }
}
