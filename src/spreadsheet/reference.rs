//! Conversions between spreadsheet cell references ("B2", "AA10") and
//! zero-based `(column, row)` indices.
use regex::Regex;
use serde::Serialize;
use std::fmt::Display;
use std::sync::LazyLock;
use thiserror::Error;

/// Letters used for column names, most significant digit first
const ALPHABET: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

static NAMED_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z]+)([1-9][0-9]*)$").expect("Hardcode regex pattern"));

static LOOSE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(-?\d+)\s*,\s*(-?\d+)\s*$").expect("Hardcode regex pattern"));

/// Errors raised while reading a cell address typed by the user
#[derive(Error, Debug, PartialEq)]
pub enum ReferenceError {
    #[error("Invalid cell address '{0}'")]
    InvalidAddress(String),
}

/// Zero-based position of a cell
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct CellAddress {
    pub column: usize,
    pub row: usize,
}

impl CellAddress {
    pub const fn new(column: usize, row: usize) -> Self {
        CellAddress { column, row }
    }
}

impl From<(usize, usize)> for CellAddress {
    /// Builds an address from a `(column, row)` pair
    fn from((column, row): (usize, usize)) -> Self {
        CellAddress { column, row }
    }
}

impl Display for CellAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", format_named(self.column, self.row))
    }
}

/// One endpoint of a selection as typed by the user
#[derive(Clone, Debug, PartialEq)]
pub enum AddressSpec {
    /// Spreadsheet notation such as "B10"
    Named(CellAddress),
    /// Two comma separated integers, column first: "1,9"
    LoosePair(i64, i64),
    /// Neither notation matched
    Invalid(String),
}

impl AddressSpec {
    /// Classifies the text, trying the named notation before the loose pair
    pub fn parse(text: &str) -> AddressSpec {
        let text = text.trim();
        if let Ok(address) = parse_named(text) {
            AddressSpec::Named(address)
        } else if let Ok((column, row)) = parse_loose(text) {
            AddressSpec::LoosePair(column, row)
        } else {
            AddressSpec::Invalid(text.to_owned())
        }
    }

    /// Turns the endpoint into a concrete address.
    /// Loose pairs with negative components cannot address a cell.
    pub fn resolve(self) -> Result<CellAddress, ReferenceError> {
        match self {
            AddressSpec::Named(address) => Ok(address),
            AddressSpec::LoosePair(column, row) => usize::try_from(column)
                .ok()
                .zip(usize::try_from(row).ok())
                .map(CellAddress::from)
                .ok_or_else(|| ReferenceError::InvalidAddress(format!("{column},{row}"))),
            AddressSpec::Invalid(text) => Err(ReferenceError::InvalidAddress(text)),
        }
    }
}

/// Parses a named address such as "AA10" into `(26, 9)`.
pub fn parse_named(text: &str) -> Result<CellAddress, ReferenceError> {
    let captures = NAMED_PATTERN
        .captures(text)
        .ok_or_else(|| ReferenceError::InvalidAddress(text.to_owned()))?;
    let column = captures.get(1).and_then(|letters| col_to_index(letters.as_str()));
    let row = captures.get(2).and_then(|number| row_to_index(number.as_str()));
    column
        .zip(row)
        .map(CellAddress::from)
        .ok_or_else(|| ReferenceError::InvalidAddress(text.to_owned()))
}

/// Formats zero-based indices as a named address, `(27, 0)` becomes "AB1".
pub fn format_named(column: usize, row: usize) -> String {
    let mut name = index_to_col(column);
    name.push_str(&(row as u128 + 1).to_string());
    name
}

/// Parses the "column,row" fallback notation without any bounds checks.
pub fn parse_loose(text: &str) -> Result<(i64, i64), ReferenceError> {
    let invalid = || ReferenceError::InvalidAddress(text.to_owned());
    let captures = LOOSE_PATTERN.captures(text).ok_or_else(invalid)?;
    let column = captures[1].parse::<i64>().map_err(|_| invalid())?;
    let row = captures[2].parse::<i64>().map_err(|_| invalid())?;
    Ok((column, row))
}

/// Decodes column letters (case-insensitive) to a zero-based index.
/// Returns None for empty input, non-letters or indices that overflow.
pub(crate) fn col_to_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let column = letters.bytes().try_fold(0u128, |index, letter| {
        let digit = ALPHABET.iter().position(|it| *it == letter.to_ascii_uppercase())?;
        index.checked_mul(26)?.checked_add(digit as u128 + 1)
    })?;
    usize::try_from(column - 1).ok()
}

/// Decodes a 1-based row number to a zero-based index
pub(crate) fn row_to_index(number: &str) -> Option<usize> {
    let row = number.parse::<u128>().ok()?.checked_sub(1)?;
    usize::try_from(row).ok()
}

/// Encodes a zero-based column index as letters: 0 is "A", 26 is "AA"
pub(crate) fn index_to_col(col: usize) -> String {
    let mut column = col;
    let mut letters = Vec::new();
    loop {
        letters.push(ALPHABET[column % 26]);
        match (column / 26).checked_sub(1) {
            Some(next) => column = next,
            None => break,
        }
    }
    letters.iter().rev().map(|letter| char::from(*letter)).collect()
}

/// Splits a workbook cell reference like "C7" (or "$C$7") into zero-based `(row, col)`
pub(crate) fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let reference = reference.replace('$', "");
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let col = col_to_index(&reference[..split])?;
    let row = row_to_index(&reference[split..])?;
    Some((row, col))
}
