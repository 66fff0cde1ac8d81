use crate::error::ExcelTableError;
use crate::spreadsheet::source::Source;
use crate::spreadsheet::SheetSelector;
use crate::table::range::Selection;

/// Everything needed to extract one table.
///
/// Built with [`ExtractRequest::new`] and the chained setters, or filled from
/// directive-style option strings with [`Selection::parse`], [`SheetSelector::parse`],
/// [`HeaderSpec::parse`] and [`parse_widths`].
#[derive(Clone, Debug, Default)]
pub struct ExtractRequest {
    pub source: Option<Source>,
    pub sheet: SheetSelector,
    /// Start cell, named ("B2") or "column,row"; None starts at A1
    pub from: Option<String>,
    /// End cell; None extends to the last row and column holding data
    pub to: Option<String>,
    /// Rows whose absolute index is below this count are header rows
    pub header_rows: usize,
    /// Literal column names placed above the extracted rows
    pub header_names: Vec<String>,
    /// Column widths, used only when there is one per selected column
    pub widths: Vec<u32>,
}

impl ExtractRequest {
    pub fn new(source: impl Into<Source>) -> Self {
        ExtractRequest {
            source: Some(source.into()),
            ..ExtractRequest::default()
        }
    }

    pub fn sheet(mut self, sheet: impl Into<SheetSelector>) -> Self {
        self.sheet = sheet.into();
        self
    }

    pub fn selection(mut self, selection: impl Into<Selection>) -> Self {
        let selection = selection.into();
        self.from = selection.from;
        self.to = selection.to;
        self
    }

    pub fn from(mut self, from: &str) -> Self {
        self.from = Some(from.to_owned());
        self
    }

    pub fn to(mut self, to: &str) -> Self {
        self.to = Some(to.to_owned());
        self
    }

    pub fn header_rows(mut self, header_rows: usize) -> Self {
        self.header_rows = header_rows;
        self
    }

    /// Applies a parsed `header` option
    pub fn header(mut self, header: HeaderSpec) -> Self {
        match header {
            HeaderSpec::Rows(count) => {
                self.header_rows = count;
                self.header_names.clear();
            }
            HeaderSpec::Names(names) => {
                self.header_rows = 0;
                self.header_names = names;
            }
        }
        self
    }

    pub fn widths(mut self, widths: Vec<u32>) -> Self {
        self.widths = widths;
        self
    }
}

/// The `header` option: a number of header rows, or comma separated column names
#[derive(Clone, Debug, PartialEq)]
pub enum HeaderSpec {
    Rows(usize),
    Names(Vec<String>),
}

impl HeaderSpec {
    /// Digits give a row count, other text gives column names, empty text gives no header
    pub fn parse(text: &str) -> HeaderSpec {
        let text = text.trim();
        if text.is_empty() {
            HeaderSpec::Rows(0)
        } else if text.bytes().all(|it| it.is_ascii_digit()) {
            HeaderSpec::Rows(text.parse().unwrap_or(0))
        } else {
            HeaderSpec::Names(text.split(',').map(|name| name.trim().to_owned()).collect())
        }
    }
}

/// Header row count of a directive option; anything but digits means none
pub fn parse_header_rows(text: &str) -> usize {
    match HeaderSpec::parse(text) {
        HeaderSpec::Rows(count) => count,
        HeaderSpec::Names(_) => 0,
    }
}

/// Parses a comma separated width list such as "40,30,30"
pub fn parse_widths(text: &str) -> Result<Vec<u32>, ExcelTableError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    text.split(',')
        .map(|width| {
            width
                .trim()
                .parse::<u32>()
                .map_err(|e| ExcelTableError::invalid_option("widths", format!("'{}' {}", width.trim(), e)))
        })
        .collect()
}
