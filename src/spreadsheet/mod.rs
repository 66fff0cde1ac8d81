//! # Spreadsheet Access
//!
//! Reads cell grids out of workbook documents. Office Open XML workbooks
//! (`.xlsx`, `.xlsm`, `.xltx`, `.xltm`, `.xlam`) and OpenDocument spreadsheets
//! (`.ods`) are parsed in a streaming fashion with `zip` + `quick-xml`, binary
//! workbooks (`.xlsb`) record by record, and Excel 97-2003 workbooks (`.xls`)
//! from their compound file. The [`GridLoader`] trait is the seam the table
//! extractor depends on.
pub mod cell;
pub(crate) mod excel;
pub mod grid;
pub mod memory;
pub(crate) mod ods;
pub mod reference;
pub mod source;
pub(crate) mod xls;
pub(crate) mod xlsb;
pub(crate) mod xlsx;

use crate::error::ResultMessage;
use crate::helpers::reader::Container;
use crate::helpers::reader::SourceReader;
use crate::helpers::zip::ZipHelper;
use crate::spreadsheet::grid::Grid;
use crate::spreadsheet::grid::GridRequest;
use crate::spreadsheet::ods::OdsSpreadsheet;
use crate::spreadsheet::source::Source;
use crate::spreadsheet::xls::XlsSpreadsheet;
use crate::spreadsheet::xlsb::XlsbSpreadsheet;
use crate::spreadsheet::xlsx::XlsxSpreadsheet;
use glob::Pattern;
use log::debug;
use std::fmt::Display;
use std::io::Seek;
use std::io::SeekFrom;
use thiserror::Error;
use zip::ZipArchive;

/// Errors raised while locating, opening or parsing a workbook
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("{0}")]
    WithContextError(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    StringEncodingError(#[from] std::str::Utf8Error),

    #[error("{0}")]
    PatternError(#[from] glob::PatternError),

    // Third-party library errors
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    #[error("{0}")]
    HttpError(#[from] reqwest::Error),

    // Helper module errors
    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    #[error("{0}")]
    CfbError(#[from] crate::helpers::cfb::CfbError),

    #[error("{0}")]
    Biff8Error(#[from] crate::helpers::biff8::Biff8Error),

    #[error("{0}")]
    Biff12Error(#[from] crate::helpers::biff12::Biff12Error),

    // Workbook errors
    #[error("Unsupported source '{0}', only local files, file:// and http(s):// URLs can be read")]
    SourceError(String),

    #[error("Remote file '{0}' returned no data")]
    RemoteFileNoDataError(String),

    #[error("Cannot detect file format for '{0}'")]
    FileFormatError(String),

    #[error("Missing part '{0}' in workbook")]
    FileError(String),

    #[error("Invalid ODS MIME type in '{0}'")]
    MimeTypeError(String),

    #[error("Spreadsheet '{0}' is password protected")]
    SpreadsheetPasswordProtectedError(String),

    #[error("Spreadsheet '{0}' contains no sheets")]
    SpreadsheetEmptyError(String),

    #[error("Sheet '{1}' not found in '{0}'")]
    SheetNotFoundError(String, String),
}

/// Which sheet of a workbook to read
#[derive(Clone, Debug, PartialEq)]
pub enum SheetSelector {
    /// Zero-based position in workbook order
    Index(usize),
    /// Sheet name, matched exactly first and then as a glob pattern
    Name(String),
}

impl Default for SheetSelector {
    fn default() -> Self {
        SheetSelector::Index(0)
    }
}

impl SheetSelector {
    /// Digit-only text selects by position, anything else by name
    pub fn parse(text: &str) -> SheetSelector {
        let text = text.trim();
        match text.parse::<usize>() {
            Ok(index) if text.bytes().all(|it| it.is_ascii_digit()) => SheetSelector::Index(index),
            _ => SheetSelector::Name(text.to_owned()),
        }
    }
}

impl From<usize> for SheetSelector {
    fn from(index: usize) -> Self {
        SheetSelector::Index(index)
    }
}

impl From<&str> for SheetSelector {
    fn from(text: &str) -> Self {
        SheetSelector::parse(text)
    }
}

impl Display for SheetSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SheetSelector::Index(index) => write!(f, "#{index}"),
            SheetSelector::Name(name) => write!(f, "{name}"),
        }
    }
}

/// An opened workbook
pub trait Spreadsheet {
    /// Name of the workbook, used in messages
    fn name(&self) -> String;

    /// Sheet names in workbook order
    fn sheet_names(&self) -> Vec<String>;

    /// Reads one sheet, restricted by the hints of the request
    fn read_grid(&mut self, sheet_index: usize, request: &GridRequest) -> Result<Grid, SpreadsheetError>;

    /// Finds the position of the selected sheet
    fn resolve_sheet(&self, selector: &SheetSelector) -> Result<usize, SpreadsheetError> {
        let names = self.sheet_names();
        let not_found = || SpreadsheetError::SheetNotFoundError(self.name(), selector.to_string());
        match selector {
            SheetSelector::Index(index) if *index < names.len() => Ok(*index),
            SheetSelector::Index(_) => Err(not_found()),
            SheetSelector::Name(name) => {
                if let Some(index) = names.iter().position(|it| it == name) {
                    return Ok(index);
                }
                let pattern = Pattern::new(name)?;
                names.iter().position(|it| pattern.matches(it)).ok_or_else(not_found)
            }
        }
    }
}

/// Produces the cell grid of one sheet of a source
pub trait GridLoader {
    fn load(&self, source: &Source, request: &GridRequest) -> Result<Grid, SpreadsheetError>;
}

/// Loads grids from workbook files on disk or in memory
#[derive(Copy, Clone, Debug, Default)]
pub struct WorkbookLoader;

impl GridLoader for WorkbookLoader {
    fn load(&self, source: &Source, request: &GridRequest) -> Result<Grid, SpreadsheetError> {
        let mut spreadsheet = open_spreadsheet(source)?;
        let sheet_index = spreadsheet.resolve_sheet(&request.sheet)?;
        debug!(
            "Reading sheet {} of '{}' (columns: {:?}, skip rows: {:?})",
            sheet_index,
            spreadsheet.name(),
            request.columns,
            request.skip_rows
        );
        spreadsheet.read_grid(sheet_index, request)
    }
}

/// Workbook formats that can be read
#[derive(Copy, Clone, Debug, PartialEq)]
enum Format {
    Xlsx,
    Xlsb,
    Xls,
    Ods,
}

impl Format {
    fn from_extension(extension: &str) -> Option<Format> {
        match extension {
            "xlsx" | "xlsm" | "xltx" | "xltm" | "xlam" => Some(Format::Xlsx),
            "xlsb" => Some(Format::Xlsb),
            "xls" | "xla" => Some(Format::Xls),
            "ods" => Some(Format::Ods),
            _ => None,
        }
    }

    fn container(self) -> Container {
        match self {
            Format::Xls => Container::CompoundFile,
            Format::Xlsx | Format::Xlsb | Format::Ods => Container::Zip,
        }
    }
}

/// Opens a workbook, detecting its format from the file extension or, when
/// that is missing or does not match the container, from the content.
pub fn open_spreadsheet(source: &Source) -> Result<Box<dyn Spreadsheet>, SpreadsheetError> {
    let name = source.name();
    let mut reader = SourceReader::open(source).with_prefix(&name)?;
    let container = reader.container()?;
    let format = match source.extension().as_deref().and_then(Format::from_extension) {
        Some(format) if format.container() == container => format,
        _ => detect_format(&name, &mut reader, container)?,
    };
    debug!("Opening '{}' as {:?} ({:?} container)", name, format, container);

    let spreadsheet: Box<dyn Spreadsheet> = match format {
        // Password protected OOXML packages are compound files as well
        Format::Xls => Box::new(XlsSpreadsheet::open(name, reader)?),
        Format::Xlsx => Box::new(XlsxSpreadsheet::open(name, ZipArchive::new(reader)?)?),
        Format::Xlsb => Box::new(XlsbSpreadsheet::open(name, ZipArchive::new(reader)?)?),
        Format::Ods => Box::new(OdsSpreadsheet::open(name, ZipArchive::new(reader)?)?),
    };
    Ok(spreadsheet)
}

/// Sniffs the format of a source from its content
fn detect_format(name: &str, reader: &mut SourceReader, container: Container) -> Result<Format, SpreadsheetError> {
    let format = match container {
        Container::Zip => {
            let zip = ZipArchive::new(&mut *reader)?;
            if zip.contains("xl/workbook.xml") {
                Format::Xlsx
            } else if zip.contains("xl/workbook.bin") {
                Format::Xlsb
            } else if zip.contains("content.xml") {
                Format::Ods
            } else {
                Err(SpreadsheetError::FileFormatError(name.to_owned()))?
            }
        }
        Container::CompoundFile => Format::Xls,
        Container::Unknown => Err(SpreadsheetError::FileFormatError(name.to_owned()))?,
    };
    reader.seek(SeekFrom::Start(0))?;
    Ok(format)
}
