//! # Spreadsheet Range Tables
//!
//! Extracts a rectangular cell range from an Excel or OpenDocument workbook
//! and turns it into a table of styled cells, ready to be rendered by a
//! document generator.
//!
//! ## Features
//!
//! - **Multi-format support**: Office Open XML workbooks (`.xlsx`, `.xlsm`, `.xltx`, `.xltm`, `.xlam`),
//!   binary workbooks (`.xlsb`), Excel 97-2003 workbooks (`.xls`) and OpenDocument spreadsheets (`.ods`),
//!   read from disk, from memory or from an `http(s)://` URL
//! - **Flexible addresses**: Named cells ("B10") or zero-based "column,row" pairs, with either
//!   end of the range left open
//! - **Header handling**: Leading sheet rows become header rows, or literal column names are put on top
//! - **Cell styles**: Bold, italic and solid background colours are carried into the table
//! - **Column widths**: Explicit widths per column with a uniform fallback
//!
//! ## Example
//!
//! ```no_run
//! use exceltable::ExtractRequest;
//!
//! let request = ExtractRequest::new("cartoons.xlsx")
//!     .sheet("big")
//!     .selection("A1:C4")
//!     .header_rows(1);
//! let table = exceltable::extract(&request)?;
//! for row in table.all_rows() {
//!     let texts: Vec<String> = row.iter().map(|cell| cell.text()).collect();
//!     println!("{}", texts.join(" | "));
//! }
//! # Ok::<(), exceltable::ExcelTableError>(())
//! ```
mod helpers;

pub mod error;
pub mod spreadsheet;
pub mod table;

pub use crate::error::ExcelTableError;
pub use crate::spreadsheet::grid::Grid;
pub use crate::spreadsheet::grid::GridRequest;
pub use crate::spreadsheet::reference::format_named;
pub use crate::spreadsheet::reference::parse_loose;
pub use crate::spreadsheet::reference::parse_named;
pub use crate::spreadsheet::reference::CellAddress;
pub use crate::spreadsheet::source::Source;
pub use crate::spreadsheet::GridLoader;
pub use crate::spreadsheet::SheetSelector;
pub use crate::spreadsheet::WorkbookLoader;
pub use crate::table::extractor::RangeExtractor;
pub use crate::table::request::ExtractRequest;
pub use crate::table::CellRole;
pub use crate::table::Table;
pub use crate::table::TableCell;

/// Extracts a table from a workbook file with the default loader
pub fn extract(request: &ExtractRequest) -> Result<Table, ExcelTableError> {
    RangeExtractor::workbook().extract(request)
}
