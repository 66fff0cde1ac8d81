//! # Tables
//!
//! The document-side view of an extracted range: rows of owned, styled
//! cells split into header and body rows, plus the range they came from.
pub mod extractor;
pub mod range;
pub mod request;

use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::cell::Rgb;
use crate::spreadsheet::reference::CellAddress;
use serde::Serialize;

/// Width given to columns without an explicit width
pub const DEFAULT_WIDTH: u32 = 20;

/// Whether a cell belongs to a header row or to the body
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CellRole {
    Header,
    #[default]
    Body,
}

/// One cell of an extracted table
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TableCell {
    pub value: CellValue,
    pub width: u32,
    pub role: CellRole,
    pub bold: bool,
    pub italic: bool,
    pub background: Option<Rgb>,
}

impl TableCell {
    /// A plain body cell of default width
    pub fn new(value: CellValue) -> Self {
        TableCell {
            value,
            width: DEFAULT_WIDTH,
            role: CellRole::Body,
            bold: false,
            italic: false,
            background: None,
        }
    }

    /// Display text of the value
    pub fn text(&self) -> String {
        self.value.to_string()
    }
}

/// The endpoints a table was actually extracted from, after defaults were applied
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResolvedRange {
    pub from: CellAddress,
    /// None only when an open-ended range found no data
    pub to: Option<CellAddress>,
}

/// An extracted table. All rows of both parts have the same length.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Table {
    pub headers: Vec<Vec<TableCell>>,
    pub rows: Vec<Vec<TableCell>>,
    pub range: ResolvedRange,
}

impl Table {
    /// True when the range selected nothing
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.rows.is_empty()
    }

    pub fn column_count(&self) -> usize {
        self.headers
            .first()
            .or_else(|| self.rows.first())
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Header rows followed by body rows
    pub fn all_rows(&self) -> impl Iterator<Item = &Vec<TableCell>> {
        self.headers.iter().chain(self.rows.iter())
    }

    /// Column widths as whole percentages of the first body row's total width.
    /// Tables without body rows use the first header row; a zero total
    /// falls back to equal widths.
    pub fn relative_widths(&self) -> Vec<u32> {
        let Some(first) = self.rows.first().or_else(|| self.headers.first()) else {
            return Vec::new();
        };
        let total: u64 = first.iter().map(|cell| u64::from(cell.width)).sum();
        if total == 0 {
            let count = first.len() as u32;
            return vec![100 / count.max(1); first.len()];
        }
        first
            .iter()
            .map(|cell| (u64::from(cell.width) * 100 / total) as u32)
            .collect()
    }

    /// Puts a row of literal column names on top of the header rows
    pub fn prepend_header_names(&mut self, names: &[String]) {
        let row = names
            .iter()
            .map(|name| TableCell {
                role: CellRole::Header,
                bold: true,
                ..TableCell::new(CellValue::from(name.trim()))
            })
            .collect();
        self.headers.insert(0, row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(widths: &[u32]) -> Vec<TableCell> {
        widths
            .iter()
            .map(|width| TableCell {
                width: *width,
                ..TableCell::new(CellValue::Empty)
            })
            .collect()
    }

    fn table_of(headers: Vec<Vec<TableCell>>, rows: Vec<Vec<TableCell>>) -> Table {
        Table {
            headers,
            rows,
            range: ResolvedRange {
                from: CellAddress::default(),
                to: None,
            },
        }
    }

    #[test]
    fn relative_widths_from_first_body_row() {
        let table = table_of(vec![row(&[1, 1, 1])], vec![row(&[40, 30, 30]), row(&[1, 2, 3])]);
        assert_eq!(table.relative_widths(), vec![40, 30, 30]);

        let table = table_of(Vec::new(), vec![row(&[20, 20, 20])]);
        assert_eq!(table.relative_widths(), vec![33, 33, 33]);
    }

    #[test]
    fn relative_widths_fallbacks() {
        assert_eq!(table_of(vec![row(&[10, 30])], Vec::new()).relative_widths(), vec![25, 75]);
        assert_eq!(table_of(Vec::new(), vec![row(&[0, 0, 0, 0])]).relative_widths(), vec![25, 25, 25, 25]);
        assert!(table_of(Vec::new(), Vec::new()).relative_widths().is_empty());
    }

    #[test]
    fn shape() {
        let table = table_of(vec![row(&[20, 20])], vec![row(&[20, 20])]);
        assert!(!table.is_empty());
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.all_rows().count(), 2);
    }

    #[test]
    fn header_names_are_bold_headers() {
        let mut table = table_of(Vec::new(), vec![row(&[20, 20])]);
        table.prepend_header_names(&[" Name".to_owned(), "Year ".to_owned()]);
        assert_eq!(table.headers.len(), 1);
        let names: Vec<String> = table.headers[0].iter().map(TableCell::text).collect();
        assert_eq!(names, vec!["Name", "Year"]);
        assert!(table.headers[0].iter().all(|cell| cell.bold && cell.role == CellRole::Header));
    }

    #[test]
    fn serializes_for_renderers() {
        let cell = TableCell {
            background: Some(Rgb(255, 0, 16)),
            ..TableCell::new(CellValue::from("x"))
        };
        let json = serde_json::to_value(&cell).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "value": "x",
                "width": 20,
                "role": "body",
                "bold": false,
                "italic": false,
                "background": [255, 0, 16]
            })
        );
    }
}
