use crate::error::ResultMessage;
use crate::helpers::biff8::Biff8Reader;
use crate::helpers::cfb::Cfb;
use crate::helpers::reader::SourceReader;
use crate::match_biff8_record;
use crate::spreadsheet::cell::error_text;
use crate::spreadsheet::cell::CellStyle;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::cell::NumberKind;
use crate::spreadsheet::cell::Rgb;
use crate::spreadsheet::excel::number_kind;
use crate::spreadsheet::excel::CellFormat;
use crate::spreadsheet::excel::Font;
use crate::spreadsheet::excel::DEFAULT_PALETTE;
use crate::spreadsheet::grid::Grid;
use crate::spreadsheet::grid::GridBuilder;
use crate::spreadsheet::grid::GridCell;
use crate::spreadsheet::grid::GridRequest;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use log::debug;
use std::collections::HashMap;

// BIFF8 record types
const FORMULA: u16 = 6;        // Formula cell with its cached result
const EOF: u16 = 10;           // End of a substream
const DATE1904: u16 = 34;      // Date system flag (1904 vs 1900 base)
const FILE_PASS: u16 = 47;     // Workbook is encrypted
const FONT: u16 = 49;          // Font table entry
const BOUND_SHEET8: u16 = 133; // Sheet name, type and substream position
const PALETTE: u16 = 146;      // Custom colors of the indexed palette
const MUL_RK: u16 = 189;       // Run of RK number cells in one row
const MUL_BLANK: u16 = 190;    // Run of blank styled cells in one row
const XF: u16 = 224;           // Extended format of cells and styles
const SST: u16 = 252;          // Shared string table
const LABEL_SST: u16 = 253;    // Cell holding a shared string index
const BLANK: u16 = 513;        // Blank styled cell
const NUMBER: u16 = 515;       // Floating point cell
const LABEL: u16 = 516;        // Cell holding its own string
const BOOL_ERR: u16 = 517;     // Boolean or error cell
const STRING: u16 = 519;       // String result of the preceding formula
const RK: u16 = 638;           // Compressed number cell
const FORMAT: u16 = 1054;      // Custom number format
const BOF: u16 = 2057;         // Start of a substream

/// Sheet type of ordinary worksheets in BOUND_SHEET8
const WORKSHEET: u8 = 0;

/// An Excel 97-2003 workbook, with the whole workbook stream held in memory
pub(crate) struct XlsSpreadsheet {
    name: String,
    reader: Biff8Reader,
    shared_strings: Vec<String>,
    /// Cell formats indexed by the XF index of a cell record
    formats: Vec<CellFormat>,
    /// Worksheets as (name, substream position) pairs
    sheets: Vec<(String, usize)>,
    is_1904: bool,
}

impl XlsSpreadsheet {
    /// Opens the compound file and reads the workbook globals
    pub(crate) fn open(name: String, mut source: SourceReader) -> Result<XlsSpreadsheet, SpreadsheetError> {
        let cfb = Cfb::new(&mut source).with_prefix(&name)?;
        // OOXML packages are wrapped in a compound file once encrypted
        if cfb.exists("EncryptedPackage") {
            Err(SpreadsheetError::SpreadsheetPasswordProtectedError(name.to_owned()))?
        }
        let stream = match cfb.read("Workbook").with_prefix(&name)? {
            Some(stream) => stream,
            None => cfb.read("Book").with_prefix(&name)?
                .ok_or_else(|| SpreadsheetError::SpreadsheetEmptyError(name.to_owned()))?,
        };

        let mut reader = Biff8Reader::new(stream);
        let globals = load_globals(&mut reader).with_prefix(&name)?;
        if globals.is_encrypted {
            Err(SpreadsheetError::SpreadsheetPasswordProtectedError(name.to_owned()))?
        }
        if globals.sheets.is_empty() {
            Err(SpreadsheetError::SpreadsheetEmptyError(name.to_owned()))?
        }
        debug!(
            "Workbook '{}' has sheets {:?} ({} shared strings, {} formats, 1904 dates: {})",
            name,
            globals.sheets,
            globals.shared_strings.len(),
            globals.formats.len(),
            globals.is_1904
        );
        Ok(XlsSpreadsheet {
            name,
            reader,
            shared_strings: globals.shared_strings,
            formats: globals.formats,
            sheets: globals.sheets,
            is_1904: globals.is_1904,
        })
    }

    fn format(&self, index: u16) -> CellFormat {
        self.formats.get(usize::from(index)).copied().unwrap_or_default()
    }

    /// Reads the cell records of one worksheet substream
    fn read_sheet(&mut self, position: usize, request: &GridRequest) -> Result<Grid, SpreadsheetError> {
        let mut builder = GridBuilder::new(request);
        // A formula with a string result is followed by a STRING record
        let mut pending_string = None::<(usize, usize, CellStyle)>;

        self.reader.goto(position);
        self.reader.next()?;
        while let Some(kind) = self.reader.next()? {
            match kind {
                BOF | EOF => break,
                STRING => {
                    if let Some((row, col, style)) = pending_string.take() {
                        let value = self.reader.read_xl_unicode_string()?;
                        builder.push(row, col, GridCell::new(CellValue::from(value), style));
                    }
                }
                MUL_RK | MUL_BLANK => {
                    pending_string = None;
                    let row = usize::from(self.reader.read_u16()?);
                    let col_lower_bound = usize::from(self.reader.read_u16()?);
                    let col_upper_bound = usize::from(self.reader.get_u16_back(2)?);
                    if builder.after_row_upper_bound(row) {
                        break;
                    }
                    for col in col_lower_bound..=col_upper_bound {
                        let index = self.reader.read_u16()?;
                        let format = self.format(index);
                        let value = if kind == MUL_RK {
                            CellValue::from_number(self.reader.read_rk_number()?, format.number, self.is_1904)
                        } else {
                            CellValue::Empty
                        };
                        if builder.contains(row, col) {
                            builder.push(row, col, GridCell::new(value, format.style));
                        }
                    }
                }
                FORMULA | NUMBER | RK | LABEL_SST | LABEL | BOOL_ERR | BLANK => {
                    pending_string = None;
                    let row = usize::from(self.reader.read_u16()?);
                    let col = usize::from(self.reader.read_u16()?);
                    if builder.after_row_upper_bound(row) {
                        break;
                    }
                    if !builder.contains(row, col) {
                        continue;
                    }
                    let index = self.reader.read_u16()?;
                    let format = self.format(index);
                    let value = match kind {
                        NUMBER => CellValue::from_number(self.reader.read_f64()?, format.number, self.is_1904),
                        RK => CellValue::from_number(self.reader.read_rk_number()?, format.number, self.is_1904),
                        LABEL_SST => {
                            let index = self.reader.read_u32()? as usize;
                            self.shared_strings
                                .get(index)
                                .map(|string| CellValue::from(string.as_str()))
                                .unwrap_or_default()
                        }
                        LABEL => CellValue::from(self.reader.read_xl_unicode_string()?),
                        BOOL_ERR => {
                            let value = self.reader.read_u8()?;
                            if self.reader.read_u8()? == 1 {
                                CellValue::from(error_text(value))
                            } else {
                                CellValue::Boolean(value != 0)
                            }
                        }
                        FORMULA => match read_formula_result(&mut self.reader, format.number, self.is_1904)? {
                            Some(value) => value,
                            None => {
                                pending_string = Some((row, col, format.style));
                                continue;
                            }
                        },
                        _ => CellValue::Empty,
                    };
                    builder.push(row, col, GridCell::new(value, format.style));
                }
                _ => (),
            }
        }
        Ok(builder.finish())
    }
}

impl Spreadsheet for XlsSpreadsheet {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.to_owned()).collect()
    }

    fn read_grid(&mut self, sheet_index: usize, request: &GridRequest) -> Result<Grid, SpreadsheetError> {
        let (sheet_name, position) = self.sheets
            .get(sheet_index)
            .cloned()
            .ok_or_else(|| SpreadsheetError::SheetNotFoundError(self.name.to_owned(), format!("#{sheet_index}")))?;
        let prefix = format!("{}[{}]", self.name, sheet_name);
        self.read_sheet(position, request).with_prefix(&prefix)
    }
}

/// Workbook level records read before the first worksheet
#[derive(Default)]
struct Globals {
    is_1904: bool,
    is_encrypted: bool,
    shared_strings: Vec<String>,
    formats: Vec<CellFormat>,
    sheets: Vec<(String, usize)>,
}

fn load_globals(reader: &mut Biff8Reader) -> Result<Globals, SpreadsheetError> {
    let mut globals = Globals::default();
    let mut fonts = Vec::<Font>::new();
    let mut custom_formats = HashMap::<u32, NumberKind>::new();
    let mut palette = DEFAULT_PALETTE;
    // (number format id, font index, solid fill color index)
    let mut format_indexes = Vec::<(u32, usize, Option<usize>)>::new();

    match_biff8_record!(reader => {
        EOF => break,
        FILE_PASS => {
            globals.is_encrypted = true;
            break;
        }
        DATE1904 => globals.is_1904 = reader.read_u16()? == 1,
        FONT => {
            reader.skip(2)?;
            let flags = reader.read_u16()?;
            reader.skip(2)?;
            let weight = reader.read_u16()?;
            fonts.push(Font {
                bold: weight >= 700,
                italic: flags & 0x02 != 0,
            });
        }
        FORMAT => {
            let id = reader.read_u16()?;
            let format = reader.read_xl_unicode_string()?;
            custom_formats.insert(u32::from(id), NumberKind::from_format_code(&format));
        }
        XF => {
            let font_index = usize::from(reader.read_u16()?);
            let format_id = u32::from(reader.read_u16()?);
            reader.skip(10)?;
            let pattern = reader.read_u32()? >> 26;
            let foreground = usize::from(reader.read_u16()? & 0x7F);
            format_indexes.push((format_id, font_index, (pattern == 1).then_some(foreground)));
        }
        PALETTE => {
            let count = usize::from(reader.read_u16()?);
            for color in palette.iter_mut().skip(8).take(count) {
                let [red, green, blue, _] = reader.read_u32()?.to_le_bytes();
                *color = Rgb(red, green, blue);
            }
        }
        SST => globals.shared_strings = load_shared_strings(reader)?,
        BOUND_SHEET8 => {
            let position = reader.read_u32()? as usize;
            reader.skip(1)?;
            let kind = reader.read_u8()?;
            let name = reader.read_short_xl_unicode_string()?;
            // Chart, macro and module sheets carry no cells
            if kind == WORKSHEET {
                globals.sheets.push((name, position));
            }
        }
    });

    globals.formats = format_indexes
        .into_iter()
        .map(|(format_id, font_index, color)| {
            // Font index 4 is never written, later fonts shift down by one
            let font = match font_index {
                4 => None,
                0..=3 => fonts.get(font_index),
                _ => fonts.get(font_index - 1),
            };
            // Indexes 64 and up are system colors
            let background = color.and_then(|index| palette.get(index).copied());
            CellFormat {
                number: number_kind(&custom_formats, format_id),
                style: font.copied().unwrap_or_default().style(background),
            }
        })
        .collect();
    Ok(globals)
}

/// Loads the shared string table from an SST record
fn load_shared_strings(reader: &mut Biff8Reader) -> Result<Vec<String>, SpreadsheetError> {
    reader.skip(4)?;
    let count = reader.read_u32()? as usize;
    let mut shared_strings = Vec::new();
    for _ in 0..count {
        shared_strings.push(reader.read_xl_unicode_rich_extended_string()?);
    }
    Ok(shared_strings)
}

/// Decodes the cached result of a FORMULA record.
/// None when the result is a string stored in the following STRING record.
fn read_formula_result(reader: &mut Biff8Reader, kind: NumberKind, is_1904: bool) -> Result<Option<CellValue>, SpreadsheetError> {
    let result = reader.read_u64()?;
    if result & 0xFFFF_0000_0000_0000 != 0xFFFF_0000_0000_0000 {
        return Ok(Some(CellValue::from_number(f64::from_bits(result), kind, is_1904)));
    }
    let byte = ((result >> 16) & 0xFF) as u8;
    Ok(match result & 0xFF {
        0 => None,
        1 => Some(CellValue::Boolean(byte != 0)),
        2 => Some(CellValue::from(error_text(byte))),
        _ => Some(CellValue::Empty),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::cfb::tests::compound_file;
    use crate::spreadsheet::open_spreadsheet;
    use crate::spreadsheet::source::Source;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    const SHR_FMLA: u16 = 1212;
    const CONTINUE: u16 = 60;

    fn record(kind: u16, body: &[u8]) -> Vec<u8> {
        let mut bytes = kind.to_le_bytes().to_vec();
        bytes.extend_from_slice(&(body.len() as u16).to_le_bytes());
        bytes.extend_from_slice(body);
        bytes
    }

    fn cell(kind: u16, row: u16, col: u16, xf: u16, value: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        for field in [row, col, xf] {
            body.extend_from_slice(&field.to_le_bytes());
        }
        body.extend_from_slice(value);
        record(kind, &body)
    }

    fn formula(row: u16, col: u16, xf: u16, result: [u8; 8]) -> Vec<u8> {
        let mut value = result.to_vec();
        value.extend_from_slice(&[0; 8]);
        cell(FORMULA, row, col, xf, &value)
    }

    fn compressed(text: &str) -> Vec<u8> {
        let mut bytes = (text.chars().count() as u16).to_le_bytes().to_vec();
        bytes.push(0);
        bytes.extend(text.chars().map(|character| character as u8));
        bytes
    }

    fn wide(text: &str) -> Vec<u8> {
        let units: Vec<u16> = text.encode_utf16().collect();
        let mut bytes = (units.len() as u16).to_le_bytes().to_vec();
        bytes.push(1);
        for unit in units {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        bytes
    }

    fn font(bold: bool, italic: bool) -> Vec<u8> {
        let mut body = 200u16.to_le_bytes().to_vec();
        body.extend_from_slice(&(if italic { 0x02u16 } else { 0 }).to_le_bytes());
        body.extend_from_slice(&0x7FFFu16.to_le_bytes());
        body.extend_from_slice(&(if bold { 700u16 } else { 400 }).to_le_bytes());
        body.extend_from_slice(&[0; 6]);
        body.extend_from_slice(&[5, 0]);
        body.extend_from_slice(b"Arial");
        record(FONT, &body)
    }

    fn xf(font: u16, format: u16, fill: Option<u16>) -> Vec<u8> {
        let mut body = font.to_le_bytes().to_vec();
        body.extend_from_slice(&format.to_le_bytes());
        body.extend_from_slice(&[0; 10]);
        let pattern: u32 = if fill.is_some() { 1 << 26 } else { 0 };
        body.extend_from_slice(&pattern.to_le_bytes());
        body.extend_from_slice(&(fill.unwrap_or(64) | (65 << 7)).to_le_bytes());
        record(XF, &body)
    }

    /// Lays out the globals substream followed by one substream per sheet
    fn workbook_stream(globals: &[Vec<u8>], sheets: &[(&str, u8, Vec<Vec<u8>>)]) -> Vec<u8> {
        let substreams: Vec<Vec<u8>> = sheets
            .iter()
            .map(|(_, _, records)| {
                let mut bytes = record(BOF, &[0, 6, 0x10, 0]);
                for entry in records {
                    bytes.extend_from_slice(entry);
                }
                bytes.extend(record(EOF, &[]));
                bytes
            })
            .collect();
        let build = |positions: &[usize]| {
            let mut bytes = record(BOF, &[0, 6, 5, 0]);
            for global in globals {
                bytes.extend_from_slice(global);
            }
            for ((name, kind, _), position) in sheets.iter().zip(positions) {
                let mut body = (*position as u32).to_le_bytes().to_vec();
                body.extend_from_slice(&[0, *kind, name.len() as u8, 0]);
                body.extend_from_slice(name.as_bytes());
                bytes.extend(record(BOUND_SHEET8, &body));
            }
            bytes.extend(record(EOF, &[]));
            bytes
        };

        let mut positions = Vec::new();
        let mut position = build(&vec![0; sheets.len()]).len();
        for substream in &substreams {
            positions.push(position);
            position += substream.len();
        }
        let mut stream = build(&positions);
        for substream in substreams {
            stream.extend(substream);
        }
        stream
    }

    fn open(stream: &[u8]) -> Box<dyn Spreadsheet> {
        let source = Source::from_bytes("book.xls", compound_file(&[("Workbook", stream)]));
        open_spreadsheet(&source).unwrap()
    }

    fn globals() -> Vec<Vec<u8>> {
        let mut shared_strings = vec![6, 0, 0, 0, 5, 0, 0, 0];
        shared_strings.extend(compressed("Name"));
        shared_strings.extend([5, 0, 0, b'G', b'r', 0xF6, 0xDF, b'e']);
        shared_strings.extend(wide("日本"));
        shared_strings.extend([4, 0, 0x08, 1, 0]);
        shared_strings.extend_from_slice(b"Rich");
        shared_strings.extend([0, 0, 1, 0]);
        // The last string moves on to a CONTINUE record, switching to UTF-16
        shared_strings.extend([9, 0, 0]);
        shared_strings.extend_from_slice(b"Cont");
        let mut continued = vec![1];
        for unit in "inued".encode_utf16() {
            continued.extend_from_slice(&unit.to_le_bytes());
        }

        let mut palette = 6u16.to_le_bytes().to_vec();
        for color in [[0, 0, 0], [255, 255, 255], [255, 0, 0], [0, 255, 0], [0, 0, 255], [0x12, 0x34, 0x56]] {
            palette.extend_from_slice(&color);
            palette.push(0);
        }

        let mut format = 164u16.to_le_bytes().to_vec();
        format.extend(compressed("yyyy-mm-dd"));

        vec![
            font(false, false),
            font(true, false),
            font(false, true),
            font(false, false),
            font(true, true),
            record(FORMAT, &format),
            record(PALETTE, &palette),
            xf(0, 0, None),
            xf(1, 0, None),
            xf(0, 164, None),
            xf(2, 0, Some(13)),
            xf(5, 14, None),
            xf(0, 0, Some(10)),
            xf(0, 0, Some(64)),
            record(SST, &shared_strings),
            record(CONTINUE, &continued),
        ]
    }

    fn data_sheet() -> Vec<Vec<u8>> {
        let mut mul_rk = Vec::new();
        for field in [2u16, 0, 0] {
            mul_rk.extend_from_slice(&field.to_le_bytes());
        }
        mul_rk.extend_from_slice(&0x3FF8_0000u32.to_le_bytes());
        mul_rk.extend_from_slice(&4u16.to_le_bytes());
        mul_rk.extend_from_slice(&((45293u32 << 2) | 0x02).to_le_bytes());
        mul_rk.extend_from_slice(&1u16.to_le_bytes());

        let mut mul_blank = Vec::new();
        for field in [5u16, 0, 5, 5, 6, 2] {
            mul_blank.extend_from_slice(&field.to_le_bytes());
        }

        vec![
            cell(LABEL_SST, 0, 0, 1, &0u32.to_le_bytes()),
            cell(LABEL, 0, 1, 0, &compressed("Value")),
            cell(LABEL, 0, 2, 0, &wide("When")),
            cell(LABEL_SST, 1, 0, 3, &2u32.to_le_bytes()),
            cell(RK, 1, 1, 0, &((42u32 << 2) | 0x02).to_le_bytes()),
            cell(NUMBER, 1, 2, 2, &45292f64.to_le_bytes()),
            record(MUL_RK, &mul_rk),
            cell(BOOL_ERR, 2, 2, 0, &[1, 0]),
            formula(3, 0, 0, [0, 0, 0, 0, 0, 0, 0xFF, 0xFF]),
            record(SHR_FMLA, &[0; 10]),
            record(STRING, &compressed("calc")),
            formula(3, 1, 0, 2.5f64.to_le_bytes()),
            formula(3, 2, 0, [2, 0, 0x07, 0, 0, 0, 0xFF, 0xFF]),
            cell(BOOL_ERR, 4, 0, 0, &[0x2A, 1]),
            formula(4, 1, 0, [1, 0, 0, 0, 0, 0, 0xFF, 0xFF]),
            formula(4, 2, 1, [3, 0, 0, 0, 0, 0, 0xFF, 0xFF]),
            record(MUL_BLANK, &mul_blank),
            cell(LABEL_SST, 6, 0, 0, &3u32.to_le_bytes()),
            cell(LABEL_SST, 6, 1, 0, &4u32.to_le_bytes()),
            cell(BLANK, 6, 3, 5, &[]),
        ]
    }

    fn sample_stream() -> Vec<u8> {
        workbook_stream(
            &globals(),
            &[
                ("Data", WORKSHEET, data_sheet()),
                ("Chart", 2, Vec::new()),
                ("Notes", WORKSHEET, vec![cell(LABEL_SST, 0, 0, 0, &1u32.to_le_bytes())]),
            ],
        )
    }

    fn date(year: i32, month: u32, day: u32) -> CellValue {
        CellValue::Date(NaiveDate::from_ymd_opt(year, month, day).unwrap())
    }

    #[test]
    fn worksheets_only() {
        let spreadsheet = open(&sample_stream());
        assert_eq!(spreadsheet.sheet_names(), vec!["Data", "Notes"]);
    }

    #[test]
    fn read_values() {
        let mut spreadsheet = open(&sample_stream());
        let grid = spreadsheet.read_grid(0, &GridRequest::default()).unwrap();
        assert_eq!((grid.row_count(), grid.column_count()), (7, 3));

        let values: Vec<Vec<CellValue>> = grid
            .rows()
            .map(|row| row.iter().map(|cell| cell.value.clone()).collect())
            .collect();
        assert_eq!(
            values,
            vec![
                vec![CellValue::from("Name"), CellValue::from("Value"), CellValue::from("When")],
                vec![CellValue::from("日本"), CellValue::Number(42.0), date(2024, 1, 1)],
                vec![CellValue::Number(1.5), date(2024, 1, 2), CellValue::Boolean(true)],
                vec![CellValue::from("calc"), CellValue::Number(2.5), CellValue::from("#DIV/0!")],
                vec![CellValue::from("#N/A"), CellValue::Boolean(false), CellValue::Empty],
                vec![CellValue::Empty, CellValue::Empty, CellValue::Empty],
                vec![CellValue::from("Rich"), CellValue::from("Continued"), CellValue::Empty],
            ]
        );

        let notes = spreadsheet.read_grid(1, &GridRequest::default()).unwrap();
        assert_eq!(notes.value_at(0, 0), Some(&CellValue::from("Größe")));
    }

    #[test]
    fn read_styles() {
        let mut spreadsheet = open(&sample_stream());
        let grid = spreadsheet.read_grid(0, &GridRequest::default()).unwrap();
        let style = |row: usize, col: usize| grid.cell_at(row, col).unwrap().style;

        assert_eq!(style(0, 0), CellStyle { bold: true, ..CellStyle::default() });
        assert_eq!(style(0, 1), CellStyle::default());
        // Palette entry 13 is replaced by the PALETTE record
        assert_eq!(
            style(1, 0),
            CellStyle { bold: false, italic: true, background: Some(Rgb(0x12, 0x34, 0x56)) }
        );
        assert_eq!(style(2, 1), CellStyle { bold: true, italic: true, background: None });
        assert!(style(4, 2).bold);
        assert_eq!(style(5, 0).background, Some(Rgb(0xFF, 0x00, 0x00)));
        assert_eq!(style(5, 2), CellStyle::default());
    }

    #[test]
    fn read_window() {
        let mut spreadsheet = open(&sample_stream());
        let request = GridRequest {
            columns: Some(1..=2),
            skip_rows: Some(2),
            row_limit: Some(2),
            ..GridRequest::default()
        };
        let grid = spreadsheet.read_grid(0, &request).unwrap();
        assert_eq!((grid.first_row(), grid.first_column()), (2, 1));
        assert_eq!((grid.row_count(), grid.column_count()), (2, 2));
        assert_eq!(grid.value_at(0, 0), Some(&date(2024, 1, 2)));
        assert_eq!(grid.value_at(1, 1), Some(&CellValue::from("#DIV/0!")));
    }

    #[test]
    fn dates_from_1904() {
        let stream = workbook_stream(
            &[record(DATE1904, &[1, 0]), xf(0, 14, None)],
            &[("Sheet1", WORKSHEET, vec![cell(NUMBER, 0, 0, 0, &0f64.to_le_bytes())])],
        );
        let mut spreadsheet = open(&stream);
        let grid = spreadsheet.read_grid(0, &GridRequest::default()).unwrap();
        assert_eq!(grid.value_at(0, 0), Some(&date(1904, 1, 1)));
    }

    #[test]
    fn book_stream_name() {
        let stream = workbook_stream(&[], &[("Old", WORKSHEET, vec![cell(RK, 0, 0, 0, &((7u32 << 2) | 0x02).to_le_bytes())])]);
        let source = Source::from_bytes("old.xls", compound_file(&[("Book", &stream)]));
        let mut spreadsheet = open_spreadsheet(&source).unwrap();
        assert_eq!(spreadsheet.sheet_names(), vec!["Old"]);
        let grid = spreadsheet.read_grid(0, &GridRequest::default()).unwrap();
        assert_eq!(grid.value_at(0, 0), Some(&CellValue::Number(7.0)));
    }

    #[test]
    fn encrypted_workbook() {
        let stream = workbook_stream(&[record(FILE_PASS, &[1, 0, 1, 0, 1, 0])], &[("Sheet1", WORKSHEET, Vec::new())]);
        let source = Source::from_bytes("secret.xls", compound_file(&[("Workbook", &stream)]));
        assert!(matches!(
            open_spreadsheet(&source),
            Err(SpreadsheetError::SpreadsheetPasswordProtectedError(_))
        ));
    }

    #[test]
    fn compound_file_without_workbook() {
        let source = Source::from_bytes("memo.xls", compound_file(&[("WordDocument", b"text")]));
        assert!(matches!(open_spreadsheet(&source), Err(SpreadsheetError::SpreadsheetEmptyError(_))));

        let stream = workbook_stream(&[], &[("Chart", 2, Vec::new())]);
        let source = Source::from_bytes("charts.xls", compound_file(&[("Workbook", &stream)]));
        assert!(matches!(open_spreadsheet(&source), Err(SpreadsheetError::SpreadsheetEmptyError(_))));
    }
}
