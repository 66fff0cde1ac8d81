use crate::error::ResultMessage;
use crate::helpers::biff8::decode_rk;
use crate::helpers::reader::SourceReader;
use crate::helpers::zip::ZipHelper;
use crate::spreadsheet::cell::error_text;
use crate::spreadsheet::cell::CellStyle;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::cell::NumberKind;
use crate::spreadsheet::cell::Rgb;
use crate::spreadsheet::excel::load_relationships;
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
use log::warn;
use std::collections::HashMap;
use std::collections::HashSet;
use zip::ZipArchive;

// BIFF12 record types

/// Row header
const BRT_ROW_HDR: u16 = 0;
/// Blank styled cell
const BRT_CELL_BLANK: u16 = 1;
/// Cell containing an RK number
const BRT_CELL_RK: u16 = 2;
/// Cell containing an error code
const BRT_CELL_ERROR: u16 = 3;
/// Cell containing a boolean
const BRT_CELL_BOOL: u16 = 4;
/// Cell containing a double
const BRT_CELL_REAL: u16 = 5;
/// Cell containing its own string
const BRT_CELL_ST: u16 = 6;
/// Cell containing a shared string index
const BRT_CELL_ISST: u16 = 7;
/// Formula with a string result
const BRT_FMLA_STRING: u16 = 8;
/// Formula with a numeric result
const BRT_FMLA_NUM: u16 = 9;
/// Formula with a boolean result
const BRT_FMLA_BOOL: u16 = 10;
/// Formula with an error result
const BRT_FMLA_ERROR: u16 = 11;
/// Shared string table item
const BRT_SST_ITEM: u16 = 19;
/// Future record block begin
const BRT_FRT_BEGIN: u16 = 35;
/// Future record block end
const BRT_FRT_END: u16 = 36;
/// Font table entry
const BRT_FONT: u16 = 43;
/// Number format definition
const BRT_FMT: u16 = 44;
/// Fill table entry
const BRT_FILL: u16 = 45;
/// Extended format
const BRT_XF: u16 = 47;
/// Cell containing a rich text string
const BRT_CELL_R_STRING: u16 = 62;
/// End of the worksheet list
const BRT_END_BUNDLE_SHS: u16 = 144;
/// Begin sheet data
const BRT_BEGIN_SHEET_DATA: u16 = 145;
/// End sheet data
const BRT_END_SHEET_DATA: u16 = 146;
/// Workbook properties
const BRT_WB_PROP: u16 = 153;
/// Worksheet entry
const BRT_BUNDLE_SH: u16 = 156;
/// Begin shared string table
const BRT_BEGIN_SST: u16 = 159;
/// Begin and end of the fill table
const BRT_BEGIN_FILLS: u16 = 603;
const BRT_END_FILLS: u16 = 604;
/// Begin and end of the font table
const BRT_BEGIN_FONTS: u16 = 611;
const BRT_END_FONTS: u16 = 612;
/// Begin and end of the number format table
const BRT_BEGIN_FMTS: u16 = 615;
const BRT_END_FMTS: u16 = 616;
/// Begin and end of the cell format table
const BRT_BEGIN_CELL_XFS: u16 = 617;
const BRT_END_CELL_XFS: u16 = 618;

/// Color types of a BrtColor structure
const COLOR_INDEXED: u8 = 1;
const COLOR_ARGB: u8 = 2;

/// An Excel 2007+ binary workbook
pub(crate) struct XlsbSpreadsheet {
    name: String,
    zip: ZipArchive<SourceReader>,
    /// Cell formats indexed by the style of a cell record
    formats: Vec<CellFormat>,
    /// Worksheets as (name, zip_path) pairs
    sheets: Vec<(String, String)>,
    is_1904: bool,
}

impl XlsbSpreadsheet {
    /// Reads the workbook structure and styles of an opened package
    pub(crate) fn open(name: String, mut zip: ZipArchive<SourceReader>) -> Result<XlsbSpreadsheet, SpreadsheetError> {
        let (sheets, is_1904) = load_workbook(&mut zip).with_prefix(&name)?;
        if sheets.is_empty() {
            Err(SpreadsheetError::SpreadsheetEmptyError(name.to_owned()))?
        }
        let formats = load_cell_formats(&mut zip).with_prefix(&name)?;
        debug!("Workbook '{}' has sheets {:?} (1904 dates: {})", name, sheets, is_1904);
        Ok(XlsbSpreadsheet {
            name,
            zip,
            formats,
            sheets,
            is_1904,
        })
    }

    /// Loads the shared strings with the given indexes
    fn load_shared_strings(&mut self, mut indexes: HashSet<usize>) -> Result<HashMap<usize, String>, SpreadsheetError> {
        let mut shared_strings = HashMap::<usize, String>::new();
        let mut reader = match self.zip.biff12_reader("xl/sharedStrings.bin")? {
            Some(reader) => reader,
            None => return Ok(shared_strings),
        };

        if reader.find(BRT_BEGIN_SST)? {
            for id in 0..reader.get_usize(4)? {
                if !reader.find_with(BRT_SST_ITEM, &[(BRT_FRT_BEGIN, BRT_FRT_END)])? {
                    break;
                }
                if indexes.remove(&id) {
                    shared_strings.insert(id, reader.get_str(1)?);
                }
                if indexes.is_empty() {
                    break;
                }
            }
        }
        if !indexes.is_empty() {
            warn!("{} shared strings referenced by '{}' are missing", indexes.len(), self.name);
        }
        Ok(shared_strings)
    }
}

impl Spreadsheet for XlsbSpreadsheet {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.to_owned()).collect()
    }

    /// Streams the sheet data records of one worksheet part
    fn read_grid(&mut self, sheet_index: usize, request: &GridRequest) -> Result<Grid, SpreadsheetError> {
        let (sheet_name, zip_path) = self.sheets
            .get(sheet_index)
            .cloned()
            .ok_or_else(|| SpreadsheetError::SheetNotFoundError(self.name.to_owned(), format!("#{sheet_index}")))?;
        let prefix = format!("{}[{}]", self.name, sheet_name);

        let mut builder = GridBuilder::new(request);
        let mut shared_cells = Vec::<(usize, usize, usize, CellStyle)>::new();
        let mut reader = self.zip.biff12_reader(&zip_path)?
            .ok_or_else(|| SpreadsheetError::FileError(zip_path.to_owned()))
            .with_prefix(&prefix)?;

        let mut row = 0usize;
        if reader.find(BRT_BEGIN_SHEET_DATA)? {
            while let Some(kind) = reader.next()? {
                match kind {
                    BRT_END_SHEET_DATA => break,
                    BRT_ROW_HDR => {
                        row = reader.get_usize(0)?;
                        if builder.after_row_upper_bound(row) {
                            break;
                        }
                    }
                    BRT_CELL_BLANK
                    | BRT_CELL_RK
                    | BRT_CELL_ERROR | BRT_FMLA_ERROR
                    | BRT_CELL_BOOL | BRT_FMLA_BOOL
                    | BRT_CELL_REAL | BRT_FMLA_NUM
                    | BRT_CELL_ST | BRT_FMLA_STRING
                    | BRT_CELL_R_STRING
                    | BRT_CELL_ISST => {
                        let col = reader.get_usize(0)?;
                        if !builder.contains(row, col) {
                            continue;
                        }
                        let format = self.formats.get(reader.get_style(4)?).copied().unwrap_or_default();
                        let value = match kind {
                            BRT_CELL_RK => CellValue::from_number(decode_rk(reader.get_u32(8)?), format.number, self.is_1904),
                            BRT_CELL_REAL | BRT_FMLA_NUM => CellValue::from_number(reader.get_f64(8)?, format.number, self.is_1904),
                            BRT_CELL_BOOL | BRT_FMLA_BOOL => CellValue::Boolean(reader.get_u8(8)? != 0),
                            BRT_CELL_ERROR | BRT_FMLA_ERROR => CellValue::from(error_text(reader.get_u8(8)?)),
                            BRT_CELL_ST | BRT_FMLA_STRING => CellValue::from(reader.get_str(8)?),
                            BRT_CELL_R_STRING => CellValue::from(reader.get_str(9)?),
                            BRT_CELL_ISST => {
                                shared_cells.push((row, col, reader.get_usize(8)?, format.style));
                                continue;
                            }
                            _ => CellValue::Empty,
                        };
                        builder.push(row, col, GridCell::new(value, format.style));
                    }
                    _ => (),
                }
            }
        }
        drop(reader);

        if !shared_cells.is_empty() {
            let indexes = shared_cells.iter().map(|(_, _, index, _)| *index).collect();
            let shared_strings = self.load_shared_strings(indexes).with_prefix(&self.name)?;
            for (row, col, index, style) in shared_cells {
                let value = shared_strings
                    .get(&index)
                    .map(|string| CellValue::from(string.as_str()))
                    .unwrap_or_default();
                builder.push(row, col, GridCell::new(value, style));
            }
        }
        Ok(builder.finish())
    }
}

/// Loads worksheet names and part paths from `xl/workbook.bin`, and whether
/// the workbook counts dates from 1904.
fn load_workbook(zip: &mut ZipArchive<SourceReader>) -> Result<(Vec<(String, String)>, bool), SpreadsheetError> {
    let relationships = load_relationships(zip, "xl/_rels/workbook.bin.rels")?;
    let mut reader = zip.biff12_reader("xl/workbook.bin")?
        .ok_or_else(|| SpreadsheetError::FileError("xl/workbook.bin".to_string()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    let mut is_1904 = false;
    while let Some(kind) = reader.next()? {
        match kind {
            BRT_END_BUNDLE_SHS => break,
            BRT_WB_PROP => is_1904 = reader.get_u8(0)? & 0x01 != 0,
            BRT_BUNDLE_SH => {
                let (id, bound) = reader.get_str_and_bound(8)?;
                // Chartsheets are not in the relationship map
                if let Some(zip_path) = relationships.get(&id) {
                    sheets.push((reader.get_str(bound)?, zip_path.to_owned()));
                }
            }
            _ => (),
        }
    }
    Ok((sheets, is_1904))
}

/// Reads `xl/styles.bin` into one [`CellFormat`] per cell format entry.
/// Workbooks without a styles part have no formats.
fn load_cell_formats(zip: &mut ZipArchive<SourceReader>) -> Result<Vec<CellFormat>, SpreadsheetError> {
    let mut reader = match zip.biff12_reader("xl/styles.bin")? {
        Some(reader) => reader,
        None => return Ok(Vec::new()),
    };

    let mut custom_formats = HashMap::<u32, NumberKind>::new();
    let mut fonts = Vec::<Font>::new();
    let mut fills = Vec::<Option<Rgb>>::new();
    let mut format_indexes = Vec::<(u32, usize, usize)>::new();
    // Begin record of the table being read
    let mut context = None::<u16>;

    while let Some(kind) = reader.next()? {
        match kind {
            BRT_BEGIN_FMTS | BRT_BEGIN_FONTS | BRT_BEGIN_FILLS | BRT_BEGIN_CELL_XFS => context = Some(kind),
            BRT_END_FMTS | BRT_END_FONTS | BRT_END_FILLS => context = None,
            BRT_END_CELL_XFS => break,
            BRT_FMT if context == Some(BRT_BEGIN_FMTS) => {
                let id = u32::from(reader.get_u16(0)?);
                let format = reader.get_str(2)?;
                custom_formats.insert(id, NumberKind::from_format_code(&format));
            }
            BRT_FONT if context == Some(BRT_BEGIN_FONTS) => {
                let flags = reader.get_u16(2)?;
                let weight = reader.get_u16(4)?;
                fonts.push(Font {
                    bold: weight >= 700,
                    italic: flags & 0x02 != 0,
                });
            }
            BRT_FILL if context == Some(BRT_BEGIN_FILLS) => {
                // Theme and automatic colors are left out
                let is_solid = reader.get_u32(0)? == 1;
                let color = match reader.get_u8(4)? >> 1 {
                    COLOR_ARGB => Some(Rgb(reader.get_u8(8)?, reader.get_u8(9)?, reader.get_u8(10)?)),
                    COLOR_INDEXED => DEFAULT_PALETTE.get(usize::from(reader.get_u8(5)?)).copied(),
                    _ => None,
                };
                fills.push(color.filter(|_| is_solid));
            }
            BRT_XF if context == Some(BRT_BEGIN_CELL_XFS) => {
                format_indexes.push((
                    u32::from(reader.get_u16(2)?),
                    usize::from(reader.get_u16(4)?),
                    usize::from(reader.get_u16(6)?),
                ));
            }
            _ => (),
        }
    }
    debug!(
        "Loaded {} cell formats ({} custom number formats, {} fonts, {} fills)",
        format_indexes.len(),
        custom_formats.len(),
        fonts.len(),
        fills.len()
    );

    let formats = format_indexes
        .into_iter()
        .map(|(number_format_id, font_id, fill_id)| {
            let font = fonts.get(font_id).copied().unwrap_or_default();
            CellFormat {
                number: number_kind(&custom_formats, number_format_id),
                style: font.style(fills.get(fill_id).copied().flatten()),
            }
        })
        .collect();
    Ok(formats)
}
