use crate::error::ResultMessage;
use crate::helpers::reader::SourceReader;
use crate::helpers::xml::XmlAttributeHelper;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::CellStyle;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::excel::load_cell_formats;
use crate::spreadsheet::excel::load_relationships;
use crate::spreadsheet::excel::CellFormat;
use crate::spreadsheet::grid::Grid;
use crate::spreadsheet::grid::GridBuilder;
use crate::spreadsheet::grid::GridCell;
use crate::spreadsheet::grid::GridRequest;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use log::debug;
use log::warn;
use quick_xml::events::Event;
use std::borrow::Cow;
use std::collections::HashMap;
use std::collections::HashSet;
use std::io::BufRead;
use zip::ZipArchive;

// Local names of the elements read from workbook, shared strings and worksheet parts
const TAG_SHARED_STRING_ITEM: &[u8] = b"si"; // Shared string table item
const TAG_PHONETIC_TEXT: &[u8] = b"rPh"; // Phonetic text for Asian languages
const TAG_TEXT: &[u8] = b"t"; // Text content within strings
const TAG_WORKBOOK_PROPERTIES: &[u8] = b"workbookPr";
const TAG_SHEET: &[u8] = b"sheet";
const TAG_ROW: &[u8] = b"row";
const TAG_CELL: &[u8] = b"c";
const TAG_INLINE_STRING: &[u8] = b"is";
const TAG_VALUE: &[u8] = b"v";

/// An Excel 2007+ workbook
pub(crate) struct XlsxSpreadsheet {
    name: String,
    zip: ZipArchive<SourceReader>,
    /// Cell formats indexed by the `s` attribute of a cell
    formats: Vec<CellFormat>,
    /// Worksheets as (name, zip_path) pairs
    sheets: Vec<(String, String)>,
    is_1904: bool,
}

impl XlsxSpreadsheet {
    /// Reads the workbook structure and styles of an opened package
    pub(crate) fn open(name: String, mut zip: ZipArchive<SourceReader>) -> Result<XlsxSpreadsheet, SpreadsheetError> {
        let (sheets, is_1904) = load_workbook(&mut zip).with_prefix(&name)?;
        if sheets.is_empty() {
            Err(SpreadsheetError::SpreadsheetEmptyError(name.to_owned()))?
        }
        let formats = load_cell_formats(&mut zip).with_prefix(&name)?;
        debug!("Workbook '{}' has sheets {:?} (1904 dates: {})", name, sheets, is_1904);
        Ok(XlsxSpreadsheet {
            name,
            zip,
            formats,
            sheets,
            is_1904,
        })
    }

    /// Loads the shared strings with the given indexes.
    ///
    /// Shared strings are stored once per workbook and referenced by index;
    /// only the strings the selected cells use are kept.
    fn load_shared_strings(&mut self, mut indexes: HashSet<usize>) -> Result<HashMap<usize, String>, SpreadsheetError> {
        let mut shared_strings = HashMap::<usize, String>::new();
        let mut reader = match self.zip.xml_reader("xl/sharedStrings.xml")? {
            Some(reader) => reader,
            None => return Ok(shared_strings),
        };

        let mut id = 0usize;
        match_xml_events!(reader => {
            Event::Start(event) if event.local_name().as_ref() == TAG_SHARED_STRING_ITEM => {
                if indexes.remove(&id) {
                    let string = read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?;
                    shared_strings.insert(id, string);
                }
                if indexes.is_empty() {
                    break;
                }
                id += 1;
            }
        });
        if !indexes.is_empty() {
            warn!("{} shared strings referenced by '{}' are missing", indexes.len(), self.name);
        }
        Ok(shared_strings)
    }
}

impl Spreadsheet for XlsxSpreadsheet {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.to_owned()).collect()
    }

    /// Streams one worksheet part and keeps the cells inside the request window.
    ///
    /// Shared string cells are collected first and resolved in one pass over
    /// the shared string table once the worksheet has been read.
    fn read_grid(&mut self, sheet_index: usize, request: &GridRequest) -> Result<Grid, SpreadsheetError> {
        let (sheet_name, zip_path) = self.sheets
            .get(sheet_index)
            .cloned()
            .ok_or_else(|| SpreadsheetError::SheetNotFoundError(self.name.to_owned(), format!("#{sheet_index}")))?;
        let prefix = format!("{}[{}]", self.name, sheet_name);

        let mut builder = GridBuilder::new(request);
        let mut shared_cells = Vec::<(usize, usize, usize, CellStyle)>::new();
        let mut reader = self.zip.xml_reader(&zip_path)?
            .ok_or_else(|| SpreadsheetError::FileError(zip_path.to_owned()))
            .with_prefix(&prefix)?;

        let mut row_count = 0usize;
        let mut col_count = 0usize;
        let mut row = 0usize;
        let mut col = 0usize;
        let mut is_selected = false;
        let mut kind = CellType::default();
        let mut style = CellStyle::default();
        let mut value = String::new();
        match_xml_events!(reader => {
            Event::Start(event) if event.local_name().as_ref() == TAG_ROW => {
                if let Some(number) = event.parse_attribute_value::<usize>("r")? {
                    row_count = number.saturating_sub(1);
                }
                col_count = 0;
            }
            Event::End(event) if event.local_name().as_ref() == TAG_ROW => {
                row_count += 1;
                col_count = 0;
            }
            Event::Start(event) if event.local_name().as_ref() == TAG_CELL => {
                (row, col) = event.get_attribute_value("r")?
                    .and_then(|reference| reference_to_index(&reference))
                    .unwrap_or((row_count, col_count));
                col_count = col + 1;
                value.clear();
                if builder.after_row_upper_bound(row) {
                    break;
                }
                is_selected = builder.contains(row, col);
                if is_selected {
                    let format = match event.get_attribute_value("s")?.filter(|index| !index.is_empty()) {
                        Some(index) => {
                            let index = index.parse::<usize>()?;
                            self.formats.get(index).copied().unwrap_or_else(|| {
                                warn!("Unknown cell format {} in {}", index, prefix);
                                CellFormat::default()
                            })
                        }
                        None => CellFormat::default(),
                    };
                    style = format.style;
                    kind = match event.get_attribute_value("t")?.as_deref() {
                        Some("inlineStr") | Some("str") => CellType::InlineString,
                        Some("s") => CellType::SharedString,
                        Some("d") => CellType::IsoDateTime,
                        Some("b") => CellType::Boolean,
                        Some("e") => CellType::Error,
                        _ => CellType::Number(format.number),
                    };
                }
            }
            Event::Start(event) if is_selected && event.local_name().as_ref() == TAG_INLINE_STRING => {
                value = read_string_value(&mut reader, TAG_INLINE_STRING, false)?;
            }
            Event::Start(event) if is_selected && event.local_name().as_ref() == TAG_VALUE => {
                value = read_string_value(&mut reader, TAG_VALUE, true)?;
            }
            Event::End(event) if is_selected && event.local_name().as_ref() == TAG_CELL => {
                is_selected = false;
                match kind {
                    CellType::SharedString if !value.is_empty() => {
                        let index = value.trim().parse::<usize>()?;
                        shared_cells.push((row, col, index, style));
                    }
                    _ if value.is_empty() => builder.push(row, col, GridCell::new(CellValue::Empty, style)),
                    _ => builder.push(row, col, GridCell::new(CellValue::from_raw(kind, &value, self.is_1904), style)),
                }
            }
        });
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

/// Loads worksheet names and part paths from `xl/workbook.xml`, and whether
/// the workbook counts dates from 1904.
fn load_workbook(zip: &mut ZipArchive<SourceReader>) -> Result<(Vec<(String, String)>, bool), SpreadsheetError> {
    let relationships = load_relationships(zip, "xl/_rels/workbook.xml.rels")?;
    let mut reader = zip.xml_reader("xl/workbook.xml")?
        .ok_or_else(|| SpreadsheetError::FileError("xl/workbook.xml".to_string()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    let mut is_1904 = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_SHEET => {
            let mut name = None::<Cow<str>>;
            let mut id = None::<Cow<str>>;
            for result in event.attributes() {
                let attribute = result?;
                let key = attribute.key.local_name();
                if key.as_ref() == b"name" {
                    name = Some(attribute.get_value()?);
                } else if key.as_ref() == b"id" {
                    id = Some(attribute.get_value()?);
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(&*id) {
                    sheets.push((name.to_string(), path.to_owned()));
                }
            }
        }
        Event::Start(event) if event.local_name().as_ref() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = event.get_attribute_value("date1904")?
                .map(|value| value.eq("1") || value.eq("true"))
                .unwrap_or(false);
        }
    });
    Ok((sheets, is_1904))
}

/// Reads a string value up to `end_tag`, joining rich text runs and skipping
/// phonetic annotations.
fn read_string_value<R: BufRead>(
    reader: &mut XmlReader<R>,
    end_tag: &[u8],
    is_text_content: bool,
) -> Result<String, SpreadsheetError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.local_name().as_ref() == end_tag => break,
        Event::Start(event) if event.local_name().as_ref() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.local_name().as_ref() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.local_name().as_ref() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.local_name().as_ref() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_bytes_text(&event)?,
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}
