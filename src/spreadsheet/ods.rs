use crate::helpers::reader::SourceReader;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::CellStyle;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::cell::NumberKind;
use crate::spreadsheet::cell::Rgb;
use crate::spreadsheet::grid::Grid;
use crate::spreadsheet::grid::GridBuilder;
use crate::spreadsheet::grid::GridCell;
use crate::spreadsheet::grid::GridRequest;
use crate::error::ResultMessage;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use log::debug;
use log::warn;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::collections::HashMap;
use std::io::Read;
use zip::ZipArchive;

/// ODS file MIME type identifier
const MIME_TYPE: &str = "application/vnd.oasis.opendocument.spreadsheet";
/// Table-cell style definition
const STYLE: QName = QName(b"style:style");
/// Font properties of a style
const TEXT_PROPERTIES: QName = QName(b"style:text-properties");
/// Cell properties of a style, holding the background color
const TABLE_CELL_PROPERTIES: QName = QName(b"style:table-cell-properties");
/// XML element name for table (sheet)
const TABLE: QName = QName(b"table:table");
/// XML element name for table row
const TABLE_ROW: QName = QName(b"table:table-row");
/// XML element name for table cell
const TABLE_CELL: QName = QName(b"table:table-cell");
/// XML element name for covered table cell (merged cells)
const TABLE_COVERED_CELL: QName = QName(b"table:covered-table-cell");
/// XML element name for annotations (comments)
const ANNOTATION: QName = QName(b"office:annotation");
/// XML element name for paragraph text
const PARAGRAPH: QName = QName(b"text:p");
/// XML element name for string (space) text
const STRING: QName = QName(b"text:s");
const TAB: QName = QName(b"text:tab");
const LINE_BREAK: QName = QName(b"text:line-break");

/// Longest chain of parent styles followed when resolving a style
const MAX_STYLE_DEPTH: usize = 8;

/// ODS spreadsheet handler for reading OpenDocument Spreadsheet files
pub(crate) struct OdsSpreadsheet {
    name: String,
    zip: ZipArchive<SourceReader>,
    /// Table names in document order
    sheets: Vec<String>,
    /// Cell styles by `style:name`
    styles: HashMap<String, CellStyle>,
}

impl OdsSpreadsheet {
    /// Validates an opened package and reads its table names and cell styles
    pub(crate) fn open(name: String, mut zip: ZipArchive<SourceReader>) -> Result<Self, SpreadsheetError> {
        check_mime(&name, &mut zip)?;
        if is_password_protected(&mut zip).with_prefix(&name)? {
            Err(SpreadsheetError::SpreadsheetPasswordProtectedError(name.to_owned()))?;
        }

        let mut style_sheet = StyleSheet::default();
        if let Some(mut reader) = zip.xml_reader("styles.xml")? {
            match_xml_events!(reader => {
                Event::Start(event) if event.name() == STYLE => style_sheet.start_style(&event)?,
                Event::End(event) if event.name() == STYLE => style_sheet.end_style(),
                Event::Start(event) if event.name() == TEXT_PROPERTIES => style_sheet.text_properties(&event)?,
                Event::Start(event) if event.name() == TABLE_CELL_PROPERTIES => style_sheet.cell_properties(&event)?,
            });
        }

        let mut sheets = Vec::<String>::new();
        let mut reader = zip.xml_reader("content.xml")?
            .ok_or_else(|| SpreadsheetError::FileError("content.xml".to_owned()))
            .with_prefix(&name)?;
        let mut table_depth = 0usize;
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == STYLE => style_sheet.start_style(&event)?,
            Event::End(event) if event.name() == STYLE => style_sheet.end_style(),
            Event::Start(event) if event.name() == TEXT_PROPERTIES => style_sheet.text_properties(&event)?,
            Event::Start(event) if event.name() == TABLE_CELL_PROPERTIES => style_sheet.cell_properties(&event)?,
            Event::Start(event) if event.name() == TABLE => {
                if table_depth == 0 {
                    let table_name = event.get_attribute_value("table:name")?.unwrap_or_default();
                    sheets.push(table_name.to_string());
                }
                table_depth += 1;
            }
            Event::End(event) if event.name() == TABLE => table_depth = table_depth.saturating_sub(1),
        });
        drop(reader);

        if sheets.is_empty() {
            Err(SpreadsheetError::SpreadsheetEmptyError(name.to_owned()))?;
        }
        let styles = style_sheet.resolve();
        debug!("Spreadsheet '{}' has tables {:?} and {} cell styles", name, sheets, styles.len());
        Ok(OdsSpreadsheet {
            name,
            zip,
            sheets,
            styles,
        })
    }
}

impl Spreadsheet for OdsSpreadsheet {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.to_owned()
    }

    /// Reads one table of `content.xml`, expanding repeated rows and columns
    /// only inside the request window.
    fn read_grid(&mut self, sheet_index: usize, request: &GridRequest) -> Result<Grid, SpreadsheetError> {
        let sheet_name = self.sheets
            .get(sheet_index)
            .cloned()
            .ok_or_else(|| SpreadsheetError::SheetNotFoundError(self.name.to_owned(), format!("#{sheet_index}")))?;
        let prefix = format!("{}[{}]", self.name, sheet_name);
        let mut builder = GridBuilder::new(request);
        let mut reader = self.zip
            .xml_reader("content.xml")?
            .ok_or_else(|| SpreadsheetError::FileError("content.xml".to_owned()))
            .with_prefix(&prefix)?;

        // Skip to the requested top level table
        let mut table_index = 0usize;
        let mut table_depth = 0usize;
        let mut is_found = false;
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TABLE => {
                if table_depth == 0 {
                    if table_index == sheet_index {
                        is_found = true;
                        break;
                    }
                    table_index += 1;
                }
                table_depth += 1;
            }
            Event::End(event) if event.name() == TABLE => table_depth = table_depth.saturating_sub(1),
        });
        if !is_found {
            Err(SpreadsheetError::SheetNotFoundError(self.name.to_owned(), sheet_name))?;
        }

        // Cell information
        let mut row = 0usize;
        let mut col = 0usize;
        let mut row_count = 1usize;
        let mut col_count = 1usize;
        let mut kind = CellType::default();
        let mut style = CellStyle::default();
        let mut value = String::new();
        // Parsing context
        let mut element_context = false; // collecting paragraph text
        let mut comment_context = false; // inside an annotation
        let mut nested_tables = 0usize;
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TABLE => nested_tables += 1,
            Event::End(event) if event.name() == TABLE => {
                if nested_tables == 0 {
                    break;
                }
                nested_tables -= 1;
            }
            Event::Start(event) if nested_tables == 0 && event.name() == TABLE_ROW => {
                row_count = event.parse_attribute_value("table:number-rows-repeated")?.unwrap_or(1);
                col = 0;
            }
            Event::End(event) if nested_tables == 0 && event.name() == TABLE_ROW => {
                row += row_count;
                if builder.after_row_upper_bound(row) {
                    break;
                }
            }
            Event::Start(event) if nested_tables == 0 && (event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL) => {
                value.clear();
                col_count = event.parse_attribute_value("table:number-columns-repeated")?.unwrap_or(1);
                style = match event.get_attribute_value("table:style-name")? {
                    Some(style_name) => self.styles.get(&*style_name).copied().unwrap_or_default(),
                    None => CellStyle::default(),
                };
                kind = match event.get_attribute_value("office:value-type")?.as_deref() {
                    Some("boolean") => {
                        let is_true = event.get_attribute_value("office:boolean-value")?
                            .map(|cow| cow != "false" && cow != "0")
                            .unwrap_or(false);
                        value.push_str(if is_true { "1" } else { "0" });
                        CellType::Boolean
                    }
                    Some("date") => {
                        if let Some(data) = event.get_attribute_value("office:date-value")? {
                            value.push_str(&data);
                        }
                        CellType::IsoDateTime
                    }
                    Some("time") => {
                        if let Some(data) = event.get_attribute_value("office:time-value")? {
                            value.push_str(&data);
                        }
                        CellType::IsoDuration
                    }
                    Some("string") => {
                        let is_error = event.get_attribute_value("calcext:value-type")?
                            .map(|cow| cow == "error")
                            .unwrap_or(false);
                        if is_error {
                            CellType::Error
                        } else {
                            CellType::InlineString
                        }
                    }
                    Some("float") | Some("percentage") | Some("currency") => {
                        if let Some(data) = event.get_attribute_value("office:value")? {
                            value.push_str(&data);
                        }
                        CellType::Number(NumberKind::Plain)
                    }
                    Some(other) => {
                        warn!("Unknown value type '{}' in {}", other, prefix);
                        CellType::InlineString
                    }
                    None => CellType::Empty,
                };
                element_context = matches!(kind, CellType::InlineString | CellType::Error);
            }
            Event::End(event) if nested_tables == 0 && (event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL) => {
                let cell_value = if kind == CellType::Empty || value.is_empty() {
                    CellValue::Empty
                } else {
                    CellValue::from_raw(kind, &value, false)
                };
                builder.push_run(row, row_count, col, col_count, GridCell::new(cell_value, style));
                col += col_count;
                element_context = false;
                comment_context = false;
            }
            // String content
            Event::Start(event) if element_context && event.name() == ANNOTATION => comment_context = true,
            Event::End(event) if element_context && comment_context && event.name() == ANNOTATION => comment_context = false,
            Event::Start(event) if element_context && !comment_context && event.name() == PARAGRAPH => {
                if !value.is_empty() {
                    value.push('\n');
                }
            }
            Event::Start(event) if element_context && !comment_context && event.name() == STRING => {
                let count = event.parse_attribute_value("text:c")?.unwrap_or(1);
                for _ in 0..count {
                    value.push(' ');
                }
            }
            Event::Start(event) if element_context && !comment_context && event.name() == TAB => value.push('\t'),
            Event::Start(event) if element_context && !comment_context && event.name() == LINE_BREAK => value.push('\n'),
            Event::Text(event) if element_context && !comment_context => value.push_bytes_text(&event)?,
            Event::GeneralRef(event) if element_context && !comment_context => value.push_bytes_ref(&event)?,
        });

        Ok(builder.finish())
    }
}

/// Properties declared by one style, unset ones come from the parent style
#[derive(Clone, Debug, Default)]
struct StyleProperties {
    parent: Option<String>,
    bold: Option<bool>,
    italic: Option<bool>,
    background: Option<Option<Rgb>>,
}

/// Collects `table-cell` styles from `styles.xml` and the automatic styles of `content.xml`
#[derive(Default)]
struct StyleSheet {
    styles: HashMap<String, StyleProperties>,
    current: Option<(String, StyleProperties)>,
}

impl StyleSheet {
    fn start_style(&mut self, event: &BytesStart) -> Result<(), SpreadsheetError> {
        let is_cell_style = event.get_attribute_value("style:family")?
            .map(|family| family == "table-cell")
            .unwrap_or(false);
        self.current = match event.get_attribute_value("style:name")? {
            Some(name) if is_cell_style => {
                let properties = StyleProperties {
                    parent: event.get_attribute_value("style:parent-style-name")?.map(|parent| parent.to_string()),
                    ..StyleProperties::default()
                };
                Some((name.to_string(), properties))
            }
            _ => None,
        };
        Ok(())
    }

    fn end_style(&mut self) {
        if let Some((name, properties)) = self.current.take() {
            self.styles.insert(name, properties);
        }
    }

    fn text_properties(&mut self, event: &BytesStart) -> Result<(), SpreadsheetError> {
        if let Some((_, properties)) = &mut self.current {
            if let Some(weight) = event.get_attribute_value("fo:font-weight")? {
                properties.bold = Some(weight == "bold" || weight.parse::<u32>().map(|it| it >= 600).unwrap_or(false));
            }
            if let Some(font_style) = event.get_attribute_value("fo:font-style")? {
                properties.italic = Some(font_style == "italic" || font_style == "oblique");
            }
        }
        Ok(())
    }

    fn cell_properties(&mut self, event: &BytesStart) -> Result<(), SpreadsheetError> {
        if let Some((_, properties)) = &mut self.current {
            if let Some(color) = event.get_attribute_value("fo:background-color")? {
                // "transparent" clears an inherited color
                properties.background = Some(Rgb::parse_hex(&color));
            }
        }
        Ok(())
    }

    /// Flattens parent chains into final cell styles
    fn resolve(&self) -> HashMap<String, CellStyle> {
        self.styles
            .keys()
            .map(|name| {
                let mut style = CellStyle::default();
                let (mut bold, mut italic, mut background) = (None, None, None);
                let mut next = Some(name);
                for _ in 0..MAX_STYLE_DEPTH {
                    let Some(properties) = next.and_then(|name| self.styles.get(name)) else {
                        break;
                    };
                    bold = bold.or(properties.bold);
                    italic = italic.or(properties.italic);
                    background = background.or(properties.background);
                    next = properties.parent.as_ref();
                }
                style.bold = bold.unwrap_or(false);
                style.italic = italic.unwrap_or(false);
                style.background = background.flatten();
                (name.to_owned(), style)
            })
            .collect()
    }
}

/// Validates that the archive declares the ODS MIME type
fn check_mime(name: &str, zip: &mut ZipArchive<SourceReader>) -> Result<(), SpreadsheetError> {
    if let Some(file) = &mut zip.file("mimetype")? {
        let mut mime_type = String::new();
        file.read_to_string(&mut mime_type)?;
        if !mime_type.trim().starts_with(MIME_TYPE) {
            Err(SpreadsheetError::MimeTypeError(name.to_owned()))?;
        }
    }
    Ok(())
}

/// Checks whether the manifest declares encrypted entries
fn is_password_protected(zip: &mut ZipArchive<SourceReader>) -> Result<bool, SpreadsheetError> {
    let mut reader = match zip.xml_reader("META-INF/manifest.xml")? {
        Some(reader) => reader,
        None => return Ok(false),
    };
    let mut in_file_entry = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == QName(b"manifest:file-entry") => in_file_entry = true,
        Event::End(event) if event.name() == QName(b"manifest:file-entry") => in_file_entry = false,
        Event::Start(event) if in_file_entry && event.name() == QName(b"manifest:encryption-data") => {
            return Ok(true);
        }
    });
    Ok(false)
}
