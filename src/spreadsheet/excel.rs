//! Office Open XML package helpers
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::CellStyle;
use crate::spreadsheet::cell::NumberKind;
use crate::spreadsheet::cell::Rgb;
use crate::spreadsheet::SpreadsheetError;
use log::debug;
use quick_xml::events::Event;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Read;
use std::io::Seek;
use zip::ZipArchive;

// Local names of the elements read from relationships and styles parts
const TAG_RELATIONSHIP: &[u8] = b"Relationship";
const TAG_CUSTOM_FORMATS: &[u8] = b"numFmts";
const TAG_CUSTOM_FORMAT: &[u8] = b"numFmt";
const TAG_FONTS: &[u8] = b"fonts";
const TAG_FONT: &[u8] = b"font";
const TAG_BOLD: &[u8] = b"b";
const TAG_ITALIC: &[u8] = b"i";
const TAG_FILLS: &[u8] = b"fills";
const TAG_FILL: &[u8] = b"fill";
const TAG_PATTERN_FILL: &[u8] = b"patternFill";
const TAG_FOREGROUND_COLOR: &[u8] = b"fgColor";
const TAG_CELL_FORMATS: &[u8] = b"cellXfs";
const TAG_CELL_FORMAT: &[u8] = b"xf";

/// Number format class and presentation of one `cellXfs` entry
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) struct CellFormat {
    pub(crate) number: NumberKind,
    pub(crate) style: CellStyle,
}

/// Loads worksheet relationships
///
/// # Returns
/// Mapping of relationship IDs to worksheet paths inside the archive
pub(crate) fn load_relationships<RS: Read + Seek>(
    zip: &mut ZipArchive<RS>,
    path: &str,
) -> Result<HashMap<String, String>, SpreadsheetError> {
    let mut reader = zip.xml_reader(path)?
        .ok_or_else(|| SpreadsheetError::FileError(path.to_string()))?;
    let mut relationships: HashMap<String, String> = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            // Only worksheets; chartsheets and dialog sheets carry no cells
            if kind.map(|it| it.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.to_string(), to_zip_path(target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Normalizes a relationship target to a path inside the archive
pub(crate) fn to_zip_path(path: Cow<'_, str>) -> String {
    if let Some(path) = path.strip_prefix('/') {
        path.to_string()
    } else if path.starts_with("xl/") {
        path.to_string()
    } else {
        format!("xl/{path}")
    }
}

/// Font flags of a workbook font table entry
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) struct Font {
    pub(crate) bold: bool,
    pub(crate) italic: bool,
}

impl Font {
    pub(crate) fn style(self, background: Option<Rgb>) -> CellStyle {
        CellStyle {
            bold: self.bold,
            italic: self.italic,
            background,
        }
    }
}

/// Resolves a number format id, custom formats first
pub(crate) fn number_kind(custom_formats: &HashMap<u32, NumberKind>, id: u32) -> NumberKind {
    custom_formats
        .get(&id)
        .copied()
        .or_else(|| NumberKind::from_builtin_id(id))
        .unwrap_or_default()
}

/// Default colors of the 64-entry indexed palette. Entries 0 to 7 repeat 8 to 15.
pub(crate) const DEFAULT_PALETTE: [Rgb; 64] = [
    Rgb(0x00, 0x00, 0x00), Rgb(0xFF, 0xFF, 0xFF), Rgb(0xFF, 0x00, 0x00), Rgb(0x00, 0xFF, 0x00),
    Rgb(0x00, 0x00, 0xFF), Rgb(0xFF, 0xFF, 0x00), Rgb(0xFF, 0x00, 0xFF), Rgb(0x00, 0xFF, 0xFF),
    Rgb(0x00, 0x00, 0x00), Rgb(0xFF, 0xFF, 0xFF), Rgb(0xFF, 0x00, 0x00), Rgb(0x00, 0xFF, 0x00),
    Rgb(0x00, 0x00, 0xFF), Rgb(0xFF, 0xFF, 0x00), Rgb(0xFF, 0x00, 0xFF), Rgb(0x00, 0xFF, 0xFF),
    Rgb(0x80, 0x00, 0x00), Rgb(0x00, 0x80, 0x00), Rgb(0x00, 0x00, 0x80), Rgb(0x80, 0x80, 0x00),
    Rgb(0x80, 0x00, 0x80), Rgb(0x00, 0x80, 0x80), Rgb(0xC0, 0xC0, 0xC0), Rgb(0x80, 0x80, 0x80),
    Rgb(0x99, 0x99, 0xFF), Rgb(0x99, 0x33, 0x66), Rgb(0xFF, 0xFF, 0xCC), Rgb(0xCC, 0xFF, 0xFF),
    Rgb(0x66, 0x00, 0x66), Rgb(0xFF, 0x80, 0x80), Rgb(0x00, 0x66, 0xCC), Rgb(0xCC, 0xCC, 0xFF),
    Rgb(0x00, 0x00, 0x80), Rgb(0xFF, 0x00, 0xFF), Rgb(0xFF, 0xFF, 0x00), Rgb(0x00, 0xFF, 0xFF),
    Rgb(0x80, 0x00, 0x80), Rgb(0x80, 0x00, 0x00), Rgb(0x00, 0x80, 0x80), Rgb(0x00, 0x00, 0xFF),
    Rgb(0x00, 0xCC, 0xFF), Rgb(0xCC, 0xFF, 0xFF), Rgb(0xCC, 0xFF, 0xCC), Rgb(0xFF, 0xFF, 0x99),
    Rgb(0x99, 0xCC, 0xFF), Rgb(0xFF, 0x99, 0xCC), Rgb(0xCC, 0x99, 0xFF), Rgb(0xFF, 0xCC, 0x99),
    Rgb(0x33, 0x66, 0xFF), Rgb(0x33, 0xCC, 0xCC), Rgb(0x99, 0xCC, 0x00), Rgb(0xFF, 0xCC, 0x00),
    Rgb(0xFF, 0x99, 0x00), Rgb(0xFF, 0x66, 0x00), Rgb(0x66, 0x66, 0x99), Rgb(0x96, 0x96, 0x96),
    Rgb(0x00, 0x33, 0x66), Rgb(0x33, 0x99, 0x66), Rgb(0x00, 0x33, 0x00), Rgb(0x33, 0x33, 0x00),
    Rgb(0x99, 0x33, 0x00), Rgb(0x99, 0x33, 0x66), Rgb(0x33, 0x33, 0x99), Rgb(0x33, 0x33, 0x33),
];

/// Reads `xl/styles.xml` into one [`CellFormat`] per `cellXfs` entry.
/// Workbooks without a styles part have no formats.
pub(crate) fn load_cell_formats<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<Vec<CellFormat>, SpreadsheetError> {
    let mut reader = match zip.xml_reader("xl/styles.xml")? {
        Some(reader) => reader,
        None => return Ok(Vec::new()),
    };

    let mut custom_formats = HashMap::<u32, NumberKind>::new();
    let mut fonts = Vec::<Font>::new();
    let mut fills = Vec::<Option<Rgb>>::new();
    let mut format_indexes = Vec::<(u32, usize, usize)>::new();

    let mut custom_formats_context = false;
    let mut fonts_context = false;
    let mut fills_context = false;
    let mut is_solid_fill = false;
    let mut format_indexes_context = false;

    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_CUSTOM_FORMATS => custom_formats_context = true,
        Event::End(event) if event.local_name().as_ref() == TAG_CUSTOM_FORMATS => custom_formats_context = false,
        Event::Start(event) if custom_formats_context && event.local_name().as_ref() == TAG_CUSTOM_FORMAT => {
            let id = event.parse_attribute_value::<u32>("numFmtId")?;
            let format = event.get_attribute_value("formatCode")?;
            if let Some((id, format)) = id.zip(format) {
                custom_formats.insert(id, NumberKind::from_format_code(&format));
            }
        }

        Event::Start(event) if event.local_name().as_ref() == TAG_FONTS => fonts_context = true,
        Event::End(event) if event.local_name().as_ref() == TAG_FONTS => fonts_context = false,
        Event::Start(event) if fonts_context && event.local_name().as_ref() == TAG_FONT => fonts.push(Font::default()),
        Event::Start(event) if fonts_context && event.local_name().as_ref() == TAG_BOLD => {
            if let Some(font) = fonts.last_mut() {
                font.bold = event.is_toggled_on()?;
            }
        }
        Event::Start(event) if fonts_context && event.local_name().as_ref() == TAG_ITALIC => {
            if let Some(font) = fonts.last_mut() {
                font.italic = event.is_toggled_on()?;
            }
        }

        Event::Start(event) if event.local_name().as_ref() == TAG_FILLS => fills_context = true,
        Event::End(event) if event.local_name().as_ref() == TAG_FILLS => fills_context = false,
        Event::Start(event) if fills_context && event.local_name().as_ref() == TAG_FILL => fills.push(None),
        Event::Start(event) if fills_context && event.local_name().as_ref() == TAG_PATTERN_FILL => {
            is_solid_fill = event.get_attribute_value("patternType")?
                .map(|pattern| pattern == "solid")
                .unwrap_or(false);
        }
        Event::Start(event) if fills_context && is_solid_fill && event.local_name().as_ref() == TAG_FOREGROUND_COLOR => {
            // Theme and indexed colors are left out
            if let Some(fill) = fills.last_mut() {
                *fill = event.get_attribute_value("rgb")?.and_then(|rgb| Rgb::parse_hex(&rgb));
            }
        }

        Event::Start(event) if event.local_name().as_ref() == TAG_CELL_FORMATS => format_indexes_context = true,
        Event::End(event) if event.local_name().as_ref() == TAG_CELL_FORMATS => format_indexes_context = false,
        Event::Start(event) if format_indexes_context && event.local_name().as_ref() == TAG_CELL_FORMAT => {
            format_indexes.push((
                event.parse_attribute_value("numFmtId")?.unwrap_or(0),
                event.parse_attribute_value("fontId")?.unwrap_or(0),
                event.parse_attribute_value("fillId")?.unwrap_or(0),
            ));
        }
    });
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <numFmts count="1"><numFmt numFmtId="164" formatCode="yyyy\-mm\-dd"/></numFmts>
  <fonts count="3">
    <font><sz val="11"/><name val="Calibri"/></font>
    <font><b/><sz val="11"/></font>
    <font><b val="0"/><i/></font>
  </fonts>
  <fills count="3">
    <fill><patternFill patternType="none"/></fill>
    <fill><patternFill patternType="gray125"/></fill>
    <fill><patternFill patternType="solid"><fgColor rgb="FFFFFF00"/><bgColor indexed="64"/></patternFill></fill>
  </fills>
  <cellStyleXfs count="1"><xf numFmtId="0" fontId="1" fillId="2"/></cellStyleXfs>
  <cellXfs count="4">
    <xf numFmtId="0" fontId="0" fillId="0" xfId="0"/>
    <xf numFmtId="164" fontId="1" fillId="0" xfId="0" applyNumberFormat="1"/>
    <xf numFmtId="22" fontId="2" fillId="2" xfId="0"/>
    <xf numFmtId="4" fontId="9" fillId="9" xfId="0"/>
  </cellXfs>
  <dxfs count="1"><dxf><font><b/></font><fill><patternFill><bgColor rgb="FF00FF00"/></patternFill></fill></dxf></dxfs>
</styleSheet>"#;

    fn archive(entries: &[(&str, &str)]) -> ZipArchive<Cursor<Vec<u8>>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        ZipArchive::new(Cursor::new(writer.finish().unwrap().into_inner())).unwrap()
    }

    #[test]
    fn zip_paths() {
        assert_eq!(to_zip_path(Cow::from("worksheets/sheet1.xml")), "xl/worksheets/sheet1.xml");
        assert_eq!(to_zip_path(Cow::from("/xl/worksheets/sheet1.xml")), "xl/worksheets/sheet1.xml");
        assert_eq!(to_zip_path(Cow::from("xl/worksheets/sheet1.xml")), "xl/worksheets/sheet1.xml");
    }

    #[test]
    fn relationships_keep_worksheets_only() {
        let mut zip = archive(&[(
            "xl/_rels/workbook.xml.rels",
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
              <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
              <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
            </Relationships>"#,
        )]);
        let relationships = load_relationships(&mut zip, "xl/_rels/workbook.xml.rels").unwrap();
        assert_eq!(relationships.len(), 1);
        assert_eq!(relationships["rId1"], "xl/worksheets/sheet1.xml");
    }

    #[test]
    fn missing_relationships_part() {
        let mut zip = archive(&[("xl/workbook.xml", "<workbook/>")]);
        assert!(matches!(
            load_relationships(&mut zip, "xl/_rels/workbook.xml.rels"),
            Err(SpreadsheetError::FileError(_))
        ));
    }

    #[test]
    fn cell_formats_from_styles() {
        let mut zip = archive(&[("xl/styles.xml", STYLES)]);
        let formats = load_cell_formats(&mut zip).unwrap();
        assert_eq!(formats.len(), 4);
        assert_eq!(formats[0], CellFormat::default());
        assert_eq!(formats[1].number, NumberKind::Date);
        assert!(formats[1].style.bold);
        assert_eq!(formats[1].style.background, None);
        assert_eq!(formats[2].number, NumberKind::DateTime);
        assert_eq!(
            formats[2].style,
            CellStyle {
                bold: false,
                italic: true,
                background: Some(Rgb(0xFF, 0xFF, 0x00)),
            }
        );
        // Dangling font and fill ids fall back to a plain style
        assert_eq!(formats[3], CellFormat::default());
    }

    #[test]
    fn custom_number_formats_shadow_builtin_ids() {
        let custom_formats = HashMap::from([(14, NumberKind::Plain), (164, NumberKind::Time)]);
        assert_eq!(number_kind(&custom_formats, 14), NumberKind::Plain);
        assert_eq!(number_kind(&custom_formats, 164), NumberKind::Time);
        assert_eq!(number_kind(&custom_formats, 22), NumberKind::DateTime);
        assert_eq!(number_kind(&custom_formats, 165), NumberKind::Plain);
    }

    #[test]
    fn indexed_palette() {
        assert_eq!(DEFAULT_PALETTE[2], DEFAULT_PALETTE[10]);
        assert_eq!(DEFAULT_PALETTE[13], Rgb(0xFF, 0xFF, 0x00));
        assert_eq!(DEFAULT_PALETTE[22], Rgb(0xC0, 0xC0, 0xC0));
    }

    #[test]
    fn no_styles_part() {
        let mut zip = archive(&[("xl/workbook.xml", "<workbook/>")]);
        assert!(load_cell_formats(&mut zip).unwrap().is_empty());
    }
}
