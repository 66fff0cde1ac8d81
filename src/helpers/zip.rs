//! Lookup helpers for the ZIP containers behind `.xlsx`, `.xlsb` and `.ods` files

use crate::helpers::biff12::Biff12Reader;
use crate::helpers::xml::XmlReader;
use crate::spreadsheet::SpreadsheetError;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::ZipArchive;

pub(crate) trait ZipHelper<RS: Read + Seek> {
    /// Finds an entry by name, ignoring ASCII case and backslash separators
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, SpreadsheetError>;

    /// Returns true when an entry with the given name exists
    fn contains(&self, name: &str) -> bool;

    /// Opens an entry as an XML event stream
    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, SpreadsheetError>;

    /// Opens an entry as a BIFF12 record stream
    fn biff12_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<Biff12Reader<BufReader<ZipFile<'_, RS>>>>, SpreadsheetError>;
}

impl<RS: Read + Seek> ZipHelper<RS> for ZipArchive<RS> {
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, SpreadsheetError> {
        let pattern = name.replace('\\', "/");
        let path = self.file_names()
            .find(|file_name| pattern.eq_ignore_ascii_case(&file_name.replace('\\', "/")))
            .map(|file_name| file_name.to_owned());
        match path.map(|file_name| self.by_name(&file_name)).transpose() {
            Ok(Some(file)) => Ok(Some(file)),
            Ok(None) | Err(ZipError::FileNotFound) => Ok(None),
            Err(error) => Err(error)?,
        }
    }

    fn contains(&self, name: &str) -> bool {
        let pattern = name.replace('\\', "/");
        self.file_names()
            .any(|file_name| pattern.eq_ignore_ascii_case(&file_name.replace('\\', "/")))
    }

    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, SpreadsheetError> {
        let reader = self
            .file(name)?
            .map(|file| XmlReader::new(BufReader::new(file)));
        Ok(reader)
    }

    fn biff12_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<Biff12Reader<BufReader<ZipFile<'_, RS>>>>, SpreadsheetError> {
        let reader = self
            .file(name)?
            .map(|file| Biff12Reader::new(BufReader::new(file)));
        Ok(reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn archive(entries: &[(&str, &str)]) -> ZipArchive<Cursor<Vec<u8>>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        let cursor = writer.finish().unwrap();
        ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap()
    }

    #[test]
    fn lookup_ignores_case_and_separators() {
        let mut zip = archive(&[("xl/Workbook.xml", "<workbook/>")]);
        assert!(zip.contains("XL/workbook.xml"));
        assert!(zip.contains("xl\\workbook.xml"));
        assert!(zip.file("xl\\WORKBOOK.xml").unwrap().is_some());
        assert!(zip.file("xl/styles.xml").unwrap().is_none());
        assert!(!zip.contains("content.xml"));
    }

    #[test]
    fn xml_reader_for_missing_entry_is_none() {
        let mut zip = archive(&[("content.xml", "<x/>")]);
        assert!(zip.xml_reader("styles.xml").unwrap().is_none());
        assert!(zip.xml_reader("content.xml").unwrap().is_some());
    }

    #[test]
    fn biff12_reader_reads_records() {
        let mut zip = archive(&[("xl/workbook.bin", "\u{1}\u{0}")]);
        assert!(zip.biff12_reader("xl/styles.bin").unwrap().is_none());
        let mut reader = zip.biff12_reader("XL/Workbook.bin").unwrap().unwrap();
        assert_eq!(reader.next().unwrap(), Some(1));
        assert_eq!(reader.next().unwrap(), None);
    }
}
