use crate::spreadsheet::source::Source;
use crate::spreadsheet::SpreadsheetError;
use log::debug;
use std::fs::File;
use std::io::BufReader;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::sync::Arc;
use url::Url;

/// Signature of the compound file container used by legacy `.xls` workbooks
/// and by password protected OOXML packages.
const CFB_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
/// Local file header signature that starts every ZIP archive
const ZIP_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// Container detected from the first bytes of a source
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum Container {
    Zip,
    CompoundFile,
    Unknown,
}

/// A seekable reader over a local file, caller bytes or a downloaded body
pub(crate) enum SourceReader {
    /// Local file reader
    Local(BufReader<File>),
    /// Bytes handed over by the caller
    Memory(Cursor<Arc<[u8]>>),
    /// Remote URL reader (in-memory buffer)
    Remote(Cursor<Vec<u8>>),
}

impl SourceReader {
    /// Opens the bytes behind a source for reading
    pub(crate) fn open(source: &Source) -> Result<SourceReader, SpreadsheetError> {
        match source {
            Source::Path(path) => {
                let file = File::open(path)?;
                Ok(SourceReader::Local(BufReader::new(file)))
            }
            Source::Bytes { bytes, .. } => Ok(SourceReader::Memory(Cursor::new(Arc::clone(bytes)))),
            Source::Url(url) => Self::download(url),
        }
    }

    /// Fetches the whole body of an HTTP(S) URL
    fn download(url: &Url) -> Result<SourceReader, SpreadsheetError> {
        let response = reqwest::blocking::get(url.as_str())?.error_for_status()?;
        let body = response.bytes()?;
        if body.is_empty() {
            Err(SpreadsheetError::RemoteFileNoDataError(url.to_string()))?
        }
        debug!("Downloaded {} bytes from {}", body.len(), url);
        Ok(SourceReader::Remote(Cursor::new(body.to_vec())))
    }

    /// Peeks at the leading signature and rewinds to the start
    pub(crate) fn container(&mut self) -> Result<Container, SpreadsheetError> {
        let mut header = [0u8; 8];
        let mut length = 0usize;
        while length < header.len() {
            let count = self.read(&mut header[length..])?;
            if count == 0 {
                break;
            }
            length += count;
        }
        self.seek(SeekFrom::Start(0))?;

        let container = if length >= ZIP_SIGNATURE.len() && header[..ZIP_SIGNATURE.len()] == ZIP_SIGNATURE {
            Container::Zip
        } else if length == CFB_SIGNATURE.len() && header == CFB_SIGNATURE {
            Container::CompoundFile
        } else {
            Container::Unknown
        };
        Ok(container)
    }
}

impl Read for SourceReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            SourceReader::Local(reader) => reader.read(buf),
            SourceReader::Memory(reader) => reader.read(buf),
            SourceReader::Remote(reader) => reader.read(buf),
        }
    }
}

impl Seek for SourceReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        match self {
            SourceReader::Local(reader) => reader.seek(pos),
            SourceReader::Memory(reader) => reader.seek(pos),
            SourceReader::Remote(reader) => reader.seek(pos),
        }
    }
}
