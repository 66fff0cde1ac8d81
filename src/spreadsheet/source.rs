use crate::spreadsheet::SpreadsheetError;
use std::fmt::Display;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

/// Where the workbook bytes come from.
#[derive(Clone, Debug)]
pub enum Source {
    /// A workbook on the local file system
    Path(PathBuf),
    /// A workbook already held in memory, e.g. read from an open file handle.
    /// The name is only used for format detection and messages.
    Bytes { name: String, bytes: Arc<[u8]> },
    /// A workbook fetched over HTTP(S) when it is opened
    Url(Url),
}

impl Source {
    /// Parses a user supplied location: a plain path, a `file://` URL or an
    /// `http(s)://` URL.
    ///
    /// Other schemes (`s3`, `ftp`, ...) are rejected; fetch such workbooks
    /// first and pass the content through [`Source::from_bytes`].
    pub fn parse(location: &str) -> Result<Source, SpreadsheetError> {
        match Url::parse(location) {
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map(Source::Path)
                .map_err(|_| SpreadsheetError::SourceError(location.to_owned())),
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Source::Url(url)),
            // Single letter schemes are Windows drive letters such as `C:\data.xlsx`
            Ok(url) if url.scheme().len() > 1 => Err(SpreadsheetError::SourceError(location.to_owned())),
            _ => Ok(Source::Path(PathBuf::from(location))),
        }
    }

    /// Wraps bytes that are already in memory
    pub fn from_bytes(name: &str, bytes: Vec<u8>) -> Source {
        Source::Bytes {
            name: name.to_owned(),
            bytes: Arc::from(bytes),
        }
    }

    /// Reads an open binary handle to the end and keeps its content
    pub fn from_reader<R: Read>(name: &str, mut reader: R) -> Result<Source, SpreadsheetError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(Source::from_bytes(name, bytes))
    }

    /// Display name used in error messages
    pub fn name(&self) -> String {
        match self {
            Source::Path(path) => path.to_string_lossy().to_string(),
            Source::Bytes { name, .. } => name.to_owned(),
            Source::Url(url) => url.to_string(),
        }
    }

    /// Lower-cased file extension, if the name carries one
    pub fn extension(&self) -> Option<String> {
        let name = match self {
            Source::Path(path) => path.to_string_lossy(),
            Source::Bytes { name, .. } => name.into(),
            Source::Url(url) => url.path().into(),
        };
        Path::new(&*name)
            .extension()
            .and_then(|extension| extension.to_str())
            .map(|extension| extension.to_ascii_lowercase())
    }
}

impl From<&str> for Source {
    fn from(path: &str) -> Self {
        Source::Path(PathBuf::from(path))
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::Path(path)
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Source::Path(path.to_path_buf())
    }
}

impl Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parse_plain_paths() {
        match Source::parse("doc/example/cartoons.xlsx").unwrap() {
            Source::Path(path) => assert_eq!(path, PathBuf::from("doc/example/cartoons.xlsx")),
            other => panic!("unexpected source {other:?}"),
        }
        assert!(matches!(Source::parse("C:\\data\\book.xlsx").unwrap(), Source::Path(_)));
    }

    #[test]
    fn parse_file_url() {
        match Source::parse("file:///tmp/book.ods").unwrap() {
            Source::Path(path) => assert_eq!(path, PathBuf::from("/tmp/book.ods")),
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[test]
    fn parse_http_url() {
        let source = Source::parse("https://example.com/files/Cartoons.XLS?raw=1").unwrap();
        assert!(matches!(source, Source::Url(_)));
        assert_eq!(source.extension().as_deref(), Some("xls"));
        assert_eq!(source.name(), "https://example.com/files/Cartoons.XLS?raw=1");
    }

    #[test]
    fn parse_other_schemes_is_rejected() {
        assert!(matches!(
            Source::parse("s3://bucket/book.xlsx"),
            Err(SpreadsheetError::SourceError(_))
        ));
        assert!(Source::parse("ftp://example.com/book.xlsx").is_err());
    }

    #[test]
    fn extension_is_lower_case() {
        assert_eq!(Source::from("Book.XLSX").extension().as_deref(), Some("xlsx"));
        assert_eq!(Source::from_bytes("stdin", Vec::new()).extension(), None);
    }

    #[test]
    fn from_reader_keeps_content() {
        let source = Source::from_reader("handle.ods", Cursor::new(b"abc".to_vec())).unwrap();
        match source {
            Source::Bytes { name, bytes } => {
                assert_eq!(name, "handle.ods");
                assert_eq!(&bytes[..], b"abc");
            }
            other => panic!("unexpected source {other:?}"),
        }
    }
}
