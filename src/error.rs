use crate::spreadsheet::reference::ReferenceError;
use crate::spreadsheet::SpreadsheetError;
use thiserror::Error;

/// Errors returned by table extraction
#[derive(Error, Debug)]
pub enum ExcelTableError {
    /// An endpoint is neither a named address nor a non-negative "column,row" pair
    #[error(transparent)]
    InvalidAddress(#[from] ReferenceError),

    #[error("No spreadsheet file given")]
    MissingSource,

    /// Any failure of the grid loader, passed through unchanged
    #[error("{0}")]
    SourceRead(#[from] SpreadsheetError),

    #[error("Invalid value for option '{name}': {message}")]
    InvalidOption { name: String, message: String },
}

impl ExcelTableError {
    pub(crate) fn invalid_option(name: &str, message: impl Into<String>) -> Self {
        ExcelTableError::InvalidOption {
            name: name.to_owned(),
            message: message.into(),
        }
    }
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, SpreadsheetError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| SpreadsheetError::WithContextError(format!("{}: {}", message, e)))
    }
}
