use crate::trend::TIMESTAMP_COLUMN;
use thiserror::Error;

/// Low-level error raised while decoding a spreadsheet file.
/// Aggregates errors from the standard library, dependencies and the reader modules.
#[derive(Error, Debug)]
pub(crate) enum SheetError {
    #[error("{0}")]
    WithContextError(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    ParseFloatError(#[from] std::num::ParseFloatError),

    #[error("{0}")]
    StringEncodingError(#[from] std::str::Utf8Error),

    // Third-party library errors
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    // Helper module errors
    #[error("{0}")]
    CfbHelperError(#[from] crate::helpers::cfb::CfbError),

    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    #[error("{0}")]
    Biff8HelperError(#[from] crate::helpers::biff8::Biff8Error),

    // Spreadsheet module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    #[error("{0}")]
    XlsError(#[from] crate::spreadsheet::xls::XlsError),
}

/// The spreadsheet does not have the shape the trend pipeline expects.
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("missing required column '{0}'")]
    MissingColumn(String),

    #[error("Cannot detect spreadsheet format for '{0}'")]
    UnsupportedFile(String),

    #[error("Parse '{file}' failed: {message}")]
    Unparseable { file: String, message: String },
}

/// Generation parameters violate their constraints.
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Please enter positive integers! ({field} = {value})")]
    NotPositive { field: &'static str, value: i64 },

    #[error("Number of channels cannot exceed 50! (got {0})")]
    TooManyChannels(i64),

    #[error("Please enter positive integers! ({field} = '{value}')")]
    NotAnInteger { field: &'static str, value: String },

    #[error("Unknown generation mode '{0}'")]
    UnknownMode(String),

    #[error("{points} points every {interval} seconds run past the last representable date")]
    TimeSpanOverflow { interval: i64, points: i64 },

    #[error("Cannot allocate {0} points per channel")]
    TooManyPoints(i64),
}

/// Error returned by every public operation of the crate.
#[derive(Error, Debug)]
pub enum TrendError {
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown channel '{0}'")]
    UnknownChannel(String),

    #[error("No spreadsheet has been loaded yet")]
    NothingLoaded,
}

impl TrendError {
    /// Wraps a decoding failure of `file`. I/O failures keep their kind.
    pub(crate) fn from_sheet(file: &str, error: SheetError) -> Self {
        match error {
            SheetError::IoError(error) => TrendError::Io(error),
            SheetError::ZipError(zip::result::ZipError::Io(error)) => TrendError::Io(error),
            error => TrendError::Format(FormatError::Unparseable {
                file: file.to_owned(),
                message: error.to_string(),
            }),
        }
    }

    pub(crate) fn missing_timestamp_column() -> Self {
        TrendError::Format(FormatError::MissingColumn(TIMESTAMP_COLUMN.to_owned()))
    }
}

pub(crate) trait ResultOptionChain {
    fn ok_none_else<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Self;
}

impl<T, E> ResultOptionChain for Result<Option<T>, E> {
    fn ok_none_else<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Self,
    {
        match self {
            Ok(None) => f(),
            _ => self,
        }
    }
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, SheetError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| SheetError::WithContextError(format!("{}: {}", message, e)))
    }
}
