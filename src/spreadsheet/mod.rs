//! # Spreadsheet Module
//!
//! Readers for the first worksheet of Excel workbooks (`.xlsx`, `.xlsm`,
//! `.xlam` and legacy `.xls`, `.xla`) and a writer for `.xlsx` workbooks.
//! Readers produce a [`Sheet`] of typed cells; interpretation of those cells
//! is left to the caller.
pub(crate) mod cell;
pub(crate) mod excel;
pub(crate) mod reference;
pub(crate) mod sheet;
pub(crate) mod writer;
pub(crate) mod xls;
pub(crate) mod xlsx;

use crate::error::SheetError;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::xls::XlsSpreadsheet;
use crate::spreadsheet::xlsx::XlsxSpreadsheet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub(crate) enum SpreadsheetError {
    #[error("Part '{0}' is missing from the workbook")]
    FileError(String),

    #[error("Spreadsheet '{0}' has no worksheets")]
    SpreadsheetEmptyError(String),

    #[error("Spreadsheet '{0}' is password protected")]
    SpreadsheetPasswordProtectedError(String),

    #[error("Cell {2} of sheet '{1}' in '{0}' refers to missing shared string '{3}'")]
    SharedStringError(String, String, String, String),
}

/// Buffered reader over a workbook on disk
pub(crate) type FileReader = BufReader<File>;

/// Common interface of the workbook readers.
pub(crate) trait Spreadsheet {
    /// Returns the file name of this spreadsheet
    fn name(&self) -> String;

    /// Worksheet names in workbook order
    fn sheet_names(&self) -> Vec<String>;

    /// Loads the shared string table (empty when the workbook has none)
    fn load_shared_strings(&mut self) -> Result<Vec<String>, SheetError>;

    /// Reads the worksheet at `index` (0-based, workbook order)
    fn read_sheet(&mut self, index: usize) -> Result<Sheet, SheetError>;
}

/// Workbook container formats, chosen by file extension.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum SpreadsheetFormat {
    /// Office Open XML package
    Xlsx,
    /// BIFF8 stream inside an OLE compound file
    Xls,
}

impl SpreadsheetFormat {
    pub(crate) fn detect(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "xlsx" | "xlsm" | "xlam" => Some(Self::Xlsx),
            "xls" | "xla" => Some(Self::Xls),
            _ => None,
        }
    }
}

/// Opens a workbook with the reader for `format`.
pub(crate) fn open_spreadsheet(path: &Path, format: SpreadsheetFormat) -> Result<Box<dyn Spreadsheet>, SheetError> {
    Ok(match format {
        SpreadsheetFormat::Xlsx => Box::new(XlsxSpreadsheet::open(path)?),
        SpreadsheetFormat::Xls => Box::new(XlsSpreadsheet::open(path)?),
    })
}

/// Reads the first worksheet of a workbook with shared strings resolved.
pub(crate) fn read_first_sheet(path: &Path, format: SpreadsheetFormat) -> Result<Sheet, SheetError> {
    let mut spreadsheet = open_spreadsheet(path, format)?;
    if spreadsheet.sheet_names().is_empty() {
        Err(SpreadsheetError::SpreadsheetEmptyError(spreadsheet.name()))?;
    }
    let mut sheet = spreadsheet.read_sheet(0)?;
    if sheet.cells.iter().any(|cell| cell.kind == cell::CellType::SharedString) {
        let shared_strings = spreadsheet.load_shared_strings()?;
        sheet.resolve_shared_strings(&shared_strings)?;
    }
    Ok(sheet)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_formats_by_extension() {
        assert_eq!(SpreadsheetFormat::detect(Path::new("trend.xlsx")), Some(SpreadsheetFormat::Xlsx));
        assert_eq!(SpreadsheetFormat::detect(Path::new("Trend.XLSM")), Some(SpreadsheetFormat::Xlsx));
        assert_eq!(SpreadsheetFormat::detect(Path::new("old/trend.xls")), Some(SpreadsheetFormat::Xls));
        assert_eq!(SpreadsheetFormat::detect(Path::new("trend.csv")), None);
        assert_eq!(SpreadsheetFormat::detect(Path::new("trend")), None);
    }
}
