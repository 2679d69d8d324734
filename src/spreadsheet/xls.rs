use crate::error::ResultMessage;
use crate::error::ResultOptionChain;
use crate::error::SheetError;
use crate::helpers::biff8::Biff8Reader;
use crate::helpers::cfb::Cfb;
use crate::match_biff8_record;
use crate::spreadsheet::cell::to_error_value;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::excel::load_number_formats;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use either::Either;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

// BIFF8 record types
const FORMULA: u16 = 6;
const EOF: u16 = 10;
const DATE1904: u16 = 34;
const FILE_PASS: u16 = 47;
const CODE_PAGE: u16 = 66;
const BOUND_SHEET8: u16 = 133;
const MUL_RK: u16 = 189;
const XF: u16 = 224;
const SST: u16 = 252;
const LABEL_SST: u16 = 253;
const NUMBER: u16 = 515;
const LABEL: u16 = 516;
const BOOL_ERR: u16 = 517;
const STRING: u16 = 519;       // Cached string result of the preceding FORMULA
const RK: u16 = 638;
const FORMAT: u16 = 1054;
const BOF: u16 = 2057;

// BoundSheet8 `dt` value of a worksheet (others are charts and macro sheets)
const WORKSHEET: u8 = 0;

#[derive(Error, Debug)]
pub(crate) enum XlsError {
    #[error("Invalid Code page '{0}'")]
    CodePageError(u16),

    #[error("Invalid Formula value '{0}'")]
    FormulaValueError(u64),
}

/// A legacy Excel 97-2003 workbook (.xls, .xla)
pub(crate) struct XlsSpreadsheet {
    pub(crate) name: String,
    reader: Biff8Reader,
    shared_strings: Vec<String>,
    /// Cell type implied by each XF record, indexed by XF id
    number_formats: Vec<CellType>,
    /// Worksheets with the stream offset of their BOF record
    sheets: Vec<(String, usize)>,
}

impl XlsSpreadsheet {
    /// Opens the compound file and reads the workbook globals substream
    pub(crate) fn open(path: &Path) -> Result<XlsSpreadsheet, SheetError> {
        let file_name = path.display().to_string();
        let mut buf_reader = BufReader::new(File::open(path)?);
        let cfb = Cfb::new(&mut buf_reader).with_prefix(&format!("Open '{file_name}'"))?;
        let mut reader = cfb.read("Workbook")
            .ok_none_else(|| cfb.read("Book"))?
            .map(Biff8Reader::new)
            .ok_or_else(|| SpreadsheetError::SpreadsheetEmptyError(file_name.to_owned()))?;
        let mut is_1904 = false;
        let mut shared_strings = Vec::new();
        let mut custom_formats: HashMap<String, CellType> = HashMap::new();
        let mut format_indexes: Vec<String> = Vec::new();
        let mut sheets: Vec<(String, usize)> = Vec::new();
        match_biff8_record!(reader => {
            EOF => break,
            FILE_PASS if reader.read_u16()? != 0 => Err(SpreadsheetError::SpreadsheetPasswordProtectedError(file_name.to_owned()))?,
            DATE1904 if reader.read_u16()? == 1 => is_1904 = true,
            CODE_PAGE => {
                let code_page = reader.read_u16()?;
                reader.encoding = codepage::to_encoding(code_page).ok_or(XlsError::CodePageError(code_page))?;
            }
            FORMAT => {
                let id = reader.read_u16()?;
                let format = reader.read_xl_unicode_string()?;
                custom_formats.insert(
                    id.to_string(),
                    CellType::parse_custom_number_format(&format, is_1904),
                );
            }
            XF => {
                reader.skip(2)?;
                let id = reader.read_u16()?;
                format_indexes.push(id.to_string());
            }
            SST => shared_strings = load_shared_strings(&mut reader)?,
            BOUND_SHEET8 => {
                let pointer = reader.read_usize()?;
                reader.skip(1)?;
                let sheet_type = reader.read_u8()?;
                let sheet_name = reader.read_short_xl_unicode_string()?;
                if sheet_type == WORKSHEET {
                    sheets.push((sheet_name, pointer));
                }
            }
        });
        if sheets.is_empty() {
            Err(SpreadsheetError::SpreadsheetEmptyError(file_name.to_owned()))?
        }

        let number_formats = load_number_formats(format_indexes, custom_formats, is_1904);

        Ok(XlsSpreadsheet {
            name: file_name,
            reader,
            shared_strings,
            number_formats,
            sheets,
        })
    }

    fn number_format(&self, index: usize) -> CellType {
        self.number_formats.get(index).copied().unwrap_or(CellType::Number)
    }
}

impl Spreadsheet for XlsSpreadsheet {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.to_owned()).collect()
    }

    /// The SST lives in the globals substream, so it is already loaded
    fn load_shared_strings(&mut self) -> Result<Vec<String>, SheetError> {
        Ok(self.shared_strings.to_owned())
    }

    fn read_sheet(&mut self, index: usize) -> Result<Sheet, SheetError> {
        let (sheet_name, pointer) = self.sheets.get(index)
            .cloned()
            .ok_or_else(|| SpreadsheetError::SpreadsheetEmptyError(self.name.to_owned()))?;
        self.reader.goto(pointer);
        self.reader.next()?;
        let mut sheet = Sheet::new(&self.name, &sheet_name);
        while let Some(tag) = self.reader.next()? {
            match tag {
                BOF | EOF => break,
                MUL_RK => {
                    let row = self.reader.read_u16()? as usize;
                    let col_lower_bound = self.reader.read_u16()? as usize;
                    let col_upper_bound = self.reader.get_u16_back(2)? as usize;
                    for col in col_lower_bound..=col_upper_bound {
                        let index = self.reader.read_u16()? as usize;
                        let kind = self.number_format(index);
                        let value = self.reader.read_rk_number()?;
                        sheet.push(Cell {
                            row,
                            col,
                            kind,
                            value,
                        });
                    }
                }
                BOOL_ERR | NUMBER | RK | LABEL_SST | LABEL | FORMULA => {
                    let row = self.reader.read_u16()? as usize;
                    let col = self.reader.read_u16()? as usize;
                    let (either, value) = match tag {
                        BOOL_ERR => read_bool_or_error_cell(&mut self.reader)?,
                        NUMBER => read_number_cell(&mut self.reader)?,
                        RK => read_rk_cell(&mut self.reader)?,
                        LABEL_SST => read_label_sst_cell(&mut self.reader)?,
                        LABEL => read_label_cell(&mut self.reader)?,
                        _ => read_formula_cell(&mut self.reader)?,
                    };
                    let kind = match either {
                        Either::Left(kind) => kind,
                        Either::Right(index) => self.number_format(index),
                    };
                    if !value.is_empty() {
                        sheet.push(Cell {
                            row,
                            col,
                            kind,
                            value,
                        });
                    }
                }
                _ => (),
            }
        }

        Ok(sheet)
    }
}

fn load_shared_strings(reader: &mut Biff8Reader) -> Result<Vec<String>, SheetError> {
    let mut shared_strings: Vec<String> = Vec::new();
    reader.skip(4)?;
    let count = reader.read_usize()?;
    for _ in 0..count {
        let string = reader.read_xl_unicode_rich_extended_string()?;
        shared_strings.push(string);
    }
    Ok(shared_strings)
}

/// BoolErr: a boolean, or an error code when the flag byte is set
fn read_bool_or_error_cell(reader: &mut Biff8Reader) -> Result<(Either<CellType, usize>, String), SheetError> {
    reader.skip(2)?;
    let value = reader.read_u8()?;
    let flag = reader.read_u8()?;
    Ok(if flag == 0 {
        (Either::Left(CellType::Boolean), value.to_string())
    } else {
        (Either::Left(CellType::Error), to_error_value(value).to_owned())
    })
}

fn read_number_cell(reader: &mut Biff8Reader) -> Result<(Either<CellType, usize>, String), SheetError> {
    let index = reader.read_u16()? as usize;
    let value = reader.read_f64()?;
    Ok((Either::Right(index), value.to_string()))
}

fn read_rk_cell(reader: &mut Biff8Reader) -> Result<(Either<CellType, usize>, String), SheetError> {
    let index = reader.read_u16()? as usize;
    let value = reader.read_rk_number()?;
    Ok((Either::Right(index), value))
}

/// LabelSst: the value is an index into the SST
fn read_label_sst_cell(reader: &mut Biff8Reader) -> Result<(Either<CellType, usize>, String), SheetError> {
    reader.skip(2)?;
    let value = reader.read_usize()?;
    Ok((Either::Left(CellType::SharedString), value.to_string()))
}

fn read_label_cell(reader: &mut Biff8Reader) -> Result<(Either<CellType, usize>, String), SheetError> {
    reader.skip(2)?;
    let value = reader.read_xl_unicode_string()?;
    Ok((Either::Left(CellType::Text), value))
}

/// Formula: only the cached result is read. Non-numeric results are tagged
/// by 0xFFFF in the top two bytes, with the result type in the low byte.
fn read_formula_cell(
    reader: &mut Biff8Reader,
) -> Result<(Either<CellType, usize>, String), SheetError> {
    let index = reader.read_u16()? as usize;
    let formula = reader.read_u64()?;
    let is_number = (formula & 0xFFFF000000000000) != 0xFFFF000000000000;
    let flag = formula & 0xFF;
    if is_number {
        Ok((Either::Right(index), f64::from_bits(formula).to_string()))
    } else if flag == 0 {
        match reader.next()? {
            Some(STRING) => {
                let value = reader.read_xl_unicode_string()?;
                Ok((Either::Left(CellType::Text), value))
            }
            _ => Err(XlsError::FormulaValueError(formula))?,
        }
    } else if flag == 1 {
        let value = if (formula & 0xFF0000) > 0 { "1" } else { "0" };
        Ok((Either::Left(CellType::Boolean), value.to_owned()))
    } else if flag == 2 {
        let code = ((formula >> 16) & 0xFF) as u8;
        Ok((Either::Left(CellType::Error), to_error_value(code).to_owned()))
    } else if flag == 3 {
        Ok((Either::Left(CellType::Text), "".to_owned()))
    } else {
        Err(XlsError::FormulaValueError(formula))?
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::helpers::cfb::tests::compound_file;
    use crate::spreadsheet::read_first_sheet;
    use crate::spreadsheet::SpreadsheetFormat;

    fn record(kind: u16, data: &[u8]) -> Vec<u8> {
        let mut bytes = kind.to_le_bytes().to_vec();
        bytes.extend((data.len() as u16).to_le_bytes());
        bytes.extend(data);
        bytes
    }

    /// XLUnicodeString with compressed (8-bit) characters
    fn unicode_string(text: &str) -> Vec<u8> {
        let mut bytes = (text.len() as u16).to_le_bytes().to_vec();
        bytes.push(0);
        bytes.extend(text.as_bytes());
        bytes
    }

    fn cell_header(row: u16, col: u16, xf: u16) -> Vec<u8> {
        [row.to_le_bytes(), col.to_le_bytes(), xf.to_le_bytes()].concat()
    }

    fn label_sst(row: u16, col: u16, index: u32) -> Vec<u8> {
        let mut data = cell_header(row, col, 0);
        data.extend(index.to_le_bytes());
        record(LABEL_SST, &data)
    }

    fn number(row: u16, col: u16, xf: u16, value: f64) -> Vec<u8> {
        let mut data = cell_header(row, col, xf);
        data.extend(value.to_le_bytes());
        record(NUMBER, &data)
    }

    fn rk_integer(value: i32) -> [u8; 4] {
        (((value << 2) | 0x02) as u32).to_le_bytes()
    }

    /// A BIFF8 workbook stream shaped like a trend export: a unit banner in
    /// row 0, labels in row 1 and two sample rows.
    pub(crate) fn trend_workbook_stream() -> Vec<u8> {
        let mut globals = record(BOF, &[0x00, 0x06, 0x05, 0x00, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        globals.extend(record(CODE_PAGE, &1200u16.to_le_bytes()));
        let mut format = 164u16.to_le_bytes().to_vec();
        format.extend(unicode_string("dd-mmm-yyyy hh:mm:ss"));
        globals.extend(record(FORMAT, &format));
        for format_id in [0u16, 164, 2] {
            let mut xf = vec![0u8; 20];
            xf[2..4].copy_from_slice(&format_id.to_le_bytes());
            globals.extend(record(XF, &xf));
        }
        let labels = ["Date & Time", "Channel 1", "Channel 2"];
        let mut sst = (labels.len() as u32).to_le_bytes().to_vec();
        sst.extend((labels.len() as u32).to_le_bytes());
        for label in labels {
            sst.extend(unicode_string(label));
        }
        globals.extend(record(SST, &sst));

        let chart_name = "Chart1";
        let sheet_name = "Trend";
        let bound_sheet_size = |name: &str| 4 + 4 + 2 + 2 + name.len();
        let sheet_offset = globals.len() + bound_sheet_size(chart_name) + bound_sheet_size(sheet_name) + 4;
        for (name, sheet_type) in [(chart_name, 2u8), (sheet_name, WORKSHEET)] {
            let mut bound_sheet = (sheet_offset as u32).to_le_bytes().to_vec();
            bound_sheet.extend([0, sheet_type, name.len() as u8, 0]);
            bound_sheet.extend(name.as_bytes());
            globals.extend(record(BOUND_SHEET8, &bound_sheet));
        }
        globals.extend(record(EOF, &[]));
        assert_eq!(globals.len(), sheet_offset);

        let mut stream = globals;
        stream.extend(record(BOF, &[0x00, 0x06, 0x10, 0x00, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]));
        let mut banner = cell_header(0, 1, 0);
        banner.extend(unicode_string("mm/s RMS"));
        stream.extend(record(LABEL, &banner));
        stream.extend(label_sst(1, 0, 0));
        stream.extend(label_sst(1, 1, 1));
        stream.extend(label_sst(1, 2, 2));
        stream.extend(number(2, 0, 1, 45000.5));
        let mut mul_rk = 2u16.to_le_bytes().to_vec();
        mul_rk.extend(1u16.to_le_bytes());
        mul_rk.extend(2u16.to_le_bytes());
        mul_rk.extend(rk_integer(3));
        mul_rk.extend(2u16.to_le_bytes());
        mul_rk.extend(rk_integer(4));
        mul_rk.extend(2u16.to_le_bytes());
        stream.extend(record(MUL_RK, &mul_rk));
        stream.extend(number(3, 0, 1, 45000.5 + 10.0 / 86400.0));
        stream.extend(number(3, 1, 2, 2.5));
        let mut error = cell_header(3, 2, 0);
        error.extend([0x07, 1]);
        stream.extend(record(BOOL_ERR, &error));
        stream.extend(record(EOF, &[]));
        stream
    }

    pub(crate) fn write_trend_workbook(path: &Path) {
        std::fs::write(path, compound_file("Workbook", &trend_workbook_stream())).unwrap();
    }

    #[test]
    fn reads_workbook_globals() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("trend.xls");
        write_trend_workbook(&path);

        let spreadsheet = XlsSpreadsheet::open(&path).unwrap();
        assert_eq!(spreadsheet.sheet_names(), vec!["Trend"]);
        assert_eq!(spreadsheet.shared_strings, vec!["Date & Time", "Channel 1", "Channel 2"]);
        assert_eq!(spreadsheet.number_formats, vec![
            CellType::Number,
            CellType::NumberDateTime1900,
            CellType::Number,
        ]);
    }

    #[test]
    fn reads_first_sheet_cells() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("trend.xls");
        write_trend_workbook(&path);

        let sheet = read_first_sheet(&path, SpreadsheetFormat::Xls).unwrap();
        assert_eq!(sheet.name, "Trend");
        let cells: Vec<(String, CellType, String)> = sheet.cells.iter()
            .map(|cell| (cell.reference(), cell.kind, cell.to_string()))
            .collect();
        assert_eq!(cells, vec![
            ("B1".to_owned(), CellType::Text, "mm/s RMS".to_owned()),
            ("A2".to_owned(), CellType::Text, "Date & Time".to_owned()),
            ("B2".to_owned(), CellType::Text, "Channel 1".to_owned()),
            ("C2".to_owned(), CellType::Text, "Channel 2".to_owned()),
            ("A3".to_owned(), CellType::NumberDateTime1900, "2023-03-15 12:00:00".to_owned()),
            ("B3".to_owned(), CellType::Number, "3".to_owned()),
            ("C3".to_owned(), CellType::Number, "4".to_owned()),
            ("A4".to_owned(), CellType::NumberDateTime1900, "2023-03-15 12:00:10".to_owned()),
            ("B4".to_owned(), CellType::Number, "2.5".to_owned()),
            ("C4".to_owned(), CellType::Error, "#DIV/0!".to_owned()),
        ]);
    }

    #[test]
    fn rejects_files_without_workbook_stream() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("empty.xls");
        std::fs::write(&path, compound_file("Other", b"data")).unwrap();
        assert!(XlsSpreadsheet::open(&path).is_err());
    }
}
