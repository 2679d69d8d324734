use crate::spreadsheet::reference::index_to_reference;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use std::collections::HashSet;
use std::fmt::Display;

const MILLISECONDS_PER_DAY: f64 = 86_400_000.0;

/// Text layouts accepted when a timestamp is stored as a string.
const DATETIME_LAYOUTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d-%b-%Y %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const DATE_LAYOUTS: &[&str] = &["%Y-%m-%d", "%d-%b-%Y"];

/// Types of cell data in spreadsheet files.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    /// Boolean values stored as "1"/"0"
    Boolean,
    /// Plain numeric values
    Number,
    /// Date/time values stored as numbers from 1900 epoch
    NumberDateTime1900,
    /// Date values stored as numbers from 1900 epoch
    NumberDate1900,
    /// Time values stored as numbers from 1900 epoch
    NumberTime1900,
    /// Date/time values stored as numbers from 1904 epoch
    NumberDateTime1904,
    /// Date values stored as numbers from 1904 epoch
    NumberDate1904,
    /// Time values stored as numbers from 1904 epoch
    NumberTime1904,
    /// ISO 8601 date/time strings
    IsoDateTime,
    /// Literal text
    Text,
    /// Index into the workbook's shared string table
    SharedString,
    /// Error values such as `#DIV/0!`
    Error,
}

impl CellType {
    /// Maps built-in number format ids to date/time cell types.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "22" => Some(if is_1904 { Self::NumberDateTime1904 } else { Self::NumberDateTime1900 }),
            "14" | "15" | "16" | "17" => Some(if is_1904 { Self::NumberDate1904 } else { Self::NumberDate1900 }),
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => Some(if is_1904 { Self::NumberTime1904 } else { Self::NumberTime1900 }),
            _ => None,
        }
    }

    /// Classifies a custom number format code by the date/time tokens it
    /// contains outside literals, escapes and `[...]` sections.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_date = false;
        let mut is_time = false;
        let mut is_color = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' if !is_escaped => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_literal && !is_color => is_literal = true,

                ']' if is_color => is_color = false,
                '[' if !is_color && !is_literal => is_color = true,
                _ if is_literal || is_color => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        match (is_date, is_time, is_1904) {
            (true, true, false) => Self::NumberDateTime1900,
            (true, true, true) => Self::NumberDateTime1904,
            (true, false, false) => Self::NumberDate1900,
            (true, false, true) => Self::NumberDate1904,
            (false, true, false) => Self::NumberTime1900,
            (false, true, true) => Self::NumberTime1904,
            (false, false, _) => Self::Number,
        }
    }

    /// Whether the value is an Excel serial number with a date/time format.
    pub(crate) fn is_serial_datetime(&self) -> bool {
        self.epoch_is_1904().is_some()
    }

    fn epoch_is_1904(&self) -> Option<bool> {
        match self {
            Self::NumberDateTime1900 | Self::NumberDate1900 | Self::NumberTime1900 => Some(false),
            Self::NumberDateTime1904 | Self::NumberDate1904 | Self::NumberTime1904 => Some(true),
            _ => None,
        }
    }
}

/// Converts Excel error codes to their display strings.
pub(crate) fn to_error_value(value: u8) -> &'static str {
    match value {
        0x00 => "#NULL!",
        0x07 => "#DIV/0!",
        0x0F => "#VALUE!",
        0x17 => "#REF!",
        0x1D => "#NAME?",
        0x24 => "#NUM!",
        0x2A => "#N/A",
        0x2B => "#GETTING_DATA",
        _ => "#ERROR!",
    }
}

/// A single non-empty cell with its position, type and raw value.
#[derive(Clone, Debug)]
pub(crate) struct Cell {
    /// Row index (0-based)
    pub(crate) row: usize,
    /// Column index (0-based)
    pub(crate) col: usize,
    pub(crate) kind: CellType,
    /// Raw value as stored in the file
    pub(crate) value: String,
}

impl Cell {
    /// Returns the A1-style reference (e.g. "B2")
    pub(crate) fn reference(&self) -> String {
        index_to_reference(self.row, self.col)
    }

    /// A cell counts as missing when it has no value or its text is a null literal.
    pub(crate) fn is_missing(&self, null_literals: &HashSet<String>) -> bool {
        match self.kind {
            CellType::Empty => true,
            CellType::Text | CellType::SharedString | CellType::Error | CellType::IsoDateTime => {
                null_literals.contains(self.value.as_str())
            }
            _ => self.value.is_empty(),
        }
    }

    pub(crate) fn to_double(&self) -> Result<f64, String> {
        self.value.trim().parse::<f64>().map_err(|_| format!("parse '{}' to double failed", self.value))
    }

    /// Numeric coercion of a channel reading: numbers, booleans and numeric
    /// text convert; dates, errors and other text do not.
    pub(crate) fn to_number(&self) -> Result<f64, String> {
        match self.kind {
            CellType::Number | CellType::Text | CellType::SharedString => {
                self.to_double().and_then(|value| {
                    if value.is_nan() {
                        Err(format!("'{}' at {} is not a number", self.value, self.reference()))
                    } else {
                        Ok(value)
                    }
                })
            }
            CellType::Boolean => Ok(if self.value == "1" { 1.0 } else { 0.0 }),
            _ => Err(format!("'{}' at {} is not a number", self.value, self.reference())),
        }
    }

    /// Date-time coercion of a timestamp cell: date/time formatted serials,
    /// ISO values and text in a known layout convert.
    pub(crate) fn to_datetime(&self) -> Result<NaiveDateTime, String> {
        let failure = || format!("parse '{}' at {} to datetime failed", self.value, self.reference());
        if let Some(is_1904) = self.kind.epoch_is_1904() {
            return from_excel_serial(self.to_double()?, is_1904).ok_or_else(failure);
        }
        match self.kind {
            CellType::IsoDateTime | CellType::Text | CellType::SharedString => {
                parse_datetime_text(self.value.trim()).ok_or_else(failure)
            }
            _ => Err(failure()),
        }
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            CellType::Boolean => write!(f, "{}", if self.value == "1" { "true" } else { "false" }),
            CellType::IsoDateTime => write!(f, "{}", self.value.replace('T', " ")),
            kind if kind.is_serial_datetime() => match self.to_datetime() {
                Ok(datetime) if matches!(kind, CellType::NumberDate1900 | CellType::NumberDate1904) => {
                    write!(f, "{}", datetime.format("%Y-%m-%d"))
                }
                Ok(datetime) if matches!(kind, CellType::NumberTime1900 | CellType::NumberTime1904) => {
                    write!(f, "{}", datetime.format("%H:%M:%S"))
                }
                Ok(datetime) => write!(f, "{}", datetime.format("%Y-%m-%d %H:%M:%S")),
                Err(_) => write!(f, "{}", self.value),
            },
            _ => write!(f, "{}", self.value),
        }
    }
}

fn epoch(is_1904: bool) -> Option<NaiveDateTime> {
    let date = if is_1904 {
        NaiveDate::from_ymd_opt(1904, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };
    date.and_hms_opt(0, 0, 0)
}

/// Converts an Excel serial day number to a date-time, rounded to the
/// millisecond.
pub(crate) fn from_excel_serial(serial: f64, is_1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let mut milliseconds = (serial * MILLISECONDS_PER_DAY).round() as i64;
    // Lotus 1-2-3 leap year bug: 1900 serials before 60 are one day early
    if !is_1904 && serial.trunc() < 60.0 {
        milliseconds += MILLISECONDS_PER_DAY as i64;
    }
    epoch(is_1904)?.checked_add_signed(Duration::milliseconds(milliseconds))
}

/// Converts a date-time (from 1900-03-01 on) to an Excel 1900 serial day number.
pub(crate) fn to_excel_serial(datetime: &NaiveDateTime) -> Option<f64> {
    let milliseconds = datetime.signed_duration_since(epoch(false)?).num_milliseconds();
    let serial = milliseconds as f64 / MILLISECONDS_PER_DAY;
    (serial >= 61.0).then_some(serial)
}

fn parse_datetime_text(text: &str) -> Option<NaiveDateTime> {
    DATETIME_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(text, layout).ok())
        .or_else(|| {
            DATE_LAYOUTS
                .iter()
                .find_map(|layout| NaiveDate::parse_from_str(text, layout).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}
