use crate::error::FormatError;
use crate::error::TrendError;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::read_first_sheet;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::SpreadsheetFormat;
use crate::trend::Channel;
use crate::trend::LoadOptions;
use crate::trend::NormalizedTable;
use chrono::NaiveDateTime;
use log::debug;
use log::trace;
use std::collections::BTreeMap;
use std::path::Path;

/// Loads the first worksheet of `path` with default [`LoadOptions`].
pub fn load(path: impl AsRef<Path>) -> Result<NormalizedTable, TrendError> {
    load_with(path, &LoadOptions::default())
}

/// Loads the first worksheet of `path` into a normalized table.
///
/// The row after `options.skip_rows` holds the column labels. The first used
/// column is the timestamp index whatever its label; every other column is a
/// channel unless all of its cells are missing. Rows without any cell are
/// skipped.
///
/// # Errors
///
/// * [`TrendError::Io`] when the file cannot be read
/// * [`TrendError::Format`] when the file is not a supported workbook, cannot
///   be decoded, or has no header-label row
pub fn load_with(path: impl AsRef<Path>, options: &LoadOptions) -> Result<NormalizedTable, TrendError> {
    let path = path.as_ref();
    let file_name = path.display().to_string();
    let format = SpreadsheetFormat::detect(path)
        .ok_or_else(|| FormatError::UnsupportedFile(file_name.to_owned()))?;
    let sheet = read_first_sheet(path, format)
        .map_err(|error| TrendError::from_sheet(&file_name, error))?;
    let table = normalize(&sheet, options)?;
    debug!(
        "Loaded sheet '{}' of '{}': {} rows, {} channels",
        sheet.name,
        file_name,
        table.len(),
        table.channels().len()
    );
    Ok(table)
}

pub(crate) fn normalize(sheet: &Sheet, options: &LoadOptions) -> Result<NormalizedTable, TrendError> {
    let (Some(row_lower), Some(row_upper), Some(timestamp_col)) =
        (sheet.row_lower_bound, sheet.row_upper_bound, sheet.col_lower_bound)
    else {
        return Err(TrendError::missing_timestamp_column());
    };
    let header_row = row_lower.checked_add(options.skip_rows)
        .filter(|row| *row <= row_upper)
        .ok_or_else(TrendError::missing_timestamp_column)?;

    let mut rows = sheet.rows();
    // Rows without any cell carry no reading and are left out
    let body = rows.split_off(&header_row.saturating_add(1));
    let header = rows.remove(&header_row).unwrap_or_default();

    let timestamps: Vec<Option<NaiveDateTime>> = body.values()
        .map(|cells| to_timestamp(cells.get(&timestamp_col).copied(), options))
        .collect();
    let unparsed = body.values()
        .zip(&timestamps)
        .filter(|(cells, timestamp)| timestamp.is_none() && cells.contains_key(&timestamp_col))
        .count();
    if unparsed > 0 {
        debug!("{unparsed} timestamp cells of sheet '{}' could not be parsed", sheet.name);
    }

    // Body cells of each channel column with their position in the body
    let mut columns = BTreeMap::<usize, Vec<(usize, &Cell)>>::new();
    for (index, cells) in body.values().enumerate() {
        for (&col, &cell) in cells.iter().filter(|(col, _)| **col != timestamp_col) {
            columns.entry(col).or_default().push((index, cell));
        }
    }

    let mut channels = Vec::<Channel>::new();
    for (col, cells) in columns {
        let name = channel_name(header.get(&col).copied(), col - timestamp_col);
        if cells.iter().all(|(_, cell)| cell.is_missing(&options.null_literals)) {
            trace!("Column '{name}' has no values, dropped");
            continue;
        }
        let mut samples = vec![None; timestamps.len()];
        for (index, cell) in cells {
            samples[index] = to_sample(cell, options);
        }
        channels.push(Channel { name, samples });
    }

    Ok(NormalizedTable::new(timestamps, channels))
}

fn to_timestamp(cell: Option<&Cell>, options: &LoadOptions) -> Option<NaiveDateTime> {
    cell.filter(|cell| !cell.is_missing(&options.null_literals))
        .and_then(|cell| cell.to_datetime().ok())
}

fn to_sample(cell: &Cell, options: &LoadOptions) -> Option<f64> {
    if cell.is_missing(&options.null_literals) {
        return None;
    }
    match cell.to_number() {
        Ok(value) => Some(value),
        Err(message) => {
            trace!("{message}");
            None
        }
    }
}

/// Header label of a channel column; blank labels are named by column offset
fn channel_name(label: Option<&Cell>, col: usize) -> String {
    label.map(|cell| cell.to_string().trim().to_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("Unnamed: {col}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::cell::CellType;
    use crate::spreadsheet::xls::tests::write_trend_workbook;
    use crate::trend::TIMESTAMP_COLUMN;
    use std::collections::HashSet;

    fn sheet(cells: &[(usize, usize, CellType, &str)]) -> Sheet {
        let mut sheet = Sheet::new("trend.xlsx", "Sheet1");
        for (row, col, kind, value) in cells {
            sheet.push(Cell { row: *row, col: *col, kind: *kind, value: value.to_string() });
        }
        sheet
    }

    fn datetime(text: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn no_banner() -> LoadOptions {
        LoadOptions { skip_rows: 0, ..LoadOptions::default() }
    }

    #[test]
    fn normalizes_a_trend_sheet() {
        let sheet = sheet(&[
            (0, 1, CellType::Text, "mm/s RMS"),
            (0, 2, CellType::Text, "mm/s RMS"),
            (1, 0, CellType::Text, "Timestamp"),
            (1, 1, CellType::Text, "Pump"),
            (1, 2, CellType::Text, "Fan"),
            (2, 0, CellType::NumberDateTime1900, "45000.5"),
            (2, 1, CellType::Number, "1.5"),
            (2, 2, CellType::Text, "2.5"),
            (3, 0, CellType::Text, "2023-03-15 12:00:10"),
            (3, 1, CellType::Text, "offline"),
            (3, 2, CellType::Boolean, "1"),
        ]);
        let table = normalize(&sheet, &LoadOptions::default()).unwrap();

        assert_eq!(table.timestamps(), &[
            Some(datetime("2023-03-15 12:00:00")),
            Some(datetime("2023-03-15 12:00:10")),
        ]);
        assert_eq!(table.channel_names(), vec!["Pump", "Fan"]);
        assert_eq!(table.channel("Pump").unwrap().samples, vec![Some(1.5), None]);
        assert_eq!(table.channel("Fan").unwrap().samples, vec![Some(2.5), Some(1.0)]);
        assert!(table.channel(TIMESTAMP_COLUMN).is_none());
    }

    #[test]
    fn missing_header_row_is_a_format_error() {
        let error = normalize(&sheet(&[(0, 1, CellType::Text, "mm/s RMS")]), &LoadOptions::default()).unwrap_err();
        match error {
            TrendError::Format(FormatError::MissingColumn(column)) => assert_eq!(column, TIMESTAMP_COLUMN),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(normalize(&sheet(&[]), &no_banner()).is_err());
    }

    #[test]
    fn header_only_sheet_is_empty() {
        let sheet = sheet(&[
            (0, 0, CellType::Text, "Date & Time"),
            (0, 1, CellType::Text, "Channel 1"),
        ]);
        let table = normalize(&sheet, &no_banner()).unwrap();
        assert!(table.is_empty());
        assert!(table.channels().is_empty());
    }

    #[test]
    fn all_missing_columns_are_dropped() {
        let sheet = sheet(&[
            (0, 0, CellType::Text, "Date & Time"),
            (0, 1, CellType::Text, "Empty"),
            (0, 2, CellType::Text, "Nulls"),
            (0, 3, CellType::Text, "Status"),
            (1, 0, CellType::Text, "2024-01-01 00:00:00"),
            (1, 2, CellType::Text, "N/A"),
            (1, 3, CellType::Text, "running"),
            (2, 0, CellType::Text, "2024-01-01 00:00:10"),
            (2, 2, CellType::Error, "#N/A"),
            (2, 3, CellType::Text, "stopped"),
        ]);
        let table = normalize(&sheet, &no_banner()).unwrap();
        // Text-only columns survive as all-missing channels
        assert_eq!(table.channel_names(), vec!["Status"]);
        assert_eq!(table.channel("Status").unwrap().samples, vec![None, None]);
    }

    #[test]
    fn unparseable_timestamps_become_missing() {
        let sheet = sheet(&[
            (0, 0, CellType::Text, "When"),
            (0, 1, CellType::Text, "Channel 1"),
            (1, 0, CellType::Text, "not a date"),
            (1, 1, CellType::Number, "1"),
            (2, 0, CellType::Number, "45000"),
            (2, 1, CellType::Number, "2"),
            (3, 1, CellType::Number, "3"),
            (4, 0, CellType::Text, "2024-01-01 00:00:00"),
            (4, 1, CellType::Number, "4"),
            (5, 0, CellType::Text, "2023-12-31 23:59:50"),
            (5, 1, CellType::Number, "5"),
        ]);
        let table = normalize(&sheet, &no_banner()).unwrap();
        assert_eq!(table.timestamps(), &[
            None,
            None,
            None,
            Some(datetime("2024-01-01 00:00:00")),
            Some(datetime("2023-12-31 23:59:50")),
        ]);
        assert_eq!(table.channel("Channel 1").unwrap().samples.len(), 5);
    }

    #[test]
    fn blank_labels_are_named_by_offset() {
        let sheet = sheet(&[
            (0, 2, CellType::Text, "Date & Time"),
            (0, 4, CellType::Text, "Channel 2"),
            (1, 2, CellType::Text, "2024-01-01"),
            (1, 3, CellType::Number, "1"),
            (1, 4, CellType::Number, "2"),
        ]);
        let table = normalize(&sheet, &no_banner()).unwrap();
        assert_eq!(table.channel_names(), vec!["Unnamed: 1", "Channel 2"]);
    }

    #[test]
    fn custom_null_literals() {
        let sheet = sheet(&[
            (0, 0, CellType::Text, "Date & Time"),
            (0, 1, CellType::Text, "Channel 1"),
            (1, 0, CellType::Text, "2024-01-01"),
            (1, 1, CellType::Text, "--"),
        ]);
        let options = LoadOptions {
            skip_rows: 0,
            null_literals: HashSet::from(["--".to_owned()]),
        };
        assert!(normalize(&sheet, &options).unwrap().channels().is_empty());
        assert_eq!(normalize(&sheet, &no_banner()).unwrap().channel_names(), vec!["Channel 1"]);
    }

    #[test]
    fn stray_far_cell_is_read_sparsely() {
        let sheet = sheet(&[
            (0, 2, CellType::Text, "mm/s RMS"),
            (1, 0, CellType::Text, "Date & Time"),
            (1, 1, CellType::Text, "Channel 1"),
            (2, 0, CellType::Text, "2024-01-01 00:00:00"),
            (2, 1, CellType::Number, "1.5"),
            (1_048_575, 16_383, CellType::Text, "checked by ops"),
        ]);
        let table = normalize(&sheet, &LoadOptions::default()).unwrap();

        assert_eq!(table.timestamps(), &[Some(datetime("2024-01-01 00:00:00")), None]);
        assert_eq!(table.channel_names(), vec!["Channel 1", "Unnamed: 16383"]);
        assert_eq!(table.channel("Channel 1").unwrap().samples, vec![Some(1.5), None]);
        assert_eq!(table.channel("Unnamed: 16383").unwrap().samples, vec![None, None]);
    }

    #[test]
    fn blank_rows_are_skipped() {
        let sheet = sheet(&[
            (0, 0, CellType::Text, "Date & Time"),
            (0, 1, CellType::Text, "Channel 1"),
            (1, 0, CellType::Text, "2024-01-01 00:00:00"),
            (1, 1, CellType::Number, "1"),
            (4, 0, CellType::Text, "2024-01-01 00:00:30"),
            (4, 1, CellType::Number, "4"),
        ]);
        let table = normalize(&sheet, &no_banner()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.channel("Channel 1").unwrap().samples, vec![Some(1.0), Some(4.0)]);
    }

    #[test]
    fn loads_legacy_workbooks() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("trend.xls");
        write_trend_workbook(&path);

        let table = load(&path).unwrap();
        assert_eq!(table.timestamps(), &[
            Some(datetime("2023-03-15 12:00:00")),
            Some(datetime("2023-03-15 12:00:10")),
        ]);
        assert_eq!(table.channel_names(), vec!["Channel 1", "Channel 2"]);
        assert_eq!(table.channel("Channel 1").unwrap().samples, vec![Some(3.0), Some(2.5)]);
        assert_eq!(table.channel("Channel 2").unwrap().samples, vec![Some(4.0), None]);
    }

    #[test]
    fn rejects_unsupported_and_missing_files() {
        let directory = tempfile::tempdir().unwrap();
        let csv = directory.path().join("trend.csv");
        std::fs::write(&csv, "Date & Time,Channel 1\n").unwrap();
        assert!(matches!(load(&csv), Err(TrendError::Format(FormatError::UnsupportedFile(_)))));

        let missing = directory.path().join("missing.xlsx");
        assert!(matches!(load(&missing), Err(TrendError::Io(_))));

        let corrupt = directory.path().join("corrupt.xls");
        std::fs::write(&corrupt, vec![7u8; 2048]).unwrap();
        assert!(matches!(load(&corrupt), Err(TrendError::Format(FormatError::Unparseable { .. }))));
    }
}
