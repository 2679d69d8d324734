use crate::error::TrendError;
use crate::error::ValidationError;
use crate::generator::GenerationConfig;
use crate::generator::Mode;
use crate::generator::DEFAULT_OUTPUT_FILE;
use crate::generator::UNIT_LABEL;
use crate::spreadsheet::writer::write_workbook;
use crate::spreadsheet::writer::CellStyle;
use crate::spreadsheet::writer::CellValue;
use crate::spreadsheet::writer::OutputSheet;
use crate::trend::Channel;
use crate::trend::NormalizedTable;
use crate::trend::TIMESTAMP_COLUMN;
use chrono::Local;
use chrono::NaiveDateTime;
use chrono::TimeDelta;
use chrono::Timelike;
use log::debug;
use log::info;
use rand::Rng;
use std::path::Path;

const TIMESTAMP_COLUMN_WIDTH: f64 = 18.0;
const CHANNEL_COLUMN_WIDTH: f64 = 12.0;
const SHEET_NAME: &str = "Sheet1";

/// Extra spread added to the base value of [`Mode::Ideal`] samples
const IDEAL_NOISE: f64 = 0.2;

/// Generates a dataset starting now and writes it to [`DEFAULT_OUTPUT_FILE`].
pub fn generate(config: &GenerationConfig) -> Result<NormalizedTable, TrendError> {
    generate_to(config, DEFAULT_OUTPUT_FILE)
}

/// Generates a dataset starting now and writes it to `path`.
pub fn generate_to(config: &GenerationConfig, path: impl AsRef<Path>) -> Result<NormalizedTable, TrendError> {
    generate_with(config, path, Local::now().naive_local(), &mut rand::thread_rng())
}

/// Generates a dataset from `start` with the given random source and writes it to `path`.
///
/// Nothing is written unless `config` is valid, and the workbook appears at
/// `path` only once it is complete.
pub fn generate_with<R: Rng + ?Sized>(
    config: &GenerationConfig,
    path: impl AsRef<Path>,
    start: NaiveDateTime,
    rng: &mut R,
) -> Result<NormalizedTable, TrendError> {
    let path = path.as_ref();
    let table = synthesize(config, start, rng)?;
    let file_name = path.display().to_string();
    write_workbook(path, &to_output_sheet(&table))
        .map_err(|error| TrendError::from_sheet(&file_name, error))?;
    info!("Generated Excel file ({} mode): {}", config.mode, file_name);
    Ok(table)
}

/// Builds a random dataset in memory.
///
/// Timestamps start at `start` truncated to whole seconds and advance by
/// `interval_seconds`; each sample is rounded to one decimal.
pub fn synthesize<R: Rng + ?Sized>(
    config: &GenerationConfig,
    start: NaiveDateTime,
    rng: &mut R,
) -> Result<NormalizedTable, TrendError> {
    config.validate()?;
    let overflow = || ValidationError::TimeSpanOverflow {
        interval: config.interval_seconds,
        points: config.point_count,
    };
    let start = start.with_nanosecond(0).unwrap_or(start);
    let timestamp = |index: i64| {
        index.checked_mul(config.interval_seconds)
            .and_then(TimeDelta::try_seconds)
            .and_then(|offset| start.checked_add_signed(offset))
    };
    // The last timestamp bounds every other one
    timestamp(config.point_count - 1).ok_or_else(overflow)?;

    let points = usize::try_from(config.point_count).map_err(|_| overflow())?;
    let channel_count = usize::try_from(config.channel_count).map_err(|_| overflow())?;
    let too_many = |_| ValidationError::TooManyPoints(config.point_count);

    let mut timestamps = Vec::new();
    timestamps.try_reserve_exact(points).map_err(too_many)?;
    for index in 0..config.point_count {
        timestamps.push(Some(timestamp(index).ok_or_else(overflow)?));
    }

    let mut channels = Vec::with_capacity(channel_count);
    for number in 1..=channel_count {
        let mut samples = Vec::new();
        samples.try_reserve_exact(points).map_err(too_many)?;
        channels.push(Channel {
            name: format!("Channel {number}"),
            samples,
        });
    }
    // Row by row, so one seed always gives the same sheet
    for _ in 0..points {
        for channel in channels.iter_mut() {
            channel.samples.push(Some(sample(config.mode, rng)));
        }
    }

    debug!("Synthesized {points} samples for {channel_count} channels in {} mode", config.mode);
    Ok(NormalizedTable::new(timestamps, channels))
}

fn sample<R: Rng + ?Sized>(mode: Mode, rng: &mut R) -> f64 {
    let (low, high) = mode.range();
    let value = match mode {
        Mode::Ideal => {
            let base = rng.gen_range(low..=(low + high) / 2.0);
            base + rng.gen_range(-IDEAL_NOISE..=IDEAL_NOISE)
        }
        _ => rng.gen_range(low..=high),
    };
    (value * 10.0).round() / 10.0
}

fn to_output_sheet(table: &NormalizedTable) -> OutputSheet {
    let channels = table.channels();
    let mut widths = vec![TIMESTAMP_COLUMN_WIDTH];
    widths.resize(channels.len() + 1, CHANNEL_COLUMN_WIDTH);

    let text = |value: &str, style: CellStyle| Some((CellValue::Text(value.to_owned()), style));
    let mut rows = Vec::with_capacity(table.len() + 2);
    rows.push(std::iter::once(None)
        .chain(channels.iter().map(|_| text(UNIT_LABEL, CellStyle::Unit)))
        .collect());
    rows.push(std::iter::once(text(TIMESTAMP_COLUMN, CellStyle::Header))
        .chain(channels.iter().map(|channel| text(&channel.name, CellStyle::Header)))
        .collect());
    for (index, timestamp) in table.timestamps().iter().enumerate() {
        let timestamp = timestamp.map(|timestamp| (CellValue::DateTime(timestamp), CellStyle::Timestamp));
        rows.push(std::iter::once(timestamp)
            .chain(channels.iter().map(|channel| {
                channel.samples[index].map(|value| (CellValue::Number(value), CellStyle::Reading))
            }))
            .collect());
    }

    OutputSheet {
        name: SHEET_NAME.to_owned(),
        widths,
        rows,
    }
}
