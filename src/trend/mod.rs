//! # Historical trend data
//!
//! Loads vibration readings from the first worksheet of a spreadsheet into a
//! [`NormalizedTable`]: one ordered timestamp index and one numeric series
//! per channel column, with `None` marking values that are missing or could
//! not be coerced.
mod ingest;
mod series;
mod session;

pub use ingest::load;
pub use ingest::load_with;
pub use series::selection_labels;
pub use series::ChannelSelection;
pub use series::Series;
pub use series::ALL_CHANNELS;
pub use series::CHART_TITLE;
pub use series::LEGEND_TITLE;
pub use series::X_AXIS_LABEL;
pub use series::Y_AXIS_LABEL;
pub use session::TrendSession;

use chrono::NaiveDateTime;
use serde::Deserialize;
use std::collections::HashSet;

/// Canonical label of the timestamp index column
pub const TIMESTAMP_COLUMN: &str = "Date & Time";

/// Text values read as missing by default
pub const DEFAULT_NULL_LITERALS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// One named channel of readings, aligned with the table's timestamps.
#[derive(Clone, Debug, PartialEq)]
pub struct Channel {
    pub name: String,
    pub samples: Vec<Option<f64>>,
}

/// A time-indexed table of channel readings.
///
/// Every channel holds exactly one sample per timestamp. Timestamps keep the
/// order of the source rows and may repeat or be missing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NormalizedTable {
    timestamps: Vec<Option<NaiveDateTime>>,
    channels: Vec<Channel>,
}

impl NormalizedTable {
    /// Builds a table, keeping only channels whose length matches the index.
    pub(crate) fn new(timestamps: Vec<Option<NaiveDateTime>>, channels: Vec<Channel>) -> Self {
        let rows = timestamps.len();
        let channels = channels.into_iter()
            .filter(|channel| {
                let aligned = channel.samples.len() == rows;
                if !aligned {
                    log::warn!("Channel '{}' has {} samples for {} timestamps, skipped", channel.name, channel.samples.len(), rows);
                }
                aligned
            })
            .collect();
        Self { timestamps, channels }
    }

    pub fn timestamps(&self) -> &[Option<NaiveDateTime>] {
        &self.timestamps
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// The first channel called `name`
    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|channel| channel.name == name)
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|channel| channel.name.as_str()).collect()
    }

    /// Number of rows (timestamps)
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// How a sheet is turned into a table.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoadOptions {
    /// Rows above the header-label row (the unit banner of generated files)
    pub skip_rows: usize,
    /// Text values treated as missing
    pub null_literals: HashSet<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            skip_rows: 1,
            null_literals: DEFAULT_NULL_LITERALS.iter().map(|literal| literal.to_string()).collect(),
        }
    }
}
