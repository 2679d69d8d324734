//! # Synthetic vibration data
//!
//! Generates random RMS vibration readings for a number of channels at a
//! fixed sampling interval and saves them as an `.xlsx` workbook laid out
//! the way the trend loader expects: a unit banner, a header row, then one
//! row per sample.
mod dataset;

pub use dataset::generate;
pub use dataset::generate_to;
pub use dataset::generate_with;
pub use dataset::synthesize;

use crate::error::ValidationError;
use serde::Deserialize;
use std::fmt::Display;
use std::str::FromStr;

/// Upper limit on the number of channels per dataset
pub const MAX_CHANNELS: i64 = 50;

/// File written by [`generate`], relative to the working directory
pub const DEFAULT_OUTPUT_FILE: &str = "Generated_Data.xlsx";

/// Unit label written above every channel column
pub const UNIT_LABEL: &str = "mm/s RMS";

/// Operating condition a dataset imitates; each has its own amplitude range.
#[derive(Copy, Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(try_from = "String")]
pub enum Mode {
    Ideal,
    #[default]
    Normal,
    Harsh,
    Random,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Ideal, Mode::Normal, Mode::Harsh, Mode::Random];

    /// Inclusive amplitude range in mm/s RMS
    pub fn range(&self) -> (f64, f64) {
        match self {
            Self::Ideal => (0.5, 2.5),
            Self::Normal => (1.5, 8.0),
            Self::Harsh => (8.0, 25.0),
            Self::Random => (0.5, 25.0),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ideal => "Ideal",
            Self::Normal => "Normal",
            Self::Harsh => "Harsh",
            Self::Random => "Random",
        }
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Mode {
    type Err = ValidationError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| ValidationError::UnknownMode(name.to_owned()))
    }
}

impl TryFrom<String> for Mode {
    type Error = ValidationError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        name.parse()
    }
}

/// Parameters of a synthetic dataset.
///
/// Counts are signed so that user input such as `0` or `-5` can be
/// represented and rejected by [`GenerationConfig::validate`].
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    /// Seconds between consecutive samples
    pub interval_seconds: i64,
    /// Samples per channel
    pub point_count: i64,
    pub channel_count: i64,
    pub mode: Mode,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 10,
            point_count: 100,
            channel_count: 16,
            mode: Mode::Normal,
        }
    }
}

impl GenerationConfig {
    /// Builds a configuration from free-text form fields.
    pub fn parse(interval_seconds: &str, point_count: &str, channel_count: &str, mode: &str) -> Result<Self, ValidationError> {
        let config = Self {
            interval_seconds: parse_count("interval_seconds", interval_seconds)?,
            point_count: parse_count("point_count", point_count)?,
            channel_count: parse_count("channel_count", channel_count)?,
            mode: mode.parse()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that every count is positive and the channel count is at most [`MAX_CHANNELS`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("interval_seconds", self.interval_seconds),
            ("point_count", self.point_count),
            ("channel_count", self.channel_count),
        ] {
            if value <= 0 {
                return Err(ValidationError::NotPositive { field, value });
            }
        }
        if self.channel_count > MAX_CHANNELS {
            return Err(ValidationError::TooManyChannels(self.channel_count));
        }
        Ok(())
    }
}

fn parse_count(field: &'static str, value: &str) -> Result<i64, ValidationError> {
    value.trim()
        .parse::<i64>()
        .map_err(|_| ValidationError::NotAnInteger { field, value: value.to_owned() })
}
