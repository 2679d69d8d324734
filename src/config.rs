//! TOML configuration file with defaults for loading and generating.
//!
//! ```toml
//! # trend-sheet.toml
//! [trend]
//! skip_rows = 1
//! null_literals = ["", "N/A", "--"]
//!
//! [generator]
//! interval_seconds = 10
//! point_count = 100
//! channel_count = 16
//! mode = "Normal"
//! ```
//!
//! Missing sections and keys keep their built-in defaults.

use crate::generator::GenerationConfig;
use crate::trend::LoadOptions;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// File picked up from the working directory when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "trend-sheet.toml";

/// Root of a `trend-sheet.toml` file.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub trend: LoadOptions,
    pub generator: GenerationConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    /// Loads `path` when given, otherwise [`DEFAULT_CONFIG_FILE`] if it
    /// exists, otherwise the defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.is_file() {
                    log::debug!("Using config file {}", path.display());
                    Self::from_file(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}
