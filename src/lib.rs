//! # Vibration Trend Sheets
//!
//! Reads historical vibration readings from Excel workbooks and turns them
//! into time-indexed channel series ready for charting, and generates
//! synthetic readings in the same layout for testing.
//!
//! ## Features
//!
//! - **Multi-format input**: `.xlsx`, `.xlsm`, `.xlam` (Office Open XML) and
//!   legacy `.xls`, `.xla` (BIFF8 compound files), read with a pure Rust decoder
//! - **Normalization**: the first worksheet becomes one timestamp index and
//!   one numeric series per channel; unparseable values become missing markers
//! - **Refresh**: [`trend::TrendSession`] reloads the last opened file and
//!   keeps the previous table when a reload fails
//! - **Synthetic data**: [`generator`] writes random readings in four
//!   operating modes, atomically
//!
//! ## Example
//!
//! ```no_run
//! use trend_sheet::generator::{generate_to, GenerationConfig};
//! use trend_sheet::trend::{load, ChannelSelection};
//!
//! # fn main() -> Result<(), trend_sheet::TrendError> {
//! generate_to(&GenerationConfig::default(), "Generated_Data.xlsx")?;
//! let table = load("Generated_Data.xlsx")?;
//! for series in table.series(&ChannelSelection::All)? {
//!     println!("{}: {} points", series.name, series.plottable().count());
//! }
//! # Ok(())
//! # }
//! ```
mod helpers;
mod spreadsheet;

pub mod config;
pub mod error;
pub mod generator;
pub mod trend;

pub use error::FormatError;
pub use error::TrendError;
pub use error::ValidationError;
pub use trend::NormalizedTable;
