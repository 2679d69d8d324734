//! # Trend Sheet
//!
//! Command-line front end for loading vibration trend workbooks and
//! generating synthetic ones.
//!
//! ## Usage
//!
//! ```bash
//! # Generate 100 readings for 16 channels every 10 seconds
//! trend-sheet generate --mode harsh --output Generated_Data.xlsx
//!
//! # List channels and print the series of one of them
//! trend-sheet load Generated_Data.xlsx --channel "Channel 3"
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use trend_sheet::config::Config;
use trend_sheet::generator::{generate_to, GenerationConfig, Mode, DEFAULT_OUTPUT_FILE};
use trend_sheet::trend::{
    load_with, selection_labels, ChannelSelection, CHART_TITLE, LEGEND_TITLE, X_AXIS_LABEL,
    Y_AXIS_LABEL,
};

/// Vibration trend workbook loader and generator
#[derive(Parser)]
#[command(name = "trend-sheet")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file (defaults to ./trend-sheet.toml when present)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a trend workbook and print its channel series
    Load {
        /// Spreadsheet file path
        #[arg(value_name = "PATH", default_value = DEFAULT_OUTPUT_FILE)]
        path: PathBuf,

        /// Print only this channel
        #[arg(long, value_name = "NAME")]
        channel: Option<String>,

        /// Rows above the header-label row
        #[arg(long, value_name = "N")]
        skip_rows: Option<usize>,
    },

    /// Generate a synthetic trend workbook
    Generate {
        /// Seconds between samples
        #[arg(long, value_name = "N", allow_negative_numbers = true)]
        interval: Option<i64>,

        /// Samples per channel
        #[arg(long, value_name = "N", allow_negative_numbers = true)]
        points: Option<i64>,

        /// Number of channels (at most 50)
        #[arg(long, value_name = "N", allow_negative_numbers = true)]
        channels: Option<i64>,

        /// Operating mode: Ideal, Normal, Harsh or Random
        #[arg(long, value_name = "MODE")]
        mode: Option<String>,

        /// Output workbook path
        #[arg(short, long, value_name = "PATH", default_value = DEFAULT_OUTPUT_FILE)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = Config::discover(cli.config.as_deref())?;

    match cli.command {
        Commands::Load {
            path,
            channel,
            skip_rows,
        } => run_load(config, path, channel, skip_rows),
        Commands::Generate {
            interval,
            points,
            channels,
            mode,
            output,
        } => run_generate(config.generator, interval, points, channels, mode, output),
    }
}

/// Load a workbook and print the series of the selected channels
fn run_load(
    config: Config,
    path: PathBuf,
    channel: Option<String>,
    skip_rows: Option<usize>,
) -> Result<()> {
    let mut options = config.trend;
    if let Some(skip_rows) = skip_rows {
        options.skip_rows = skip_rows;
    }

    let table = load_with(&path, &options)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    info!("Loaded {} rows from {}", table.len(), path.display());

    let selection = channel
        .as_deref()
        .map(ChannelSelection::from_label)
        .unwrap_or_default();
    let series = table.series(&selection)?;

    println!("{}", CHART_TITLE);
    println!("Selection: {}", selection);
    println!("{}: {}", LEGEND_TITLE, selection_labels(&table).join(", "));
    for series in &series {
        println!();
        println!("{}", series.name);
        println!("  {:<20} {}", X_AXIS_LABEL, Y_AXIS_LABEL);
        for (timestamp, value) in series.plottable() {
            println!("  {:<20} {:.1}", timestamp.format("%Y-%m-%d %H:%M:%S"), value);
        }
    }

    Ok(())
}

/// Generate a workbook, command-line values taking precedence over the config file
fn run_generate(
    defaults: GenerationConfig,
    interval: Option<i64>,
    points: Option<i64>,
    channels: Option<i64>,
    mode: Option<String>,
    output: PathBuf,
) -> Result<()> {
    let mode = match mode {
        Some(mode) => mode.parse::<Mode>()?,
        None => defaults.mode,
    };
    let config = GenerationConfig {
        interval_seconds: interval.unwrap_or(defaults.interval_seconds),
        point_count: points.unwrap_or(defaults.point_count),
        channel_count: channels.unwrap_or(defaults.channel_count),
        mode,
    };

    generate_to(&config, &output)?;
    println!("Generated Excel file ({} mode): {}", config.mode, output.display());

    Ok(())
}
