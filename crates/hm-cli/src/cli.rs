//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// House reading correlation.
///
/// Correlates indoor and outdoor temperature readings and nets grid draw
/// against local production to find extremal events.
#[derive(Debug, Parser)]
#[command(name = "hm", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Import rooms, devices and readings from JSONL on stdin.
    Import,

    /// List the readings logged by a device.
    Readings {
        /// The device to list.
        device: String,

        /// Start of the window (ISO 8601 or relative like "2 hours ago").
        #[arg(long, requires = "end")]
        start: Option<String>,

        /// End of the window (ISO 8601 or relative like "2 hours ago").
        #[arg(long, requires = "start")]
        end: Option<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Find the largest temperature gap between an outdoor and an indoor device.
    TemperatureDiff {
        /// Device placed outdoors (in a room of height 0).
        #[arg(long)]
        outdoor: String,

        /// Device placed indoors.
        #[arg(long)]
        indoor: String,

        /// Start of the window (ISO 8601 or relative like "2 hours ago").
        #[arg(long)]
        start: String,

        /// End of the window (ISO 8601 or relative like "2 hours ago").
        #[arg(long)]
        end: String,

        /// Matching tolerance in minutes (defaults to the configured value).
        #[arg(long)]
        delta: Option<i64>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Find the peak net power consumption of the house.
    PeakPower {
        /// Start of the window (ISO 8601 or relative like "2 hours ago").
        #[arg(long)]
        start: String,

        /// End of the window (ISO 8601 or relative like "2 hours ago").
        #[arg(long)]
        end: String,

        /// Matching tolerance in minutes (defaults to the configured value).
        #[arg(long)]
        delta: Option<i64>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}
