//! CLI arguments and subcommands for netmon.
//!
//! This module defines the command-line interface structure using the clap
//! library, including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Sort column options for the process table
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortColumnArg {
    Process,
    Pid,
    Download,
    Upload,
    Connections,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "netmon",
    about = "Real-time per-process network traffic monitor",
    long_about = "Real-time per-process network traffic monitor.\n\n\
                  Samples a nettop-style counter feed once per interval, derives \
                  per-process download/upload rates and connection counts, and keeps \
                  a rolling 60-interval history for the activity graph.",
    version = "0.1.0",
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Sampling interval in seconds
    #[arg(short = 'i', long)]
    pub interval: Option<u64>,

    /// Rolling history window length in intervals
    #[arg(long)]
    pub history_length: Option<usize>,

    /// Counter feed binary (path or name)
    #[arg(long)]
    pub feed_command: Option<String>,

    /// Hide rows with both rates below this many bytes/sec
    #[arg(long)]
    pub min_display_rate: Option<f64>,

    /// Prune a process's history after N absent intervals (0 = never)
    #[arg(long)]
    pub prune_after: Option<u64>,

    /// Initial sort column
    #[arg(long, value_enum)]
    pub sort: Option<SortColumnArg>,

    /// Sort descending (default)
    #[arg(long, conflicts_with = "ascending")]
    pub descending: bool,

    /// Sort ascending
    #[arg(long, conflicts_with = "descending")]
    pub ascending: bool,

    /// Environment variable holding the sudo password for the feed
    #[arg(long)]
    pub sudo_password_env: Option<String>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Probe the counter feed: spawn it, read one snapshot, report
    Check {
        /// Show the parsed processes of the probe snapshot
        #[arg(long)]
        verbose: bool,
    },

    /// Generate a configuration file
    Config {
        /// Output file path (stdout if omitted)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,
    },
}
