//! Configuration management for netmon.
//!
//! This module handles loading, merging, and validating configuration from
//! files and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat, SortColumnArg};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

// Default configuration constants
pub const DEFAULT_INTERVAL_SECS: u64 = 1;
pub const DEFAULT_HISTORY_LENGTH: usize = 60;
pub const DEFAULT_FEED_COMMAND: &str = "nettop";
pub const DEFAULT_MIN_DISPLAY_RATE: f64 = 100.0;
pub const DEFAULT_PRUNE_AFTER: u64 = 300;

/// Effective configuration. Every field is optional so that file values and
/// CLI overrides merge cleanly; consumers apply the defaults above.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Sampling interval in seconds passed to the feed command.
    #[serde(alias = "interval", alias = "interval-secs", skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,

    /// Rolling history window in sampling intervals.
    #[serde(alias = "history-length", skip_serializing_if = "Option::is_none")]
    pub history_length: Option<usize>,

    /// Path or name of the counter feed binary.
    #[serde(alias = "feed-command", skip_serializing_if = "Option::is_none")]
    pub feed_command: Option<String>,

    /// Extra arguments appended to the feed command line.
    #[serde(alias = "feed-args", skip_serializing_if = "Option::is_none")]
    pub feed_args: Option<Vec<String>>,

    /// Hide table rows whose rates are both below this (bytes/sec).
    #[serde(alias = "min-display-rate", skip_serializing_if = "Option::is_none")]
    pub min_display_rate: Option<f64>,

    /// Prune a process's history after this many consecutive absent
    /// intervals; 0 keeps vanished processes forever.
    #[serde(alias = "prune-after-intervals", skip_serializing_if = "Option::is_none")]
    pub prune_after_intervals: Option<u64>,

    /// Initial sort column for the process table.
    #[serde(alias = "sort-column", skip_serializing_if = "Option::is_none")]
    pub sort_column: Option<String>,

    /// Initial sort direction.
    #[serde(alias = "sort-descending", skip_serializing_if = "Option::is_none")]
    pub sort_descending: Option<bool>,

    /// Name of the environment variable holding the sudo password.
    #[serde(alias = "sudo-password-env", skip_serializing_if = "Option::is_none")]
    pub sudo_password_env: Option<String>,

    // Logging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_secs: Some(DEFAULT_INTERVAL_SECS),
            history_length: Some(DEFAULT_HISTORY_LENGTH),
            feed_command: Some(DEFAULT_FEED_COMMAND.to_string()),
            feed_args: None,
            min_display_rate: Some(DEFAULT_MIN_DISPLAY_RATE),
            prune_after_intervals: Some(DEFAULT_PRUNE_AFTER),
            sort_column: Some("download".to_string()),
            sort_descending: Some(true),
            sudo_password_env: None,
            log_level: Some("info".into()),
        }
    }
}

pub const KNOWN_SORT_COLUMNS: [&str; 5] = ["process", "pid", "download", "upload", "connections"];

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if cfg.interval_secs == Some(0) {
        return Err("interval_secs must be at least 1".into());
    }

    if let Some(len) = cfg.history_length {
        if len < 2 {
            return Err("history_length must be at least 2 (rates need two snapshots)".into());
        }
    }

    if let Some(rate) = cfg.min_display_rate {
        if rate < 0.0 {
            return Err("min_display_rate must not be negative".into());
        }
    }

    if let Some(column) = cfg.sort_column.as_deref() {
        if !KNOWN_SORT_COLUMNS.contains(&column) {
            return Err(format!(
                "Invalid sort_column '{}', expected one of {:?}",
                column, KNOWN_SORT_COLUMNS
            )
            .into());
        }
    }

    if let Some(cmd) = cfg.feed_command.as_deref() {
        if cmd.trim().is_empty() {
            return Err("feed_command must not be empty".into());
        }
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref().and_then(|p| p.to_str()))?
    };

    if let Some(interval) = args.interval {
        config.interval_secs = Some(interval);
    }
    if let Some(len) = args.history_length {
        config.history_length = Some(len);
    }
    if let Some(cmd) = &args.feed_command {
        config.feed_command = Some(cmd.clone());
    }
    if let Some(rate) = args.min_display_rate {
        config.min_display_rate = Some(rate);
    }
    if let Some(n) = args.prune_after {
        config.prune_after_intervals = Some(n);
    }

    if let Some(column) = args.sort {
        config.sort_column = Some(
            match column {
                SortColumnArg::Process => "process",
                SortColumnArg::Pid => "pid",
                SortColumnArg::Download => "download",
                SortColumnArg::Upload => "upload",
                SortColumnArg::Connections => "connections",
            }
            .to_string(),
        );
    }
    if args.descending {
        config.sort_descending = Some(true);
    }
    if args.ascending {
        config.sort_descending = Some(false);
    }

    if let Some(env_name) = &args.sudo_password_env {
        config.sudo_password_env = Some(env_name.clone());
    }

    Ok(config)
}

/// Enhanced configuration loading with multiple format support
pub fn load_config(path: Option<&str>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = if let Some(p) = path {
        PathBuf::from(p)
    } else {
        // Try default locations
        let defaults = [
            "/etc/netmon/netmon.yaml",
            "/etc/netmon/netmon.yml",
            "/etc/netmon/netmon.json",
            "./netmon.yaml",
            "./netmon.yml",
            "./netmon.json",
        ];

        defaults
            .iter()
            .find(|p| Path::new(p).exists())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(""))
    };

    if !path.exists() || path.to_string_lossy().is_empty() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Serializes config in the requested format.
pub fn render_config(
    config: &Config,
    format: ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, format)?);
    Ok(())
}
