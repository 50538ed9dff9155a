//! netmon - version 0.1.0
//!
//! Per-process network traffic monitor driven by a nettop-style counter
//! feed. This is the main entry point that wires the sampling loop, the
//! shared history, and the presentation loop together and handles
//! subcommands.

use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tokio::signal;
use tracing::{error, info, Level};

use netmon::cli::{Args, Commands, ConfigFormat, LogLevel};
use netmon::config::{
    render_config, resolve_config, show_config, validate_effective_config, Config,
    DEFAULT_HISTORY_LENGTH, DEFAULT_INTERVAL_SECS, DEFAULT_MIN_DISPLAY_RATE, DEFAULT_PRUNE_AFTER,
};
use netmon::feed::CounterFeed;
use netmon::history::HistoryStore;
use netmon::presenter::{run_presenter, SortColumn, SortSpec, TablePresenter};
use netmon::sampler::{run_sampler, update_channel};
use netmon::snapshot::SnapshotAccumulator;

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(args: &Args) {
    let log_level = match args.log_level {
        LogLevel::Off => Level::ERROR,
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    info!("Logging initialized with level: {:?}", args.log_level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Reads the sudo password from the environment variable the config names.
fn feed_credential(config: &Config) -> Option<String> {
    let env_name = config.sudo_password_env.as_deref()?;
    match std::env::var(env_name) {
        Ok(password) if !password.is_empty() => Some(password),
        _ => {
            eprintln!(
                "⚠️  {} is not set; running the feed without elevation",
                env_name
            );
            None
        }
    }
}

fn sort_spec(config: &Config) -> SortSpec {
    let column = config
        .sort_column
        .as_deref()
        .and_then(SortColumn::from_name)
        .unwrap_or(SortColumn::Download);
    SortSpec {
        column,
        descending: config.sort_descending.unwrap_or(true),
    }
}

/// `check` subcommand: spawn the feed, read one snapshot, report.
fn command_check(verbose: bool, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let credential = feed_credential(config);
    let feed = CounterFeed::spawn(config, credential.as_deref())?;
    let (reader, handle) = feed.into_parts();

    let mut accumulator = SnapshotAccumulator::new(reader);
    let result = accumulator.next_snapshot();
    handle.terminate();

    match result? {
        Some(snapshot) => {
            println!(
                "✅ Feed is working: {} processes, {} with connections",
                snapshot.processes.len(),
                snapshot.connections.len()
            );
            if verbose {
                let mut keys: Vec<_> = snapshot.processes.keys().collect();
                keys.sort();
                for key in keys {
                    let counters = &snapshot.processes[key];
                    println!(
                        "  {} (in: {} B, out: {} B, conns: {})",
                        key,
                        counters.bytes_in,
                        counters.bytes_out,
                        snapshot.connections.get(key).copied().unwrap_or(0)
                    );
                }
            }
            Ok(())
        }
        None => {
            eprintln!("❌ Feed ended before producing a complete snapshot");
            std::process::exit(1);
        }
    }
}

/// `config` subcommand: write a configuration file.
fn command_config(
    output: Option<std::path::PathBuf>,
    format: ConfigFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let rendered = render_config(&Config::default(), format)?;
    match output {
        Some(path) => {
            std::fs::write(&path, rendered)?;
            println!("✅ Configuration written to: {}", path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format);
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        let config = load_validated_config(&args)?;

        return match command {
            Commands::Check { verbose } => command_check(*verbose, &config),
            Commands::Config { output, format } => command_config(output.clone(), *format),
        };
    }

    // Monitor mode
    let config = load_validated_config(&args)?;
    setup_logging(&args);

    info!("Starting netmon");

    let interval = config.interval_secs.unwrap_or(DEFAULT_INTERVAL_SECS);
    let history_length = config.history_length.unwrap_or(DEFAULT_HISTORY_LENGTH);
    let prune_after = config.prune_after_intervals.unwrap_or(DEFAULT_PRUNE_AFTER);
    let min_display_rate = config
        .min_display_rate
        .unwrap_or(DEFAULT_MIN_DISPLAY_RATE);

    let credential = feed_credential(&config);
    let feed = CounterFeed::spawn(&config, credential.as_deref())?;
    let (reader, feed_handle) = feed.into_parts();

    let history = Arc::new(RwLock::new(HistoryStore::new(history_length, prune_after)));
    let (tx, rx) = update_channel();
    let running = Arc::new(AtomicBool::new(true));
    let paused = Arc::new(AtomicBool::new(false));

    let sampler = {
        let history = history.clone();
        let running = running.clone();
        let dt = interval as f64;
        tokio::task::spawn_blocking(move || run_sampler(reader, history, tx, running, dt))
    };

    let presenter = TablePresenter::new(sort_spec(&config), min_display_rate);
    let presentation = tokio::spawn(run_presenter(
        rx,
        history.clone(),
        presenter,
        paused.clone(),
        running.clone(),
    ));

    // SIGUSR1 toggles the display pause; sampling and history keep running
    #[cfg(unix)]
    {
        let paused = paused.clone();
        tokio::spawn(async move {
            let mut toggle = signal::unix::signal(signal::unix::SignalKind::user_defined1())
                .expect("Failed to install signal handler");
            while toggle.recv().await.is_some() {
                let was_paused = paused.fetch_xor(true, Ordering::Relaxed);
                info!(
                    "Display {}",
                    if was_paused { "resumed" } else { "paused" }
                );
            }
        });
    }

    // Setup graceful shutdown signal handlers
    let shutdown_signal = async {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
            }
            _ = terminate => {
                info!("Received SIGTERM, shutting down gracefully...");
            }
        }
    };

    tokio::select! {
        _ = shutdown_signal => {
            info!("Shutdown signal received, exiting...");
        }
        result = presentation => {
            if let Err(e) = result {
                error!("Presentation task failed: {}", e);
            }
        }
    }

    // Clearing the flag first makes the feed kill read as a deliberate stop,
    // not a stream failure
    running.store(false, Ordering::Relaxed);
    feed_handle.terminate();

    if let Err(e) = sampler.await {
        error!("Sampling task failed: {}", e);
    }

    info!("netmon stopped gracefully");
    Ok(())
}
