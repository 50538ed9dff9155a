//! External counter feed process management.
//!
//! The feed is an external `nettop`-style process emitting the CSV counter
//! stream on stdout. This module owns its lifecycle only at the boundary:
//! spawn with the right flags, optionally validate a sudo credential first,
//! and expose a kill handle so shutdown can unblock a pending stream read.
//!
//! Note: `nettop` block-buffers its output when piped; if samples arrive in
//! bursts, point `feed_command` at an unbuffering wrapper (e.g. `stdbuf`)
//! via the extra `feed_args`.

use std::io::{self, BufReader, Write};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::config::{Config, DEFAULT_FEED_COMMAND, DEFAULT_INTERVAL_SECS};
use crate::error::Error;

/// A running counter feed: buffered stdout plus a kill handle.
pub struct CounterFeed {
    reader: BufReader<ChildStdout>,
    handle: FeedHandle,
}

/// Cloneable handle used to terminate the feed process from another task.
#[derive(Clone)]
pub struct FeedHandle {
    child: Arc<Mutex<Child>>,
}

impl FeedHandle {
    /// Kills the feed process, which also ends the stream and unblocks any
    /// reader waiting on it.
    pub fn terminate(&self) {
        match self.child.lock() {
            Ok(mut child) => {
                if let Err(e) = child.kill() {
                    debug!("feed process already gone: {}", e);
                }
                let _ = child.wait();
            }
            Err(_) => warn!("feed handle lock poisoned, cannot terminate"),
        }
    }
}

/// Validates a sudo credential by priming the sudo session (`sudo -S -v`).
///
/// Runs before the feed is spawned so a rejected credential surfaces with no
/// sampling state created.
pub fn validate_credential(password: &str) -> Result<(), Error> {
    let mut child = Command::new("sudo")
        .args(["-S", "-v"])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| Error::Spawn {
            command: "sudo -S -v".to_string(),
            source,
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        // A write failure here just means sudo exited early; the status check
        // below is authoritative.
        let _ = writeln!(stdin, "{}", password);
    }

    let status = child.wait()?;
    if !status.success() {
        return Err(Error::Elevation("sudo rejected the credential".to_string()));
    }

    debug!("sudo session validated");
    Ok(())
}

impl CounterFeed {
    /// Spawns the counter feed configured in `config`.
    ///
    /// With a credential, the credential is validated first and the feed runs
    /// under `sudo` (the primed session covers it). Without one, the feed
    /// binary is executed directly and may report fewer rows.
    pub fn spawn(config: &Config, credential: Option<&str>) -> Result<Self, Error> {
        let feed_command = config
            .feed_command
            .clone()
            .unwrap_or_else(|| DEFAULT_FEED_COMMAND.to_string());
        let interval = config.interval_secs.unwrap_or(DEFAULT_INTERVAL_SECS);

        let use_sudo = credential.is_some();
        if let Some(password) = credential {
            validate_credential(password)?;
        }

        let mut command = if use_sudo {
            let mut c = Command::new("sudo");
            c.arg(&feed_command);
            c
        } else {
            Command::new(&feed_command)
        };

        // -x: machine-readable CSV, -L 0: endless samples, -s: interval
        command
            .args(["-x", "-L", "0", "-s"])
            .arg(interval.to_string());
        if let Some(extra) = &config.feed_args {
            command.args(extra);
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let mut child = command.spawn().map_err(|source| Error::Spawn {
            command: feed_command.clone(),
            source,
        })?;

        let stdout = child.stdout.take().ok_or_else(|| Error::Spawn {
            command: feed_command.clone(),
            source: io::Error::other("stdout not captured"),
        })?;

        info!(
            "counter feed started: {} (interval {}s, sudo: {})",
            feed_command, interval, use_sudo
        );

        Ok(Self {
            reader: BufReader::new(stdout),
            handle: FeedHandle {
                child: Arc::new(Mutex::new(child)),
            },
        })
    }

    /// Splits the feed into its stream reader and kill handle.
    pub fn into_parts(self) -> (BufReader<ChildStdout>, FeedHandle) {
        (self.reader, self.handle)
    }
}
