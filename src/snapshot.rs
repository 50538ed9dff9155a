//! Snapshot accumulation from the counter feed.
//!
//! The feed emits one iteration per sampling interval: a boundary/header
//! line, then process-summary rows each followed by that process's
//! connection rows. [`SnapshotAccumulator`] consumes lines until the next
//! boundary and seals everything in between into one [`Snapshot`].
//!
//! Connection rows carry no process identity; they are attributed to the
//! most recently accepted process summary in stream order. That cursor is a
//! local threaded through the accumulation loop and resets at every
//! boundary. A misordered feed silently misattributes connections.

use ahash::AHashMap as HashMap;
use std::io::{self, BufRead};
use tracing::trace;

use crate::record::{self, CounterRecord};

/// Stable identity of a monitored process within a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessKey {
    pub name: String,
    pub pid: u32,
}

impl ProcessKey {
    pub fn new(name: impl Into<String>, pid: u32) -> Self {
        Self {
            name: name.into(),
            pid,
        }
    }
}

impl std::fmt::Display for ProcessKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.name, self.pid)
    }
}

/// Cumulative byte counters for one process at one sampling instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessCounters {
    pub bytes_in: u64,
    pub bytes_out: u64,
}

/// All per-process counters captured at one sampling instant.
///
/// Immutable once sealed by the accumulator; the sampler keeps exactly one
/// previous generation for differencing.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub processes: HashMap<ProcessKey, ProcessCounters>,
    pub connections: HashMap<ProcessKey, u32>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}

/// Returns true for the feed's iteration boundary/header line.
fn is_boundary(line: &str) -> bool {
    line.starts_with("time,") || line.starts_with(",interface,state")
}

/// Accumulates feed lines into per-interval snapshots.
pub struct SnapshotAccumulator<R> {
    reader: R,
}

impl<R: BufRead> SnapshotAccumulator<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Reads lines until the next iteration boundary and returns the sealed
    /// snapshot, or `Ok(None)` when the stream has ended.
    ///
    /// A boundary seen while the in-progress snapshot is still empty is the
    /// feed's initial header and is skipped. A partial snapshot at EOF is
    /// discarded. Unparseable lines are dropped, except that lines whose
    /// identifier still has the connection shape count toward the current
    /// process's connections.
    pub fn next_snapshot(&mut self) -> io::Result<Option<Snapshot>> {
        let mut snapshot = Snapshot::default();
        let mut current: Option<ProcessKey> = None;
        let mut buf = String::new();

        loop {
            buf.clear();
            if self.reader.read_line(&mut buf)? == 0 {
                return Ok(None);
            }

            let line = buf.trim();
            if line.is_empty() {
                continue;
            }

            if is_boundary(line) {
                if snapshot.is_empty() {
                    continue;
                }
                return Ok(Some(snapshot));
            }

            match record::parse(line) {
                Ok(CounterRecord::ProcessSummary {
                    name,
                    pid,
                    bytes_in,
                    bytes_out,
                }) => {
                    let key = ProcessKey::new(name, pid);
                    snapshot
                        .processes
                        .insert(key.clone(), ProcessCounters { bytes_in, bytes_out });
                    current = Some(key);
                }
                Ok(CounterRecord::Connection { .. }) => {
                    count_connection(&mut snapshot, current.as_ref());
                }
                Err(e) => {
                    // Connection rows sometimes fail field parsing but are
                    // still recognizable by identifier shape; they count.
                    if identifier_of(line).is_some_and(record::connection_shaped) {
                        count_connection(&mut snapshot, current.as_ref());
                    } else {
                        trace!("discarding unparseable feed line: {} ({})", line, e);
                    }
                }
            }
        }
    }
}

fn identifier_of(line: &str) -> Option<&str> {
    let line = line.strip_prefix(',').unwrap_or(line);
    line.split(',').nth(1)
}

fn count_connection(snapshot: &mut Snapshot, current: Option<&ProcessKey>) {
    // No-op before the first process summary of the interval
    if let Some(key) = current {
        *snapshot.connections.entry(key.clone()).or_insert(0) += 1;
    }
}
