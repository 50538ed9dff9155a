//! Rate derivation from consecutive counter snapshots.
//!
//! The feed reports cumulative byte counters; instantaneous throughput is the
//! delta between two consecutive snapshots divided by the sampling interval.
//! A process whose counters went backwards (reset or wraparound) reports a
//! zero rate for that interval rather than a negative one.

use ahash::AHashMap as HashMap;

use crate::snapshot::{ProcessKey, Snapshot};

/// Derived per-process throughput for the current interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessStat {
    /// Bytes per second received.
    pub download_rate: f64,
    /// Bytes per second sent.
    pub upload_rate: f64,
    /// Connection rows attributed to this process in the current snapshot.
    pub connections: u32,
}

/// Differences two consecutive snapshots into per-process rates.
///
/// Only keys present in both snapshots produce a stat: a key seen for the
/// first time merely establishes its baseline, and a key that disappeared is
/// dropped. The result wholly replaces any previous stat mapping.
pub fn diff(previous: &Snapshot, current: &Snapshot, dt: f64) -> HashMap<ProcessKey, ProcessStat> {
    let mut stats = HashMap::with_capacity(current.processes.len());

    for (key, curr) in &current.processes {
        let Some(prev) = previous.processes.get(key) else {
            continue;
        };

        // saturating_sub clamps counter resets to a one-interval zero dip
        let download_rate = curr.bytes_in.saturating_sub(prev.bytes_in) as f64 / dt;
        let upload_rate = curr.bytes_out.saturating_sub(prev.bytes_out) as f64 / dt;
        let connections = current.connections.get(key).copied().unwrap_or(0);

        stats.insert(
            key.clone(),
            ProcessStat {
                download_rate,
                upload_rate,
                connections,
            },
        );
    }

    stats
}

/// Aggregate (download, upload) rate over all current stats.
pub fn totals(stats: &HashMap<ProcessKey, ProcessStat>) -> (f64, f64) {
    stats.values().fold((0.0, 0.0), |(down, up), stat| {
        (down + stat.download_rate, up + stat.upload_rate)
    })
}
