//! Bounded rolling history of per-process throughput.
//!
//! Each monitored process owns one download and one upload FIFO, capped at
//! the configured window length; a shared timestamp FIFO marks the sampling
//! instants. Buffers are created lazily on a key's first successful rate
//! computation and evicted oldest-first once full, so memory stays bounded
//! per key regardless of session length.

use ahash::AHashMap as HashMap;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use tracing::debug;

use crate::rates::ProcessStat;
use crate::snapshot::ProcessKey;

/// Default window length: 60 sampling intervals.
pub const DEFAULT_WINDOW: usize = 60;

/// Default number of consecutive absent intervals after which a key's
/// history is pruned. Zero disables pruning entirely.
pub const DEFAULT_PRUNE_AFTER: u64 = 300;

/// Download/upload sample FIFOs for one process.
#[derive(Debug, Clone, Default)]
pub struct SeriesPair {
    download: VecDeque<f64>,
    upload: VecDeque<f64>,
    /// Consecutive appends in which this key was absent from the stats.
    idle_intervals: u64,
}

impl SeriesPair {
    pub fn download(&self) -> &VecDeque<f64> {
        &self.download
    }

    pub fn upload(&self) -> &VecDeque<f64> {
        &self.upload
    }

    fn push(&mut self, capacity: usize, download: f64, upload: f64) {
        push_bounded(&mut self.download, capacity, download);
        push_bounded(&mut self.upload, capacity, upload);
        self.idle_intervals = 0;
    }
}

fn push_bounded<T>(fifo: &mut VecDeque<T>, capacity: usize, value: T) {
    if fifo.len() == capacity {
        fifo.pop_front();
    }
    fifo.push_back(value);
}

/// Per-process throughput history with a shared timestamp series.
#[derive(Debug)]
pub struct HistoryStore {
    capacity: usize,
    prune_after: u64,
    series: HashMap<ProcessKey, SeriesPair>,
    timestamps: VecDeque<DateTime<Utc>>,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_PRUNE_AFTER)
    }
}

impl HistoryStore {
    /// Creates a store with the given window length. `prune_after` is the
    /// number of consecutive absent intervals before a key's history is
    /// dropped; `0` keeps vanished keys forever.
    pub fn new(capacity: usize, prune_after: u64) -> Self {
        Self {
            capacity,
            prune_after,
            series: HashMap::new(),
            timestamps: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends one sample per direction for every key present in `stats`,
    /// plus one shared timestamp. Keys absent from `stats` keep their
    /// existing samples and accrue idle time toward pruning.
    pub fn append(&mut self, stats: &HashMap<ProcessKey, ProcessStat>, at: DateTime<Utc>) {
        push_bounded(&mut self.timestamps, self.capacity, at);

        for (key, stat) in stats {
            self.series
                .entry(key.clone())
                .or_default()
                .push(self.capacity, stat.download_rate, stat.upload_rate);
        }

        if self.prune_after == 0 {
            return;
        }

        let prune_after = self.prune_after;
        self.series.retain(|key, pair| {
            if stats.contains_key(key) {
                return true;
            }
            pair.idle_intervals += 1;
            if pair.idle_intervals > prune_after {
                debug!("pruning history for {} after {} idle intervals", key, prune_after);
                false
            } else {
                true
            }
        });
    }

    /// Returns the windowed (download, upload) samples for a key in oldest
    /// to newest order, or `None` if the key has never produced a rate.
    pub fn windowed(&self, key: &ProcessKey) -> Option<(Vec<f64>, Vec<f64>)> {
        self.series.get(key).map(|pair| {
            (
                pair.download.iter().copied().collect(),
                pair.upload.iter().copied().collect(),
            )
        })
    }

    /// Iterates all keys with their series, no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&ProcessKey, &SeriesPair)> {
        self.series.iter()
    }

    pub fn timestamps(&self) -> &VecDeque<DateTime<Utc>> {
        &self.timestamps
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Empties every per-key FIFO and the timestamp series. Key entries
    /// themselves are kept; they refill on the next append.
    pub fn clear(&mut self) {
        for pair in self.series.values_mut() {
            pair.download.clear();
            pair.upload.clear();
        }
        self.timestamps.clear();
    }
}
