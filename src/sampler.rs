//! The sampling task: accumulate, diff, record, publish.
//!
//! One blocking loop owns the whole write side of the pipeline. Each
//! completed feed iteration is differenced against the previous one, the
//! resulting rates are appended to the shared history, and a fresh
//! [`TrafficUpdate`] is swapped into a `watch` channel. The channel is the
//! single-slot latest-wins hand-off to the presentation side: the presenter
//! only ever observes whole, sealed updates and never blocks the sampler.

use ahash::AHashMap as HashMap;
use chrono::{DateTime, Utc};
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::history::HistoryStore;
use crate::rates::{self, ProcessStat};
use crate::snapshot::{ProcessKey, Snapshot, SnapshotAccumulator};

/// Lifecycle of the sampling subsystem as seen by the presenter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorStatus {
    /// No complete interval yet.
    Starting,
    Running,
    /// The counter stream ended; sampling is over for this session.
    Ended,
    /// The stream failed with an I/O error.
    Failed(String),
}

impl std::fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorStatus::Starting => write!(f, "starting"),
            MonitorStatus::Running => write!(f, "running"),
            MonitorStatus::Ended => write!(f, "stream ended"),
            MonitorStatus::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// One interval's published result: the full stat mapping plus aggregates.
#[derive(Debug, Clone)]
pub struct TrafficUpdate {
    pub stats: HashMap<ProcessKey, ProcessStat>,
    pub total_download: f64,
    pub total_upload: f64,
    pub status: MonitorStatus,
    pub at: DateTime<Utc>,
}

impl TrafficUpdate {
    /// The initial channel value before the first completed interval.
    pub fn starting() -> Self {
        Self {
            stats: HashMap::new(),
            total_download: 0.0,
            total_upload: 0.0,
            status: MonitorStatus::Starting,
            at: Utc::now(),
        }
    }
}

pub type UpdateSender = watch::Sender<Arc<TrafficUpdate>>;
pub type UpdateReceiver = watch::Receiver<Arc<TrafficUpdate>>;

/// Creates the update channel seeded with a starting placeholder.
pub fn update_channel() -> (UpdateSender, UpdateReceiver) {
    watch::channel(Arc::new(TrafficUpdate::starting()))
}

/// Republishes the latest update with a terminal status, keeping its stats
/// visible in the table after sampling stops.
fn publish_status(tx: &UpdateSender, status: MonitorStatus) {
    let mut last = (**tx.borrow()).clone();
    last.status = status;
    let _ = tx.send(Arc::new(last));
}

/// Runs the sampling loop until the stream ends, fails, or `running` is
/// cleared. Blocking; intended for `tokio::task::spawn_blocking` or a
/// dedicated thread.
pub fn run_sampler(
    reader: impl BufRead,
    history: Arc<RwLock<HistoryStore>>,
    tx: UpdateSender,
    running: Arc<AtomicBool>,
    dt: f64,
) {
    let mut accumulator = SnapshotAccumulator::new(reader);
    let mut previous: Option<Snapshot> = None;

    loop {
        if !running.load(Ordering::Relaxed) {
            debug!("sampler stopping: shutdown requested");
            return;
        }

        let current = match accumulator.next_snapshot() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                // Deliberate shutdown kills the feed, which also reads as EOF
                if running.load(Ordering::Relaxed) {
                    info!("counter stream ended");
                    publish_status(&tx, MonitorStatus::Ended);
                }
                return;
            }
            Err(e) => {
                error!("counter stream read failed: {}", e);
                publish_status(&tx, MonitorStatus::Failed(e.to_string()));
                return;
            }
        };

        if let Some(prev) = previous.take() {
            let stats = rates::diff(&prev, &current, dt);
            let at = Utc::now();

            {
                let mut history = history.write().expect("history lock poisoned");
                history.append(&stats, at);
            }

            let (total_download, total_upload) = rates::totals(&stats);
            debug!(
                "interval complete: {} processes, {:.0} B/s down, {:.0} B/s up",
                stats.len(),
                total_download,
                total_upload
            );

            let _ = tx.send(Arc::new(TrafficUpdate {
                stats,
                total_download,
                total_upload,
                status: MonitorStatus::Running,
                at,
            }));
        }

        previous = Some(current);
    }
}
