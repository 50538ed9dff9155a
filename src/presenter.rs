//! Presentation boundary: sorting, formatting, and the 1 Hz table loop.
//!
//! The actual widget/window layer is out of scope; this module is the seam
//! it plugs into. It consumes the sampler's watch channel once per second,
//! sorts the stat mapping by the caller's sort specification, hides idle
//! rows, projects the shared history for the activity graph, and renders a
//! plain-text table. A pause flag suspends rendering without touching the
//! sampler, so history keeps accumulating invisibly while paused.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{error, info};

use crate::graph::{self, Direction, PlotArea, PlotFrame};
use crate::history::HistoryStore;
use crate::rates::ProcessStat;
use crate::sampler::{MonitorStatus, TrafficUpdate, UpdateReceiver};
use crate::snapshot::ProcessKey;

/// Column of the process table to sort by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Process,
    Pid,
    Download,
    Upload,
    Connections,
}

impl SortColumn {
    /// Parses a config-file column name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "process" => Some(Self::Process),
            "pid" => Some(Self::Pid),
            "download" => Some(Self::Download),
            "upload" => Some(Self::Upload),
            "connections" => Some(Self::Connections),
            _ => None,
        }
    }
}

/// Caller-selected sort: column plus direction.
#[derive(Debug, Clone, Copy)]
pub struct SortSpec {
    pub column: SortColumn,
    pub descending: bool,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            column: SortColumn::Download,
            descending: true,
        }
    }
}

/// Sorts the stat mapping into display order. Ties fall back to key order
/// so the table is stable between refreshes.
pub fn sort_stats<'a>(
    stats: &'a ahash::AHashMap<ProcessKey, ProcessStat>,
    spec: SortSpec,
) -> Vec<(&'a ProcessKey, &'a ProcessStat)> {
    let mut rows: Vec<_> = stats.iter().collect();

    rows.sort_by(|(ka, sa), (kb, sb)| {
        let ordering = match spec.column {
            SortColumn::Process => ka.name.cmp(&kb.name).then(ka.pid.cmp(&kb.pid)),
            SortColumn::Pid => ka.pid.cmp(&kb.pid),
            SortColumn::Download => sa
                .download_rate
                .partial_cmp(&sb.download_rate)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| ka.cmp(kb)),
            SortColumn::Upload => sa
                .upload_rate
                .partial_cmp(&sb.upload_rate)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| ka.cmp(kb)),
            SortColumn::Connections => sa.connections.cmp(&sb.connections).then_with(|| ka.cmp(kb)),
        };

        if spec.descending {
            ordering.reverse()
        } else {
            ordering
        }
    });

    rows
}

/// Formats a byte count into a human readable string (1024 steps).
pub fn format_bytes(mut value: f64) -> String {
    for unit in ["B", "KB", "MB", "GB"] {
        if value < 1024.0 {
            return format!("{:.1} {}", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.1} TB", value)
}

/// Formats a throughput value as `<bytes>/s`.
pub fn format_rate(value: f64) -> String {
    format!("{}/s", format_bytes(value))
}

/// Plain-text table renderer for the presentation loop.
pub struct TablePresenter {
    sort: SortSpec,
    min_display_rate: f64,
}

impl TablePresenter {
    pub fn new(sort: SortSpec, min_display_rate: f64) -> Self {
        Self {
            sort,
            min_display_rate,
        }
    }

    /// Renders one update into a table string. Rows with both rates under
    /// the display threshold are hidden (they still exist in the stats and
    /// the history).
    pub fn render(&self, update: &TrafficUpdate, frame: &PlotFrame) -> String {
        let mut out = String::new();

        out.push_str(&format!(
            "{:<28} {:>7} {:>12} {:>12} {:>6}\n",
            "PROCESS", "PID", "DOWNLOAD", "UPLOAD", "CONNS"
        ));

        for (key, stat) in sort_stats(&update.stats, self.sort) {
            if stat.download_rate < self.min_display_rate
                && stat.upload_rate < self.min_display_rate
            {
                continue;
            }
            out.push_str(&format!(
                "{:<28} {:>7} {:>12} {:>12} {:>6}\n",
                truncate(&key.name, 28),
                key.pid,
                format_rate(stat.download_rate),
                format_rate(stat.upload_rate),
                stat.connections
            ));
        }

        out.push_str(&format!(
            "Total: down {} up {} | graph: {} series | status: {} | {}\n",
            format_rate(update.total_download),
            format_rate(update.total_upload),
            frame.polylines.len(),
            update.status,
            update.at.format("%H:%M:%S")
        ));

        let legend: Vec<String> = frame
            .polylines
            .iter()
            .filter(|p| p.direction == Direction::Download)
            .map(|p| format!("{} {}", p.color.to_hex(), p.key))
            .collect();
        if !legend.is_empty() {
            out.push_str(&format!("Series: {}\n", legend.join(", ")));
        }

        out
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// The periodic presentation loop.
///
/// Reads the latest update once per second and prints the rendered table.
/// Pausing suspends output only; the sampler keeps running. The loop exits
/// on shutdown or when the sampler reports a terminal status.
pub async fn run_presenter(
    rx: UpdateReceiver,
    history: Arc<RwLock<HistoryStore>>,
    presenter: TablePresenter,
    paused: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
) {
    let mut out = std::io::stdout();
    run_presenter_with(rx, history, presenter, paused, running, &mut out).await;
}

async fn run_presenter_with<W: Write>(
    mut rx: UpdateReceiver,
    history: Arc<RwLock<HistoryStore>>,
    presenter: TablePresenter,
    paused: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    out: &mut W,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        if !running.load(Ordering::Relaxed) {
            return;
        }

        let update = rx.borrow_and_update().clone();

        if !paused.load(Ordering::Relaxed) {
            let frame = {
                let history = history.read().expect("history lock poisoned");
                graph::project(&history, PlotArea::default())
            };
            let _ = write!(out, "{}", presenter.render(&update, &frame));
            let _ = out.flush();
        }

        match &update.status {
            MonitorStatus::Ended => {
                info!("sampling ended, presentation loop stopping");
                running.store(false, Ordering::Relaxed);
                return;
            }
            MonitorStatus::Failed(e) => {
                error!("sampling failed: {}", e);
                running.store(false, Ordering::Relaxed);
                return;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::AHashMap as HashMap;
    use chrono::Utc;

    fn stats_fixture() -> HashMap<ProcessKey, ProcessStat> {
        let mut stats = HashMap::new();
        stats.insert(
            ProcessKey::new("alpha", 1),
            ProcessStat {
                download_rate: 500.0,
                upload_rate: 10.0,
                connections: 2,
            },
        );
        stats.insert(
            ProcessKey::new("beta", 2),
            ProcessStat {
                download_rate: 2000.0,
                upload_rate: 400.0,
                connections: 7,
            },
        );
        stats.insert(
            ProcessKey::new("idle", 3),
            ProcessStat {
                download_rate: 5.0,
                upload_rate: 5.0,
                connections: 0,
            },
        );
        stats
    }

    #[test]
    fn test_sort_by_download_descending() {
        let stats = stats_fixture();
        let rows = sort_stats(
            &stats,
            SortSpec {
                column: SortColumn::Download,
                descending: true,
            },
        );
        let names: Vec<&str> = rows.iter().map(|(k, _)| k.name.as_str()).collect();
        assert_eq!(names, vec!["beta", "alpha", "idle"]);
    }

    #[test]
    fn test_sort_by_name_ascending() {
        let stats = stats_fixture();
        let rows = sort_stats(
            &stats,
            SortSpec {
                column: SortColumn::Process,
                descending: false,
            },
        );
        let names: Vec<&str> = rows.iter().map(|(k, _)| k.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta", "idle"]);
    }

    #[test]
    fn test_sort_by_connections() {
        let stats = stats_fixture();
        let rows = sort_stats(
            &stats,
            SortSpec {
                column: SortColumn::Connections,
                descending: true,
            },
        );
        assert_eq!(rows[0].0.name, "beta");
    }

    #[test]
    fn test_format_bytes_units() {
        assert_eq!(format_bytes(0.0), "0.0 B");
        assert_eq!(format_bytes(512.0), "512.0 B");
        assert_eq!(format_bytes(2048.0), "2.0 KB");
        assert_eq!(format_bytes(1536.0), "1.5 KB");
        assert_eq!(format_bytes(3.0 * 1024.0 * 1024.0), "3.0 MB");
        assert_eq!(format_bytes(2.0_f64.powi(40)), "1.0 TB");
    }

    #[test]
    fn test_render_hides_idle_rows() {
        let update = TrafficUpdate {
            stats: stats_fixture(),
            total_download: 2505.0,
            total_upload: 415.0,
            status: MonitorStatus::Running,
            at: Utc::now(),
        };
        let presenter = TablePresenter::new(SortSpec::default(), 100.0);
        let history = HistoryStore::default();
        let frame = graph::project(&history, PlotArea::default());

        let rendered = presenter.render(&update, &frame);
        assert!(rendered.contains("alpha"));
        assert!(rendered.contains("beta"));
        assert!(!rendered.contains("idle"));
        assert!(rendered.contains("status: running"));
    }

    #[test]
    fn test_sort_column_names_round_trip() {
        for name in crate::config::KNOWN_SORT_COLUMNS {
            assert!(SortColumn::from_name(name).is_some(), "{} must parse", name);
        }
        assert!(SortColumn::from_name("bogus").is_none());
    }

    #[test]
    fn test_render_legend_lists_series_colors() {
        let mut history = HistoryStore::default();
        history.append(&stats_fixture(), Utc::now());
        let frame = graph::project(&history, PlotArea::default());

        let update = TrafficUpdate {
            stats: stats_fixture(),
            total_download: 2505.0,
            total_upload: 415.0,
            status: MonitorStatus::Running,
            at: Utc::now(),
        };
        let presenter = TablePresenter::new(SortSpec::default(), 0.0);
        let rendered = presenter.render(&update, &frame);

        let legend = rendered
            .lines()
            .find(|l| l.starts_with("Series:"))
            .expect("legend line present");
        assert!(legend.contains('#'));
        assert!(legend.contains("alpha.1"));
        assert!(legend.contains("beta.2"));
    }

    fn update_with(status: MonitorStatus) -> Arc<TrafficUpdate> {
        Arc::new(TrafficUpdate {
            stats: stats_fixture(),
            total_download: 2505.0,
            total_upload: 415.0,
            status,
            at: Utc::now(),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_loop_stays_silent_while_sampling_continues() {
        let (tx, rx) = crate::sampler::update_channel();
        let history = Arc::new(RwLock::new(HistoryStore::default()));
        let paused = Arc::new(AtomicBool::new(true));
        let running = Arc::new(AtomicBool::new(true));
        let presenter = TablePresenter::new(SortSpec::default(), 0.0);
        let mut out = Vec::new();

        let driver = {
            let history = history.clone();
            async move {
                let _ = tx.send(update_with(MonitorStatus::Running));
                tokio::time::sleep(Duration::from_millis(2500)).await;
                // The write side keeps appending while the display is paused
                history
                    .write()
                    .unwrap()
                    .append(&stats_fixture(), Utc::now());
                let _ = tx.send(update_with(MonitorStatus::Ended));
            }
        };

        let presentation = run_presenter_with(
            rx,
            history.clone(),
            presenter,
            paused.clone(),
            running.clone(),
            &mut out,
        );
        tokio::join!(presentation, driver);

        assert!(out.is_empty(), "paused loop must render nothing");
        assert!(!running.load(Ordering::Relaxed), "terminal status clears the flag");
        assert_eq!(history.read().unwrap().timestamps().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_renders_then_stops_on_ended() {
        let (tx, rx) = crate::sampler::update_channel();
        let history = Arc::new(RwLock::new(HistoryStore::default()));
        let paused = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(true));
        let presenter = TablePresenter::new(SortSpec::default(), 0.0);
        let mut out = Vec::new();

        let driver = async move {
            let _ = tx.send(update_with(MonitorStatus::Running));
            tokio::time::sleep(Duration::from_millis(1500)).await;
            let _ = tx.send(update_with(MonitorStatus::Ended));
        };

        let presentation = run_presenter_with(
            rx,
            history.clone(),
            presenter,
            paused,
            running.clone(),
            &mut out,
        );
        tokio::join!(presentation, driver);

        let rendered = String::from_utf8(out).unwrap();
        assert!(rendered.contains("alpha"));
        assert!(rendered.contains("stream ended"));
        assert!(!running.load(Ordering::Relaxed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_exits_when_running_cleared() {
        let (_tx, rx) = crate::sampler::update_channel();
        let history = Arc::new(RwLock::new(HistoryStore::default()));
        let running = Arc::new(AtomicBool::new(false));
        let presenter = TablePresenter::new(SortSpec::default(), 0.0);
        let mut out = Vec::new();

        run_presenter_with(
            rx,
            history,
            presenter,
            Arc::new(AtomicBool::new(false)),
            running,
            &mut out,
        )
        .await;

        assert!(out.is_empty());
    }
}
