//! End-to-end pipeline tests: raw feed text through snapshot accumulation,
//! rate derivation, history, and graph projection.

use chrono::Utc;
use netmon::graph::{self, PlotArea};
use netmon::history::HistoryStore;
use netmon::rates;
use netmon::snapshot::{ProcessKey, SnapshotAccumulator};
use std::io::Cursor;

/// Runs a whole feed through the pipeline at dt=1, returning the final
/// stats and the populated history.
fn run_pipeline(
    feed: &str,
) -> (
    ahash::AHashMap<ProcessKey, rates::ProcessStat>,
    HistoryStore,
) {
    let mut accumulator = SnapshotAccumulator::new(Cursor::new(feed.to_string()));
    let mut history = HistoryStore::new(60, 0);
    let mut previous = None;
    let mut stats = ahash::AHashMap::new();

    while let Some(current) = accumulator.next_snapshot().unwrap() {
        if let Some(prev) = previous.take() {
            stats = rates::diff(&prev, &current, 1.0);
            history.append(&stats, Utc::now());
        }
        previous = Some(current);
    }

    (stats, history)
}

const BOUNDARY: &str = "time,,interface,state\n";

#[test]
fn test_steady_transfer_produces_constant_rates() {
    let feed = format!(
        "{b}0,browser.512,,,1000,500\n\
         {b}1,browser.512,,,2024,756\n\
         {b}2,browser.512,,,3048,1012\n{b}",
        b = BOUNDARY
    );
    let (stats, history) = run_pipeline(&feed);

    let key = ProcessKey::new("browser", 512);
    assert_eq!(stats[&key].download_rate, 1024.0);
    assert_eq!(stats[&key].upload_rate, 256.0);

    let (down, up) = history.windowed(&key).unwrap();
    assert_eq!(down, vec![1024.0, 1024.0]);
    assert_eq!(up, vec![256.0, 256.0]);
    assert_eq!(history.timestamps().len(), 2);
}

#[test]
fn test_counter_reset_clamps_to_zero_rate() {
    // bytes_in drops between snapshots (process restarted with the same pid)
    let feed = format!(
        "{b}0,daemon.7,,,50000,1000\n\
         {b}1,daemon.7,,,300,1500\n{b}",
        b = BOUNDARY
    );
    let (stats, _) = run_pipeline(&feed);

    let stat = stats[&ProcessKey::new("daemon", 7)];
    assert_eq!(stat.download_rate, 0.0);
    assert_eq!(stat.upload_rate, 500.0);
}

#[test]
fn test_new_process_rates_appear_one_interval_late() {
    // late.9 shows up only in the second snapshot, so its first diff needs
    // a third snapshot
    let feed = format!(
        "{b}0,early.1,,,100,100\n\
         {b}1,early.1,,,200,200\n\
         1,late.9,,,1000,1000\n\
         {b}2,early.1,,,300,300\n\
         2,late.9,,,1600,1400\n{b}",
        b = BOUNDARY
    );
    let (stats, history) = run_pipeline(&feed);

    let late = ProcessKey::new("late", 9);
    assert_eq!(stats[&late].download_rate, 600.0);
    assert_eq!(stats[&late].upload_rate, 400.0);

    // First interval had no baseline for late.9
    let (down, _) = history.windowed(&late).unwrap();
    assert_eq!(down, vec![600.0]);
    let (early_down, _) = history.windowed(&ProcessKey::new("early", 1)).unwrap();
    assert_eq!(early_down, vec![100.0, 100.0]);
}

#[test]
fn test_vanished_process_drops_out_of_stats() {
    let feed = format!(
        "{b}0,gone.3,,,100,100\n\
         0,stay.4,,,100,100\n\
         {b}1,stay.4,,,200,200\n{b}",
        b = BOUNDARY
    );
    let (stats, _) = run_pipeline(&feed);

    assert!(!stats.contains_key(&ProcessKey::new("gone", 3)));
    assert_eq!(stats[&ProcessKey::new("stay", 4)].download_rate, 100.0);
}

#[test]
fn test_connection_counts_flow_into_stats() {
    let feed = format!(
        "{b}0,app.42,,,1000,1000\n\
         1,tcp4 10.0.0.1:443<->10.0.0.2:80,en0,Established,10,10\n\
         {b}1,app.42,,,2000,2000\n\
         1,tcp4 10.0.0.1:443<->10.0.0.2:80,en0,Established,20,20\n\
         1,udp4 *:5353<->*:*,en0,,1,1\n{b}",
        b = BOUNDARY
    );
    let (stats, _) = run_pipeline(&feed);

    let stat = stats[&ProcessKey::new("app", 42)];
    // The count comes from the current snapshot, not the baseline
    assert_eq!(stat.connections, 2);
    assert_eq!(stat.download_rate, 1000.0);
}

#[test]
fn test_process_names_with_dots_keep_full_name() {
    let feed = format!(
        "{b}0,com.apple.WebKit.512,,,100,100\n\
         {b}1,com.apple.WebKit.512,,,300,200\n{b}",
        b = BOUNDARY
    );
    let (stats, _) = run_pipeline(&feed);

    let key = ProcessKey::new("com.apple.WebKit", 512);
    assert_eq!(stats[&key].download_rate, 200.0);
}

#[test]
fn test_noisy_feed_survives_to_projection() {
    let feed = format!(
        "{b}garbage line\n\
         0,app.1,,,0,0\n\
         ,tcp4 1.2.3.4:1<->5.6.7.8:2,en0,Established,broken,counters\n\
         {b}1,app.1,,,4096,2048\n\
         {b}2,app.1,,,8192,4096\n{b}",
        b = BOUNDARY
    );
    let (_, history) = run_pipeline(&feed);

    let frame = graph::project(&history, PlotArea::default());
    // One process, two directions
    assert_eq!(frame.polylines.len(), 2);
    assert!(frame.max_value > 4096.0);

    // Every plotted y stays inside the plot rectangle
    let area = PlotArea::default();
    for point in frame.points() {
        assert!(point.y >= area.top - 1e-9);
        assert!(point.y <= area.top + area.height + 1e-9);
    }
}

#[test]
fn test_totals_sum_all_processes() {
    let feed = format!(
        "{b}0,a.1,,,0,0\n\
         0,b.2,,,0,0\n\
         {b}1,a.1,,,100,10\n\
         1,b.2,,,200,20\n{b}",
        b = BOUNDARY
    );
    let (stats, _) = run_pipeline(&feed);

    let (down, up) = rates::totals(&stats);
    assert_eq!(down, 300.0);
    assert_eq!(up, 30.0);
}

#[test]
fn test_dt_scales_rates() {
    let feed = format!("{b}0,p.1,,,0,0\n{b}1,p.1,,,1000,500\n{b}", b = BOUNDARY);
    let mut accumulator = SnapshotAccumulator::new(Cursor::new(feed));
    let first = accumulator.next_snapshot().unwrap().unwrap();
    let second = accumulator.next_snapshot().unwrap().unwrap();

    let stats = rates::diff(&first, &second, 2.0);
    let stat = stats[&ProcessKey::new("p", 1)];
    assert_eq!(stat.download_rate, 500.0);
    assert_eq!(stat.upload_rate, 250.0);
}
