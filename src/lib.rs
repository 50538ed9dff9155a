//! netmon - per-process network traffic monitor
//!
//! Samples a `nettop`-style CSV counter feed, groups the cumulative
//! counters into per-interval snapshots, differences consecutive snapshots
//! into download/upload rates, and keeps a rolling history for the
//! log-scale activity graph.
//!
//! Pipeline, write side to read side:
//! [`snapshot::SnapshotAccumulator`] -> [`rates::diff`] ->
//! [`history::HistoryStore`] -> [`graph::project`] /
//! [`presenter::TablePresenter`].

pub mod cli;
pub mod config;
pub mod error;
pub mod feed;
pub mod graph;
pub mod history;
pub mod presenter;
pub mod rates;
pub mod record;
pub mod sampler;
pub mod snapshot;

pub use error::Error;
