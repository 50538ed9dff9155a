//! Error types for startup- and stream-level failures.
//!
//! Per-line parse failures are handled entirely inside the record/snapshot
//! layers (see [`crate::record::ParseError`]) and never reach this type;
//! only failures that end sampling or prevent it from starting live here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The supplied credential was rejected before sampling began.
    #[error("elevation failed: {0}")]
    Elevation(String),

    /// The external counter process could not be started.
    #[error("failed to spawn counter feed '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
