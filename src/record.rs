//! Counter feed record parsing.
//!
//! This module parses single lines of the nettop-style CSV counter feed into
//! typed records. The feed interleaves two record shapes behind one grammar:
//!
//! - Process summary: `time,processname.pid,,,bytes_in,bytes_out,...`
//! - Connection:      `time,connection_string,interface,state,bytes_in,bytes_out,...`
//!
//! Parse failures are per-line and recoverable; the caller discards the line
//! and keeps consuming the stream.

use once_cell::sync::Lazy;
use regex::Regex;

/// Identifier prefixes that mark a record as a connection entry.
pub const CONNECTION_PREFIXES: [&str; 6] = ["tcp", "udp", "tcp4", "tcp6", "udp4", "udp6"];

/// Field index of the record identifier (field 0 is the sample time).
const IDENTIFIER_FIELD: usize = 1;
/// Field index of the cumulative bytes-in counter.
const BYTES_IN_FIELD: usize = 4;
/// Field index of the cumulative bytes-out counter.
const BYTES_OUT_FIELD: usize = 5;
/// Minimum number of comma-separated fields for any parseable record.
const MIN_FIELDS: usize = 6;

/// Matches a process-summary identifier: `<name>.<pid>` with the pid anchored
/// at the end. The name part is matched lazily so names containing dots keep
/// everything up to the final dot.
static PROCESS_IDENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)\.(\d+)$").expect("process identifier regex is valid"));

/// One parsed line of the counter feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterRecord {
    /// Per-process cumulative byte counters.
    ProcessSummary {
        name: String,
        pid: u32,
        bytes_in: u64,
        bytes_out: u64,
    },
    /// A single connection row. Carries no identity of its own; the caller
    /// attributes it to the most recent process summary by stream position.
    Connection { bytes_in: u64, bytes_out: u64 },
}

/// Reasons a line can be rejected. Never propagated past the accumulator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("expected at least {MIN_FIELDS} fields, got {0}")]
    TooFewFields(usize),
    #[error("empty identifier field")]
    EmptyIdentifier,
    #[error("identifier does not match <name>.<pid>")]
    MalformedIdentifier,
    #[error("byte counter field is missing or not an integer")]
    BadCounter,
}

/// Returns true if an identifier has the connection shape: it contains the
/// endpoint separator `<->` or starts with a known protocol prefix.
pub fn connection_shaped(identifier: &str) -> bool {
    identifier.contains("<->") || CONNECTION_PREFIXES.iter().any(|p| identifier.starts_with(p))
}

/// Strips a single leading and a single trailing field delimiter.
fn strip_delimiters(line: &str) -> &str {
    let line = line.strip_prefix(',').unwrap_or(line);
    line.strip_suffix(',').unwrap_or(line)
}

fn parse_counter(fields: &[&str], index: usize) -> Result<u64, ParseError> {
    fields
        .get(index)
        .and_then(|f| f.parse::<u64>().ok())
        .ok_or(ParseError::BadCounter)
}

/// Parses one raw feed line into a [`CounterRecord`].
///
/// Header/boundary lines are recognized upstream by the accumulator and must
/// not be passed here.
pub fn parse(line: &str) -> Result<CounterRecord, ParseError> {
    let fields: Vec<&str> = strip_delimiters(line).split(',').collect();

    if fields.len() < MIN_FIELDS {
        return Err(ParseError::TooFewFields(fields.len()));
    }

    let identifier = fields[IDENTIFIER_FIELD];
    if identifier.is_empty() {
        return Err(ParseError::EmptyIdentifier);
    }

    let bytes_in = parse_counter(&fields, BYTES_IN_FIELD)?;
    let bytes_out = parse_counter(&fields, BYTES_OUT_FIELD)?;

    if connection_shaped(identifier) {
        return Ok(CounterRecord::Connection {
            bytes_in,
            bytes_out,
        });
    }

    let caps = PROCESS_IDENT_RE
        .captures(identifier)
        .ok_or(ParseError::MalformedIdentifier)?;

    let name = caps[1].to_string();
    let pid: u32 = caps[2].parse().map_err(|_| ParseError::MalformedIdentifier)?;

    Ok(CounterRecord::ProcessSummary {
        name,
        pid,
        bytes_in,
        bytes_out,
    })
}
