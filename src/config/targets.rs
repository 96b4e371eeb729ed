//! Targets-file parsing.
//!
//! Sources and sinks are listed one per line in a flat delimited format:
//!
//! ```text
//! f,/etc/passwd
//! n,10.0.0.1,9999
//! f,"/mnt/c,d/report.txt"
//! ```
//!
//! `f` rows name a file path, `n` rows a network address and port. Fields may
//! be double-quoted; commas inside quotes are literal. Malformed rows are
//! logged with their line number and skipped; one bad row never aborts the
//! rest of the file.

use std::path::Path;

use thiserror::Error;
use tracing::warn;

use crate::types::Target;

/// Why a single row failed to parse. The row is skipped, not fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RowError {
    /// First field is neither `f` nor `n`.
    #[error("unknown target kind {0:?}")]
    UnknownKind(String),
    /// Field count does not match the kind.
    #[error("expected {expected} fields, found {found}")]
    BadArity {
        /// Field count the kind requires.
        expected: usize,
        /// Field count actually present.
        found: usize,
    },
    /// Port field is not a valid u16.
    #[error("invalid port {0:?}")]
    BadPort(String),
    /// Nothing on the line.
    #[error("empty row")]
    Empty,
}

/// Parses one row's fields into a target.
pub fn parse_row(fields: &[String]) -> Result<Target, RowError> {
    let Some(kind) = fields.first() else {
        return Err(RowError::Empty);
    };
    match kind.as_str() {
        "f" => {
            if fields.len() != 2 {
                return Err(RowError::BadArity {
                    expected: 2,
                    found: fields.len(),
                });
            }
            Ok(Target::file(fields[1].clone()))
        }
        "n" => {
            if fields.len() != 3 {
                return Err(RowError::BadArity {
                    expected: 3,
                    found: fields.len(),
                });
            }
            let port: u16 = fields[2]
                .parse()
                .map_err(|_| RowError::BadPort(fields[2].clone()))?;
            Ok(Target::network(fields[1].clone(), port))
        }
        other => Err(RowError::UnknownKind(other.to_owned())),
    }
}

/// Splits a line into fields: comma-delimited, double quotes protect commas,
/// empty fields dropped.
fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                if !current.is_empty() {
                    fields.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        fields.push(current);
    }
    fields
}

/// Parses targets from text, skipping malformed rows with a line-numbered
/// diagnostic.
pub fn parse_targets(contents: &str) -> Vec<Target> {
    let mut targets = Vec::new();
    for (i, line) in contents.lines().enumerate() {
        let line_number = i.saturating_add(1);
        let fields = split_fields(line);
        if fields.is_empty() {
            continue; // blank line
        }
        match parse_row(&fields) {
            Ok(target) => targets.push(target),
            Err(e) => warn!(line = line_number, error = %e, "skipping malformed target row"),
        }
    }
    targets
}

/// Reads and parses a targets file.
///
/// An unreadable file yields an empty list (logged), matching the
/// best-effort posture of the rest of the tracker.
pub fn parse_targets_file(path: impl AsRef<Path>) -> Vec<Target> {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(contents) => parse_targets(&contents),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read targets file, treating as empty");
            Vec::new()
        }
    }
}
