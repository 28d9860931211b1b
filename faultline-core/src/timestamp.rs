//! Capture-stamp normalization and parsing.
//!
//! Capture jobs name snapshots with path-safe stamps (`:` is not a legal
//! filename character everywhere), so historical data carries two spellings
//! of the same instant:
//!
//! - `2025-11-01T12-30-00Z` (path-safe, used for snapshot keys)
//! - `2025-11-01T12:30:00Z` (RFC 3339, used everywhere else)
//!
//! [`normalize`] converts the former to the latter and is a no-op on input
//! that is already normalized. It is applied once at ingestion; nothing
//! downstream of snapshot parsing ever sees a path-safe stamp.

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::error::FaultlineError;

/// Date, `T`, three two-digit time fields separated by either `-` (path-safe)
/// or `:` (RFC 3339), trailing `Z`.
const STAMP_PATTERN: &str = r"^\d{4}-\d{2}-\d{2}T\d{2}[-:]\d{2}[-:]\d{2}Z$";

/// Whether `value` has the shape of a capture stamp, in either spelling.
pub fn is_capture_stamp(value: &str) -> bool {
    Regex::new(STAMP_PATTERN)
        .map(|re| re.is_match(value))
        .unwrap_or(false)
}

/// Rewrite the path-safe time separators to RFC 3339 colons.
///
/// Examples:
/// - `2025-11-01T12-30-00Z` -> `2025-11-01T12:30:00Z`
/// - `2025-11-01T12:30:00Z` -> `2025-11-01T12:30:00Z` (unchanged)
/// - `not a stamp`          -> `not a stamp` (unchanged)
///
/// Deterministic and idempotent: normalizing an already-normalized stamp is
/// a no-op, and input that is not a capture stamp passes through untouched.
pub fn normalize(value: &str) -> String {
    if !is_capture_stamp(value) {
        return value.to_string();
    }
    // The time separators sit at fixed offsets: THH-MM-SSZ.
    value
        .chars()
        .enumerate()
        .map(|(i, c)| if (i == 13 || i == 16) && c == '-' { ':' } else { c })
        .collect()
}

/// Parse a capture stamp (either spelling) into a UTC timestamp.
pub fn parse(value: &str) -> Result<DateTime<Utc>, FaultlineError> {
    let normalized = normalize(value);
    DateTime::parse_from_rfc3339(&normalized)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| FaultlineError::InvalidTimestamp(value.to_string()))
}

// ============================================================================
// TESTS
// ============================================================================
