//! File naming and access paths for stored images.
//!
//! Names are the UTC ingestion time with nanosecond precision, e.g.
//! `2024-03-05 07:08:09.000000001.jpeg`. The fractional part is always nine
//! digits so that lexical order of names follows upload order.

use chrono::{DateTime, Utc};

/// Prefix of every access URL handed back to clients.
pub const ACCESS_PATH: &str = "/image?source=";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

/// Build the file name for an ingest at `at`.
///
/// `attempt` 0 is the plain timestamp name; later attempts insert `-<n>`
/// before the extension to step around an existing file.
pub fn file_name(at: DateTime<Utc>, extension: &str, attempt: u32) -> String {
    let stamp = at.format(TIMESTAMP_FORMAT);
    if attempt == 0 {
        format!("{stamp}{extension}")
    } else {
        format!("{stamp}-{attempt}{extension}")
    }
}

pub fn access_url(file_name: &str) -> String {
    format!("{ACCESS_PATH}{file_name}")
}

/// A source must name a single file directly under the storage prefix.
pub fn is_valid_source(source: &str) -> bool {
    !source.is_empty()
        && source != "."
        && source != ".."
        && !source.contains(['/', '\\', '\0'])
}
