//! Library side of the `cronocam` binary: file discovery, the backup run
//! pipeline, and status formatting helpers.

pub mod discover;
pub mod pipeline;

use chrono::{DateTime, Utc};

pub use pipeline::{BackupRun, RunError, RunOptions, RunSummary};

/// Human-readable age of `time` relative to `now`, e.g. "3 hours ago".
///
/// Anything older than 30 days is shown as a date.
pub fn format_relative_time(time: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now.signed_duration_since(time);

    if diff.num_minutes() < 1 {
        "just now".to_string()
    } else if diff.num_hours() < 1 {
        plural_ago(diff.num_minutes(), "minute")
    } else if diff.num_days() < 1 {
        plural_ago(diff.num_hours(), "hour")
    } else if diff.num_days() < 30 {
        plural_ago(diff.num_days(), "day")
    } else {
        time.format("%b %-d, %Y").to_string()
    }
}

fn plural_ago(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", n, unit)
    }
}

/// Last path component for compact listings
pub fn display_name(path: &str) -> &str {
    std::path::Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
}
