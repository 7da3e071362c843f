//! Shared utility functions used across multiple modules.

use chrono::{DateTime, Utc};

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Truncate text to at most 180 characters for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Current wall-clock time.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current Unix timestamp in seconds.
pub fn unix_timestamp_now() -> i64 {
    Utc::now().timestamp()
}

/// Allocate a creation-timestamp-derived id that is unique among `existing`.
///
/// Ids are milliseconds since the epoch; when two records are created within
/// the same millisecond the id is bumped past the largest one in use.
pub fn next_record_id(existing: impl IntoIterator<Item = i64>) -> i64 {
    let candidate = Utc::now().timestamp_millis();
    let max_existing = existing.into_iter().max().unwrap_or(i64::MIN);
    if candidate > max_existing {
        candidate
    } else {
        max_existing.saturating_add(1)
    }
}
