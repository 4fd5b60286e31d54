//! Timestamp and clock display utilities

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Longest display name shown on the device list before truncation
pub const DISPLAY_NAME_MAX: usize = 20;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Format a duration as `MM:SS` (minutes keep growing past 99)
pub fn format_clock(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Format the time left in an item as `-MM:SS`, saturating at zero
pub fn format_remaining(elapsed: Duration, total: Duration) -> String {
    format!("-{}", format_clock(total.saturating_sub(elapsed)))
}

/// Shorten a name for list display
///
/// Names longer than `max` characters keep their first `max - 3` characters
/// followed by `...`, so the result is exactly `max` characters long.
pub fn truncate_display_name(name: &str, max: usize) -> String {
    if name.chars().count() <= max {
        return name.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut short: String = name.chars().take(keep).collect();
    short.push_str("...");
    short
}
