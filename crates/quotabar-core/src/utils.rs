//! Utility functions for quotabar-core

use chrono::{DateTime, Local, Utc};

/// Format a reset time relative to `now`, e.g. "in 2h 15m"
///
/// Minutes are only shown when the reset is less than a day away.
///
/// # Example
/// ```ignore
/// use quotabar_core::utils::format_relative_time;
///
/// let label = format_relative_time(sample.five_hour.resets_at, Utc::now());
/// ```
pub fn format_relative_time(resets_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(resets_at) = resets_at else {
        return "unknown".to_string();
    };

    let total_seconds = (resets_at - now).num_seconds();
    if total_seconds <= 0 {
        return "now".to_string();
    }

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3_600;
    let minutes = (total_seconds % 3_600) / 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{}d", days));
    }
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 && days == 0 {
        parts.push(format!("{}m", minutes));
    }

    if parts.is_empty() {
        return "< 1m".to_string();
    }

    format!("in {}", parts.join(" "))
}

/// Format a reset time in the local timezone, e.g. "Mon 14:30"
pub fn format_local_time(resets_at: Option<DateTime<Utc>>) -> String {
    match resets_at {
        Some(dt) => dt.with_timezone(&Local).format("%a %H:%M").to_string(),
        None => "unknown".to_string(),
    }
}

/// Truncate a response body for debug logging
pub fn truncate_for_log(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
