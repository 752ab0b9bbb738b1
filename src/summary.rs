// src/summary.rs
//! Display strings for first/last-seen times.

use chrono::{DateTime, FixedOffset};

/// Storage stamps crawl times as `HH-MM`; display them as `HH:MM`.
/// Anything else passes through untouched.
pub fn display_clock(stamp: &str) -> String {
    let b = stamp.as_bytes();
    let is_hh_mm = b.len() == 5
        && b[2] == b'-'
        && b[..2].iter().all(u8::is_ascii_digit)
        && b[3..].iter().all(u8::is_ascii_digit);
    if is_hh_mm {
        format!("{}:{}", &stamp[..2], &stamp[3..])
    } else {
        stamp.to_string()
    }
}

/// `""` without a first-seen time, the single time when first and last
/// agree (or last is missing), otherwise `[first ~ last]`.
pub fn format_time_display(first_time: &str, last_time: &str) -> String {
    if first_time.is_empty() {
        return String::new();
    }
    let first = display_clock(first_time);
    let last = display_clock(last_time);
    if last.is_empty() || first == last {
        first
    } else {
        format!("[{first} ~ {last}]")
    }
}

/// RFC 3339 publish time rendered as `MM-DD HH:MM` at `utc_offset_minutes`.
/// Unparsable input is returned as-is.
pub fn format_published(published_at: &str, utc_offset_minutes: i32) -> String {
    let Ok(parsed) = DateTime::parse_from_rfc3339(published_at.trim()) else {
        return published_at.to_string();
    };
    let Some(offset) = FixedOffset::east_opt(utc_offset_minutes * 60) else {
        return published_at.to_string();
    };
    parsed.with_timezone(&offset).format("%m-%d %H:%M").to_string()
}
