// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, Local, NaiveDate, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Minutes as `45 min` or `1 h 05`.
pub fn format_duration_minutes(minutes: i32) -> String {
    if minutes.abs() < 60 {
        return format!("{minutes} min");
    }
    let sign = if minutes < 0 { "-" } else { "" };
    let minutes = minutes.unsigned_abs();
    format!("{sign}{} h {:02}", minutes / 60, minutes % 60)
}

/// Today's date in the local timezone, the default for a new activity.
pub fn today() -> String {
    Local::now().date_naive().format("%Y-%m-%d").to_string()
}

/// Check a `YYYY-MM-DD` date as typed by the user.
pub fn parse_activity_date(raw: &str) -> Result<String, chrono::ParseError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map(|d| d.format("%Y-%m-%d").to_string())
}
