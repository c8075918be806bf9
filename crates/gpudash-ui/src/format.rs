//! Human-readable formatting for chart labels and HUD lines.
//!
//! All functions are pure and easy to test in isolation.

use chrono::{DateTime, Local, TimeZone, Utc};

const SI_UNITS: [&str; 7] = ["B", "kB", "MB", "GB", "TB", "PB", "EB"];

/// Format a byte count with decimal SI prefixes.
///
/// Returns values like `"12.3 MB"`, `"950 B"`, `"0 B"`. Negative and
/// non-finite inputs render as `"-- B"`.
pub fn format_bytes(bytes: f64) -> String {
    if !bytes.is_finite() || bytes < 0.0 {
        return "-- B".into();
    }
    let mut value = bytes;
    let mut unit = 0;
    while value >= 1000.0 && unit < SI_UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{value:.0} B")
    } else {
        format!("{value:.1} {}", SI_UNITS[unit])
    }
}

/// Format a percentage value for display.
///
/// Returns `"--%"` for NaN values, otherwise formats as `"45.2%"`.
pub fn format_percent(value: f64) -> String {
    if value.is_nan() {
        "--%".into()
    } else {
        format!("{:.1}%", value)
    }
}

/// Local wall-clock time of a sample timestamp, `HH:MM:SS`.
pub fn format_clock(timestamp_ms: u64) -> String {
    format_clock_in(timestamp_ms, &Local)
}

pub fn format_clock_in<Tz: TimeZone>(timestamp_ms: u64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match DateTime::<Utc>::from_timestamp_millis(timestamp_ms as i64) {
        Some(utc) => utc.with_timezone(tz).format("%H:%M:%S").to_string(),
        None => "--:--:--".into(),
    }
}
