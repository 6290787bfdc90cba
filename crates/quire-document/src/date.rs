//! Date parsing and formatting shared by documents and template filters.
//!
//! Values without a time zone are read as UTC, and date-only values become
//! UTC midnight, so the same calendar date is the same instant on every
//! build machine.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

/// `YYYY-MM-DD-slug` at the start of a post filename stem.
static FILENAME_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})-(.+)$").expect("static regex is valid")
});

/// Formats carrying an explicit offset.
const ZONED_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y-%m-%d %H:%M:%S%.f %:z",
    "%Y-%m-%d %H:%M %z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

/// Formats read as UTC.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Date-only formats, read as UTC midnight.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d %B %Y", "%B %d, %Y", "%b %d, %Y"];

/// Parse a date or timestamp string.
///
/// Returns `None` for anything unrecognised; callers decide whether that is
/// an error (it never is for template filters).
pub fn parse_date(input: &str) -> Option<DateTime<FixedOffset>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(input) {
        return Some(dt);
    }
    for fmt in ZONED_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(input, fmt) {
            return Some(dt);
        }
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, fmt) {
            return Some(Utc.from_utc_datetime(&naive).fixed_offset());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(input, fmt) {
            return utc_midnight(date).map(|dt| dt.fixed_offset());
        }
    }
    None
}

/// Midnight UTC of a calendar date.
pub fn utc_midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Split a post filename stem into its date and slug.
///
/// `2024-01-15-hello-world` gives midnight UTC on 2024-01-15 and
/// `hello-world`. Returns `None` when the stem does not follow the
/// convention or names an impossible date.
pub fn parse_filename_date(stem: &str) -> Option<(DateTime<Utc>, &str)> {
    let caps = FILENAME_DATE.captures(stem)?;
    let year = caps.get(1)?.as_str().parse().ok()?;
    let month = caps.get(2)?.as_str().parse().ok()?;
    let day = caps.get(3)?.as_str().parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some((utc_midnight(date)?, caps.get(4)?.as_str()))
}

/// Template-facing timestamp: `2024-01-15 00:00:00 +0000`.
pub fn format_timestamp<Tz: TimeZone>(date: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    date.format("%Y-%m-%d %H:%M:%S %z").to_string()
}
