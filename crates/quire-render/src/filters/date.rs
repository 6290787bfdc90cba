//! Date filters.
//!
//! Input may be a date string in any format the document model accepts, a
//! Unix timestamp, or the words `now` and `today`. Unparseable input or an
//! invalid format string renders as an empty string rather than failing
//! the page.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Datelike, FixedOffset, Utc};
use liquid_core::model::{Value, ValueView};
use liquid_core::Result;
use quire_document::date::parse_date;

use super::number::{self, Number};
use super::{FnFilter, arg_text, text};

/// Read a filter input as a date.
pub(crate) fn to_datetime(input: &dyn ValueView) -> Option<DateTime<FixedOffset>> {
    if input.is_nil() {
        return None;
    }
    if let Some(Number::Int(seconds)) = number::parse(input) {
        return DateTime::from_timestamp(seconds, 0).map(|dt| dt.fixed_offset());
    }
    let text = text(input);
    match text.trim() {
        "now" | "today" => Some(Utc::now().fixed_offset()),
        other => parse_date(other),
    }
}

/// Format `date` with a strftime string, or `None` if the string is invalid.
pub(crate) fn format(date: &DateTime<FixedOffset>, fmt: &str) -> Option<String> {
    let items: Vec<Item<'_>> = StrftimeItems::new(fmt).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return None;
    }
    Some(date.format_with_items(items.into_iter()).to_string())
}

fn ordinal(day: u32) -> String {
    let suffix = match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{day}{suffix}")
}

/// Shared body of `date_to_string` and `date_to_long_string`.
///
/// `kind` of `ordinal` writes the day as `7th`; `style` of `US` puts the
/// month first.
fn date_string(date: &DateTime<FixedOffset>, month: &str, args: &[Value]) -> Option<String> {
    let ordinal_day = arg_text(args, 0).is_some_and(|k| k == "ordinal");
    let us = arg_text(args, 1).is_some_and(|s| s == "US");
    if !ordinal_day {
        return format(date, &format!("%d {month} %Y"));
    }
    let day = ordinal(date.day());
    let month = format(date, month)?;
    let year = date.year();
    Some(if us {
        format!("{month} {day}, {year}")
    } else {
        format!("{day} {month} {year}")
    })
}

fn render(result: Option<String>) -> Value {
    Value::scalar(result.unwrap_or_default())
}

fn date(input: &dyn ValueView, args: &[Value]) -> Result<Value> {
    let Some(fmt) = arg_text(args, 0).filter(|f| !f.is_empty()) else {
        return Ok(input.to_value());
    };
    Ok(render(to_datetime(input).and_then(|d| format(&d, &fmt))))
}

fn date_to_xmlschema(input: &dyn ValueView, _args: &[Value]) -> Result<Value> {
    Ok(render(to_datetime(input).and_then(|d| format(&d, "%Y-%m-%dT%H:%M:%S%:z"))))
}

fn date_to_rfc822(input: &dyn ValueView, _args: &[Value]) -> Result<Value> {
    Ok(render(to_datetime(input).and_then(|d| format(&d, "%a, %d %b %Y %H:%M:%S %z"))))
}

fn date_to_string(input: &dyn ValueView, args: &[Value]) -> Result<Value> {
    Ok(render(to_datetime(input).and_then(|d| date_string(&d, "%b", args))))
}

fn date_to_long_string(input: &dyn ValueView, args: &[Value]) -> Result<Value> {
    Ok(render(to_datetime(input).and_then(|d| date_string(&d, "%B", args))))
}

pub(super) fn filters() -> Vec<FnFilter> {
    vec![
        FnFilter::new("date", date),
        FnFilter::new("date_to_xmlschema", date_to_xmlschema),
        FnFilter::new("date_to_rfc822", date_to_rfc822),
        FnFilter::new("date_to_string", date_to_string),
        FnFilter::new("date_to_long_string", date_to_long_string),
    ]
}
