//! Date parsing policy shared by coercion and rule bounds.
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use super::DateFormat;
use crate::value::Value;

/// Largest instant magnitude representable, in epoch milliseconds.
const MAX_EPOCH_MILLIS: f64 = 8.64e15;

/// Full date, `T`, time with at least minutes, and an optional zone.
static ISO_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^[+-]?\d{4}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])",
        r"T([01]\d|2[0-3]):[0-5]\d(:[0-5]\d([.,]\d+)?)?",
        r"(Z|[+-]([01]\d|2[0-3])(:?[0-5]\d)?)?$",
    ))
    .expect("iso date pattern")
});

static NUMBER_STRING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?\d+(\.\d+)?$").expect("number string pattern"));

static BLANK: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*$").expect("blank pattern"));

pub fn is_iso_date(text: &str) -> bool {
    ISO_DATE.is_match(text)
}

/// `None` on any failure, including out-of-range instants.
pub fn parse(value: &Value, format: Option<DateFormat>) -> Option<DateTime<Utc>> {
    match value {
        Value::Date(d) => Some(*d),
        Value::Number(n) if !n.is_finite() => None,
        Value::Number(_) | Value::String(_) => parse_scalar(value, format),
        _ => None,
    }
}

fn parse_scalar(value: &Value, format: Option<DateFormat>) -> Option<DateTime<Utc>> {
    if format == Some(DateFormat::Iso) {
        let text = value.as_str()?;
        if !is_iso_date(text) {
            return None;
        }
        return parse_iso(text);
    }

    let normalized = match value {
        Value::String(s) if NUMBER_STRING.is_match(s) => s.parse::<f64>().ok().map(Value::Number),
        _ => None,
    };
    let value = normalized.as_ref().unwrap_or(value);

    match format {
        Some(timestamp) => {
            let factor = if timestamp == DateFormat::Unix { 1000.0 } else { 1.0 };
            let n = match value {
                Value::Number(n) => *n,
                Value::String(s) if BLANK.is_match(s) => return None,
                Value::String(s) => s.trim().parse::<f64>().ok()?,
                _ => return None,
            };
            from_epoch_millis(n * factor)
        }
        None => match value {
            Value::Number(n) => from_epoch_millis(*n),
            Value::String(s) => parse_loose(s),
            _ => None,
        },
    }
}

pub fn from_epoch_millis(ms: f64) -> Option<DateTime<Utc>> {
    if !ms.is_finite() || ms.abs() > MAX_EPOCH_MILLIS {
        return None;
    }
    DateTime::from_timestamp_millis(ms.trunc() as i64)
}

/// Zone-less ISO date-times are read as UTC.
fn parse_iso(text: &str) -> Option<DateTime<Utc>> {
    let text = text.replace(',', ".");
    if let Ok(d) = DateTime::parse_from_rfc3339(&text) {
        return Some(d.with_timezone(&Utc));
    }
    if let Some(d) = ["%Y-%m-%dT%H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M%#z"]
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(&text, fmt).ok())
    {
        return Some(d.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&text, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Permissive parse for schemas without a format. Zone-less inputs are read
/// as UTC.
fn parse_loose(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Some(d) = parse_iso(text) {
        return Some(d);
    }
    if let Ok(d) = DateTime::parse_from_rfc2822(text) {
        return Some(d.with_timezone(&Utc));
    }
    const DATE_TIMES: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    if let Some(naive) = DATE_TIMES.iter().find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok()) {
        return Some(naive.and_utc());
    }
    const DATES: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
    DATES
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn millis(d: Option<DateTime<Utc>>) -> Option<i64> {
        d.map(|d| d.timestamp_millis())
    }

    #[test]
    fn iso_requires_a_time() {
        assert!(is_iso_date("2020-01-01T00:00:00.000Z"));
        assert!(is_iso_date("2020-01-01T10:30+02:00"));
        assert!(is_iso_date("2020-01-01T10:00:00"));
        assert!(!is_iso_date("2020-01-01"));
        assert!(!is_iso_date("2020-01-01T10"));
        assert!(!is_iso_date("2020-13-01T00:00Z"));
        assert_eq!(
            millis(parse(&Value::from("2020-01-01T10:30+02:00"), Some(DateFormat::Iso))),
            millis(parse(&Value::from("2020-01-01T08:30:00Z"), Some(DateFormat::Iso))),
        );
        assert_eq!(
            millis(parse(&Value::from("2020-01-01T10:00:00"), Some(DateFormat::Iso))),
            millis(parse(&Value::from("2020-01-01T10:00:00Z"), Some(DateFormat::Iso))),
        );
        assert_eq!(
            millis(parse(&Value::from("2020-01-01T10:00"), Some(DateFormat::Iso))),
            millis(parse(&Value::from("2020-01-01T10:00:00Z"), Some(DateFormat::Iso))),
        );
        assert_eq!(parse(&Value::from(1000), Some(DateFormat::Iso)), None);
    }

    #[test]
    fn timestamps_scale_by_format() {
        assert_eq!(millis(parse(&Value::from(1000), Some(DateFormat::Unix))), Some(1_000_000));
        assert_eq!(millis(parse(&Value::from("1000"), Some(DateFormat::Javascript))), Some(1000));
        assert_eq!(millis(parse(&Value::from("1.5"), Some(DateFormat::Unix))), Some(1500));
        assert_eq!(parse(&Value::from("  "), Some(DateFormat::Unix)), None);
        assert_eq!(parse(&Value::from("soon"), Some(DateFormat::Javascript)), None);
    }

    #[test]
    fn loose_parse_accepts_common_shapes() {
        assert_eq!(millis(parse(&Value::from("1970-01-02"), None)), Some(86_400_000));
        assert_eq!(millis(parse(&Value::from("86400000"), None)), Some(86_400_000));
        assert!(parse(&Value::from("Tue, 1 Jul 2003 10:52:37 +0200"), None).is_some());
        assert_eq!(parse(&Value::from("not a date"), None), None);
        assert_eq!(parse(&Value::Number(f64::NAN), None), None);
        assert_eq!(parse(&Value::Number(9e15), None), None);
        assert_eq!(parse(&Value::Bool(true), None), None);
    }
}
