//! Post timestamps arrive either as ISO-8601 text or as feed shorthand such as
//! `3d` or `2w`, meaning that long before now. Both are folded into one UTC
//! instant here.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// `<count><unit>` with optional whitespace and an optional trailing "ago"
static RELATIVE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+)\s*([a-z]+)(?:\s+ago)?$").expect("Failed to compile relative time regex")
});

/// Parse a timestamp in either supported form. Returns `None` for anything
/// unrecognized or out of range, never panics.
pub fn parse_timestamp(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    parse_absolute(raw).or_else(|| parse_relative(raw, now))
}

/// Offset forms RFC 3339 rejects: `+0000` style offsets, times without seconds
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// ISO-8601 date-times with `Z` or an offset, naive date-times taken as UTC,
/// and bare dates taken as midnight UTC
pub fn parse_absolute(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(raw, fmt).ok())
    {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = raw.strip_suffix(['Z', 'z']).unwrap_or(raw);
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(naive, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}

/// Relative shorthand ("45m", "3h", "1d", "2w", "4mo", "1y") measured back from `now`
pub fn parse_relative(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let lowered = raw.trim().to_lowercase();
    let caps = RELATIVE_REGEX.captures(&lowered)?;
    let count: i64 = caps[1].parse().ok()?;
    let delta = match &caps[2] {
        "m" | "min" | "mins" | "minute" | "minutes" => TimeDelta::try_minutes(count),
        "h" | "hr" | "hrs" | "hour" | "hours" => TimeDelta::try_hours(count),
        "d" | "day" | "days" => TimeDelta::try_days(count),
        "w" | "wk" | "wks" | "week" | "weeks" => TimeDelta::try_weeks(count),
        "mo" | "mon" | "month" | "months" => count.checked_mul(30).and_then(TimeDelta::try_days),
        "y" | "yr" | "yrs" | "year" | "years" => {
            count.checked_mul(365).and_then(TimeDelta::try_days)
        }
        _ => None,
    }?;
    now.checked_sub_signed(delta)
}
