//! Conversion of relative posting ages ("3 days ago") to timestamps

use chrono::{DateTime, TimeDelta, Utc};
use regex::Regex;
use std::sync::OnceLock;

fn relative_age_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(\d+)\s+(minute|minutes|hour|hours|day|days|week|weeks|month|months)\s+ago")
            .expect("relative age pattern is valid")
    })
}

/// Derives an absolute publication time from a relative age
///
/// Recognizes `<N> minute(s)|hour(s)|day(s)|week(s)|month(s) ago` anywhere in
/// the text, with a month counted as 30 days. Returns `None` for text that
/// does not match (e.g. "yesterday") or a quantity too large to represent.
pub fn parse_posted_time(text: &str, reference: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let captures = relative_age_pattern().captures(text)?;
    let quantity: i64 = captures.get(1)?.as_str().parse().ok()?;
    let unit = captures.get(2)?.as_str().to_ascii_lowercase();

    let delta = match unit.trim_end_matches('s') {
        "minute" => TimeDelta::try_minutes(quantity)?,
        "hour" => TimeDelta::try_hours(quantity)?,
        "day" => TimeDelta::try_days(quantity)?,
        "week" => TimeDelta::try_weeks(quantity)?,
        "month" => TimeDelta::try_days(quantity.checked_mul(30)?)?,
        _ => return None,
    };

    reference.checked_sub_signed(delta)
}
