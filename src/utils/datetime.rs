use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DateTimeError {
    #[error("Date parsing error: {0}")]
    DateParsing(String),

    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),
}

/// Convert a `--since` value to a unix timestamp.
///
/// Accepts unix seconds (`1700000000`), RFC 3339 (`2024-01-02T03:04:05Z`)
/// or a relative duration (`30s`, `15m`, `2h`, `1d`).
///
/// # Errors
/// Returns an error if the value matches none of those forms.
pub fn parse_since(value: &str, now: DateTime<Utc>) -> Result<i64, DateTimeError> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<i64>() {
        return Ok(secs);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.timestamp());
    }

    let regex = Regex::new(r"^(?P<amount>\d+)(?P<unit>[smhd])$")?;
    let captures = regex.captures(value).ok_or_else(|| {
        DateTimeError::DateParsing(format!("Failed to parse time from '{value}'"))
    })?;
    let amount: i64 = captures["amount"]
        .parse()
        .map_err(|e| DateTimeError::DateParsing(format!("Bad amount in '{value}': {e}")))?;
    let delta = match &captures["unit"] {
        "s" => Duration::try_seconds(amount),
        "m" => Duration::try_minutes(amount),
        "h" => Duration::try_hours(amount),
        _ => Duration::try_days(amount),
    };
    delta
        .and_then(|delta| now.checked_sub_signed(delta))
        .map(|since| since.timestamp())
        .ok_or_else(|| DateTimeError::DateParsing(format!("'{value}' is out of range")))
}

/// Format a timestamp as a relative time (e.g., "5 minutes ago")
#[must_use]
pub fn format_time_ago(dt: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = now.signed_duration_since(dt);
    let days = duration.num_days();
    let hours = duration.num_hours();
    let minutes = duration.num_minutes();
    let seconds = duration.num_seconds().max(0);

    if days > 0 {
        format!("{days} days ago")
    } else if hours > 0 {
        format!("{hours} hours ago")
    } else if minutes > 0 {
        format!("{minutes} minutes ago")
    } else {
        format!("{seconds} seconds ago")
    }
}
