//! Date, time and duration helpers for the prediction_store crate

use crate::error::{PredictionError, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};

/// Parse a duration such as `"1 hour"`, `"15 minutes"`, `"2 days"` or `"1h"`
pub fn parse_duration(text: &str) -> Result<Duration> {
    let lower = text.trim().to_lowercase();

    let shortcut = match lower.as_str() {
        "hourly" | "h" => Some(Duration::hours(1)),
        "daily" | "d" => Some(Duration::days(1)),
        "minute" | "min" => Some(Duration::minutes(1)),
        _ => None,
    };
    if let Some(duration) = shortcut {
        return Ok(duration);
    }

    let split = lower
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(lower.len());
    let (amount, unit) = lower.split_at(split);
    let unsupported = || PredictionError::InvalidParameter(format!("Unsupported duration: {}", text));
    let amount: i64 = amount.parse().map_err(|_| unsupported())?;

    let duration = match unit.trim() {
        "s" | "sec" | "second" | "seconds" => Duration::try_seconds(amount),
        "m" | "min" | "minute" | "minutes" => Duration::try_minutes(amount),
        "h" | "hour" | "hours" => Duration::try_hours(amount),
        "d" | "day" | "days" => Duration::try_days(amount),
        "w" | "week" | "weeks" => Duration::try_weeks(amount),
        _ => return Err(unsupported()),
    };

    duration.ok_or_else(|| {
        PredictionError::InvalidParameter(format!("Duration out of range: {}", text))
    })
}

/// Truncate an instant to the start of its hour
pub fn hour_floor(at: DateTime<Utc>) -> DateTime<Utc> {
    at.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(at)
}

/// Midnight of the day of `at`, in the time zone of `at`
pub fn start_of_day<Tz: TimeZone>(at: &DateTime<Tz>) -> DateTime<Tz> {
    at.date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| at.timezone().from_local_datetime(&midnight).earliest())
        .unwrap_or_else(|| at.clone())
}

/// Consecutive hourly instants starting at `start`
pub fn hourly_timestamps(start: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
    (0..count)
        .map(|i| start + Duration::hours(i as i64))
        .collect()
}

/// Parse an instant given as RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) or `YYYY-MM-DD` (UTC midnight)
pub fn parse_datetime(text: &str) -> Result<DateTime<Utc>> {
    let trimmed = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    Err(PredictionError::InvalidParameter(format!(
        "Unsupported datetime: {}",
        text
    )))
}
