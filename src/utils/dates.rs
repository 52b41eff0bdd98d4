use crate::data_structures::DateRange;
use crate::error::{ApiError, ApiResult};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};

const MIN_YEAR: i32 = 1;
const MAX_YEAR: i32 = 9999;

/// Parses `YYYY-MM-DD`, a naive ISO datetime, or an RFC 3339 timestamp and
/// keeps only the calendar date. Years outside 1..=9999 are rejected.
pub fn parse_iso_date(value: &str) -> ApiResult<NaiveDate> {
    let trimmed = value.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(trimmed).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| {
            NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
        .filter(|date| (MIN_YEAR..=MAX_YEAR).contains(&date.year()))
        .ok_or_else(|| ApiError::bad_request(format!("Invalid ISO date: {}", value)))
}

/// Resolves optional request bounds against `today`. A missing end means
/// today, a missing start means `default_days` before the end.
pub fn build_date_range(
    start: Option<&str>,
    end: Option<&str>,
    default_days: i64,
    today: NaiveDate,
) -> ApiResult<DateRange> {
    let end = match end {
        Some(raw) => parse_iso_date(raw)?,
        None => today,
    };
    let start = match start {
        Some(raw) => parse_iso_date(raw)?,
        None => Duration::try_days(default_days)
            .and_then(|span| end.checked_sub_signed(span))
            .ok_or_else(|| {
                ApiError::bad_request(format!("cannot go back {} days from {}", default_days, end))
            })?,
    };

    if start > end {
        return Err(ApiError::bad_request("start date cannot be after end date"));
    }

    Ok(DateRange { start, end })
}
