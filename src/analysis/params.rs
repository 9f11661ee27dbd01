//! Parsing and validation of analytics inputs.

use std::sync::OnceLock;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

use crate::error::{AppError, Result};

/// Smallest accepted top-N.
pub const MIN_TOP_N: usize = 1;
/// Largest accepted top-N.
pub const MAX_TOP_N: usize = 100;

fn month_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^\d{4}-(0[1-9]|1[0-2])$").ok())
        .as_ref()
}

/// Parse `YYYY-MM` into the first instant of that month (UTC).
pub fn parse_month(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();
    let matches = month_pattern().is_some_and(|p| p.is_match(input));
    if !matches {
        return Err(AppError::validation(format!(
            "invalid month '{input}', expected YYYY-MM"
        )));
    }

    NaiveDate::parse_from_str(&format!("{input}-01"), "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
        .ok_or_else(|| AppError::validation(format!("invalid month '{input}'")))
}

/// Parse a top-N given as text.
pub fn parse_top_n(input: &str) -> Result<usize> {
    let n: i64 = input
        .trim()
        .parse()
        .map_err(|_| AppError::validation(format!("top-N '{input}' is not an integer")))?;
    usize::try_from(n)
        .map_err(|_| out_of_range(n))
        .and_then(validate_top_n)
}

/// Reject top-N values outside `[1, 100]`.
pub fn validate_top_n(n: usize) -> Result<usize> {
    if (MIN_TOP_N..=MAX_TOP_N).contains(&n) {
        Ok(n)
    } else {
        Err(out_of_range(n))
    }
}

fn out_of_range(n: impl std::fmt::Display) -> AppError {
    AppError::validation(format!(
        "top-N must be within [{MIN_TOP_N}, {MAX_TOP_N}], got {n}"
    ))
}

/// Parse a reference date: RFC 3339, ISO local date-time, or a plain date.
pub fn parse_reference_date(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(Utc.from_utc_datetime(&dt));
        }
    }
    if let Some(dt) = NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(Utc.from_utc_datetime(&dt));
    }

    Err(AppError::validation(format!(
        "invalid date '{input}', expected ISO date or date-time"
    )))
}

/// `[first instant of the month, first instant of the next month)`.
pub fn month_bounds(at: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let (year, month) = (at.year(), at.month());
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };

    let first = |y: i32, m: u32| {
        Utc.with_ymd_and_hms(y, m, 1, 0, 0, 0)
            .single()
            .unwrap_or(at)
    };
    (first(year, month), first(next_year, next_month))
}

/// Reject ranges whose start lies after the end.
pub fn validate_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
    if start > end {
        return Err(AppError::validation(format!(
            "start {} is after end {}",
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_month() {
        assert_eq!(parse_month("2024-03").unwrap(), utc(2024, 3, 1, 0));
        assert!(parse_month("2024-13").is_err());
        assert!(parse_month("2024-3").is_err());
        assert!(parse_month("24-03").is_err());
        assert!(matches!(parse_month("march"), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_parse_top_n() {
        assert_eq!(parse_top_n("1").unwrap(), 1);
        assert_eq!(parse_top_n(" 100 ").unwrap(), 100);
        assert!(parse_top_n("0").is_err());
        assert!(parse_top_n("101").is_err());
        assert!(parse_top_n("-5").is_err());
        assert!(parse_top_n("ten").is_err());
    }

    #[test]
    fn test_parse_reference_date() {
        assert_eq!(
            parse_reference_date("2024-03-15T10:00:00").unwrap(),
            utc(2024, 3, 15, 10)
        );
        assert_eq!(
            parse_reference_date("2024-03-15T10:00:00Z").unwrap(),
            utc(2024, 3, 15, 10)
        );
        assert_eq!(parse_reference_date("2024-03-15").unwrap(), utc(2024, 3, 15, 0));
        assert!(parse_reference_date("15/03/2024").is_err());
    }

    #[test]
    fn test_month_bounds() {
        assert_eq!(
            month_bounds(utc(2024, 2, 29, 23)),
            (utc(2024, 2, 1, 0), utc(2024, 3, 1, 0))
        );
        assert_eq!(
            month_bounds(utc(2023, 12, 31, 5)),
            (utc(2023, 12, 1, 0), utc(2024, 1, 1, 0))
        );
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range(utc(2024, 1, 1, 0), utc(2024, 1, 1, 0)).is_ok());
        assert!(validate_range(utc(2024, 2, 1, 0), utc(2024, 1, 1, 0)).is_err());
    }
}
