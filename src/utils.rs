use crate::error::{FarmViewsError, Result};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Deserializer};

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];
const DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Moves `date` back to the most recent `start` day (the date itself if it
/// already falls on `start`).
pub fn week_start(date: NaiveDate, start: Weekday) -> NaiveDate {
    let offset = (date.weekday().num_days_from_monday() + 7 - start.num_days_from_monday()) % 7;
    date - Duration::days(offset as i64)
}

pub fn week_end(date: NaiveDate, start: Weekday) -> NaiveDate {
    week_start(date, start) + Duration::days(6)
}

pub fn same_week(a: NaiveDate, b: NaiveDate, start: Weekday) -> bool {
    week_start(a, start) == week_start(b, start)
}

/// Days since 1970-01-01, the physical value of a polars `Date`.
pub(crate) fn epoch_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - EPOCH_DAYS_FROM_CE
}

pub(crate) fn date_from_epoch_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(EPOCH_DAYS_FROM_CE)?)
}

/// Parses the date formats found in farm CSV exports.
pub fn parse_week_date(raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(date);
        }
    }

    for format in DATE_TIME_FORMATS {
        if let Ok(stamp) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(stamp.date());
        }
    }

    Err(FarmViewsError::DateError(format!(
        "Invalid week date '{}'. Expected YYYY-MM-DD or MM/DD/YYYY",
        raw
    )))
}

/// Parses a monetary or quantity cell. Empty and `NaN` cells read as zero;
/// `$` and thousands separators are ignored; `(12.50)` is negative. Infinite
/// values are rejected.
pub fn parse_amount(raw: &str) -> std::result::Result<f64, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(0.0);
    }

    let (negative, body) = match trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };

    let cleaned: String = body.chars().filter(|c| *c != '$' && *c != ',').collect();
    let value: f64 = cleaned
        .trim()
        .parse()
        .map_err(|_| format!("Invalid amount '{}'", raw))?;

    if value.is_nan() {
        return Ok(0.0);
    }
    if value.is_infinite() {
        return Err(format!("Amount '{}' is not finite", raw));
    }

    Ok(if negative { -value } else { value })
}

pub fn deserialize_week_date<'de, D>(deserializer: D) -> std::result::Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_week_date(&raw).map_err(serde::de::Error::custom)
}

pub fn deserialize_amount<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_amount(&raw).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_week_start_monday() {
        // 2024-01-03 is a Wednesday
        let date = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        assert_eq!(
            week_start(date, Weekday::Mon),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );

        let monday = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(week_start(monday, Weekday::Mon), monday);
    }

    #[test]
    fn test_week_start_sunday() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        assert_eq!(
            week_start(date, Weekday::Sun),
            NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()
        );
        assert_eq!(
            week_end(date, Weekday::Sun),
            NaiveDate::from_ymd_opt(2024, 1, 6).unwrap()
        );
    }

    #[test]
    fn test_same_week() {
        let mon = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let sun = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();
        let next_mon = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        assert!(same_week(mon, sun, Weekday::Mon));
        assert!(!same_week(sun, next_mon, Weekday::Mon));
    }

    #[test]
    fn test_parse_week_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        assert_eq!(parse_week_date("2024-03-04").unwrap(), expected);
        assert_eq!(parse_week_date("03/04/2024").unwrap(), expected);
        assert_eq!(parse_week_date("2024-03-04 00:00:00").unwrap(), expected);
        assert!(parse_week_date("week 10").is_err());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("").unwrap(), 0.0);
        assert_eq!(parse_amount("$1,234.50").unwrap(), 1234.5);
        assert_eq!(parse_amount("(20)").unwrap(), -20.0);
        assert_eq!(parse_amount(" 7 ").unwrap(), 7.0);
        assert!(parse_amount("abc").is_err());
    }

    #[test]
    fn test_parse_amount_non_finite() {
        assert_eq!(parse_amount("NaN").unwrap(), 0.0);
        assert_eq!(parse_amount("nan").unwrap(), 0.0);
        assert!(parse_amount("inf").is_err());
        assert!(parse_amount("-infinity").is_err());
    }

    #[test]
    fn test_epoch_days_round_trip() {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        assert_eq!(epoch_days(epoch), 0);
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(epoch_days(date), 19_723);
        assert_eq!(date_from_epoch_days(19_723), Some(date));
    }
}
