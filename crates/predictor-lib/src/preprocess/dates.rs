//! Date parsing and day-count derivation

use crate::error::PreprocessError;
use chrono::{DateTime, NaiveDate, NaiveDateTime};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Parse a stored date. Accepts plain dates, naive date-times and RFC 3339
/// (converted to UTC).
pub fn parse_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Whole days elapsed between `date` and `now`
pub fn whole_days_since(date: NaiveDateTime, now: NaiveDateTime) -> i64 {
    (now - date).num_days()
}

/// Convert a text date column into "days since" values, keeping nulls
pub fn days_since_column(
    column: &str,
    values: &[Option<String>],
    now: NaiveDateTime,
) -> Result<Vec<Option<f64>>, PreprocessError> {
    values
        .iter()
        .map(|value| match value {
            None => Ok(None),
            Some(raw) => parse_date(raw)
                .map(|date| Some(whole_days_since(date, now) as f64))
                .ok_or_else(|| PreprocessError::InvalidDate {
                    column: column.to_string(),
                    value: raw.clone(),
                }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_parse_supported_formats() {
        let midnight = at("2024-05-01 00:00:00");
        assert_eq!(parse_date("2024-05-01"), Some(midnight));
        assert_eq!(parse_date("2024-05-01 00:00:00"), Some(midnight));
        assert_eq!(parse_date("2024-05-01T00:00:00"), Some(midnight));
        assert_eq!(parse_date("2024-05-01T02:00:00+02:00"), Some(midnight));
        assert_eq!(
            parse_date("2024-05-01 10:30:15.250"),
            Some(at("2024-05-01 10:30:15") + chrono::Duration::milliseconds(250))
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_date("yesterday"), None);
        assert_eq!(parse_date("2024-13-40"), None);
    }

    #[test]
    fn test_whole_days_truncate() {
        let now = at("2024-05-10 12:00:00");
        assert_eq!(whole_days_since(at("2024-05-01 00:00:00"), now), 9);
        assert_eq!(whole_days_since(at("2024-05-10 00:00:00"), now), 0);
    }

    #[test]
    fn test_days_since_column_reports_bad_value() {
        let now = at("2024-05-10 00:00:00");
        let values = vec![Some("2024-05-01".to_string()), None];
        assert_eq!(
            days_since_column("PurchaseDate", &values, now).unwrap(),
            vec![Some(9.0), None]
        );

        let bad = vec![Some("not a date".to_string())];
        assert_eq!(
            days_since_column("PurchaseDate", &bad, now),
            Err(PreprocessError::InvalidDate {
                column: "PurchaseDate".to_string(),
                value: "not a date".to_string(),
            })
        );
    }
}
