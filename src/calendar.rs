//! Civil-date arithmetic in the business time zone.
//!
//! Every lifecycle decision (active vs. history, credential release, listing
//! expiry) is made on whole civil dates, never on instants. The only place an
//! instant appears is the conversion from "now" to "today in the business
//! zone"; everything downstream compares `NaiveDate`s.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Deserialize;

/// Error for civil-date strings that are not strict `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDateError {
    pub input: String,
}

impl std::fmt::Display for ParseDateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid civil date: {:?}", self.input)
    }
}

impl std::error::Error for ParseDateError {}

/// Parse a strict `YYYY-MM-DD` string: exactly ten bytes, ASCII digits in
/// the date positions, hyphens at positions 4 and 7, and a real calendar
/// date. Anything else is rejected; no separators or lengths are coerced.
pub fn parse_civil_date(input: &str) -> Result<NaiveDate, ParseDateError> {
    let err = || ParseDateError {
        input: input.to_string(),
    };
    let bytes = input.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return Err(err());
    }
    for (i, b) in bytes.iter().enumerate() {
        if i != 4 && i != 7 && !b.is_ascii_digit() {
            return Err(err());
        }
    }
    let year: i32 = input[..4].parse().map_err(|_| err())?;
    let month: u32 = input[5..7].parse().map_err(|_| err())?;
    let day: u32 = input[8..10].parse().map_err(|_| err())?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(err)
}

/// Render a date back to the canonical `YYYY-MM-DD` form.
pub fn format_civil_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// The civil date it currently is on the business wall clock.
pub fn today_in_zone(zone: Tz, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&zone).date_naive()
}

/// Inclusive-inclusive overlap test: ranges sharing only a boundary day
/// still overlap.
pub fn ranges_overlap(
    a_start: NaiveDate,
    a_end: NaiveDate,
    b_start: NaiveDate,
    b_end: NaiveDate,
) -> bool {
    a_start <= b_end && b_start <= a_end
}

pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Serde helper for stored date fields: a missing, null, or malformed value
/// deserializes to `None` instead of failing the whole record. Downstream
/// checks treat `None` as "never active, never released".
pub fn lenient_civil_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(|s| parse_civil_date(s).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn parse_valid_dates() {
        assert_eq!(parse_civil_date("2025-12-25").unwrap(), d(2025, 12, 25));
        assert_eq!(parse_civil_date("2024-02-29").unwrap(), d(2024, 2, 29)); // leap day
        assert_eq!(parse_civil_date("2025-01-01").unwrap(), d(2025, 1, 1));
    }

    #[test]
    fn parse_rejects_wrong_separators_and_order() {
        for bad in [
            "2025/12/25",
            "25-12-2025",
            "2025-12-25T00:00:00",
            "2025-12-25 ",
            " 2025-12-25",
            "2025-1-5",
            "20251225",
            "",
            "not-a-date",
        ] {
            assert!(parse_civil_date(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn parse_rejects_impossible_calendar_dates() {
        assert!(parse_civil_date("2025-13-01").is_err());
        assert!(parse_civil_date("2025-02-30").is_err());
        assert!(parse_civil_date("2025-02-29").is_err()); // not a leap year
        assert!(parse_civil_date("2025-00-10").is_err());
        assert!(parse_civil_date("2025-06-00").is_err());
    }

    #[test]
    fn parse_format_round_trip() {
        for s in ["2025-12-25", "2024-02-29", "1999-01-31", "2030-07-04"] {
            assert_eq!(format_civil_date(parse_civil_date(s).unwrap()), s);
        }
    }

    #[test]
    fn today_follows_the_business_zone_not_utc() {
        // 01:00 UTC is still the previous evening in São Paulo (UTC-3).
        let now: DateTime<Utc> = "2025-12-24T01:00:00Z".parse().unwrap();
        assert_eq!(
            today_in_zone(chrono_tz::America::Sao_Paulo, now),
            d(2025, 12, 23)
        );
        // ...and already the next day in Tokyo (UTC+9).
        let now: DateTime<Utc> = "2025-12-23T16:00:00Z".parse().unwrap();
        assert_eq!(today_in_zone(chrono_tz::Asia::Tokyo, now), d(2025, 12, 24));
        assert_eq!(
            today_in_zone(chrono_tz::America::Sao_Paulo, now),
            d(2025, 12, 23)
        );
    }

    #[test]
    fn overlap_is_inclusive_on_both_ends() {
        let overlaps = |a: (&str, &str), b: (&str, &str)| {
            ranges_overlap(
                parse_civil_date(a.0).unwrap(),
                parse_civil_date(a.1).unwrap(),
                parse_civil_date(b.0).unwrap(),
                parse_civil_date(b.1).unwrap(),
            )
        };
        // Shared boundary day counts as overlap.
        assert!(overlaps(
            ("2025-03-01", "2025-03-05"),
            ("2025-03-05", "2025-03-09")
        ));
        assert!(overlaps(
            ("2025-03-05", "2025-03-09"),
            ("2025-03-01", "2025-03-05")
        ));
        // Fully disjoint.
        assert!(!overlaps(
            ("2025-03-01", "2025-03-04"),
            ("2025-03-05", "2025-03-09")
        ));
        // Containment.
        assert!(overlaps(
            ("2025-03-01", "2025-03-31"),
            ("2025-03-10", "2025-03-12")
        ));
        // Single-day ranges.
        assert!(overlaps(
            ("2025-03-05", "2025-03-05"),
            ("2025-03-05", "2025-03-05")
        ));
    }

    #[test]
    fn lenient_dates_swallow_garbage() {
        #[derive(Deserialize)]
        struct Row {
            #[serde(default, deserialize_with = "lenient_civil_date")]
            date: Option<NaiveDate>,
        }
        let good: Row = serde_json::from_str(r#"{"date":"2025-12-25"}"#).unwrap();
        assert_eq!(good.date, Some(d(2025, 12, 25)));
        let bad: Row = serde_json::from_str(r#"{"date":"soon"}"#).unwrap();
        assert_eq!(bad.date, None);
        let null: Row = serde_json::from_str(r#"{"date":null}"#).unwrap();
        assert_eq!(null.date, None);
        let missing: Row = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(missing.date, None);
    }
}
