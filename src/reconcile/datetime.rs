//! Date and duration resolution for heterogeneous upstream timestamps.
//!
//! The upstream emits timestamps as numeric epochs, ISO 8601 strings, and
//! space-separated `YYYY-MM-DD HH:mm:ss` strings depending on API version.
//! Everything here normalizes to epoch milliseconds, with `0` as the
//! sentinel for "unparseable" - never an error, never a negative value.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::reconcile::clock::Clock;

/// Converts any upstream date representation to epoch milliseconds.
///
/// Returns `0` for null, empty, zero-date placeholders, and anything that
/// fails to parse. Naive timestamps are interpreted as UTC so that the
/// result does not depend on the host timezone.
pub fn to_timestamp_ms(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => parse_timestamp_str(s),
        _ => 0,
    }
}

/// Parses a timestamp string to epoch milliseconds, `0` on failure.
pub fn parse_timestamp_str(s: &str) -> i64 {
    let s = s.trim();
    if s.is_empty() || s.starts_with("0000-00-00") {
        return 0;
    }

    // The space-separated form is the ISO form with ' ' for 'T'.
    let iso = s.replacen(' ', "T", 1);

    if let Ok(dt) = DateTime::parse_from_rfc3339(&iso) {
        return dt.timestamp_millis();
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(&iso, "%Y-%m-%dT%H:%M:%S%.f") {
        return dt.and_utc().timestamp_millis();
    }
    if let Ok(d) = NaiveDate::parse_from_str(&iso, "%Y-%m-%d") {
        if let Some(dt) = d.and_hms_opt(0, 0, 0) {
            return dt.and_utc().timestamp_millis();
        }
    }

    // Manual component-wise fallback for slightly malformed strings
    // (single-digit fields, stray trailing text after the seconds).
    parse_components(&iso).unwrap_or(0)
}

/// Component-wise parse: split the date on `-` and the time on `:`,
/// building the instant from explicit fields.
fn parse_components(iso: &str) -> Option<i64> {
    let (date_part, time_part) = match iso.split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (iso, None),
    };

    let mut date_fields = date_part.splitn(3, '-');
    let year: i32 = date_fields.next()?.trim().parse().ok()?;
    let month: u32 = date_fields.next()?.trim().parse().ok()?;
    let day: u32 = date_fields.next()?.trim().parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;

    let (hour, minute, second) = match time_part {
        Some(t) => {
            let mut time_fields = t.splitn(3, ':');
            let h: u32 = time_fields.next()?.trim().parse().ok()?;
            let m: u32 = time_fields.next().unwrap_or("0").trim().parse().ok()?;
            // Tolerate fractional seconds or timezone suffixes after the digits.
            let s_raw = time_fields.next().unwrap_or("0");
            let s_digits: String = s_raw.chars().take_while(|c| c.is_ascii_digit()).collect();
            let s: u32 = if s_digits.is_empty() {
                0
            } else {
                s_digits.parse().ok()?
            };
            (h, m, s)
        }
        None => (0, 0, 0),
    };

    let dt = date.and_hms_opt(hour, minute, second)?;
    Some(dt.and_utc().timestamp_millis())
}

/// Computes elapsed whole seconds between two upstream timestamps.
///
/// When `end` is absent, "now" from the supplied clock is used. An
/// unparseable start, or an explicit end that fails to parse, yields `0`.
/// Negative differences (clock drift) also resolve to `0`.
pub fn duration_secs(start: &Value, end: Option<&Value>, clock: &dyn Clock) -> u64 {
    let start_ms = to_timestamp_ms(start);
    if start_ms == 0 {
        return 0;
    }

    let end_ms = match end {
        Some(v) => {
            let e = to_timestamp_ms(v);
            if e == 0 {
                return 0;
            }
            e
        }
        None => clock.now_ms(),
    };

    let diff = (end_ms - start_ms) / 1000;
    if diff > 0 {
        diff as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::clock::FixedClock;
    use serde_json::json;

    // 2024-01-01 10:00:00 UTC
    const T0: i64 = 1_704_103_200_000;

    #[test]
    fn test_space_and_t_forms_are_the_same_instant() {
        let space = to_timestamp_ms(&json!("2024-01-01 10:00:00"));
        let iso = to_timestamp_ms(&json!("2024-01-01T10:00:00"));
        assert_eq!(space, iso);
        assert_eq!(space, T0);
    }

    #[test]
    fn test_rfc3339_with_offset() {
        let ts = to_timestamp_ms(&json!("2024-01-01T10:00:00Z"));
        assert_eq!(ts, T0);
        let ts = to_timestamp_ms(&json!("2024-01-01T07:00:00-03:00"));
        assert_eq!(ts, T0);
    }

    #[test]
    fn test_numeric_epoch_passes_through() {
        assert_eq!(to_timestamp_ms(&json!(T0)), T0);
    }

    #[test]
    fn test_unparseable_values_yield_zero() {
        assert_eq!(to_timestamp_ms(&Value::Null), 0);
        assert_eq!(to_timestamp_ms(&json!("")), 0);
        assert_eq!(to_timestamp_ms(&json!("  ")), 0);
        assert_eq!(to_timestamp_ms(&json!("0000-00-00 00:00:00")), 0);
        assert_eq!(to_timestamp_ms(&json!("not a date")), 0);
        assert_eq!(to_timestamp_ms(&json!({"nested": true})), 0);
    }

    #[test]
    fn test_date_only_is_midnight() {
        let ts = to_timestamp_ms(&json!("2024-01-01"));
        assert_eq!(ts, T0 - 10 * 3600 * 1000);
    }

    #[test]
    fn test_component_fallback_single_digit_fields() {
        let loose = to_timestamp_ms(&json!("2024-1-1 10:0:0"));
        assert_eq!(loose, T0);
    }

    #[test]
    fn test_fractional_seconds() {
        let ts = to_timestamp_ms(&json!("2024-01-01 10:00:00.500"));
        assert_eq!(ts, T0 + 500);
    }

    #[test]
    fn test_duration_against_now() {
        let clock = FixedClock(T0 + 300_000);
        let secs = duration_secs(&json!("2024-01-01 10:00:00"), None, &clock);
        assert_eq!(secs, 300);
    }

    #[test]
    fn test_duration_with_explicit_end() {
        let clock = FixedClock(0);
        let secs = duration_secs(
            &json!("2024-01-01 10:00:00"),
            Some(&json!("2024-01-01 10:10:30")),
            &clock,
        );
        assert_eq!(secs, 630);
    }

    #[test]
    fn test_duration_clamps_negative_to_zero() {
        let clock = FixedClock(T0 - 60_000);
        let secs = duration_secs(&json!("2024-01-01 10:00:00"), None, &clock);
        assert_eq!(secs, 0);
    }

    #[test]
    fn test_duration_unparseable_start_is_zero() {
        let clock = FixedClock(T0);
        assert_eq!(duration_secs(&Value::Null, None, &clock), 0);
        assert_eq!(duration_secs(&json!("garbage"), None, &clock), 0);
    }

    #[test]
    fn test_duration_unparseable_explicit_end_is_zero() {
        let clock = FixedClock(T0 + 100_000);
        let secs = duration_secs(
            &json!("2024-01-01 10:00:00"),
            Some(&json!("0000-00-00 00:00:00")),
            &clock,
        );
        assert_eq!(secs, 0);
    }
}
