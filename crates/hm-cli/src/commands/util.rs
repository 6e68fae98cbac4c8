//! Shared utilities for CLI commands.

use std::fmt;
use std::sync::LazyLock;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use hm_core::Outcome;
use regex::Regex;
use serde::Serialize;

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s+(minute|hour|day|week)s?\s+ago$"));

/// Conservative bounds for relative time parsing (~1000 years in minutes).
const MAX_RELATIVE_MINUTES: i64 = 1000 * 365 * 24 * 60;

/// Parse a datetime string as either ISO 8601 or relative to `now`.
///
/// Supports:
/// - ISO 8601: "2026-01-15T10:30:00Z"
/// - Relative: "2 hours ago", "30 minutes ago", "1 day ago", "1 week ago"
/// - "now"
pub fn parse_datetime(s: &str, now: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if s.eq_ignore_ascii_case("now") {
        return Ok(now);
    }

    let re = RELATIVE_TIME_RE
        .as_ref()
        .map_err(|err| anyhow::anyhow!("relative time pattern failed to compile: {err}"))?;
    let Some(caps) = re.captures(s) else {
        anyhow::bail!(
            "Invalid datetime: {s}. Use ISO 8601 (e.g., 2026-01-15T10:30:00Z) or relative (e.g., '2 hours ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative time")?;

    let (max_for_unit, minutes_per_unit) = match &caps[2] {
        "minute" => (MAX_RELATIVE_MINUTES, 1),
        "hour" => (MAX_RELATIVE_MINUTES / 60, 60),
        "day" => (MAX_RELATIVE_MINUTES / (60 * 24), 60 * 24),
        "week" => (MAX_RELATIVE_MINUTES / (60 * 24 * 7), 60 * 24 * 7),
        unit => anyhow::bail!("Unknown time unit: {unit}"),
    };

    if n > max_for_unit {
        anyhow::bail!("Relative time value too large: {n} {}", &caps[2]);
    }

    Ok(now - Duration::minutes(n * minutes_per_unit))
}

/// Renders an analysis outcome as a sentence or as JSON.
///
/// The JSON form carries the tagged outcome plus the same sentence under
/// `message`, so scripts can branch on `status` and still show the text.
pub fn render_outcome<T>(outcome: &Outcome<T>, json: bool) -> anyhow::Result<String>
where
    T: Serialize + fmt::Display,
{
    if !json {
        return Ok(outcome.to_string());
    }
    let mut value = serde_json::to_value(outcome).context("failed to encode result")?;
    if let Some(object) = value.as_object_mut() {
        object.insert(
            "message".to_string(),
            serde_json::Value::String(outcome.to_string()),
        );
    }
    Ok(serde_json::to_string_pretty(&value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use hm_core::NoDataReason;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).single().unwrap()
    }

    #[test]
    fn parses_rfc3339() {
        let parsed = parse_datetime("2025-03-01T10:00:00+01:00", now()).unwrap();
        assert_eq!(
            parsed,
            Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).single().unwrap()
        );
    }

    #[test]
    fn parses_relative_times() {
        assert_eq!(
            parse_datetime("2 hours ago", now()).unwrap(),
            now() - Duration::hours(2)
        );
        assert_eq!(
            parse_datetime("1 minute ago", now()).unwrap(),
            now() - Duration::minutes(1)
        );
        assert_eq!(
            parse_datetime("3 weeks ago", now()).unwrap(),
            now() - Duration::weeks(3)
        );
        assert_eq!(parse_datetime("now", now()).unwrap(), now());
    }

    #[test]
    fn rejects_garbage_and_overflow() {
        assert!(parse_datetime("yesterday-ish", now()).is_err());
        assert!(parse_datetime("99999999999 weeks ago", now()).is_err());
    }

    #[test]
    fn json_outcome_carries_status_and_message() {
        let outcome: Outcome<hm_core::TemperatureDifference> =
            Outcome::NoData(NoDataReason::NoRecords);
        let rendered = render_outcome(&outcome, true).unwrap();
        insta::assert_snapshot!(rendered, @r#"
        {
          "message": "There are no records available for the given period",
          "result": "no_records",
          "status": "no_data"
        }
        "#);
    }
}
