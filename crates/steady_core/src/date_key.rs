use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const KEY_FORMAT: &str = "%Y-%m-%d";

/// Marks a value written by the old UTC-slice code path (`2024-01-05T23:10:00.000Z`).
pub const LEGACY_TIME_SEPARATOR: char = 'T';

/// A calendar day in the device's local timezone, rendered as `YYYY-MM-DD`.
///
/// Ordering matches both chronological and lexical order of the rendered key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DateKey(NaiveDate);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{raw}` is not a YYYY-MM-DD date key")]
pub struct DateKeyError {
    raw: String,
}

impl DateKey {
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// Key of the calendar day `instant` falls on in its own timezone.
    ///
    /// Uses the local wall-clock date, never the UTC date.
    pub fn of_instant<Tz: TimeZone>(instant: &DateTime<Tz>) -> Self {
        Self(instant.date_naive())
    }

    pub fn parse(raw: &str) -> Result<Self, DateKeyError> {
        let err = || DateKeyError {
            raw: raw.to_string(),
        };
        if raw.len() != 10 {
            return Err(err());
        }
        NaiveDate::parse_from_str(raw, KEY_FORMAT)
            .map(Self)
            .map_err(|_| err())
    }

    pub fn date(self) -> NaiveDate {
        self.0
    }

    pub fn year(self) -> i32 {
        self.0.year()
    }

    pub fn pred(self) -> Option<Self> {
        self.0.pred_opt().map(Self)
    }

    pub fn succ(self) -> Option<Self> {
        self.0.succ_opt().map(Self)
    }
}

/// True for stored values carrying a time-of-day component.
pub fn is_legacy_key(raw: &str) -> bool {
    raw.contains(LEGACY_TIME_SEPARATOR)
}

/// Best-effort conversion of a legacy timestamp-shaped key to the local day it
/// was recorded on.
///
/// Values with an offset (RFC 3339) are shifted into `tz`; zone-less values are
/// read as UTC, which is what the old slice produced. If neither parses, the
/// leading date portion is kept as-is.
pub fn migrate_legacy_key<Tz: TimeZone>(raw: &str, tz: &Tz) -> Option<DateKey> {
    let raw = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(DateKey::of_instant(&instant.with_timezone(tz)));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            let instant = Utc.from_utc_datetime(&naive).with_timezone(tz);
            return Some(DateKey::of_instant(&instant));
        }
    }
    let (date_part, _) = raw.split_once(LEGACY_TIME_SEPARATOR)?;
    DateKey::parse(date_part).ok()
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(KEY_FORMAT))
    }
}

impl FromStr for DateKey {
    type Err = DateKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DateKey {
    type Error = DateKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DateKey> for String {
    fn from(key: DateKey) -> Self {
        key.to_string()
    }
}

impl From<NaiveDate> for DateKey {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn key(raw: &str) -> DateKey {
        DateKey::parse(raw).expect("valid key")
    }

    #[test]
    fn renders_zero_padded_key() {
        let day = DateKey::from_ymd(2024, 3, 7).unwrap();
        assert_eq!(day.to_string(), "2024-03-07");
        assert_eq!(key("2024-03-07"), day);
    }

    #[test]
    fn lexical_and_chronological_order_agree() {
        let mut keys = vec![key("2024-10-02"), key("2023-12-31"), key("2024-02-10")];
        keys.sort();
        let rendered: Vec<String> = keys.iter().map(ToString::to_string).collect();
        let mut lexical = rendered.clone();
        lexical.sort();
        assert_eq!(rendered, lexical);
    }

    #[test]
    fn local_day_is_used_near_midnight() {
        // 23:30 in UTC-05:00 is already the next day in UTC.
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        let late = tz.with_ymd_and_hms(2024, 1, 5, 23, 30, 0).unwrap();
        assert_eq!(DateKey::of_instant(&late).to_string(), "2024-01-05");
        assert_eq!(late.with_timezone(&Utc).date_naive().to_string(), "2024-01-06");
    }

    #[test]
    fn rejects_non_key_shapes() {
        assert!(DateKey::parse("2024-1-5").is_err());
        assert!(DateKey::parse("2024-01-05T10:00:00Z").is_err());
        assert!(DateKey::parse("yesterday").is_err());
        assert!(DateKey::parse("2024-02-30").is_err());
    }

    #[test]
    fn detects_legacy_keys() {
        assert!(is_legacy_key("2024-01-06T04:30:00.000Z"));
        assert!(!is_legacy_key("2024-01-06"));
    }

    #[test]
    fn migrates_utc_slice_into_local_day() {
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        let migrated = migrate_legacy_key("2024-01-06T04:30:00.000Z", &tz);
        assert_eq!(migrated, Some(key("2024-01-05")));

        let east = FixedOffset::east_opt(9 * 3600).unwrap();
        assert_eq!(
            migrate_legacy_key("2024-01-06T20:00:00", &east),
            Some(key("2024-01-07"))
        );
    }

    #[test]
    fn migration_falls_back_to_date_prefix() {
        let tz = FixedOffset::east_opt(0).unwrap();
        assert_eq!(
            migrate_legacy_key("2024-05-01Tnonsense", &tz),
            Some(key("2024-05-01"))
        );
        assert_eq!(migrate_legacy_key("garbage", &tz), None);
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&key("2024-01-01")).unwrap();
        assert_eq!(json, "\"2024-01-01\"");
        let parsed: DateKey = serde_json::from_str("\"2024-12-31\"").unwrap();
        assert_eq!(parsed, key("2024-12-31"));
        assert!(serde_json::from_str::<DateKey>("\"2024-12-31T00:00:00Z\"").is_err());
    }
}
