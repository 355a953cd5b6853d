use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone};
use parking_lot::Mutex;

use crate::date_key::DateKey;

/// Source of "now" for every component that needs to know what day it is.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;

    fn today(&self) -> DateKey {
        DateKey::of_instant(&self.now())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Manually driven clock for tests and previews.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Local>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Noon local time on `date`.
    pub fn on(date: NaiveDate) -> Self {
        Self::new(local_noon(date))
    }

    pub fn set(&self, now: DateTime<Local>) {
        *self.now.lock() = now;
    }

    pub fn set_day(&self, date: NaiveDate) {
        self.set(local_noon(date));
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock()
    }
}

fn local_noon(date: NaiveDate) -> DateTime<Local> {
    let noon = date.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN));
    Local
        .from_local_datetime(&noon)
        .earliest()
        .unwrap_or_else(|| Local.from_utc_datetime(&noon))
}

/// First instant of the calendar day after `now`, in `now`'s timezone.
///
/// Where a DST jump skips local midnight, the first valid instant within the
/// following hours is used instead.
pub fn next_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let tomorrow = now.date_naive().succ_opt()?;
    let tz = now.timezone();
    (0..4).find_map(|hour| {
        let candidate = tomorrow.and_time(NaiveTime::from_hms_opt(hour, 0, 0)?);
        tz.from_local_datetime(&candidate).earliest()
    })
}

/// How long to sleep from `now` until the next local midnight.
pub fn until_next_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> StdDuration {
    const FALLBACK: StdDuration = StdDuration::from_secs(60);
    next_midnight(now)
        .and_then(|midnight| (midnight - now.clone()).to_std().ok())
        .unwrap_or(FALLBACK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn next_midnight_is_start_of_following_day() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2024, 2, 28, 22, 15, 0).unwrap();
        let midnight = next_midnight(&now).expect("midnight exists");
        assert_eq!(midnight, tz.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap());
        assert_eq!(until_next_midnight(&now), StdDuration::from_secs(105 * 60));
    }

    #[test]
    fn exactly_midnight_waits_a_full_day() {
        let tz = FixedOffset::west_opt(3600).unwrap();
        let now = tz.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap();
        assert_eq!(until_next_midnight(&now), StdDuration::from_secs(24 * 3600));
        let midnight = next_midnight(&now).unwrap();
        assert_eq!(DateKey::of_instant(&midnight).to_string(), "2025-01-01");
    }

    #[test]
    fn fixed_clock_reports_its_local_day() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let clock = FixedClock::on(date);
        assert_eq!(clock.today(), DateKey::from_date(date));

        clock.advance(Duration::hours(24));
        assert_eq!(clock.today().to_string(), "2024-06-02");

        clock.set_day(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(clock.today().to_string(), "2025-01-01");
    }
}
