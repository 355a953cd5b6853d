use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::date_key::DateKey;
use crate::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencySummary {
    pub today: DateKey,
    pub year: i32,
    pub days_consistent: usize,
    pub current_streak: u32,
    pub longest_streak: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CalendarDay {
    pub date: DateKey,
    pub done: bool,
}

/// Every distinct committed completion day.
pub fn done_dates<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> BTreeSet<DateKey> {
    tasks.into_iter().filter_map(Task::completed_at).collect()
}

/// Consecutive done days ending at `today`; zero when today is not done.
pub fn current_streak(done: &BTreeSet<DateKey>, today: DateKey) -> u32 {
    let mut streak = 0;
    let mut cursor = Some(today);
    while let Some(day) = cursor {
        if !done.contains(&day) {
            break;
        }
        streak += 1;
        cursor = day.pred();
    }
    streak
}

/// Longest run of done days between Jan 1 and Dec 31 of `year`.
/// Runs are not carried across the year boundary.
pub fn longest_streak_in_year(done: &BTreeSet<DateKey>, year: i32) -> u32 {
    let mut longest: u32 = 0;
    let mut run: u32 = 0;
    for day in days_of_year(year) {
        if done.contains(&day) {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    longest
}

pub fn year_calendar(done: &BTreeSet<DateKey>, year: i32) -> Vec<CalendarDay> {
    days_of_year(year)
        .map(|date| CalendarDay {
            date,
            done: done.contains(&date),
        })
        .collect()
}

pub fn summarize<'a>(tasks: impl IntoIterator<Item = &'a Task>, today: DateKey) -> ConsistencySummary {
    let done = done_dates(tasks);
    let year = today.year();
    ConsistencySummary {
        today,
        year,
        days_consistent: done.len(),
        current_streak: current_streak(&done, today),
        longest_streak: longest_streak_in_year(&done, year),
    }
}

fn days_of_year(year: i32) -> impl Iterator<Item = DateKey> {
    NaiveDate::from_ymd_opt(year, 1, 1)
        .into_iter()
        .flat_map(|first| first.iter_days())
        .take_while(move |day| day.year() == year)
        .map(DateKey::from_date)
}
