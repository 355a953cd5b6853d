use crate::date_key::DateKey;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

pub const DAILY_MESSAGES: &[&str] = &[
    "Small steps every day add up.",
    "Show up today; tomorrow takes care of itself.",
    "Consistency beats intensity.",
    "One task done is one more than none.",
    "Keep the chain going.",
    "Progress, not perfection.",
    "Start where you are.",
    "Do it for the calendar.",
    "Today counts.",
    "Little by little, a little becomes a lot.",
];

/// Index into a list of `len` items for `day`. The same day always yields the
/// same index. `None` for an empty list.
pub fn pick_index(day: DateKey, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let folded = day
        .to_string()
        .chars()
        .fold(FNV_OFFSET, |acc, c| (acc ^ u64::from(c)).wrapping_mul(FNV_PRIME));
    Some((folded % len as u64) as usize)
}

pub fn pick<T>(items: &[T], day: DateKey) -> Option<&T> {
    pick_index(day, items.len()).and_then(|idx| items.get(idx))
}

pub fn daily_message(day: DateKey) -> &'static str {
    pick(DAILY_MESSAGES, day).copied().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashSet;

    #[test]
    fn same_day_same_pick() {
        let day = DateKey::parse("2024-07-04").unwrap();
        let first = pick_index(day, DAILY_MESSAGES.len());
        for _ in 0..10 {
            assert_eq!(pick_index(day, DAILY_MESSAGES.len()), first);
        }
        assert_eq!(daily_message(day), daily_message(day));
    }

    #[test]
    fn picks_span_the_whole_list_over_a_year() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        for len in [1, 2, 7, DAILY_MESSAGES.len(), 31] {
            let seen: HashSet<usize> = start
                .iter_days()
                .take(365)
                .filter_map(|date| pick_index(DateKey::from_date(date), len))
                .collect();
            assert_eq!(seen.len(), len, "list of {len} not fully covered");
        }
    }

    #[test]
    fn empty_list_has_no_pick() {
        let day = DateKey::parse("2024-07-04").unwrap();
        assert_eq!(pick::<&str>(&[], day), None);
        assert_eq!(pick_index(day, 0), None);
    }
}
