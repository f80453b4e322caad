//! Converts a leave date range into the quantity it consumes from the ledger
use chrono::{Datelike, NaiveDate, Weekday};

use crate::types::Days;

pub fn is_working_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Counts weekdays in `start..=end`, then takes a single flat half day off
/// when `half_day` is set and at least one working day was counted.
///
/// A reversed range consumes nothing; callers reject it before getting here.
pub fn consumed_days(start: NaiveDate, end: NaiveDate, half_day: bool) -> Days {
    let working = start
        .iter_days()
        .take_while(|day| *day <= end)
        .filter(|day| is_working_day(*day))
        .count() as i64;

    let mut total = Days::whole(working);
    if half_day && working > 0 {
        total -= Days::HALF;
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn monday_to_wednesday_is_three_days() {
        assert_eq!(
            consumed_days(date(2025, 3, 3), date(2025, 3, 5), false),
            Days::whole(3)
        );
    }

    #[test]
    fn weekend_only_range_is_zero_even_with_half_day() {
        let sat = date(2025, 3, 8);
        let sun = date(2025, 3, 9);
        assert_eq!(consumed_days(sat, sun, false), Days::ZERO);
        assert_eq!(consumed_days(sat, sun, true), Days::ZERO);
    }

    #[test]
    fn single_half_day() {
        let mon = date(2025, 3, 3);
        assert_eq!(consumed_days(mon, mon, true), Days::HALF);
    }

    #[test]
    fn half_day_is_subtracted_once_across_a_span() {
        // Fri..Tue spans a weekend: Fri, Mon, Tue
        let total = consumed_days(date(2025, 3, 7), date(2025, 3, 11), true);
        assert_eq!(total, Days::from_halves(5));
    }

    #[test]
    fn reversed_range_consumes_nothing() {
        assert_eq!(
            consumed_days(date(2025, 3, 5), date(2025, 3, 3), false),
            Days::ZERO
        );
    }
}
