//! Next-occurrence arithmetic for recurring tasks (§4.5).

use chrono::{DateTime, Datelike, Utc};

use crate::domain::models::task::RecurrenceRule;

/// Advance `from` by one recurrence increment.
///
/// `monthly` adds one calendar month; if the day-of-month does not exist in
/// the target month (e.g. Jan 31 -> Feb), the last day of that month is used.
pub fn next_occurrence(from: DateTime<Utc>, rule: RecurrenceRule) -> DateTime<Utc> {
    match rule {
        RecurrenceRule::Daily => from + chrono::Duration::days(1),
        RecurrenceRule::Weekly => from + chrono::Duration::days(7),
        RecurrenceRule::Monthly => add_one_calendar_month(from),
    }
}

fn add_one_calendar_month(from: DateTime<Utc>) -> DateTime<Utc> {
    let (target_year, target_month) = if from.month() == 12 {
        (from.year() + 1, 1)
    } else {
        (from.year(), from.month() + 1)
    };

    let last_day = days_in_month(target_year, target_month);
    let target_day = from.day().min(last_day);

    from.with_day(1)
        .and_then(|d| d.with_year(target_year))
        .and_then(|d| d.with_month(target_month))
        .and_then(|d| d.with_day(target_day))
        .expect("constructed date must be valid by days_in_month()")
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let first_of_next = chrono::NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .expect("next_month always valid (1..=12)");
    let first_of_this =
        chrono::NaiveDate::from_ymd_opt(year, month, 1).expect("month always valid (1..=12)");
    (first_of_next - first_of_this).num_days() as u32
}
