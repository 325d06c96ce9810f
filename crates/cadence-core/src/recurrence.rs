//! Occurrence calculator: pure calendar arithmetic, no I/O.
//!
//! `next_occurrence` steps a series one occurrence forward; `should_continue`
//! evaluates the termination budget; `upcoming` walks a bounded preview.
//! The materializer in `repository::materialization` drives these against the
//! instance store.
//!
//! Stepping policies worth calling out:
//!
//! - Weekly visits every selected weekday of the active week before jumping,
//!   and the interval multiplies only the wrap jump. A `{Mon, Wed}` rule with
//!   interval 2 starting on a Monday yields Mon, Wed, then the Monday two
//!   weeks after the first.
//! - A day-of-month anchor larger than the target month clamps to month-end
//!   (day 31 in February yields Feb 28/29).
//! - Nth-weekday anchors treat week 5 as "last occurrence in the month".
//! - Yearly steps re-anchor on the series start's month and day, so a series
//!   started on Feb 29 clamps to Feb 28 in common years and returns to
//!   Feb 29 in leap years.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};

use crate::models::{CustomUnit, EndCondition, MonthlyAnchor, Pattern, RecurrenceRule};

/// Computes the next candidate occurrence strictly after `last`.
///
/// # Arguments
/// * `rule` - The repetition contract being stepped.
/// * `last` - The most recent occurrence in the walk.
/// * `series_start` - The series anchor; yearly stepping re-anchors on its
///   month and day.
///
/// # Returns
/// * `Option<NaiveDateTime>` - The next candidate, or `None` when the rule's
///   until-date is already behind the computed step (the caller re-checks
///   date termination through [`should_continue`] as well).
pub fn next_occurrence(
    rule: &RecurrenceRule,
    last: NaiveDateTime,
    series_start: NaiveDateTime,
) -> Option<NaiveDateTime> {
    let interval = i64::from(rule.interval);
    let next = match &rule.pattern {
        Pattern::Daily => last.checked_add_signed(Duration::days(interval))?,
        Pattern::Weekly { days } => next_weekly(last, days, rule.interval)?,
        Pattern::Monthly { anchor } => next_monthly(last, anchor, rule.interval)?,
        Pattern::Yearly => next_yearly(last, series_start, rule.interval)?,
        Pattern::Workdays => next_counted(last, interval, is_workday)?,
        Pattern::Weekends => next_counted(last, interval, is_weekend_day)?,
        Pattern::Custom { unit } => match unit {
            CustomUnit::Hours => last.checked_add_signed(Duration::hours(interval))?,
            CustomUnit::Days => last.checked_add_signed(Duration::days(interval))?,
            CustomUnit::Weeks => last.checked_add_signed(Duration::weeks(interval))?,
            CustomUnit::Months => add_months_clamped(last, rule.interval)?,
        },
    };

    // Post-step check: a candidate past the until-date ends the series.
    match rule.end {
        EndCondition::UntilDate(end) if next > end => None,
        _ => Some(next),
    }
}

/// Whether the walk may consider another occurrence, given how many have been
/// considered so far and the date the walk has reached.
pub fn should_continue(
    rule: &RecurrenceRule,
    occurrence_count: u32,
    current: NaiveDateTime,
) -> bool {
    match rule.end {
        EndCondition::Never => true,
        EndCondition::UntilDate(end) => current <= end,
        EndCondition::AfterCount(count) => occurrence_count < count,
    }
}

/// Bounded preview of the series: up to `count` occurrences starting at
/// `series_start`, honoring the rule's end condition.
pub fn upcoming(rule: &RecurrenceRule, series_start: NaiveDateTime, count: usize) -> Vec<NaiveDateTime> {
    let mut occurrences = Vec::with_capacity(count);
    let mut current = series_start;
    let mut considered: u32 = 0;
    while occurrences.len() < count && should_continue(rule, considered, current) {
        occurrences.push(current);
        considered = considered.saturating_add(1);
        match next_occurrence(rule, current, series_start) {
            Some(next) => current = next,
            None => break,
        }
    }
    occurrences
}

pub fn is_workday(day: Weekday) -> bool {
    !is_weekend_day(day)
}

pub fn is_weekend_day(day: Weekday) -> bool {
    matches!(day, Weekday::Sat | Weekday::Sun)
}

/// Number of days in the given month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    // The first of a month always exists; its predecessor is the requested
    // month's last day.
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

/// Calendar month addition keeping the day, clamped to the target month's end.
pub fn add_months_clamped(datetime: NaiveDateTime, months: u32) -> Option<NaiveDateTime> {
    let (year, month) = shift_month(datetime.date(), months)?;
    date_with_clamped_day(year, month, datetime.date().day()).map(|d| d.and_time(datetime.time()))
}

/// Date of the Nth `weekday` of the given month; week 5 means the last
/// occurrence of that weekday in the month.
pub fn nth_weekday_of_month(year: i32, month: u32, week: u8, weekday: Weekday) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let offset = (7 + weekday.num_days_from_monday() - first.weekday().num_days_from_monday()) % 7;
    let first_hit = 1 + offset;
    let last_day = days_in_month(year, month);
    let day = if week == 5 {
        let mut day = first_hit;
        while day + 7 <= last_day {
            day += 7;
        }
        day
    } else {
        first_hit + 7 * (u32::from(week) - 1)
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

fn next_weekly(last: NaiveDateTime, days: &[Weekday], interval: u32) -> Option<NaiveDateTime> {
    let current = last.weekday().num_days_from_monday();
    let indices: Vec<u32> = days.iter().map(|d| d.num_days_from_monday()).collect();
    if let Some(&next_day) = indices.iter().find(|&&d| d > current) {
        // Still inside the active week.
        return last.checked_add_signed(Duration::days(i64::from(next_day - current)));
    }
    // Wrap to the first selected weekday; the interval stretches only this jump.
    let first = *indices.first()?;
    let wrap = i64::from(7 - current + first);
    let jump = wrap + 7 * (i64::from(interval) - 1);
    last.checked_add_signed(Duration::days(jump))
}

fn next_monthly(
    last: NaiveDateTime,
    anchor: &MonthlyAnchor,
    interval: u32,
) -> Option<NaiveDateTime> {
    let (year, month) = shift_month(last.date(), interval)?;
    let date = match anchor {
        MonthlyAnchor::DayOfMonth(day) => date_with_clamped_day(year, month, u32::from(*day))?,
        MonthlyAnchor::NthWeekday { week, weekday } => {
            nth_weekday_of_month(year, month, *week, *weekday)?
        }
    };
    Some(date.and_time(last.time()))
}

fn next_yearly(
    last: NaiveDateTime,
    series_start: NaiveDateTime,
    interval: u32,
) -> Option<NaiveDateTime> {
    let year = last.date().year().checked_add(interval as i32)?;
    let month = series_start.date().month();
    let date = date_with_clamped_day(year, month, series_start.date().day())?;
    Some(date.and_time(last.time()))
}

fn next_counted(
    last: NaiveDateTime,
    interval: i64,
    counts: fn(Weekday) -> bool,
) -> Option<NaiveDateTime> {
    let mut current = last;
    let mut remaining = interval;
    while remaining > 0 {
        current = current.checked_add_signed(Duration::days(1))?;
        if counts(current.weekday()) {
            remaining -= 1;
        }
    }
    Some(current)
}

fn shift_month(date: NaiveDate, months: u32) -> Option<(i32, u32)> {
    let total = i64::from(date.year()) * 12 + i64::from(date.month0()) + i64::from(months);
    let year = i32::try_from(total.div_euclid(12)).ok()?;
    let month = total.rem_euclid(12) as u32 + 1;
    Some((year, month))
}

fn date_with_clamped_day(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day.min(days_in_month(year, month)))
}
