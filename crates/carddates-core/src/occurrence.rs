//! Projection of recurring contact dates onto calendar years.
//!
//! A leap-day date falls back to Feb 28 in years without Feb 29.

use chrono::{Datelike, Days, NaiveDate};

use crate::contact::ContactDate;

/// Longest look-ahead window, in days (about a century).
pub const MAX_DAYS_AHEAD: i64 = 36_600;

/// One yearly occurrence of a contact date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence<'a> {
    /// The entry this occurrence belongs to.
    pub entry: &'a ContactDate,
    /// The concrete date.
    pub date: NaiveDate,
    /// Years since the known year, if any.
    pub years: Option<i32>,
}

/// Returns the date's month/day in `year`.
pub fn occurrence_in_year(date: NaiveDate, year: i32) -> Option<NaiveDate> {
    date.with_year(year)
        .or_else(|| NaiveDate::from_ymd_opt(year, date.month(), 28))
}

/// Returns the first occurrence on or after `today`.
pub fn next_occurrence(date: NaiveDate, today: NaiveDate) -> Option<NaiveDate> {
    let this_year = occurrence_in_year(date, today.year())?;
    if this_year >= today {
        Some(this_year)
    } else {
        occurrence_in_year(date, today.year() + 1)
    }
}

/// Returns the number of years between `year_of_birth` and `year`.
///
/// `None` when the year is unknown or lies after `year`.
pub fn age_in(year_of_birth: Option<i32>, year: i32) -> Option<i32> {
    year_of_birth
        .map(|born| year - born)
        .filter(|age| *age >= 0)
}

/// Returns the last day of a `days`-long window starting at `today`.
///
/// `days` is clamped to `[0, MAX_DAYS_AHEAD]`.
pub fn window_end(today: NaiveDate, days: i64) -> NaiveDate {
    let days = days.clamp(0, MAX_DAYS_AHEAD).unsigned_abs();
    today.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX)
}

/// Returns every occurrence of `entry` in `[start, end]`, oldest first.
pub fn occurrences_between(
    entry: &ContactDate,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<Occurrence<'_>> {
    if end < start {
        return Vec::new();
    }

    (start.year()..=end.year())
        .filter_map(|year| occurrence_in_year(entry.date, year))
        .filter(|date| *date >= start && *date <= end)
        .map(|date| Occurrence {
            entry,
            date,
            years: age_in(entry.year_of_birth, date.year()),
        })
        .collect()
}

/// Returns the occurrences of all entries in `[start, end]`, sorted by date.
pub fn upcoming<'a>(
    entries: &'a [ContactDate],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<Occurrence<'a>> {
    let mut all: Vec<_> = entries
        .iter()
        .flat_map(|entry| occurrences_between(entry, start, end))
        .collect();
    all.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.entry.name.cmp(&b.entry.name)));
    all
}
