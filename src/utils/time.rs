use anyhow::{Context, Result};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Serialize;

use super::clock::Clock;

/// Format used by the sleep ring API and the sleep vault index, e.g. `13-03-2023`.
pub const WEEK_START_FORMAT: &str = "%d-%m-%Y";

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// This is the standard way of converting a date to a string in lifevault. Month and day are
/// always zero padded, the notes database rejects range filters like `2024-1-01`.
pub fn iso_date(year: i32, month: u32, day: u32) -> String {
    format!("{year}-{month:02}-{day:02}")
}

/// Current date as `YYYY-MM-DD`.
pub fn current_date(clock: &dyn Clock) -> String {
    let today = clock.today();
    iso_date(today.year(), today.month(), today.day())
}

pub fn current_year(clock: &dyn Clock) -> i32 {
    clock.today().year()
}

pub fn current_month(clock: &dyn Clock) -> u32 {
    clock.today().month()
}

pub fn current_day(clock: &dyn Clock) -> u32 {
    clock.today().day()
}

/// Number of days in a month, found as "day 0" of the following month. Returns 0 for month
/// numbers outside of 1..=12.
pub fn last_day_of_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .filter(|_| (1..=12).contains(&month))
        .and_then(|v| v.pred_opt())
        .map_or(0, |v| v.day())
}

/// True if `(year, month)` is strictly before the current month.
pub fn has_month_passed(clock: &dyn Clock, year: i32, month: u32) -> bool {
    let today = clock.today();
    (year, month) < (today.year(), today.month())
}

fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn weekdays_until(year: i32, month: u32, last_day: u32) -> u32 {
    (1..=last_day)
        .filter_map(|day| NaiveDate::from_ymd_opt(year, month, day))
        .filter(|date| is_weekday(*date))
        .count() as u32
}

/// Count of Monday to Friday dates in the month.
pub fn weekdays_in_month(year: i32, month: u32) -> u32 {
    weekdays_until(year, month, last_day_of_month(year, month))
}

/// Weekdays of the month that already happened, today included. Future months have none.
pub fn weekdays_passed(clock: &dyn Clock, year: i32, month: u32) -> u32 {
    let today = clock.today();
    if has_month_passed(clock, year, month) {
        weekdays_in_month(year, month)
    } else if (year, month) == (today.year(), today.month()) {
        weekdays_until(year, month, today.day())
    } else {
        0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousMonth {
    pub prev_month: u32,
    pub prev_year: i32,
}

pub fn previous_month_and_year(month: u32, year: i32) -> PreviousMonth {
    if month == 1 {
        PreviousMonth {
            prev_month: 12,
            prev_year: year - 1,
        }
    } else {
        PreviousMonth {
            prev_month: month - 1,
            prev_year: year,
        }
    }
}

pub fn month_name(month: u32) -> &'static str {
    match month {
        1..=12 => MONTH_NAMES[month as usize - 1],
        _ => "Invalid month number",
    }
}

/// Adds `days` to a `DD-MM-YYYY` date, keeping the same format.
pub fn add_days(date: &str, days: i64) -> Result<String> {
    let parsed = NaiveDate::parse_from_str(date, WEEK_START_FORMAT)
        .with_context(|| format!("Can't parse {date} as DD-MM-YYYY"))?;
    Ok((parsed + Duration::days(days))
        .format(WEEK_START_FORMAT)
        .to_string())
}

/// A calendar month that a pipeline runs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn current(clock: &dyn Clock) -> Self {
        Self::new(current_year(clock), current_month(clock))
    }

    /// Fills whatever part of the period wasn't given with the current date.
    pub fn resolve(year: Option<i32>, month: Option<u32>, clock: &dyn Clock) -> Self {
        Self::new(
            year.unwrap_or_else(|| current_year(clock)),
            month.unwrap_or_else(|| current_month(clock)),
        )
    }

    pub fn previous(&self) -> Self {
        let PreviousMonth {
            prev_month,
            prev_year,
        } = previous_month_and_year(self.month, self.year);
        Self::new(prev_year, prev_month)
    }

    pub fn last_day(&self) -> u32 {
        last_day_of_month(self.year, self.month)
    }

    pub fn first_iso_date(&self) -> String {
        iso_date(self.year, self.month, 1)
    }

    pub fn last_iso_date(&self) -> String {
        iso_date(self.year, self.month, self.last_day())
    }
}
