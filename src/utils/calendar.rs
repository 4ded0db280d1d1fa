use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::error::{AppError, AppResult};

pub const WEEKDAY_ORDER: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

pub fn weekday_label(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}

pub fn parse_date(value: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::invalid_range(format!("malformed date `{value}`")))
}

/// Rejects inverted bounds. Equal bounds are a one-day range.
pub fn ensure_range(from: NaiveDate, to: NaiveDate) -> AppResult<()> {
    if from > to {
        return Err(AppError::invalid_range(format!(
            "range start {from} is after end {to}"
        )));
    }
    Ok(())
}

/// `date` minus `days`, or `InvalidRange` when that leaves the calendar.
pub fn days_before(date: NaiveDate, days: u32) -> AppResult<NaiveDate> {
    date.checked_sub_signed(Duration::days(days as i64))
        .ok_or_else(|| {
            AppError::invalid_range(format!("{days} days before {date} is out of range"))
        })
}

/// Monday..Sunday of the week containing `date`.
pub fn resolve_week(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let offset = date.weekday().num_days_from_monday() as i64;
    let start = date - Duration::days(offset);
    (start, start + Duration::days(6))
}

/// First and last day of a `YYYY-MM` calendar month.
pub fn resolve_month(month: &str) -> AppResult<(NaiveDate, NaiveDate)> {
    let trimmed = month.trim();
    let (year, month_number) = trimmed
        .split_once('-')
        .filter(|(year, month)| year.len() == 4 && month.len() == 2)
        .and_then(|(year, month)| Some((year.parse::<i32>().ok()?, month.parse::<u32>().ok()?)))
        .ok_or_else(|| AppError::invalid_range(format!("malformed month `{month}`")))?;

    let start = NaiveDate::from_ymd_opt(year, month_number, 1)
        .ok_or_else(|| AppError::invalid_range(format!("month out of range `{month}`")))?;
    let next_start = if month_number == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month_number + 1, 1)
    }
    .ok_or_else(|| AppError::invalid_range(format!("month out of range `{month}`")))?;

    Ok((start, next_start - Duration::days(1)))
}
