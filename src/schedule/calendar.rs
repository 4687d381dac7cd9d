//! Service-calendar validity.
//!
//! A trip runs on a date when its service's weekday flag for that date is
//! set, the date falls inside the service's [start, end] range, and no
//! exception row exists for (service, date). Comparisons are whole calendar
//! dates; time of day never enters into it.

use chrono::{Datelike, NaiveDate};
use rusqlite::{OptionalExtension, params};

use crate::error::ScheduleError;

use super::ScheduleStore;

/// Whether `service_id` operates on `date`.
///
/// An exception row suppresses the occurrence. The loader's schema also
/// permits "service added" exceptions, but only removal is honored here.
///
/// # Errors
///
/// [`ScheduleError::ServiceNotFound`] when the service has no calendar row;
/// callers treat the trip as excluded rather than failing the query.
pub fn service_runs_on(
    store: &ScheduleStore,
    service_id: &str,
    date: NaiveDate,
) -> Result<bool, ScheduleError> {
    let row = store
        .conn
        .query_row(
            "SELECT monday, tuesday, wednesday, thursday, friday, saturday, sunday,
                    start_date, end_date
             FROM calendar WHERE service_id = ?1",
            params![service_id],
            |row| {
                let mut days = [false; 7];
                for (i, day) in days.iter_mut().enumerate() {
                    *day = row.get::<_, i64>(i)? != 0;
                }
                Ok((days, row.get::<_, String>(7)?, row.get::<_, String>(8)?))
            },
        )
        .optional()?;

    let Some((days, start, end)) = row else {
        return Err(ScheduleError::ServiceNotFound(service_id.to_string()));
    };

    if !days[date.weekday().num_days_from_monday() as usize] {
        return Ok(false);
    }

    let start = parse_calendar_date(&start)?;
    let end = parse_calendar_date(&end)?;
    if date < start || date > end {
        return Ok(false);
    }

    let exception: Option<i64> = store
        .conn
        .query_row(
            "SELECT 1 FROM calendar_dates WHERE service_id = ?1 AND date = ?2",
            params![service_id, date.format("%Y-%m-%d").to_string()],
            |row| row.get(0),
        )
        .optional()?;

    Ok(exception.is_none())
}

/// Calendar dates arrive as `%Y-%m-%d` from the loader, or `%Y%m%d` from raw
/// GTFS dumps.
fn parse_calendar_date(raw: &str) -> Result<NaiveDate, ScheduleError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y%m%d"))
        .map_err(|_| ScheduleError::BadDate(raw.to_string()))
}
