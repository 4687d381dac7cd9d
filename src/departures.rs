//! Next scheduled departures for the configured selectors.
//!
//! Works purely from the static schedule; realtime adjustment happens later
//! in [`crate::merge`].

use chrono::{NaiveDateTime, Timelike};
use tracing::{debug, warn};

use crate::error::ScheduleError;
use crate::schedule::{ScheduleStore, calendar};

/// One configured (stop, route, operator) subscription.
#[derive(Debug, Clone)]
pub struct Selector {
    pub stop_name: String,
    pub route: String,
    pub operator: String,
}

/// A scheduled departure that has passed the time and calendar filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub stop_name: String,
    pub route: String,
    pub trip_id: String,
    /// Whole minutes until the scheduled departure, floored, never negative
    pub minutes_until: i64,
    /// The departure time string exactly as stored in the schedule
    pub departure_time: String,
}

/// Finds the next scheduled departures across all `selectors`.
///
/// A selector whose stop or route does not resolve is logged and skipped; a
/// trip that does not serve the selector's stop is skipped; departures
/// already in the past and services not running on `now`'s date are
/// excluded. The surviving departures are sorted soonest-first (stable for
/// ties) and only then capped at `limit`, so the cap always keeps the
/// earliest ones.
///
/// # Errors
///
/// Only storage-level failures propagate; every lookup miss is local.
pub fn find_departures(
    store: &ScheduleStore,
    selectors: &[Selector],
    limit: usize,
    now: NaiveDateTime,
) -> Result<Vec<Departure>, ScheduleError> {
    let today = now.date();
    let now_secs = i64::from(now.time().num_seconds_from_midnight());

    let mut departures = Vec::new();

    for selector in selectors {
        let stop_id = match store.find_stop(&selector.stop_name) {
            Ok(id) => id,
            Err(e) if e.is_not_found() => {
                warn!(
                    stop = %selector.stop_name,
                    route = %selector.route,
                    operator = %selector.operator,
                    "Selector references an unknown stop, skipping"
                );
                continue;
            }
            Err(e) => return Err(e),
        };

        let route_id = match store.find_route(&selector.route, &selector.operator) {
            Ok(id) => id,
            Err(e) if e.is_not_found() => {
                warn!(
                    stop = %selector.stop_name,
                    route = %selector.route,
                    operator = %selector.operator,
                    "Selector references an unknown route, skipping"
                );
                continue;
            }
            Err(e) => return Err(e),
        };

        for (trip_id, service_id) in store.trips_for_route(&route_id)? {
            let Some(stop_time) = store.stop_time_for(&trip_id, &stop_id)? else {
                continue;
            };

            let Some(dep_secs) = time_of_day_seconds(&stop_time.departure) else {
                debug!(trip = %trip_id, raw = %stop_time.departure, "Unparseable departure time");
                continue;
            };

            let diff = dep_secs - now_secs;
            if diff < 0 {
                continue;
            }

            match calendar::service_runs_on(store, &service_id, today) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) if e.is_not_found() => {
                    debug!(trip = %trip_id, service = %service_id, "Service unknown, trip excluded");
                    continue;
                }
                Err(e) => return Err(e),
            }

            departures.push(Departure {
                stop_name: selector.stop_name.clone(),
                route: selector.route.clone(),
                trip_id,
                minutes_until: diff / 60,
                departure_time: stop_time.departure.clone(),
            });
        }
    }

    departures.sort_by_key(|d| d.minutes_until);
    departures.truncate(limit);

    Ok(departures)
}

/// Seconds since midnight for a stored departure time.
///
/// The loader writes either a bare `HH:MM:SS` or a full
/// `YYYY-MM-DD HH:MM:SS.ffffff` timestamp whose date part is a placeholder;
/// only the time of day is meaningful. Hours may exceed 23 for trips
/// scheduled past midnight.
fn time_of_day_seconds(raw: &str) -> Option<i64> {
    let time_part = raw.rsplit(' ').next()?;
    let time_part = time_part.split('.').next()?;

    let mut fields = time_part.split(':');
    let hours: i64 = fields.next()?.parse().ok()?;
    let minutes: i64 = fields.next()?.parse().ok()?;
    let seconds: i64 = fields.next()?.parse().ok()?;
    if fields.next().is_some() || !(0..60).contains(&minutes) || !(0..60).contains(&seconds) {
        return None;
    }

    Some(hours * 3600 + minutes * 60 + seconds)
}
