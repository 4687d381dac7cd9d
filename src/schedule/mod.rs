//! Read-only query surface over the static GTFS schedule database.
//!
//! The database is produced by an external loader from a GTFS archive; this
//! module only looks rows up. It performs no calendar filtering; that lives
//! in [`calendar`].

pub mod calendar;

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags, OptionalExtension, params};

use crate::error::ScheduleError;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Scheduled arrival/departure for one (trip, stop) pair, as stored.
#[derive(Debug, Clone)]
pub struct StopTime {
    pub arrival: String,
    pub departure: String,
}

pub struct ScheduleStore {
    pub(crate) conn: Connection,
}

impl ScheduleStore {
    /// Opens the schedule database read-only.
    ///
    /// Each prepared statement lives only for the duration of the query that
    /// uses it, and the busy timeout keeps any query from blocking unbounded
    /// behind a concurrent writer.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ScheduleError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self { conn })
    }

    /// Wraps an already-open connection; used by tests to build fixtures
    /// on in-memory databases.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Resolves a stop display name to its stop id.
    ///
    /// Stop names are not unique in GTFS; when several stops share a name the
    /// first row wins. Known limitation carried over from the data model.
    pub fn find_stop(&self, name: &str) -> Result<String, ScheduleError> {
        self.conn
            .query_row(
                "SELECT stop_id FROM stops WHERE stop_name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| ScheduleError::StopNotFound(name.to_string()))
    }

    /// Resolves a route short name plus operating agency to a route id.
    pub fn find_route(&self, short_name: &str, operator: &str) -> Result<String, ScheduleError> {
        self.conn
            .query_row(
                "SELECT route_id FROM routes
                 WHERE route_short_name = ?1 AND agency_id = ?2",
                params![short_name, operator],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| ScheduleError::RouteNotFound {
                route: short_name.to_string(),
                operator: operator.to_string(),
            })
    }

    /// All (trip id, service id) pairs running on a route.
    pub fn trips_for_route(
        &self,
        route_id: &str,
    ) -> Result<Vec<(String, String)>, ScheduleError> {
        let mut stmt = self
            .conn
            .prepare("SELECT trip_id, service_id FROM trips WHERE route_id = ?1")?;
        let rows = stmt.query_map(params![route_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut trips = Vec::new();
        for row in rows {
            trips.push(row?);
        }
        Ok(trips)
    }

    /// The scheduled stop time of a trip at a stop, or `None` when the trip
    /// does not serve that stop. Callers treat `None` as "skip this trip".
    pub fn stop_time_for(
        &self,
        trip_id: &str,
        stop_id: &str,
    ) -> Result<Option<StopTime>, ScheduleError> {
        let row = self
            .conn
            .query_row(
                "SELECT arrival_time, departure_time FROM stop_times
                 WHERE trip_id = ?1 AND stop_id = ?2",
                params![trip_id, stop_id],
                |row| {
                    Ok(StopTime {
                        arrival: row.get(0)?,
                        departure: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }
}
