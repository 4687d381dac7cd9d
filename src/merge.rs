//! Overlays realtime delays and vehicle positions onto the scheduled
//! departures and groups the result into per (route, stop) arrival boards.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::departures::Departure;
use crate::realtime::{TripUpdates, VehicleLocation, VehiclePositions};

/// A delay-adjusted, position-enriched prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Arrival {
    pub stop_name: String,
    pub route: String,
    pub trip_id: String,
    /// Scheduled minutes-until plus the accumulated feed delay; can dip
    /// below zero when a vehicle runs early
    pub minutes: i64,
    /// Scheduled departure formatted `HH:MM`
    pub departure_time: String,
    pub position: Option<VehicleLocation>,
}

/// route short name → stop name → arrivals, soonest first.
///
/// `BTreeMap` keeps iteration (and serialization) order deterministic, so
/// identical inputs always produce identical output.
pub type Boards = BTreeMap<String, BTreeMap<String, Vec<Arrival>>>;

/// Builds the arrival boards for one update cycle.
///
/// Each departure picks up its trip's accumulated delay (zero when the feed
/// never mentioned the trip) and, through the vehicle id recorded from that
/// same trip-update entity, its vehicle position (absent rather than
/// defaulted when unknown). Groups are re-sorted because delays can reorder
/// departures that were already sorted on schedule time alone.
///
/// The adjustment starts from the untouched scheduled value every cycle, so
/// repeated cycles never compound delays.
pub fn merge(
    departures: Vec<Departure>,
    trip_updates: &TripUpdates,
    vehicle_positions: &VehiclePositions,
) -> Boards {
    let mut boards = Boards::new();

    for departure in departures {
        let update = trip_updates.get(&departure.trip_id);

        let delay_minutes = update.map_or(0, |u| u.delay_seconds / 60);
        let position = update
            .and_then(|u| u.vehicle_id.as_deref())
            .and_then(|vehicle_id| vehicle_positions.get(vehicle_id))
            .copied();

        boards
            .entry(departure.route.clone())
            .or_default()
            .entry(departure.stop_name.clone())
            .or_default()
            .push(Arrival {
                minutes: departure.minutes_until + delay_minutes,
                departure_time: format_departure(&departure.departure_time),
                position,
                stop_name: departure.stop_name,
                route: departure.route,
                trip_id: departure.trip_id,
            });
    }

    for stops in boards.values_mut() {
        for arrivals in stops.values_mut() {
            arrivals.sort_by_key(|a| a.minutes);
        }
    }

    boards
}

pub fn board_for<'a>(boards: &'a Boards, route: &str, stop: &str) -> &'a [Arrival] {
    boards
        .get(route)
        .and_then(|stops| stops.get(stop))
        .map_or(&[], Vec::as_slice)
}

/// What a consumer shows for one (route, stop) pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BoardSummary {
    pub arrivals: usize,
    pub due_in: Option<i64>,
    pub departure_time: Option<String>,
    pub position: Option<VehicleLocation>,
    /// Minutes of the second-soonest arrival, when one exists
    pub next_due_in: Option<i64>,
}

impl BoardSummary {
    pub fn of(arrivals: &[Arrival]) -> Self {
        BoardSummary {
            arrivals: arrivals.len(),
            due_in: arrivals.first().map(|a| a.minutes),
            departure_time: arrivals.first().map(|a| a.departure_time.clone()),
            position: arrivals.first().and_then(|a| a.position),
            next_due_in: arrivals.get(1).map(|a| a.minutes),
        }
    }

    /// `"-"` when nothing is known, so an empty board cannot be mistaken
    /// for "due in zero minutes".
    pub fn due_in_label(&self) -> String {
        match self.due_in {
            Some(minutes) => minutes.to_string(),
            None => "-".to_string(),
        }
    }
}

/// `HH:MM` from the stored departure string, whichever layout the loader
/// wrote (`09:00:00` or `1970-01-01 09:00:00.000000`).
fn format_departure(raw: &str) -> String {
    let time_part = raw.rsplit(' ').next().unwrap_or(raw);
    time_part.chars().take(5).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::TripUpdate;

    fn departure(trip_id: &str, minutes: i64) -> Departure {
        Departure {
            stop_name: "Main St".into(),
            route: "145".into(),
            trip_id: trip_id.into(),
            minutes_until: minutes,
            departure_time: "09:00:00".into(),
        }
    }

    fn delayed(seconds: i64, vehicle: Option<&str>) -> TripUpdate {
        TripUpdate {
            delay_seconds: seconds,
            vehicle_id: vehicle.map(str::to_string),
        }
    }

    #[test]
    fn test_delay_added_in_floored_minutes() {
        let updates = TripUpdates::from([("T1".to_string(), delayed(120, None))]);
        let boards = merge(vec![departure("T1", 10)], &updates, &VehiclePositions::new());

        let arrivals = board_for(&boards, "145", "Main St");
        assert_eq!(arrivals.len(), 1);
        assert_eq!(arrivals[0].minutes, 12);
        assert_eq!(arrivals[0].departure_time, "09:00");
        assert!(arrivals[0].position.is_none());
    }

    #[test]
    fn test_unmentioned_trip_gets_zero_delay() {
        let boards = merge(
            vec![departure("T1", 7)],
            &TripUpdates::new(),
            &VehiclePositions::new(),
        );
        assert_eq!(board_for(&boards, "145", "Main St")[0].minutes, 7);
    }

    #[test]
    fn test_partial_delay_minute_truncated() {
        let updates = TripUpdates::from([("T1".to_string(), delayed(119, None))]);
        let boards = merge(vec![departure("T1", 10)], &updates, &VehiclePositions::new());
        assert_eq!(board_for(&boards, "145", "Main St")[0].minutes, 11);
    }

    #[test]
    fn test_delay_can_reorder_group() {
        let updates = TripUpdates::from([("T1".to_string(), delayed(600, None))]);
        let boards = merge(
            vec![departure("T1", 5), departure("T2", 9)],
            &updates,
            &VehiclePositions::new(),
        );

        let arrivals = board_for(&boards, "145", "Main St");
        assert_eq!(arrivals[0].trip_id, "T2");
        assert_eq!(arrivals[0].minutes, 9);
        assert_eq!(arrivals[1].trip_id, "T1");
        assert_eq!(arrivals[1].minutes, 15);
    }

    #[test]
    fn test_position_joined_through_trip_update_vehicle() {
        let updates = TripUpdates::from([
            ("T1".to_string(), delayed(0, Some("bus-7"))),
            ("T2".to_string(), delayed(0, None)),
        ]);
        let positions = VehiclePositions::from([
            (
                "bus-7".to_string(),
                VehicleLocation {
                    latitude: 53.35,
                    longitude: -6.26,
                },
            ),
            (
                "bus-8".to_string(),
                VehicleLocation {
                    latitude: 51.90,
                    longitude: -8.47,
                },
            ),
        ]);

        let boards = merge(
            vec![departure("T1", 3), departure("T2", 6)],
            &updates,
            &positions,
        );

        let arrivals = board_for(&boards, "145", "Main St");
        assert_eq!(arrivals[0].position.unwrap().latitude, 53.35);
        // T2 has no linked vehicle: position stays unknown even though the
        // position feed has other vehicles
        assert!(arrivals[1].position.is_none());
    }

    #[test]
    fn test_groups_by_route_then_stop() {
        let mut other = departure("T9", 4);
        other.route = "46A".into();
        other.stop_name = "Elm Rd".into();

        let boards = merge(
            vec![departure("T1", 10), other],
            &TripUpdates::new(),
            &VehiclePositions::new(),
        );

        assert_eq!(board_for(&boards, "145", "Main St").len(), 1);
        assert_eq!(board_for(&boards, "46A", "Elm Rd").len(), 1);
        assert!(board_for(&boards, "46A", "Main St").is_empty());
    }

    #[test]
    fn test_merge_is_deterministic() {
        let updates = TripUpdates::from([
            ("T1".to_string(), delayed(300, Some("bus-1"))),
            ("T2".to_string(), delayed(-60, None)),
        ]);
        let departures = vec![departure("T1", 2), departure("T2", 2), departure("T3", 8)];

        let first = merge(departures.clone(), &updates, &VehiclePositions::new());
        let second = merge(departures, &updates, &VehiclePositions::new());

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_summary_reports_second_soonest() {
        let boards = merge(
            vec![departure("T1", 12), departure("T2", 27)],
            &TripUpdates::new(),
            &VehiclePositions::new(),
        );

        let summary = BoardSummary::of(board_for(&boards, "145", "Main St"));
        assert_eq!(summary.arrivals, 2);
        assert_eq!(summary.due_in, Some(12));
        assert_eq!(summary.next_due_in, Some(27));
        assert_eq!(summary.departure_time.as_deref(), Some("09:00"));
        assert_eq!(summary.due_in_label(), "12");
    }

    #[test]
    fn test_empty_board_uses_sentinel() {
        let summary = BoardSummary::of(&[]);
        assert_eq!(summary.arrivals, 0);
        assert_eq!(summary.due_in, None);
        assert_eq!(summary.next_due_in, None);
        assert_eq!(summary.due_in_label(), "-");
    }

    #[test]
    fn test_format_departure_handles_loader_layouts() {
        assert_eq!(format_departure("09:05:00"), "09:05");
        assert_eq!(format_departure("1970-01-01 17:45:30.000000"), "17:45");
    }
}
