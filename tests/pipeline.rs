//! End-to-end pipeline tests: static schedule query, encoded realtime feed,
//! and the merge into arrival boards.

use chrono::NaiveDateTime;
use prost::Message;
use rusqlite::Connection;

use gtfs_rt_board::departures::{Selector, find_departures};
use gtfs_rt_board::gtfs_rt::trip_update::{StopTimeEvent, StopTimeUpdate};
use gtfs_rt_board::gtfs_rt::{
    FeedEntity, FeedHeader, FeedMessage, Position, TripDescriptor, TripUpdate, VehicleDescriptor,
    VehiclePosition,
};
use gtfs_rt_board::merge::{BoardSummary, board_for, merge};
use gtfs_rt_board::parser::parse_feed;
use gtfs_rt_board::realtime::{collect_trip_updates, collect_vehicle_positions};
use gtfs_rt_board::schedule::ScheduleStore;

/// Stop "Main St" served by trip T1 on route "145" (operator "OP1"),
/// departing 09:00; weekday service active for all of 2026.
fn schedule_conn() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE stops (stop_id TEXT, stop_name TEXT);
         CREATE TABLE routes (route_id TEXT, route_short_name TEXT, agency_id TEXT);
         CREATE TABLE trips (trip_id TEXT, route_id TEXT, service_id TEXT);
         CREATE TABLE stop_times (trip_id TEXT, stop_id TEXT,
                                  arrival_time TEXT, departure_time TEXT);
         CREATE TABLE calendar (service_id TEXT,
                                monday INTEGER, tuesday INTEGER, wednesday INTEGER,
                                thursday INTEGER, friday INTEGER,
                                saturday INTEGER, sunday INTEGER,
                                start_date TEXT, end_date TEXT);
         CREATE TABLE calendar_dates (service_id TEXT, date TEXT, exception_type INTEGER);

         INSERT INTO stops VALUES ('S1', 'Main St');
         INSERT INTO routes VALUES ('R1', '145', 'OP1');
         INSERT INTO trips VALUES ('T1', 'R1', 'WEEKDAY');
         INSERT INTO stop_times VALUES ('T1', 'S1', '08:59:30', '09:00:00');
         INSERT INTO calendar VALUES ('WEEKDAY', 1, 1, 1, 1, 1, 0, 0,
                                      '2026-01-01', '2026-12-31');",
    )
    .unwrap();
    conn
}

fn schedule() -> ScheduleStore {
    ScheduleStore::from_connection(schedule_conn())
}

fn selector() -> Selector {
    Selector {
        stop_name: "Main St".into(),
        route: "145".into(),
        operator: "OP1".into(),
    }
}

/// A feed reporting a 120 s arrival delay for T1, worked by vehicle bus-7,
/// which is in service on route R1 at a known position.
fn realtime_feed() -> FeedMessage {
    FeedMessage {
        header: FeedHeader {
            gtfs_realtime_version: "2.0".to_string(),
            incrementality: None,
            timestamp: Some(1234567890),
        },
        entity: vec![
            FeedEntity {
                id: "e1".to_string(),
                trip_update: Some(TripUpdate {
                    trip: TripDescriptor {
                        trip_id: Some("T1".to_string()),
                        ..Default::default()
                    },
                    vehicle: Some(VehicleDescriptor {
                        id: Some("bus-7".to_string()),
                        ..Default::default()
                    }),
                    stop_time_update: vec![StopTimeUpdate {
                        arrival: Some(StopTimeEvent {
                            delay: Some(120),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
                ..Default::default()
            },
            FeedEntity {
                id: "e2".to_string(),
                vehicle: Some(VehiclePosition {
                    trip: Some(TripDescriptor {
                        route_id: Some("R1".to_string()),
                        ..Default::default()
                    }),
                    vehicle: Some(VehicleDescriptor {
                        id: Some("bus-7".to_string()),
                        ..Default::default()
                    }),
                    position: Some(Position {
                        latitude: 53.35,
                        longitude: -6.26,
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
        ],
    }
}

// Monday 2026-03-02, ten minutes before the scheduled departure
fn monday_0850() -> NaiveDateTime {
    "2026-03-02T08:50:00".parse().unwrap()
}

#[test]
fn test_round_trip_delay_applied() {
    let store = schedule();
    let departures = find_departures(&store, &[selector()], 30, monday_0850()).unwrap();
    assert_eq!(departures.len(), 1);
    assert_eq!(departures[0].minutes_until, 10);

    // Encode and re-decode the feed, as the reader would off the wire
    let bytes = realtime_feed().encode_to_vec();
    let feed = parse_feed(&bytes).unwrap();
    let trip_updates = collect_trip_updates(&feed);
    let vehicle_positions = collect_vehicle_positions(&feed);

    let boards = merge(departures, &trip_updates, &vehicle_positions);
    let arrivals = board_for(&boards, "145", "Main St");

    assert_eq!(arrivals.len(), 1);
    assert_eq!(arrivals[0].minutes, 12);
    assert_eq!(arrivals[0].departure_time, "09:00");
    let position = arrivals[0].position.expect("position joined via bus-7");
    assert_eq!(position.latitude, 53.35);
    assert_eq!(position.longitude, -6.26);

    let summary = BoardSummary::of(arrivals);
    assert_eq!(summary.due_in, Some(12));
    assert_eq!(summary.next_due_in, None);
}

#[test]
fn test_inactive_weekday_yields_no_departures_regardless_of_feed() {
    let store = schedule();
    // Saturday 2026-03-07: the weekday flag is off
    let now: NaiveDateTime = "2026-03-07T08:50:00".parse().unwrap();
    let departures = find_departures(&store, &[selector()], 30, now).unwrap();
    assert!(departures.is_empty());

    let feed = realtime_feed();
    let boards = merge(
        departures,
        &collect_trip_updates(&feed),
        &collect_vehicle_positions(&feed),
    );
    assert!(board_for(&boards, "145", "Main St").is_empty());
}

#[test]
fn test_exception_date_suppresses_departure() {
    let conn = schedule_conn();
    conn.execute(
        "INSERT INTO calendar_dates VALUES ('WEEKDAY', '2026-03-02', 2)",
        [],
    )
    .unwrap();
    let store = ScheduleStore::from_connection(conn);

    let departures = find_departures(&store, &[selector()], 30, monday_0850()).unwrap();
    assert!(departures.is_empty());
}

#[test]
fn test_unknown_selector_does_not_disturb_others() {
    let store = schedule();
    let ghost = Selector {
        stop_name: "Main St".into(),
        route: "999".into(),
        operator: "NOPE".into(),
    };

    let departures = find_departures(&store, &[ghost, selector()], 30, monday_0850()).unwrap();
    assert_eq!(departures.len(), 1);
    assert_eq!(departures[0].trip_id, "T1");
}

#[test]
fn test_merge_idempotent_over_identical_inputs() {
    let store = schedule();
    let departures = find_departures(&store, &[selector()], 30, monday_0850()).unwrap();

    let feed = realtime_feed();
    let trip_updates = collect_trip_updates(&feed);
    let vehicle_positions = collect_vehicle_positions(&feed);

    let first = merge(departures.clone(), &trip_updates, &vehicle_positions);
    let second = merge(departures, &trip_updates, &vehicle_positions);

    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
}
