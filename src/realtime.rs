//! Trip delays and vehicle positions from the GTFS-realtime feeds.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::FeedError;
use crate::fetch::{HttpClient, fetch_bytes};
use crate::gtfs_rt::FeedMessage;
use crate::parser::parse_feed;

/// Realtime state for one trip: the accumulated delay and the vehicle the
/// feed associated with the trip, both taken from the trip's own
/// trip-update entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TripUpdate {
    pub delay_seconds: i64,
    pub vehicle_id: Option<String>,
}

pub type TripUpdates = HashMap<String, TripUpdate>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VehicleLocation {
    pub latitude: f32,
    pub longitude: f32,
}

pub type VehiclePositions = HashMap<String, VehicleLocation>;

/// Fetches and decodes the trip-update feed into per-trip realtime state.
///
/// Any failure yields an error and no data; the caller decides whether to
/// degrade. A trip the feed does not mention simply has no entry, which the
/// merge stage reads as zero delay and unknown position.
pub async fn fetch_trip_updates<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
) -> Result<TripUpdates, FeedError> {
    let bytes = fetch_bytes(client, url).await?;
    let feed = parse_feed(&bytes)?;
    Ok(collect_trip_updates(&feed))
}

/// Fetches and decodes the vehicle-position feed into a vehicle id → position
/// map. Vehicles without an assigned route are out of service and excluded.
pub async fn fetch_vehicle_positions<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
) -> Result<VehiclePositions, FeedError> {
    let bytes = fetch_bytes(client, url).await?;
    let feed = parse_feed(&bytes)?;
    Ok(collect_vehicle_positions(&feed))
}

/// Sums each trip's `arrival.delay` across its stop-time updates and records
/// the vehicle descriptor carried by the same entity.
pub fn collect_trip_updates(feed: &FeedMessage) -> TripUpdates {
    let mut updates = TripUpdates::new();

    for entity in &feed.entity {
        let Some(trip_update) = &entity.trip_update else {
            continue;
        };
        let Some(trip_id) = trip_update.trip.trip_id.as_deref() else {
            continue;
        };
        if trip_id.is_empty() {
            continue;
        }

        let delay: i64 = trip_update
            .stop_time_update
            .iter()
            .filter_map(|stu| stu.arrival.as_ref())
            .filter_map(|arrival| arrival.delay)
            .map(i64::from)
            .sum();

        let entry = updates.entry(trip_id.to_string()).or_default();
        entry.delay_seconds += delay;
        if entry.vehicle_id.is_none() {
            entry.vehicle_id = trip_update
                .vehicle
                .as_ref()
                .and_then(|v| v.id.clone())
                .filter(|id| !id.is_empty());
        }
    }

    updates
}

pub fn collect_vehicle_positions(feed: &FeedMessage) -> VehiclePositions {
    let mut positions = VehiclePositions::new();

    for entity in &feed.entity {
        let Some(vehicle) = &entity.vehicle else {
            continue;
        };

        // No route assigned means the vehicle is not in service
        let in_service = vehicle
            .trip
            .as_ref()
            .and_then(|t| t.route_id.as_deref())
            .is_some_and(|route| !route.is_empty());
        if !in_service {
            continue;
        }

        let Some(id) = vehicle.vehicle.as_ref().and_then(|v| v.id.clone()) else {
            continue;
        };
        let Some(position) = &vehicle.position else {
            continue;
        };

        positions.insert(
            id,
            VehicleLocation {
                latitude: position.latitude,
                longitude: position.longitude,
            },
        );
    }

    positions
}
