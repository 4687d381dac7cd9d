//! The periodic update cycle.
//!
//! One pass queries the schedule, fetches both realtime feeds concurrently,
//! merges, and publishes the result as an immutable snapshot on a watch
//! channel, so readers always see either the previous complete snapshot or
//! the new one. Triggers arriving inside the debounce window reuse the latest
//! snapshot instead of queueing another pass.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info};

use crate::config::Config;
use crate::departures::find_departures;
use crate::fetch::{BasicClient, auth::ApiKey};
use crate::merge::{Boards, merge};
use crate::realtime::{fetch_trip_updates, fetch_vehicle_positions};
use crate::schedule::ScheduleStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedStatus {
    /// Trip updates were applied this cycle
    Live,
    /// The trip-update fetch failed; boards are schedule-only
    Degraded,
}

/// One complete, immutable result of an update cycle.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub boards: Boards,
    pub generated_at: DateTime<Utc>,
    pub feed_status: FeedStatus,
    /// Set when this cycle could not produce fresh data and an earlier
    /// result is being re-served
    pub stale: bool,
}

impl Snapshot {
    fn seed() -> Self {
        Snapshot {
            boards: Boards::new(),
            generated_at: Utc::now(),
            feed_status: FeedStatus::Degraded,
            stale: true,
        }
    }
}

/// Builds the authenticated HTTP client the feed fetches go through.
pub fn feed_client(config: &Config) -> ApiKey<BasicClient> {
    ApiKey::new(
        BasicClient::with_timeout(Duration::from_secs(config.request_timeout_secs)),
        config.api_key_header.clone(),
        config.api_key(),
    )
}

pub struct PollingController {
    config: Arc<Config>,
    client: ApiKey<BasicClient>,
    min_refresh: Duration,
    last_refresh: Mutex<Option<Instant>>,
    tx: watch::Sender<Arc<Snapshot>>,
}

impl PollingController {
    pub fn new(config: Config) -> Self {
        let client = feed_client(&config);
        let (tx, _rx) = watch::channel(Arc::new(Snapshot::seed()));
        Self {
            min_refresh: Duration::from_secs(config.min_refresh_secs),
            config: Arc::new(config),
            client,
            last_refresh: Mutex::new(None),
            tx,
        }
    }

    /// A receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.tx.subscribe()
    }

    /// The most recently published snapshot.
    pub fn latest(&self) -> Arc<Snapshot> {
        self.tx.borrow().clone()
    }

    /// Runs one update cycle, unless one finished less than the debounce
    /// interval ago, in which case the existing snapshot is returned
    /// untouched.
    /// Concurrent callers serialize on the debounce lock, so overlapping
    /// triggers collapse into a single pass.
    pub async fn refresh(&self) -> Arc<Snapshot> {
        let mut last = self.last_refresh.lock().await;
        if let Some(at) = *last {
            if at.elapsed() < self.min_refresh {
                debug!("Refresh triggered inside debounce window, reusing snapshot");
                return self.latest();
            }
        }

        let snapshot = Arc::new(self.run_cycle().await);
        *last = Some(Instant::now());
        self.tx.send_replace(snapshot.clone());
        snapshot
    }

    /// Refreshes on the configured poll interval, forever.
    pub async fn run(&self) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.poll_interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.refresh().await;
        }
    }

    async fn run_cycle(&self) -> Snapshot {
        // Static schedule pass first; without it there is nothing to merge
        // onto, so a storage failure re-serves the previous snapshot as stale.
        let config = self.config.clone();
        let departures = tokio::task::spawn_blocking(move || {
            let store = ScheduleStore::open(&config.schedule_db)?;
            find_departures(
                &store,
                &config.selectors(),
                config.arrivals_limit,
                Local::now().naive_local(),
            )
        })
        .await;

        let departures = match departures {
            Ok(Ok(departures)) => departures,
            Ok(Err(e)) => {
                error!(error = %e, "Schedule query failed, re-serving previous snapshot");
                return self.stale_snapshot();
            }
            Err(e) => {
                error!(error = %e, "Schedule query task failed, re-serving previous snapshot");
                return self.stale_snapshot();
            }
        };

        // The two feeds are independent; fetch them concurrently and merge
        // once both have settled.
        let trip_updates = fetch_trip_updates(&self.client, &self.config.trip_update_url);
        let vehicle_positions = async {
            match &self.config.vehicle_position_url {
                Some(url) => fetch_vehicle_positions(&self.client, url).await,
                None => Ok(HashMap::new()),
            }
        };
        let (trip_updates, vehicle_positions) = tokio::join!(trip_updates, vehicle_positions);

        let (trip_updates, feed_status) = match trip_updates {
            Ok(updates) => (updates, FeedStatus::Live),
            Err(e) => {
                error!(error = %e, "Trip update fetch failed, serving schedule-only boards");
                (HashMap::new(), FeedStatus::Degraded)
            }
        };
        let vehicle_positions = vehicle_positions.unwrap_or_else(|e| {
            error!(error = %e, "Vehicle position fetch failed, continuing without positions");
            HashMap::new()
        });

        let boards = merge(departures, &trip_updates, &vehicle_positions);
        info!(
            routes = boards.len(),
            trip_updates = trip_updates.len(),
            vehicles = vehicle_positions.len(),
            status = ?feed_status,
            "Update cycle complete"
        );

        Snapshot {
            boards,
            generated_at: Utc::now(),
            feed_status,
            stale: false,
        }
    }

    fn stale_snapshot(&self) -> Snapshot {
        let previous = self.latest();
        Snapshot {
            boards: previous.boards.clone(),
            generated_at: previous.generated_at,
            feed_status: previous.feed_status,
            stale: true,
        }
    }
}
