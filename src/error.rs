//! Error types for the schedule and realtime layers.
//!
//! Lookup misses are local conditions recovered by skipping the affected
//! selector or trip; only storage-wide and feed-wide failures reach the
//! update cycle.

/// Errors from the static schedule store and calendar validation.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// No stop row with the requested display name
    #[error("no stop named {0:?}")]
    StopNotFound(String),

    /// No route row matching both short name and operator
    #[error("no route {route:?} for operator {operator:?}")]
    RouteNotFound { route: String, operator: String },

    /// No calendar row for the service a trip belongs to
    #[error("no calendar entry for service {0:?}")]
    ServiceNotFound(String),

    /// A calendar date column that does not parse as a date
    #[error("malformed calendar date {0:?}")]
    BadDate(String),

    /// Underlying SQLite failure; fatal for the whole update cycle
    #[error("schedule database error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl ScheduleError {
    /// Lookup misses are recoverable by skipping; everything else is not.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ScheduleError::StopNotFound(_)
                | ScheduleError::RouteNotFound { .. }
                | ScheduleError::ServiceNotFound(_)
        )
    }
}

/// Errors fetching or decoding a GTFS-realtime feed.
///
/// Any of these leaves the consumer with an empty result set for that feed,
/// never a partially decoded one.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("feed url {0:?} is not a valid url")]
    BadUrl(String),

    #[error("feed request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success response; the body is discarded without being decoded
    #[error("feed returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("feed decode failed: {0}")]
    Decode(#[from] prost::DecodeError),
}
