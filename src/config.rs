//! Runtime configuration.
//!
//! Loaded from a JSON file; the API key may instead come from the
//! `GTFS_API_KEY` environment variable (populated from `.env` by the binary).
//!
//! ```json
//! {
//!   "trip_update_url": "https://api.example/gtfsr?format=pb",
//!   "vehicle_position_url": "https://api.example/gtfsr/vehicles?format=pb",
//!   "api_key": "...",
//!   "schedule_db": "gtfs/schedule.sqlite",
//!   "departures": [
//!     { "name": "Home stop", "stop_name": "Main St", "route": "145", "operator": "OP1" }
//!   ]
//! }
//! ```

use std::path::PathBuf;

use serde::Deserialize;

use crate::departures::Selector;

pub const API_KEY_ENV: &str = "GTFS_API_KEY";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub trip_update_url: String,
    /// Optional; without it arrivals simply carry no vehicle positions
    pub vehicle_position_url: Option<String>,
    /// Falls back to the `GTFS_API_KEY` environment variable
    pub api_key: Option<String>,
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,
    /// SQLite database produced by the external schedule loader
    pub schedule_db: PathBuf,
    #[serde(default = "default_arrivals_limit")]
    pub arrivals_limit: usize,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Update cycles triggered closer together than this reuse the previous
    /// snapshot instead of running again
    #[serde(default = "default_min_refresh_secs")]
    pub min_refresh_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    pub departures: Vec<SelectorConfig>,
}

/// One configured departure subscription. The core consumes `stop_name`,
/// `route`, and `operator`; the remaining fields are passed through to
/// whatever presents the boards.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
    pub name: Option<String>,
    pub stop_name: String,
    pub stop_id: Option<String>,
    pub route: String,
    pub operator: String,
    pub direction: Option<String>,
    pub icon: Option<String>,
    pub service_type: Option<String>,
}

fn default_api_key_header() -> String {
    "x-api-key".to_string()
}

fn default_arrivals_limit() -> usize {
    30
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_min_refresh_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Loads and validates the config file at `path`.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = serde_json::from_str(&content)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var(API_KEY_ENV).ok();
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.trip_update_url.parse::<reqwest::Url>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "trip_update_url {:?} is not a valid url",
                self.trip_update_url
            )));
        }
        if let Some(url) = &self.vehicle_position_url {
            if url.parse::<reqwest::Url>().is_err() {
                return Err(ConfigError::Invalid(format!(
                    "vehicle_position_url {url:?} is not a valid url"
                )));
            }
        }
        if self.api_key.as_deref().is_none_or(str::is_empty) {
            return Err(ConfigError::Invalid(format!(
                "api_key missing from config and {API_KEY_ENV} unset"
            )));
        }
        if self.departures.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one departure selector is required".to_string(),
            ));
        }
        Ok(())
    }

    /// The (stop, route, operator) tuples the finder works from.
    pub fn selectors(&self) -> Vec<Selector> {
        self.departures
            .iter()
            .map(|d| Selector {
                stop_name: d.stop_name.clone(),
                route: d.route.clone(),
                operator: d.operator.clone(),
            })
            .collect()
    }

    /// The key that was configured or resolved from the environment.
    /// `validate` has already guaranteed presence.
    pub fn api_key(&self) -> &str {
        self.api_key.as_deref().unwrap_or_default()
    }
}
