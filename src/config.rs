use std::time::Duration;

use anyhow::{Context, Result};
use tracing::warn;

use crate::geo::Coordinate;

/// Flight search radius for the table, in miles.
pub const PM_MILES: f64 = 50.0;
/// How often the page refreshes the table, in milliseconds.
pub const UPDATE_INTERVAL_MS: u64 = 5000;
/// London.
pub const DEFAULT_LOCATION: Coordinate = Coordinate { lat: 51.505, lon: -0.09 };
/// Alert when a plane is within this many miles.
pub const OVERHEAD_RADIUS: f64 = 4.0;

const IPSTACK_URL_DEFAULT: &str = "http://api.ipstack.com/check";
const OPENSKY_URL_DEFAULT: &str = "https://opensky-network.org/api/states/all";
const UPSTREAM_TIMEOUT_SECS_DEFAULT: u64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub ipstack_key: String,
    pub mapbox_key: String,
    pub ipstack_url: String,
    pub opensky_url: String,
    pub upstream_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = match env_optional("PORT") {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("Failed to parse PORT={} as u16", value))?,
            None => 3000,
        };
        let upstream_timeout = match env_optional("UPSTREAM_TIMEOUT_SECS") {
            Some(value) => Duration::from_secs(value.parse::<u64>().with_context(|| {
                format!("Failed to parse UPSTREAM_TIMEOUT_SECS={} as u64", value)
            })?),
            None => Duration::from_secs(UPSTREAM_TIMEOUT_SECS_DEFAULT),
        };

        let config = Self {
            host: env_string("HOST", "0.0.0.0"),
            port,
            ipstack_key: env_string("IPSTACK_KEY", ""),
            mapbox_key: env_string("MAPBOX_KEY", ""),
            ipstack_url: trim_base_url(&env_string("IPSTACK_URL", IPSTACK_URL_DEFAULT)),
            opensky_url: trim_base_url(&env_string("OPENSKY_URL", OPENSKY_URL_DEFAULT)),
            upstream_timeout,
        };
        for name in config.missing_credentials() {
            warn!("{} is not set", name);
        }
        Ok(config)
    }

    /// Credential variables left empty. Without `IPSTACK_KEY` every IP lookup
    /// falls back to the default location; without `MAPBOX_KEY` the map has no tiles.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.ipstack_key.is_empty() {
            missing.push("IPSTACK_KEY");
        }
        if self.mapbox_key.is_empty() {
            missing.push("MAPBOX_KEY");
        }
        missing
    }
}

fn trim_base_url(value: &str) -> String {
    value.trim().trim_end_matches('/').to_string()
}

fn env_optional(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_string(name: &str, default: &str) -> String {
    env_optional(name).unwrap_or_else(|| default.to_string())
}
