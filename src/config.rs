//! Service configuration.
//!
//! Settings come from two places, mirroring the rest of the deployment
//! tooling: an optional `aqmon.toml` file for tunables (region, TTLs,
//! refresh cadence) and the environment for the upstream API token
//! (`AQICN_API_TOKEN`, loaded via dotenv in `main`). A missing or malformed
//! config file falls back to the built-in Delhi NCR defaults — configuration
//! problems must never keep the service from starting.

use serde::Deserialize;

/// Environment variable holding the aqicn.org API token.
pub const TOKEN_ENV_VAR: &str = "AQICN_API_TOKEN";

/// Constant failsafe index used when the network, the feed, and the durable
/// store have all failed. Chosen as a typical Delhi winter severe-episode
/// value so downstream guidance errs toward caution.
pub const DEFAULT_FALLBACK_AQI: i32 = 285;

/// Dominant pollutant assumed for the bounds-aggregation path, which carries
/// no per-pollutant breakdown.
pub const DEFAULT_DOMINANT_POLLUTANT: &str = "pm25";

// ---------------------------------------------------------------------------
// Geographic bounds
// ---------------------------------------------------------------------------

/// A latitude/longitude bounding box for the monitored region.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BoundingBox {
    pub lat_south: f64,
    pub lon_west: f64,
    pub lat_north: f64,
    pub lon_east: f64,
}

impl BoundingBox {
    /// Delhi NCR monitoring extent.
    pub fn delhi_ncr() -> Self {
        BoundingBox {
            lat_south: 28.40,
            lon_west: 76.84,
            lat_north: 28.88,
            lon_east: 77.35,
        }
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.lat_south && lat <= self.lat_north && lon >= self.lon_west && lon <= self.lon_east
    }
}

// ---------------------------------------------------------------------------
// Service configuration
// ---------------------------------------------------------------------------

/// Tunables for the aggregation pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// City name reported when the bounds path resolves (the feed path
    /// reports its own name).
    pub city_name: String,
    /// Monitored region for bounds aggregation.
    pub bounds: BoundingBox,
    /// Live cache slot freshness window, minutes.
    pub live_ttl_minutes: i64,
    /// Forecast memoization window, minutes.
    pub forecast_ttl_minutes: i64,
    /// Background refresh cadence, seconds. Matches the live TTL so the
    /// timer never burns a network call a fresh cache would have absorbed.
    pub refresh_interval_secs: u64,
    /// Upstream request timeout, seconds. Keeps the fallback chain from
    /// stalling on a dead upstream.
    pub request_timeout_secs: u64,
    /// Failsafe index when every resolution layer has failed.
    pub fallback_aqi: i32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            city_name: "Delhi".to_string(),
            bounds: BoundingBox::delhi_ncr(),
            live_ttl_minutes: 10,
            forecast_ttl_minutes: 15,
            refresh_interval_secs: 600,
            request_timeout_secs: 8,
            fallback_aqi: DEFAULT_FALLBACK_AQI,
        }
    }
}

impl ServiceConfig {
    /// Loads configuration from a TOML file, falling back to defaults if the
    /// file is absent or fails to parse. Parse failures are reported on the
    /// service log rather than aborting startup.
    pub fn load(path: &str) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => match toml::from_str::<ServiceConfig>(&text) {
                Ok(config) => config,
                Err(e) => {
                    crate::logging::warn(
                        crate::logging::DataSource::System,
                        None,
                        &format!("config file {} failed to parse, using defaults: {}", path, e),
                    );
                    ServiceConfig::default()
                }
            },
            Err(_) => ServiceConfig::default(),
        }
    }

    /// Reads the upstream API token from the environment. Returns `None`
    /// when unset, in which case the client runs unauthenticated requests
    /// (the upstream accepts a limited demo quota).
    pub fn api_token() -> Option<String> {
        std::env::var(TOKEN_ENV_VAR).ok().filter(|t| !t.trim().is_empty())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_delhi_monitoring_extent() {
        let config = ServiceConfig::default();
        assert_eq!(config.city_name, "Delhi");
        // Connaught Place sits inside the default box.
        assert!(config.bounds.contains(28.6315, 77.2167));
        // Jaipur does not.
        assert!(!config.bounds.contains(26.9124, 75.7873));
    }

    #[test]
    fn test_refresh_interval_matches_live_ttl() {
        let config = ServiceConfig::default();
        assert_eq!(config.refresh_interval_secs, (config.live_ttl_minutes as u64) * 60);
    }

    #[test]
    fn test_partial_toml_fills_remaining_fields_from_defaults() {
        let parsed: ServiceConfig = toml::from_str("live_ttl_minutes = 5").expect("parse");
        assert_eq!(parsed.live_ttl_minutes, 5);
        assert_eq!(parsed.fallback_aqi, DEFAULT_FALLBACK_AQI);
        assert_eq!(parsed.city_name, "Delhi");
    }

    #[test]
    fn test_missing_config_file_yields_defaults() {
        let config = ServiceConfig::load("/nonexistent/aqmon.toml");
        assert_eq!(config.refresh_interval_secs, 600);
    }

    #[test]
    fn test_malformed_config_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("aqmon.toml");
        std::fs::write(&path, "live_ttl_minutes = \"ten\"").expect("write");
        let config = ServiceConfig::load(path.to_str().unwrap());
        assert_eq!(config.live_ttl_minutes, 10);
    }
}
