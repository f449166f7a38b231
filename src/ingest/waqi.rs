/// World Air Quality Index (aqicn.org) API client.
///
/// Two read-only JSON endpoints, both keyed by an API token:
///
/// - `/map/bounds/` — station records within a bounding box. The per-station
///   `aqi` field arrives as a *string* ("287", or "-" for offline stations)
///   and must be coerced at this boundary.
/// - `/feed/here/` (or `/feed/<city>/`) — one aggregate reading with the
///   dominant pollutant and city name.
///
/// Non-"ok" application status and malformed bodies are returned as errors
/// for the pipeline's fallback chain to absorb; nothing here retries.
///
/// API documentation: https://aqicn.org/json-api/doc/

use serde::Deserialize;
use std::time::Duration;

use crate::config::BoundingBox;
use crate::ingest::TelemetrySource;
use crate::model::{CityFeed, Station, TelemetryError};

const WAQI_BASE_URL: &str = "https://api.waqi.info";

/// Token used when none is configured; the upstream serves a limited demo
/// quota for it.
const DEMO_TOKEN: &str = "demo";

// ============================================================================
// WAQI API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct BoundsResponse {
    status: String,
    #[serde(default)]
    data: Vec<BoundsStation>,
}

/// One raw station record from the bounds endpoint. Loosely typed on
/// purpose; coercion into `model::Station` happens in `coerce_station`.
#[derive(Debug, Deserialize)]
struct BoundsStation {
    uid: i64,
    lat: f64,
    lon: f64,
    /// String-encoded index; "-" when the station is offline.
    aqi: String,
    #[serde(default)]
    station: Option<BoundsStationMeta>,
}

#[derive(Debug, Deserialize)]
struct BoundsStationMeta {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeedResponse {
    status: String,
    data: Option<FeedData>,
}

#[derive(Debug, Deserialize)]
struct FeedData {
    aqi: serde_json::Value, // number in practice, "-" when unavailable
    #[serde(default)]
    dominentpol: Option<String>, // spelling is the upstream's, not ours
    #[serde(default)]
    city: Option<FeedCity>,
}

#[derive(Debug, Deserialize)]
struct FeedCity {
    #[serde(default)]
    name: Option<String>,
}

// ============================================================================
// Client
// ============================================================================

pub struct WaqiClient {
    client: reqwest::Client,
    token: String,
}

impl WaqiClient {
    /// Builds a client with a bounded request timeout so the fallback chain
    /// cannot stall on a dead upstream.
    pub fn new(token: Option<String>, timeout_secs: u64) -> Result<Self, TelemetryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(WaqiClient {
            client,
            token: token.unwrap_or_else(|| DEMO_TOKEN.to_string()),
        })
    }

    fn bounds_url(&self, bounds: &BoundingBox) -> String {
        format!(
            "{}/map/bounds/?latlng={},{},{},{}&token={}",
            WAQI_BASE_URL,
            bounds.lat_south,
            bounds.lon_west,
            bounds.lat_north,
            bounds.lon_east,
            self.token
        )
    }

    fn feed_url(&self, city: &str) -> String {
        format!("{}/feed/{}/?token={}", WAQI_BASE_URL, city, self.token)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, TelemetryError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TelemetryError::Http(status.as_u16()));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| TelemetryError::Parse(e.to_string()))
    }
}

impl TelemetrySource for WaqiClient {
    async fn bounded_stations(&self, bounds: &BoundingBox) -> Result<Vec<Station>, TelemetryError> {
        let response: BoundsResponse = self.get_json(&self.bounds_url(bounds)).await?;
        if response.status != "ok" {
            return Err(TelemetryError::BadStatus(response.status));
        }

        let stations: Vec<Station> = response.data.into_iter().filter_map(coerce_station).collect();
        if stations.is_empty() {
            return Err(TelemetryError::NoValidStations);
        }
        Ok(stations)
    }

    async fn city_feed(&self) -> Result<CityFeed, TelemetryError> {
        let response: FeedResponse = self.get_json(&self.feed_url("here")).await?;
        if response.status != "ok" {
            return Err(TelemetryError::BadStatus(response.status));
        }
        let data = response
            .data
            .ok_or_else(|| TelemetryError::Parse("feed response missing data".to_string()))?;
        coerce_feed(data)
    }
}

// ============================================================================
// Boundary coercion
// ============================================================================

/// Coerces one raw bounds record into the strict domain type, or drops it.
///
/// Rejection, not propagation: a record with a non-numeric or non-positive
/// index is filtered here so nothing loosely typed travels inward.
fn coerce_station(raw: BoundsStation) -> Option<Station> {
    let aqi: i32 = raw.aqi.trim().parse().ok()?;
    if aqi <= 0 {
        return None;
    }
    let station_name = raw
        .station
        .and_then(|s| s.name)
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| format!("station {}", raw.uid));

    Some(Station {
        id: raw.uid,
        latitude: raw.lat,
        longitude: raw.lon,
        aqi,
        station_name,
    })
}

fn coerce_feed(data: FeedData) -> Result<CityFeed, TelemetryError> {
    // The feed usually carries a number, but "-" shows up when the city
    // index is momentarily unavailable.
    let aqi = match &data.aqi {
        serde_json::Value::Number(n) => n.as_f64().map(|v| v.round() as i32),
        serde_json::Value::String(s) => s.trim().parse::<i32>().ok(),
        _ => None,
    };

    match aqi {
        Some(aqi) if aqi > 0 => Ok(CityFeed {
            aqi,
            dominant_pollutant: data
                .dominentpol
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| crate::config::DEFAULT_DOMINANT_POLLUTANT.to_string()),
            city_name: data
                .city
                .and_then(|c| c.name)
                .unwrap_or_else(|| "Unknown".to_string()),
        }),
        _ => Err(TelemetryError::InvalidReading),
    }
}

// ============================================================================
// Tests
// ============================================================================


// ---------------------------------------------------------------------------
// Integration Tests - Live API Verification
// ---------------------------------------------------------------------------
//
// These tests hit the real aqicn.org API and are marked #[ignore] so they
// don't run during normal CI builds. They verify the wire shapes above still
// match reality and provide early warning of API changes.
//
// To run manually (requires AQICN_API_TOKEN or demo quota):
//   cargo test -- --ignored live_api

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Don't run in CI - depends on external API
    async fn live_api_bounds_returns_delhi_stations() {
        let client = WaqiClient::new(crate::config::ServiceConfig::api_token(), 30).expect("client");
        let stations = client
            .bounded_stations(&crate::config::BoundingBox::delhi_ncr())
            .await
            .expect("bounds request should succeed");
        assert!(!stations.is_empty(), "Delhi box should contain stations");
        assert!(stations.iter().all(|s| s.aqi > 0));
    }

    #[tokio::test]
    #[ignore] // Don't run in CI - depends on external API
    async fn live_api_feed_returns_positive_index() {
        let client = WaqiClient::new(crate::config::ServiceConfig::api_token(), 30).expect("client");
        let feed = client.city_feed().await.expect("feed request should succeed");
        assert!(feed.aqi > 0);
        assert!(!feed.city_name.is_empty());
    }
}
