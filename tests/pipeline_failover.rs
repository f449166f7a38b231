/// Integration tests for the resolution chain's failure space.
///
/// These tests verify the pipeline's outward contract: `fetch_city_aqi`
/// always resolves with a positive index, no matter which combination of
/// upstream paths is down. The upstream is a scripted mock behind the
/// `TelemetrySource` seam and the store is in-memory, so every failure mode
/// runs deterministically without a network.
///
/// Run with: cargo test --test pipeline_failover

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use aqmon_service::cache::{KvStore, LAST_VALID_KEY, LIVE_KEY, MemoryStore};
use aqmon_service::config::{DEFAULT_FALLBACK_AQI, ServiceConfig};
use aqmon_service::ingest::TelemetrySource;
use aqmon_service::model::{CityFeed, Station, TelemetryError, Trend};
use aqmon_service::pipeline::{AqiPipeline, Resolution};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

/// A fixed "now": 2026-01-15 09:00:00 UTC. Local hour is passed separately,
/// so tests pin both.
fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap()
}

fn station(name: &str, lat: f64, lon: f64, aqi: i32) -> Station {
    Station {
        id: 1,
        latitude: lat,
        longitude: lon,
        aqi,
        station_name: name.to_string(),
    }
}

fn delhi_stations() -> Vec<Station> {
    vec![
        station("Anand Vihar, Delhi", 28.6508, 77.3152, 412),
        station("R.K. Puram, Delhi", 28.5632, 77.1820, 188),
        station("ITO, Delhi", 28.6289, 77.2410, 241),
    ]
}

fn feed(aqi: i32) -> CityFeed {
    CityFeed {
        aqi,
        dominant_pollutant: "pm10".to_string(),
        city_name: "New Delhi".to_string(),
    }
}

/// Scripted upstream: each call pops the next outcome; an exhausted script
/// keeps failing, which models a persistent outage.
#[derive(Default)]
struct ScriptedSource {
    bounds_script: Mutex<VecDeque<Result<Vec<Station>, TelemetryError>>>,
    feed_script: Mutex<VecDeque<Result<CityFeed, TelemetryError>>>,
    bounds_calls: Mutex<u32>,
    feed_calls: Mutex<u32>,
}

impl ScriptedSource {
    fn new() -> Self {
        ScriptedSource::default()
    }

    fn push_bounds(&self, outcome: Result<Vec<Station>, TelemetryError>) {
        self.bounds_script.lock().unwrap().push_back(outcome);
    }

    fn push_feed(&self, outcome: Result<CityFeed, TelemetryError>) {
        self.feed_script.lock().unwrap().push_back(outcome);
    }

    fn bounds_calls(&self) -> u32 {
        *self.bounds_calls.lock().unwrap()
    }

    fn feed_calls(&self) -> u32 {
        *self.feed_calls.lock().unwrap()
    }
}

impl TelemetrySource for ScriptedSource {
    async fn bounded_stations(
        &self,
        _bounds: &aqmon_service::config::BoundingBox,
    ) -> Result<Vec<Station>, TelemetryError> {
        *self.bounds_calls.lock().unwrap() += 1;
        self.bounds_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(TelemetryError::NoValidStations))
    }

    async fn city_feed(&self) -> Result<CityFeed, TelemetryError> {
        *self.feed_calls.lock().unwrap() += 1;
        self.feed_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(TelemetryError::InvalidReading))
    }
}

struct Harness {
    source: Arc<ScriptedSource>,
    store: Arc<MemoryStore>,
    pipeline: AqiPipeline<Arc<ScriptedSource>, Arc<MemoryStore>>,
}

fn harness() -> Harness {
    let source = Arc::new(ScriptedSource::new());
    let store = Arc::new(MemoryStore::new());
    let pipeline = AqiPipeline::new(Arc::clone(&source), Arc::clone(&store), ServiceConfig::default());
    Harness { source, store, pipeline }
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_bounds_aggregation_takes_worst_station() {
    let h = harness();
    h.source.push_bounds(Ok(delhi_stations()));

    let (data, resolution) = h.pipeline.fetch_city_aqi_at(fixed_now(), 12).await;

    assert_eq!(resolution, Resolution::BoundsAggregation);
    // City index is the maximum across valid stations, not a mean.
    assert_eq!(data.aqi, 412);
    assert_eq!(data.city_name, "Delhi");
    assert_eq!(h.source.feed_calls(), 0, "feed fallback should not fire");
}

#[tokio::test]
async fn test_successful_resolution_persists_both_slots() {
    let h = harness();
    h.source.push_bounds(Ok(delhi_stations()));

    h.pipeline.fetch_city_aqi_at(fixed_now(), 12).await;

    assert!(h.store.get(LIVE_KEY).is_some(), "live slot should be written");
    assert_eq!(h.store.get(LAST_VALID_KEY), Some(Value::from(412)));
}

#[tokio::test]
async fn test_snapshot_retained_for_ward_interpolation() {
    let h = harness();
    h.source.push_bounds(Ok(delhi_stations()));
    h.pipeline.fetch_city_aqi_at(fixed_now(), 12).await;

    assert_eq!(h.pipeline.station_snapshot().await.len(), 3);

    // Centroid on top of R.K. Puram pulls hard toward its reading.
    let estimate = h.pipeline.interpolate_ward_aqi((28.5632, 77.1820)).await;
    assert_eq!(estimate.nearest_station, "R.K. Puram, Delhi");
    assert!((185..=195).contains(&estimate.aqi), "got {}", estimate.aqi);
}

// ---------------------------------------------------------------------------
// Cache behavior
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_fresh_cache_hit_skips_network_entirely() {
    let h = harness();
    h.source.push_bounds(Ok(delhi_stations()));

    let (first, _) = h.pipeline.fetch_city_aqi_at(fixed_now(), 12).await;
    let (second, resolution) = h.pipeline
        .fetch_city_aqi_at(fixed_now() + Duration::minutes(9), 12)
        .await;

    assert_eq!(resolution, Resolution::CacheHit);
    assert_eq!(second, first, "cached reading must be returned unchanged");
    assert_eq!(h.source.bounds_calls(), 1);
}

#[tokio::test]
async fn test_expired_cache_forces_refetch() {
    let h = harness();
    h.source.push_bounds(Ok(delhi_stations()));
    h.source.push_bounds(Ok(vec![station("ITO, Delhi", 28.6289, 77.2410, 199)]));

    h.pipeline.fetch_city_aqi_at(fixed_now(), 12).await;
    let (data, resolution) = h.pipeline
        .fetch_city_aqi_at(fixed_now() + Duration::minutes(10), 12)
        .await;

    assert_eq!(resolution, Resolution::BoundsAggregation);
    assert_eq!(data.aqi, 199);
    assert_eq!(h.source.bounds_calls(), 2);
}

#[tokio::test]
async fn test_corrupt_live_slot_is_treated_as_miss() {
    let h = harness();
    h.store.set(LIVE_KEY, Value::from("garbage from a previous version"));
    h.source.push_bounds(Ok(delhi_stations()));

    let (data, resolution) = h.pipeline.fetch_city_aqi_at(fixed_now(), 12).await;
    assert_eq!(resolution, Resolution::BoundsAggregation);
    assert_eq!(data.aqi, 412);
}

// ---------------------------------------------------------------------------
// Fallback chain
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_empty_bounds_falls_back_to_city_feed() {
    let h = harness();
    h.source.push_bounds(Err(TelemetryError::NoValidStations));
    h.source.push_feed(Ok(feed(305)));

    let (data, resolution) = h.pipeline.fetch_city_aqi_at(fixed_now(), 12).await;

    assert_eq!(resolution, Resolution::CityFeed);
    assert_eq!(data.aqi, 305);
    // The feed path carries its own pollutant and city name.
    assert_eq!(data.dominant_pollutant, "pm10");
    assert_eq!(data.city_name, "New Delhi");
}

#[tokio::test]
async fn test_feed_success_still_updates_durable_slot() {
    let h = harness();
    h.source.push_bounds(Err(TelemetryError::Http(502)));
    h.source.push_feed(Ok(feed(305)));

    h.pipeline.fetch_city_aqi_at(fixed_now(), 12).await;
    assert_eq!(h.store.get(LAST_VALID_KEY), Some(Value::from(305)));
}

#[tokio::test]
async fn test_all_network_paths_down_serves_durable_value() {
    let h = harness();
    // First cycle resolves normally and seeds the durable slot.
    h.source.push_bounds(Ok(delhi_stations()));
    h.pipeline.fetch_city_aqi_at(fixed_now(), 12).await;

    // Second cycle, past the TTL, with both network paths dead.
    let (data, resolution) = h.pipeline
        .fetch_city_aqi_at(fixed_now() + Duration::minutes(20), 12)
        .await;

    assert_eq!(resolution, Resolution::DurableFailsafe);
    assert_eq!(data.aqi, 412);
}

#[tokio::test]
async fn test_cold_start_with_nothing_serves_constant_default() {
    let h = harness();
    // No scripts, no store: deepest failsafe.
    let (data, resolution) = h.pipeline.fetch_city_aqi_at(fixed_now(), 12).await;

    assert_eq!(resolution, Resolution::ConstantDefault);
    assert_eq!(data.aqi, DEFAULT_FALLBACK_AQI);
    assert!(data.aqi > 0);
}

#[tokio::test]
async fn test_stale_cache_beats_constant_when_durable_is_unusable() {
    let h = harness();
    // A previous session resolved 312 hours ago; the durable slot was
    // clobbered by something unparseable in the meantime.
    h.source.push_bounds(Ok(vec![station("ITO, Delhi", 28.6289, 77.2410, 312)]));
    h.pipeline.fetch_city_aqi_at(fixed_now() - Duration::hours(8), 12).await;
    h.store.set(LAST_VALID_KEY, Value::from("ruined"));

    let (data, resolution) = h.pipeline.fetch_city_aqi_at(fixed_now(), 12).await;

    assert_eq!(resolution, Resolution::StaleCache);
    assert_eq!(data.aqi, 312);
}

#[tokio::test]
async fn test_constant_default_seeds_durable_slot_for_next_cycle() {
    let h = harness();
    h.pipeline.fetch_city_aqi_at(fixed_now(), 12).await;
    assert_eq!(h.store.get(LAST_VALID_KEY), Some(Value::from(DEFAULT_FALLBACK_AQI)));
}

// ---------------------------------------------------------------------------
// Total-function property over the failure space
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_never_emits_non_positive_aqi_under_any_failure_combination() {
    let bounds_modes = ["ok", "http", "parse", "empty", "status"];
    let feed_modes = ["ok", "http", "invalid", "status"];
    let store_modes = ["empty", "seeded", "corrupt"];

    for bounds_mode in bounds_modes {
        for feed_mode in feed_modes {
            for store_mode in store_modes {
                let h = harness();

                match store_mode {
                    "seeded" => h.store.set(LAST_VALID_KEY, Value::from(233)),
                    "corrupt" => h.store.set(LAST_VALID_KEY, Value::from("ruined")),
                    _ => {}
                }
                h.source.push_bounds(match bounds_mode {
                    "ok" => Ok(delhi_stations()),
                    "http" => Err(TelemetryError::Http(503)),
                    "parse" => Err(TelemetryError::Parse("truncated body".to_string())),
                    "empty" => Err(TelemetryError::NoValidStations),
                    _ => Err(TelemetryError::BadStatus("error".to_string())),
                });
                h.source.push_feed(match feed_mode {
                    "ok" => Ok(feed(150)),
                    "http" => Err(TelemetryError::Http(429)),
                    "invalid" => Err(TelemetryError::InvalidReading),
                    _ => Err(TelemetryError::BadStatus("nug".to_string())),
                });

                let (data, _) = h.pipeline.fetch_city_aqi_at(fixed_now(), 3).await;
                assert!(
                    data.aqi > 0,
                    "non-positive AQI {} for bounds={}, feed={}, store={}",
                    data.aqi,
                    bounds_mode,
                    feed_mode,
                    store_mode
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Trend across cycles
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_trend_is_derived_against_previous_durable_value() {
    let h = harness();
    h.source.push_bounds(Ok(vec![station("ITO, Delhi", 28.6289, 77.2410, 300)]));
    h.source.push_bounds(Ok(vec![station("ITO, Delhi", 28.6289, 77.2410, 350)]));

    let (first, _) = h.pipeline.fetch_city_aqi_at(fixed_now(), 12).await;
    assert_eq!(first.intelligence.trend, Trend::Stable, "no baseline on first cycle");

    let (second, _) = h.pipeline
        .fetch_city_aqi_at(fixed_now() + Duration::minutes(15), 12)
        .await;
    assert_eq!(second.intelligence.trend, Trend::Worsening);
}

#[tokio::test]
async fn test_durable_failsafe_reading_reports_stable_trend() {
    // The durable value serves as both the reading and the baseline, so the
    // delta is zero by construction.
    let h = harness();
    h.store.set(LAST_VALID_KEY, Value::from(260));

    let (data, resolution) = h.pipeline.fetch_city_aqi_at(fixed_now(), 12).await;
    assert_eq!(resolution, Resolution::DurableFailsafe);
    assert_eq!(data.intelligence.trend, Trend::Stable);
}

// ---------------------------------------------------------------------------
// Timer lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_stop_cancels_the_refresh_timer() {
    let h = harness();
    h.source.push_bounds(Ok(delhi_stations()));

    let pipeline = Arc::new(h.pipeline);
    pipeline.start();
    pipeline.stop();

    // With the timer cancelled, no background fetch fires even after the
    // interval would have elapsed.
    let calls_before = h.source.bounds_calls();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(h.source.bounds_calls(), calls_before);
}
