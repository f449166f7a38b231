//! The live aggregation pipeline.
//!
//! `AqiPipeline` owns the two cache slots, the latest station snapshot, and
//! the background refresh timer, with explicit `start()`/`stop()` lifecycle
//! methods so independent instances (tests, embedded consumers) never
//! interfere through ambient state.
//!
//! `fetch_city_aqi` is the pipeline's outward contract: it always resolves
//! with a plausible, positive reading. The resolution chain runs strictly in
//! order, first success wins:
//!
//! 1. fresh live cache entry
//! 2. bounds aggregation — maximum across valid stations (the city index is
//!    driven by its worst monitored point, matching regulatory reporting
//!    conventions; a mean would mask local severity)
//! 3. single-point city feed
//! 4. durable last-known-good value
//! 5. constant failsafe default (a stale cached reading is preferred to
//!    the constant when the durable slot is unusable)
//!
//! Two concurrent invocations (manual refresh racing the timer) can
//! interleave their cache writes; last-writer-wins is a documented tolerance
//! since both derive from the same upstream truth at nearly the same time.

use chrono::{DateTime, Local, Timelike, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::analysis::intelligence::derive_intelligence;
use crate::analysis::interpolate::{self, WardEstimate};
use crate::analysis::trend;
use crate::cache::{KvStore, ResilientCache};
use crate::config::{DEFAULT_DOMINANT_POLLUTANT, ServiceConfig};
use crate::ingest::TelemetrySource;
use crate::logging::{self, DataSource};
use crate::model::{HistoricalPoint, LiveAqiData, Station};

/// How the current reading was obtained. Exposed for logging and for the
/// consumer's "offline mode" label; never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    CacheHit,
    BoundsAggregation,
    CityFeed,
    DurableFailsafe,
    /// A live entry past its TTL, served only when the durable slot is
    /// also unusable. A stale reading beats the hard constant.
    StaleCache,
    ConstantDefault,
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolution::CacheHit => write!(f, "cache hit"),
            Resolution::BoundsAggregation => write!(f, "bounds aggregation"),
            Resolution::CityFeed => write!(f, "city feed"),
            Resolution::DurableFailsafe => write!(f, "durable failsafe"),
            Resolution::StaleCache => write!(f, "stale cache entry"),
            Resolution::ConstantDefault => write!(f, "constant default"),
        }
    }
}

pub struct AqiPipeline<T: TelemetrySource, S: KvStore> {
    source: T,
    cache: ResilientCache<S>,
    config: ServiceConfig,
    /// Latest successfully aggregated station set, retained between
    /// refreshes for ward interpolation and provenance queries.
    stations: RwLock<Vec<Station>>,
    refresh_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl<T: TelemetrySource, S: KvStore> AqiPipeline<T, S> {
    pub fn new(source: T, store: S, config: ServiceConfig) -> Self {
        let cache = ResilientCache::new(store, config.live_ttl_minutes);
        AqiPipeline {
            source,
            cache,
            config,
            stations: RwLock::new(Vec::new()),
            refresh_task: std::sync::Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Outward interface
    // -----------------------------------------------------------------------

    /// Resolves the authoritative city reading. Total: never errors, never
    /// returns a non-positive index.
    pub async fn fetch_city_aqi(&self) -> LiveAqiData {
        let local_hour = Local::now().hour();
        self.fetch_city_aqi_at(Utc::now(), local_hour).await.0
    }

    /// Clock-injected resolution, returning the reading together with how it
    /// was obtained. Tests drive the full failure space through this.
    pub async fn fetch_city_aqi_at(&self, now: DateTime<Utc>, local_hour: u32) -> (LiveAqiData, Resolution) {
        // Step 1: fresh cache entry short-circuits the network entirely.
        if let Some(data) = self.cache.read_live(now) {
            return (data, Resolution::CacheHit);
        }

        let (aqi, dominant_pollutant, city_name, resolution) = self.resolve_raw(now).await;

        // Trend baseline is read before the durable slot is overwritten.
        let previous = self.cache.last_valid();
        let intelligence = derive_intelligence(aqi, previous, local_hour);

        let data = LiveAqiData {
            aqi,
            status: intelligence.risk_level,
            dominant_pollutant,
            city_name,
            observed_at: now,
            intelligence,
        };

        // Two persistent writes per resolution; zero on the cache-hit path.
        self.cache.write_last_valid(aqi);
        self.cache.write_live(&data, now);

        logging::info(
            DataSource::System,
            None,
            &format!("resolved city AQI {} via {}", aqi, resolution),
        );
        (data, resolution)
    }

    /// Interpolates a sub-region estimate from the latest station snapshot.
    pub async fn interpolate_ward_aqi(&self, centroid: (f64, f64)) -> WardEstimate {
        let stations = self.stations.read().await;
        interpolate::interpolate(centroid, &stations)
    }

    /// The latest station snapshot (empty before the first successful
    /// bounds aggregation).
    pub async fn station_snapshot(&self) -> Vec<Station> {
        self.stations.read().await.clone()
    }

    /// Synthesized hourly context for the current index; the trend/forecast
    /// basis when no real history exists.
    pub fn historical_context(&self, current_aqi: i32) -> Vec<HistoricalPoint> {
        trend::historical_context(current_aqi)
    }

    /// OLS slope over an AQI series, in index units per step.
    pub fn calculate_trend_slope(&self, history: &[f64]) -> f64 {
        trend::slope(history)
    }

    // -----------------------------------------------------------------------
    // Resolution chain
    // -----------------------------------------------------------------------

    /// Steps 2–5 of the chain. Infallible by construction: every branch
    /// ends in a positive index.
    async fn resolve_raw(&self, _now: DateTime<Utc>) -> (i32, String, String, Resolution) {
        // Step 2: bounds aggregation.
        match self.source.bounded_stations(&self.config.bounds).await {
            Ok(stations) => {
                // Maximum across valid stations; coercion upstream
                // guarantees every entry is positive.
                if let Some(max_aqi) = stations.iter().map(|s| s.aqi).max() {
                    *self.stations.write().await = stations;
                    return (
                        max_aqi,
                        DEFAULT_DOMINANT_POLLUTANT.to_string(),
                        self.config.city_name.clone(),
                        Resolution::BoundsAggregation,
                    );
                }
            }
            Err(e) => logging::log_telemetry_failure(DataSource::Waqi, "bounds aggregation", &e),
        }

        // Step 3: single-point feed fallback.
        match self.source.city_feed().await {
            Ok(feed) if feed.aqi > 0 => {
                return (feed.aqi, feed.dominant_pollutant, feed.city_name, Resolution::CityFeed);
            }
            Ok(_) => logging::warn(DataSource::Feed, None, "feed resolved a non-positive index"),
            Err(e) => logging::log_telemetry_failure(DataSource::Feed, "city feed", &e),
        }

        // Step 4: durable last-known-good.
        if let Some(aqi) = self.cache.last_valid() {
            logging::warn(
                DataSource::System,
                None,
                &format!("all network paths failed, serving durable value {}", aqi),
            );
            return (
                aqi,
                DEFAULT_DOMINANT_POLLUTANT.to_string(),
                self.config.city_name.clone(),
                Resolution::DurableFailsafe,
            );
        }

        // A stale live entry from a previous session still beats the
        // constant: it was a real measurement once.
        if let Some(stale) = self.cache.read_live_any_age() {
            if stale.aqi > 0 {
                logging::warn(
                    DataSource::System,
                    None,
                    &format!("serving stale cached reading {} from {}", stale.aqi, stale.observed_at),
                );
                return (stale.aqi, stale.dominant_pollutant, stale.city_name, Resolution::StaleCache);
            }
        }

        // Step 5: constant default.
        logging::error(
            DataSource::System,
            None,
            &format!("no durable value either, serving constant default {}", self.config.fallback_aqi),
        );
        (
            self.config.fallback_aqi,
            DEFAULT_DOMINANT_POLLUTANT.to_string(),
            self.config.city_name.clone(),
            Resolution::ConstantDefault,
        )
    }

    // -----------------------------------------------------------------------
    // Refresh timer lifecycle
    // -----------------------------------------------------------------------

    /// Starts the background refresh timer. Idempotent: a second call
    /// replaces (and cancels) the previous timer. The handle is aborted by
    /// `stop()` so a torn-down consumer never leaks the task.
    pub fn start(self: &Arc<Self>)
    where
        T: 'static,
        S: 'static,
    {
        let pipeline = Arc::clone(self);
        let interval_secs = self.config.refresh_interval_secs;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            // The immediate first tick is skipped; callers run their own
            // initial fetch before starting the timer.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let data = pipeline.fetch_city_aqi().await;
                logging::debug(
                    DataSource::System,
                    None,
                    &format!("timer refresh: AQI {} ({})", data.aqi, data.status),
                );
            }
        });

        if let Some(previous) = self.refresh_task.lock().unwrap().replace(handle) {
            previous.abort();
        }
    }

    /// Cancels the refresh timer. Safe to call when no timer is running.
    pub fn stop(&self) {
        if let Some(handle) = self.refresh_task.lock().unwrap().take() {
            handle.abort();
        }
    }
}

impl<T: TelemetrySource, S: KvStore> Drop for AqiPipeline<T, S> {
    fn drop(&mut self) {
        self.stop();
    }
}
