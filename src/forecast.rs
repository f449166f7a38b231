//! Short-horizon forecasting with quantized memoization.
//!
//! The forecasting collaborator may be an external generative model or the
//! local linear projector; either way it sits behind `ForecastProvider` and
//! is treated as unreliable. Every call path lands on the deterministic
//! linear fallback when the collaborator errors, tagged with a lower
//! confidence so consumers can tell the difference.
//!
//! Results are memoized under a quantized `(aqi, slope)` key — the index
//! rounds to the nearest 5, the slope to one decimal — so small input
//! jitter between refreshes reuses a recent result instead of re-invoking
//! the collaborator. Entries expire after 15 minutes.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use crate::analysis::intelligence::risk_level;
use crate::logging::{self, DataSource};
use crate::model::{AqiPrediction, ForecastError};

/// Projection horizons, hours.
pub const HORIZONS: [u32; 3] = [24, 48, 72];

/// Confidence tag on collaborator-produced projections.
pub const PROVIDER_CONFIDENCE: f64 = 0.85;
/// Confidence tag on the local linear fallback.
pub const FALLBACK_CONFIDENCE: f64 = 0.60;

// ---------------------------------------------------------------------------
// Collaborator seam
// ---------------------------------------------------------------------------

/// Forecasting collaborator interface. Implementations must produce one
/// projection per entry in [`HORIZONS`], in order.
pub trait ForecastProvider: Send + Sync {
    fn project(
        &self,
        current_aqi: i32,
        slope: f64,
    ) -> impl Future<Output = Result<Vec<AqiPrediction>, ForecastError>> + Send;
}

/// The local deterministic projector: straight-line extrapolation of the
/// trend slope, floored at zero.
pub struct LinearProjector;

impl ForecastProvider for LinearProjector {
    async fn project(&self, current_aqi: i32, slope: f64) -> Result<Vec<AqiPrediction>, ForecastError> {
        Ok(linear_projection(current_aqi, slope, PROVIDER_CONFIDENCE))
    }
}

/// `predicted = max(0, round(aqi + slope·hours))` at each horizon, with the
/// risk classification derived from the same bins as the live reading.
pub fn linear_projection(current_aqi: i32, slope: f64, confidence: f64) -> Vec<AqiPrediction> {
    HORIZONS
        .iter()
        .map(|&hours| {
            let projected = (current_aqi as f64 + slope * hours as f64).round().max(0.0) as i32;
            AqiPrediction {
                horizon_hours: hours,
                aqi: projected,
                risk: risk_level(projected),
                confidence,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Memoizing service
// ---------------------------------------------------------------------------

struct CacheEntry {
    predictions: Vec<AqiPrediction>,
    written_at: DateTime<Utc>,
}

/// TTL-bounded memoization wrapping a forecasting collaborator.
pub struct ForecastService<P: ForecastProvider> {
    provider: P,
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl<P: ForecastProvider> ForecastService<P> {
    pub fn new(provider: P, ttl_minutes: i64) -> Self {
        ForecastService {
            provider,
            ttl: Duration::minutes(ttl_minutes),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Both inputs round to coarse buckets before key construction so
    /// adjacent readings share a cache line.
    fn cache_key(current_aqi: i32, slope: f64) -> String {
        let aqi_bucket = ((current_aqi as f64 / 5.0).round() as i64) * 5;
        let slope_bucket = (slope * 10.0).round() / 10.0;
        format!("{}|{:.1}", aqi_bucket, slope_bucket)
    }

    /// Returns the three-horizon forecast, from cache when fresh, from the
    /// collaborator on a miss, and from the linear fallback when the
    /// collaborator fails. Never errors.
    pub async fn predict_at(&self, current_aqi: i32, slope: f64, now: DateTime<Utc>) -> Vec<AqiPrediction> {
        let key = Self::cache_key(current_aqi, slope);

        if let Some(entry) = self.entries.lock().unwrap().get(&key) {
            if now - entry.written_at < self.ttl {
                return entry.predictions.clone();
            }
        }

        let predictions = match self.provider.project(current_aqi, slope).await {
            Ok(predictions) if predictions.len() == HORIZONS.len() => predictions,
            Ok(short) => {
                logging::warn(
                    DataSource::Forecast,
                    None,
                    &format!("collaborator returned {} horizons, expected {}", short.len(), HORIZONS.len()),
                );
                linear_projection(current_aqi, slope, FALLBACK_CONFIDENCE)
            }
            Err(e) => {
                logging::log_telemetry_failure(DataSource::Forecast, "projection", &e);
                linear_projection(current_aqi, slope, FALLBACK_CONFIDENCE)
            }
        };

        self.entries.lock().unwrap().insert(
            key,
            CacheEntry {
                predictions: predictions.clone(),
                written_at: now,
            },
        );
        predictions
    }

    /// Convenience wrapper over the real clock.
    pub async fn predict(&self, current_aqi: i32, slope: f64) -> Vec<AqiPrediction> {
        self.predict_at(current_aqi, slope, Utc::now()).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
