/// Core data types for the metropolitan air-quality service.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains the wire-adjacent types (`Station`, `CityFeed`), the resolved
/// reading handed to consumers (`LiveAqiData`), the derived intelligence
/// structures, and the boundary error types. Validation logic lives at the
/// ingestion boundary (`ingest::waqi`), not here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Station & feed types
// ---------------------------------------------------------------------------

/// A single validated monitoring station reading.
///
/// Ephemeral: re-fetched each aggregation cycle, never persisted. By the time
/// a `Station` exists its `aqi` has already passed boundary coercion and is
/// guaranteed positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub aqi: i32,
    pub station_name: String,
}

/// The single-point aggregate feed for the city, used when bounds
/// aggregation yields nothing usable.
#[derive(Debug, Clone, PartialEq)]
pub struct CityFeed {
    pub aqi: i32,
    pub dominant_pollutant: String,
    pub city_name: String,
}

// ---------------------------------------------------------------------------
// Resolved reading
// ---------------------------------------------------------------------------

/// The authoritative city-level reading returned to consumers.
///
/// Invariant: `aqi` is always a positive integer. The pipeline never emits
/// zero, negative, or non-numeric values — every failure path resolves to a
/// plausible reading instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveAqiData {
    pub aqi: i32,
    pub status: RiskLevel,
    pub dominant_pollutant: String,
    pub city_name: String,
    pub observed_at: DateTime<Utc>,
    pub intelligence: IntelligentAnalysis,
}

/// Risk tiers, in ascending order of severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Good,
    Moderate,
    Poor,
    VeryPoor,
    Severe,
    Hazardous,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Good => write!(f, "Good"),
            RiskLevel::Moderate => write!(f, "Moderate"),
            RiskLevel::Poor => write!(f, "Poor"),
            RiskLevel::VeryPoor => write!(f, "Very Poor"),
            RiskLevel::Severe => write!(f, "Severe"),
            RiskLevel::Hazardous => write!(f, "Hazardous"),
        }
    }
}

// ---------------------------------------------------------------------------
// Derived intelligence
// ---------------------------------------------------------------------------

/// Short-term trend relative to the durable last-known value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Worsening,
    Stable,
}

/// Diurnal-heuristic prediction of where the index is headed over the next
/// few hours. A coarse proxy, not a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Prediction {
    Increasing,
    Stable,
    Decreasing,
}

/// Recommended continuous outdoor exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureLimit {
    Minutes(u32),
    Unlimited,
}

impl std::fmt::Display for ExposureLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExposureLimit::Minutes(m) => write!(f, "{} min", m),
            ExposureLimit::Unlimited => write!(f, "Unlimited"),
        }
    }
}

/// Behavioral guidance attached to an exposure tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub mask: String,
    pub activity: String,
    pub school: String,
}

/// Graded Response Action Plan stage. Stage 0 means no graded measures are
/// in force; stages 1–4 carry fixed regulatory labels and action sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrapStage {
    pub stage: u8,
    pub label: String,
    pub description: String,
}

/// Structured decision-support output, a pure function of
/// `(current AQI, previous durable AQI, local hour of day)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntelligentAnalysis {
    pub risk_level: RiskLevel,
    pub trend: Trend,
    pub exposure: ExposureLimit,
    pub sensitive_group_warning: String,
    pub recommendation: Recommendation,
    pub prediction: Prediction,
    pub grap: GrapStage,
}

// ---------------------------------------------------------------------------
// Forecast & history types
// ---------------------------------------------------------------------------

/// A single fixed-horizon projection of the city index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AqiPrediction {
    pub horizon_hours: u32,
    pub aqi: i32,
    pub risk: RiskLevel,
    /// 0.0–1.0; collaborator results carry a higher value than the local
    /// linear fallback.
    pub confidence: f64,
}

/// One point of (real or synthesized) hourly history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPoint {
    pub timestamp: DateTime<Utc>,
    pub hour: u32,
    pub aqi: i32,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise when fetching or parsing upstream telemetry.
///
/// None of these propagate past the pipeline boundary; they drive the
/// fallback chain and are logged.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Non-2xx HTTP response.
    #[error("HTTP error: {0}")]
    Http(u16),
    /// Body arrived but was not the expected shape.
    #[error("parse error: {0}")]
    Parse(String),
    /// The API answered with a non-"ok" application status.
    #[error("upstream status: {0}")]
    BadStatus(String),
    /// Every station in the bounding box failed validation.
    #[error("no valid stations in bounds")]
    NoValidStations,
    /// The feed reported a non-positive or non-numeric index.
    #[error("feed returned an invalid reading")]
    InvalidReading,
}

/// Errors from the forecasting collaborator. Always recovered locally.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("forecast collaborator unavailable: {0}")]
    Unavailable(String),
    #[error("forecast payload could not be parsed: {0}")]
    Malformed(String),
}
