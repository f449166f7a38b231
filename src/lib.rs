//! Live air-quality aggregation and intelligence service for a
//! metropolitan region.
//!
//! The pipeline ingests station telemetry for the monitored bounding box,
//! reduces it to one authoritative city index, derives deterministic
//! decision-support intelligence from it, and interpolates per-ward
//! estimates from the raw station set. Its outward contract is strict:
//! every public entry point returns a best-effort, semantically valid
//! result — upstream outages degrade the answer's provenance, never its
//! shape.
//!
//! Module map:
//! - [`model`] — shared domain types and boundary errors
//! - [`config`] — TOML/env configuration
//! - [`ingest`] — upstream telemetry clients behind the `TelemetrySource` seam
//! - [`cache`] — two-tier resilient persistence over an injected KV store
//! - [`analysis`] — pure rule engine, IDW interpolation, trend estimation
//! - [`forecast`] — memoized forecasting with a deterministic fallback
//! - [`pipeline`] — the resolution chain and refresh timer
//! - [`wards`] — static ward registry and per-ward refresh

pub mod analysis;
pub mod cache;
pub mod config;
pub mod forecast;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod wards;

pub use model::{IntelligentAnalysis, LiveAqiData, RiskLevel, Station};
pub use pipeline::AqiPipeline;
