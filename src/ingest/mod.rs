/// Upstream telemetry ingestion.
///
/// The pipeline talks to the upstream through the `TelemetrySource` trait so
/// tests can script every failure mode without a network. Production uses
/// `waqi::WaqiClient` against aqicn.org.

use std::future::Future;

use crate::config::BoundingBox;
use crate::model::{CityFeed, Station, TelemetryError};

pub mod waqi;

/// Read-only view of the upstream telemetry API.
///
/// Both methods surface every transport, HTTP, and shape problem as a
/// `TelemetryError`; the pipeline converts those into fallback transitions
/// rather than propagating them.
pub trait TelemetrySource: Send + Sync {
    /// All valid stations inside the bounding box. Stations that fail
    /// coercion (non-numeric or non-positive index) are filtered out before
    /// this returns; an entirely invalid payload is `NoValidStations`.
    fn bounded_stations(
        &self,
        bounds: &BoundingBox,
    ) -> impl Future<Output = Result<Vec<Station>, TelemetryError>> + Send;

    /// The single-point aggregate city feed.
    fn city_feed(&self) -> impl Future<Output = Result<CityFeed, TelemetryError>> + Send;
}

/// Shared-ownership sources work anywhere an owned source does; tests use
/// this to keep a handle on the source they hand to the pipeline.
impl<T: TelemetrySource> TelemetrySource for std::sync::Arc<T> {
    fn bounded_stations(
        &self,
        bounds: &BoundingBox,
    ) -> impl Future<Output = Result<Vec<Station>, TelemetryError>> + Send {
        (**self).bounded_stations(bounds)
    }

    fn city_feed(&self) -> impl Future<Output = Result<CityFeed, TelemetryError>> + Send {
        (**self).city_feed()
    }
}
