//! Inverse-distance-weighted ward estimation.
//!
//! A ward's index is never independently measured; it is always derived from
//! the current station snapshot and the ward's geographic centroid. Distance
//! is planar Euclidean in degree space rather than geodesic — acceptable at
//! city scale, where the error against haversine is well under the sensor
//! noise floor.

use crate::model::Station;

/// Prevents division by zero when a station coincides with the centroid.
const EPSILON: f64 = 1e-4;

/// Estimate reported when no stations are available. The sentinel source
/// label tells consumers the value is a placeholder, not a measurement.
pub const DEFAULT_ESTIMATE_AQI: i32 = 150;
pub const NO_COVERAGE_LABEL: &str = "no station coverage";

/// An interpolated sub-region estimate with provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct WardEstimate {
    pub aqi: i32,
    /// Name of the geographically nearest station, reported for provenance.
    /// Independent of the weighting computation.
    pub nearest_station: String,
}

/// Interpolates a centroid's index from the station set.
///
/// Weight of station *i* is `1 / (d_i² + ε)`; the estimate is the weighted
/// average rounded to the nearest integer. An empty station set yields the
/// fixed default with the sentinel label — never an error.
pub fn interpolate(centroid: (f64, f64), stations: &[Station]) -> WardEstimate {
    if stations.is_empty() {
        return WardEstimate {
            aqi: DEFAULT_ESTIMATE_AQI,
            nearest_station: NO_COVERAGE_LABEL.to_string(),
        };
    }

    let (lat, lon) = centroid;
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    let mut nearest: (&Station, f64) = (&stations[0], f64::INFINITY);

    for station in stations {
        let d_lat = station.latitude - lat;
        let d_lon = station.longitude - lon;
        let dist_sq = d_lat * d_lat + d_lon * d_lon;

        let weight = 1.0 / (dist_sq + EPSILON);
        weighted_sum += weight * station.aqi as f64;
        weight_total += weight;

        if dist_sq < nearest.1 {
            nearest = (station, dist_sq);
        }
    }

    WardEstimate {
        aqi: (weighted_sum / weight_total).round() as i32,
        nearest_station: nearest.0.station_name.clone(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
