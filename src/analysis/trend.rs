//! Trend estimation and synthesized hourly context.
//!
//! The slope is an ordinary least-squares fit of index against series
//! position (`x = 0..n-1`), in units of AQI change per series step — per
//! hour when the series is hourly. It is the linear basis for the
//! short-horizon forecast, nothing more.

use chrono::{DateTime, Duration, Timelike, Utc};

use crate::model::HistoricalPoint;

// ---------------------------------------------------------------------------
// Least-squares slope
// ---------------------------------------------------------------------------

/// OLS slope over a time-ordered AQI series.
///
/// `slope = (n·Σxy − Σx·Σy) / (n·Σx² − (Σx)²)`
///
/// Returns 0.0 for fewer than two points, and guards the degenerate
/// zero-denominator case (unreachable with `x = 0..n-1`, but cheap to keep
/// the function total).
pub fn slope(series: &[f64]) -> f64 {
    let n = series.len();
    if n < 2 {
        return 0.0;
    }

    let n_f = n as f64;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_x_sq = 0.0;

    for (i, y) in series.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_x_sq += x * x;
    }

    let denominator = n_f * sum_x_sq - sum_x * sum_x;
    if denominator == 0.0 {
        return 0.0;
    }
    (n_f * sum_xy - sum_x * sum_y) / denominator
}

/// Convenience for integer history points.
pub fn slope_of_history(history: &[HistoricalPoint]) -> f64 {
    let values: Vec<f64> = history.iter().map(|p| p.aqi as f64).collect();
    slope(&values)
}

// ---------------------------------------------------------------------------
// Synthesized diurnal context
// ---------------------------------------------------------------------------

/// Hour-indexed scaling of the current index into a plausible recent
/// history. Overnight hours run above 1.0 (thermal inversion traps
/// emissions), midday hours below (convective mixing disperses them). The
/// table is fixed so the synthesized series is fully reproducible.
const DIURNAL_FACTOR: [f64; 24] = [
    1.08, 1.10, 1.12, 1.13, 1.14, 1.12, 1.08, 1.04, // 00-07 overnight peak
    1.00, 0.97, 0.93, 0.89, 0.85, 0.83, 0.82, 0.83, // 08-15 midday trough
    0.86, 0.90, 0.95, 1.00, 1.03, 1.05, 1.06, 1.07, // 16-23 evening build-up
];

/// Synthesizes the last 24 hours of context from the current index, oldest
/// first, ending at `now`. Used as the trend/forecast basis when no real
/// history is available. Deterministic: identical `(current_aqi, now)`
/// inputs produce identical series.
pub fn historical_context_at(current_aqi: i32, now: DateTime<Utc>) -> Vec<HistoricalPoint> {
    (0..24)
        .rev()
        .map(|hours_ago| {
            let timestamp = now - Duration::hours(hours_ago);
            let hour = timestamp.hour();
            let aqi = ((current_aqi as f64) * DIURNAL_FACTOR[hour as usize]).round() as i32;
            HistoricalPoint {
                timestamp,
                hour,
                aqi: aqi.max(1),
            }
        })
        .collect()
}

/// Convenience wrapper over the real clock. Use `historical_context_at` in
/// tests to keep them deterministic.
pub fn historical_context(current_aqi: i32) -> Vec<HistoricalPoint> {
    historical_context_at(current_aqi, Utc::now())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
