//! Rule-based intelligence derivation.
//!
//! `derive_intelligence` is a pure, total, deterministic function of
//! `(current AQI, previous durable AQI, local hour of day)` — identical
//! inputs always produce identical output, which is what makes the result
//! cacheable by AQI bucket and testable without fixtures.
//!
//! The diurnal prediction is a heuristic, not a measurement: pollutant
//! accumulation runs higher overnight under thermal inversion and lower at
//! midday under convective mixing. It is a coarse proxy for the Indo-Gangetic
//! winter pattern, not a physical model.
//!
//! All thresholds live in [`Thresholds`] as named constants so the rule
//! table can be tested and tuned independently of the derivation code.

use crate::model::{
    ExposureLimit, GrapStage, IntelligentAnalysis, Prediction, Recommendation, RiskLevel, Trend,
};

// ---------------------------------------------------------------------------
// Rule thresholds
// ---------------------------------------------------------------------------

/// The complete rule table. Defaults match CPCB breakpoints and the GRAP
/// schedule; a deployment targeting another region can supply its own.
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    /// Trend dead band: |delta| must exceed this to leave `Stable`.
    pub trend_dead_band: i32,
    /// Local hours treated as the overnight accumulation band (inclusive).
    pub night_band: (u32, u32), // wraps midnight: (start, end) as (22, 9)
    /// Local hours treated as the midday mixing band (inclusive).
    pub midday_band: (u32, u32),
    /// Exposure tier lower bounds, exclusive, descending.
    pub exposure_severe: i32,  // > 300: no outdoor exposure
    pub exposure_high: i32,    // > 200: 15 min
    pub exposure_elevated: i32, // > 150: 30 min
    pub exposure_moderate: i32, // > 100: 60 min
    /// GRAP stage lower bounds, inclusive, descending.
    pub grap_stage4: i32, // >= 450
    pub grap_stage3: i32, // >= 401
    pub grap_stage2: i32, // >= 301
    pub grap_stage1: i32, // >= 201
    /// Risk tier lower bounds, exclusive, descending.
    pub risk_hazardous: i32, // > 450
    pub risk_severe: i32,    // > 400
    pub risk_very_poor: i32, // > 300
    pub risk_poor: i32,      // > 200
    pub risk_moderate: i32,  // > 100
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            trend_dead_band: 5,
            night_band: (22, 9),
            midday_band: (12, 17),
            exposure_severe: 300,
            exposure_high: 200,
            exposure_elevated: 150,
            exposure_moderate: 100,
            grap_stage4: 450,
            grap_stage3: 401,
            grap_stage2: 301,
            grap_stage1: 201,
            risk_hazardous: 450,
            risk_severe: 400,
            risk_very_poor: 300,
            risk_poor: 200,
            risk_moderate: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// Risk classification
// ---------------------------------------------------------------------------

/// Maps an index to its risk tier with the default thresholds. Ordered,
/// non-overlapping bins; exclusive on the lower bound of each bin.
pub fn risk_level(aqi: i32) -> RiskLevel {
    risk_level_with(aqi, &Thresholds::default())
}

pub fn risk_level_with(aqi: i32, t: &Thresholds) -> RiskLevel {
    if aqi > t.risk_hazardous {
        RiskLevel::Hazardous
    } else if aqi > t.risk_severe {
        RiskLevel::Severe
    } else if aqi > t.risk_very_poor {
        RiskLevel::VeryPoor
    } else if aqi > t.risk_poor {
        RiskLevel::Poor
    } else if aqi > t.risk_moderate {
        RiskLevel::Moderate
    } else {
        RiskLevel::Good
    }
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Derives the full decision-support structure with default thresholds.
///
/// `previous_valid` is the durable last-known index; `None` when the service
/// has never resolved a reading. `hour_of_day` is the consumer's local hour,
/// 0–23 (values above 23 are clamped into range).
pub fn derive_intelligence(aqi: i32, previous_valid: Option<i32>, hour_of_day: u32) -> IntelligentAnalysis {
    derive_intelligence_with(aqi, previous_valid, hour_of_day, &Thresholds::default())
}

pub fn derive_intelligence_with(
    aqi: i32,
    previous_valid: Option<i32>,
    hour_of_day: u32,
    t: &Thresholds,
) -> IntelligentAnalysis {
    let hour = hour_of_day.min(23);
    let trend = derive_trend(aqi, previous_valid, t);

    IntelligentAnalysis {
        risk_level: risk_level_with(aqi, t),
        trend,
        exposure: exposure_limit(aqi, t),
        sensitive_group_warning: sensitive_group_warning(aqi, t).to_string(),
        recommendation: recommendation(aqi, t),
        prediction: derive_prediction(trend, hour, t),
        grap: grap_stage(aqi, t),
    }
}

fn derive_trend(aqi: i32, previous_valid: Option<i32>, t: &Thresholds) -> Trend {
    match previous_valid {
        None => Trend::Stable,
        Some(previous) => {
            let delta = aqi - previous;
            if delta > t.trend_dead_band {
                Trend::Worsening
            } else if delta < -t.trend_dead_band {
                Trend::Improving
            } else {
                Trend::Stable
            }
        }
    }
}

fn derive_prediction(trend: Trend, hour: u32, t: &Thresholds) -> Prediction {
    let (night_start, night_end) = t.night_band;
    let (midday_start, midday_end) = t.midday_band;
    // Night band wraps midnight: 22:00 through 09:00.
    let in_night = hour >= night_start || hour <= night_end;
    let in_midday = hour >= midday_start && hour <= midday_end;

    if in_night && trend != Trend::Improving {
        Prediction::Increasing
    } else if in_midday {
        Prediction::Decreasing
    } else {
        Prediction::Stable
    }
}

/// First matching bin wins, highest threshold first.
fn exposure_limit(aqi: i32, t: &Thresholds) -> ExposureLimit {
    if aqi > t.exposure_severe {
        ExposureLimit::Minutes(0)
    } else if aqi > t.exposure_high {
        ExposureLimit::Minutes(15)
    } else if aqi > t.exposure_elevated {
        ExposureLimit::Minutes(30)
    } else if aqi > t.exposure_moderate {
        ExposureLimit::Minutes(60)
    } else {
        ExposureLimit::Unlimited
    }
}

fn sensitive_group_warning(aqi: i32, t: &Thresholds) -> &'static str {
    if aqi > t.exposure_severe {
        "Emergency conditions: children, elderly, and anyone with cardiac or \
         respiratory illness must remain indoors with filtration running."
    } else if aqi > t.exposure_high {
        "Sensitive groups should stay indoors; everyone else should cut \
         outdoor time sharply."
    } else if aqi > t.exposure_elevated {
        "People with asthma or heart conditions should keep reliever \
         medication at hand and limit outdoor time."
    } else if aqi > t.exposure_moderate {
        "Unusually sensitive individuals may notice irritation during \
         extended outdoor activity."
    } else {
        "No restrictions for sensitive groups."
    }
}

fn recommendation(aqi: i32, t: &Thresholds) -> Recommendation {
    let (mask, activity, school) = if aqi > t.exposure_severe {
        (
            "N95/N99 mask mandatory for any outdoor exposure",
            "Avoid all outdoor exertion",
            "Remote learning recommended",
        )
    } else if aqi > t.exposure_high {
        (
            "N95 mask recommended outdoors",
            "No outdoor exercise",
            "Suspend outdoor sports",
        )
    } else if aqi > t.exposure_elevated {
        (
            "Mask recommended for prolonged exposure",
            "Reduce intensity of outdoor activity",
            "Limit outdoor recess",
        )
    } else if aqi > t.exposure_moderate {
        (
            "Mask optional for sensitive groups",
            "Take breaks during sustained outdoor activity",
            "School open; monitor sensitive children",
        )
    } else {
        ("No mask needed", "Normal outdoor activity", "School open")
    };

    Recommendation {
        mask: mask.to_string(),
        activity: activity.to_string(),
        school: school.to_string(),
    }
}

/// Ordered, non-overlapping, exhaustive: every integer index maps to exactly
/// one stage. Labels and action sets are the fixed GRAP schedule, not
/// derived.
fn grap_stage(aqi: i32, t: &Thresholds) -> GrapStage {
    let (stage, label, description) = if aqi >= t.grap_stage4 {
        (
            4,
            "Stage IV — Severe+",
            "Truck entry halted except essentials, public construction \
             suspended, schools shift to remote learning, odd-even vehicle \
             rationing under consideration.",
        )
    } else if aqi >= t.grap_stage3 {
        (
            3,
            "Stage III — Severe",
            "Ban on private construction and demolition, restrictions on \
             BS-III petrol and BS-IV diesel vehicles, primary schools may \
             close.",
        )
    } else if aqi >= t.grap_stage2 {
        (
            2,
            "Stage II — Very Poor",
            "Diesel generator sets banned, parking fees raised, bus and \
             metro frequency increased, dust hotspots watered daily.",
        )
    } else if aqi >= t.grap_stage1 {
        (
            1,
            "Stage I — Poor",
            "Mechanised road sweeping, dust control enforced at construction \
             sites, open waste burning penalised.",
        )
    } else {
        (
            0,
            "Stage 0 — No Action",
            "Air quality within acceptable limits; no graded response \
             measures in force.",
        )
    };

    GrapStage {
        stage,
        label: label.to_string(),
        description: description.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
