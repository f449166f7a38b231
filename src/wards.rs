/// Ward registry for the Delhi NCR air-quality service.
///
/// Defines the canonical list of wards (sub-regions) the service reports
/// estimates for, along with their geometry and attribute seed data. This is
/// the single source of truth for ward centroids — all other modules should
/// reference wards from here rather than hardcoding coordinates.
///
/// A ward's AQI is never independently measured; it is always derived by the
/// spatial interpolator from the current station snapshot. Registry entries
/// are created at load time and refreshed (never deleted) for the life of a
/// session.

use crate::analysis::intelligence::risk_level;
use crate::analysis::interpolate;
use crate::model::{RiskLevel, Station};

// ---------------------------------------------------------------------------
// Ward metadata
// ---------------------------------------------------------------------------

/// Static geometry and attribute seed data for a single ward.
pub struct Ward {
    pub id: &'static str,
    pub name: &'static str,
    /// Administrative region of the city.
    pub region: &'static str,
    /// WGS84 centroid.
    pub latitude: f64,
    pub longitude: f64,
    /// Main local emission source, for display alongside the estimate.
    pub primary_source: &'static str,
    /// Pollutants typically elevated in this ward.
    pub pollutants: &'static [&'static str],
    /// Seed meteorology shown until a live weather feed replaces it.
    pub wind_speed_kmh: f64,
    pub humidity_pct: f64,
}

/// All wards the service reports on, ordered roughly north to south.
///
/// Centroids from the municipal ward atlas; primary sources from the
/// SAFAR emission inventory.
pub static WARD_REGISTRY: &[Ward] = &[
    Ward {
        id: "narela",
        name: "Narela",
        region: "North",
        latitude: 28.8527,
        longitude: 77.0920,
        primary_source: "Industrial clusters and biomass burning",
        pollutants: &["pm25", "pm10", "so2"],
        wind_speed_kmh: 8.0,
        humidity_pct: 52.0,
    },
    Ward {
        id: "rohini",
        name: "Rohini",
        region: "North-West",
        latitude: 28.7495,
        longitude: 77.0565,
        primary_source: "Vehicular traffic and construction dust",
        pollutants: &["pm25", "pm10"],
        wind_speed_kmh: 7.0,
        humidity_pct: 55.0,
    },
    Ward {
        id: "punjabi-bagh",
        name: "Punjabi Bagh",
        region: "West",
        latitude: 28.6748,
        longitude: 77.1310,
        primary_source: "Road traffic on Ring Road corridor",
        pollutants: &["pm25", "no2"],
        wind_speed_kmh: 6.5,
        humidity_pct: 58.0,
    },
    Ward {
        id: "anand-vihar",
        name: "Anand Vihar",
        region: "East",
        latitude: 28.6508,
        longitude: 77.3152,
        primary_source: "Interstate bus terminal and rail yard",
        pollutants: &["pm25", "pm10", "no2"],
        wind_speed_kmh: 5.5,
        humidity_pct: 60.0,
    },
    Ward {
        id: "ito",
        name: "ITO",
        region: "Central",
        latitude: 28.6289,
        longitude: 77.2410,
        primary_source: "Dense arterial traffic",
        pollutants: &["no2", "pm25", "co"],
        wind_speed_kmh: 6.0,
        humidity_pct: 57.0,
    },
    Ward {
        id: "dwarka",
        name: "Dwarka",
        region: "South-West",
        latitude: 28.5921,
        longitude: 77.0460,
        primary_source: "Airport corridor and construction dust",
        pollutants: &["pm10", "pm25"],
        wind_speed_kmh: 9.0,
        humidity_pct: 54.0,
    },
    Ward {
        id: "rk-puram",
        name: "R.K. Puram",
        region: "South",
        latitude: 28.5632,
        longitude: 77.1820,
        primary_source: "Vehicular traffic with green-cover buffering",
        pollutants: &["pm25", "o3"],
        wind_speed_kmh: 7.5,
        humidity_pct: 56.0,
    },
    Ward {
        id: "okhla",
        name: "Okhla Phase 2",
        region: "South-East",
        latitude: 28.5310,
        longitude: 77.2740,
        primary_source: "Waste-to-energy plant and industrial estate",
        pollutants: &["pm25", "so2", "pm10"],
        wind_speed_kmh: 5.0,
        humidity_pct: 61.0,
    },
];

/// Looks up a ward by id. Returns `None` if not found.
pub fn find_ward(id: &str) -> Option<&'static Ward> {
    WARD_REGISTRY.iter().find(|w| w.id == id)
}

// ---------------------------------------------------------------------------
// Refresh
// ---------------------------------------------------------------------------

/// A ward joined with its latest interpolated estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct WardStatus {
    pub id: &'static str,
    pub name: &'static str,
    pub region: &'static str,
    pub aqi: i32,
    pub status: RiskLevel,
    pub nearest_station: String,
    pub primary_source: &'static str,
}

/// Re-derives every ward's estimate from a station snapshot. With an empty
/// snapshot each ward carries the interpolator's sentinel default rather
/// than being dropped.
pub fn refresh_wards(stations: &[Station]) -> Vec<WardStatus> {
    WARD_REGISTRY
        .iter()
        .map(|ward| {
            let estimate = interpolate::interpolate((ward.latitude, ward.longitude), stations);
            WardStatus {
                id: ward.id,
                name: ward.name,
                region: ward.region,
                aqi: estimate.aqi,
                status: risk_level(estimate.aqi),
                nearest_station: estimate.nearest_station,
                primary_source: ward.primary_source,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BoundingBox;

    #[test]
    fn test_no_duplicate_ward_ids() {
        let mut seen = std::collections::HashSet::new();
        for ward in WARD_REGISTRY {
            assert!(seen.insert(ward.id), "duplicate ward id '{}' in WARD_REGISTRY", ward.id);
        }
    }

    #[test]
    fn test_all_centroids_inside_monitoring_bounds() {
        // A centroid outside the bounding box would be interpolated from
        // stations it has no geographic relationship with.
        let bounds = BoundingBox::delhi_ncr();
        for ward in WARD_REGISTRY {
            assert!(
                bounds.contains(ward.latitude, ward.longitude),
                "ward '{}' centroid ({}, {}) falls outside the monitoring bounds",
                ward.name,
                ward.latitude,
                ward.longitude
            );
        }
    }

    #[test]
    fn test_all_wards_have_pollutant_seed_data() {
        for ward in WARD_REGISTRY {
            assert!(
                !ward.pollutants.is_empty(),
                "ward '{}' must list at least one pollutant",
                ward.name
            );
        }
    }

    #[test]
    fn test_find_ward_returns_correct_entry() {
        let ward = find_ward("anand-vihar").expect("Anand Vihar should be in registry");
        assert_eq!(ward.region, "East");
    }

    #[test]
    fn test_find_ward_returns_none_for_unknown_id() {
        assert!(find_ward("gurgaon").is_none());
    }

    #[test]
    fn test_refresh_with_empty_snapshot_uses_sentinel_everywhere() {
        let statuses = refresh_wards(&[]);
        assert_eq!(statuses.len(), WARD_REGISTRY.len());
        for status in statuses {
            assert_eq!(status.aqi, interpolate::DEFAULT_ESTIMATE_AQI);
            assert_eq!(status.nearest_station, interpolate::NO_COVERAGE_LABEL);
        }
    }

    #[test]
    fn test_refresh_derives_every_ward_from_snapshot() {
        let stations = vec![
            Station {
                id: 1,
                latitude: 28.6508,
                longitude: 77.3152,
                aqi: 400,
                station_name: "Anand Vihar, Delhi".to_string(),
            },
            Station {
                id: 2,
                latitude: 28.5632,
                longitude: 77.1820,
                aqi: 120,
                station_name: "R.K. Puram, Delhi".to_string(),
            },
        ];
        let statuses = refresh_wards(&stations);

        let anand = statuses.iter().find(|s| s.id == "anand-vihar").unwrap();
        let rkp = statuses.iter().find(|s| s.id == "rk-puram").unwrap();
        // Each ward's estimate is pulled hard toward its co-located station
        // (the epsilon in the weighting keeps the far station faintly
        // visible, so the estimate lands near the local reading, not on it).
        assert!((395..=400).contains(&anand.aqi), "got {}", anand.aqi);
        assert_eq!(anand.nearest_station, "Anand Vihar, Delhi");
        assert!((120..=125).contains(&rkp.aqi), "got {}", rkp.aqi);
        assert!(anand.status > rkp.status);
    }
}
