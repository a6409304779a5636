/// Location registry for the Malaysian flood risk engine.
///
/// Defines the canonical list of analysis locations: the national
/// aggregate and nine states, with their approximate centroids, share of
/// national asset exposure, and whether they are in the high flood-risk
/// group of the east coast. All other modules should reference locations
/// from here rather than hardcoding names.

use crate::model::Location;

// ---------------------------------------------------------------------------
// Return period sets
// ---------------------------------------------------------------------------

/// Frequent flooding: shorter return periods carry most of the signal.
pub const HIGH_RISK_RETURN_PERIODS: [f64; 5] = [5.0, 10.0, 25.0, 50.0, 100.0];
pub const STANDARD_RETURN_PERIODS: [f64; 5] = [10.0, 25.0, 50.0, 100.0, 250.0];

/// Exposure share assumed for a state missing from the registry.
pub const DEFAULT_EXPOSURE_SHARE: f64 = 0.04;

// ---------------------------------------------------------------------------
// Location metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationKind {
    Country,
    State,
}

/// Metadata for a single analysis location.
#[derive(Debug)]
pub struct AnalysisLocation {
    /// Name used as the hazard lookup key.
    pub name: &'static str,
    pub kind: LocationKind,
    /// ISO 3166-1 alpha-2 code of the country the location belongs to.
    pub country_code: &'static str,
    /// Approximate WGS84 centroid.
    pub latitude: f64,
    pub longitude: f64,
    /// Fraction of national exposure located here (1.0 for the country).
    pub exposure_share: f64,
    /// Northeast-monsoon states with frequent riverine flooding.
    pub high_flood_risk: bool,
    pub description: &'static str,
}

impl AnalysisLocation {
    /// The location as a country for damage estimation. States share the
    /// country's maximum damage values and region.
    pub fn damage_location(&self) -> Location {
        Location::country(self.country_code)
    }

    pub fn coordinates(&self) -> Location {
        Location::coordinates(self.latitude, self.longitude)
    }

    pub fn automatic_return_periods(&self) -> &'static [f64] {
        if self.high_flood_risk {
            &HIGH_RISK_RETURN_PERIODS
        } else {
            &STANDARD_RETURN_PERIODS
        }
    }
}

/// All analysis locations, national aggregate first, then states by
/// exposure share.
pub static LOCATION_REGISTRY: &[AnalysisLocation] = &[
    AnalysisLocation {
        name: "Malaysia (Country)",
        kind: LocationKind::Country,
        country_code: "MY",
        latitude: 4.2105,
        longitude: 101.9758,
        exposure_share: 1.0,
        high_flood_risk: false,
        description: "National aggregate. Hazard is the country-level average.",
    },
    AnalysisLocation {
        name: "Selangor",
        kind: LocationKind::State,
        country_code: "MY",
        latitude: 3.0738,
        longitude: 101.5183,
        exposure_share: 0.28,
        high_flood_risk: false,
        description: "Most developed state, includes the Klang Valley. \
                      Flash floods from urban runoff.",
    },
    AnalysisLocation {
        name: "Johor",
        kind: LocationKind::State,
        country_code: "MY",
        latitude: 1.4854,
        longitude: 103.7618,
        exposure_share: 0.14,
        high_flood_risk: false,
        description: "Southern industrial hub bordering Singapore.",
    },
    AnalysisLocation {
        name: "Sarawak",
        kind: LocationKind::State,
        country_code: "MY",
        latitude: 1.5533,
        longitude: 110.3593,
        exposure_share: 0.10,
        high_flood_risk: false,
        description: "East Malaysia (Borneo). Oil, gas and resources.",
    },
    AnalysisLocation {
        name: "Penang",
        kind: LocationKind::State,
        country_code: "MY",
        latitude: 5.4164,
        longitude: 100.3327,
        exposure_share: 0.09,
        high_flood_risk: false,
        description: "Northwest island state. Manufacturing and services.",
    },
    AnalysisLocation {
        name: "Sabah",
        kind: LocationKind::State,
        country_code: "MY",
        latitude: 5.9788,
        longitude: 116.0753,
        exposure_share: 0.08,
        high_flood_risk: false,
        description: "East Malaysia (Borneo). Resources and tourism.",
    },
    AnalysisLocation {
        name: "Perak",
        kind: LocationKind::State,
        country_code: "MY",
        latitude: 4.5921,
        longitude: 101.0901,
        exposure_share: 0.08,
        high_flood_risk: false,
        description: "Northwest state with some river flooding.",
    },
    AnalysisLocation {
        name: "Pahang",
        kind: LocationKind::State,
        country_code: "MY",
        latitude: 3.8126,
        longitude: 103.3256,
        exposure_share: 0.08,
        high_flood_risk: true,
        description: "Largest peninsular state. Large river systems flood \
                      during the northeast monsoon.",
    },
    AnalysisLocation {
        name: "Kelantan",
        kind: LocationKind::State,
        country_code: "MY",
        latitude: 6.1256,
        longitude: 102.2381,
        exposure_share: 0.06,
        high_flood_risk: true,
        description: "Northeast coast. Highest flood risk in the country; \
                      the Kelantan river basin floods most monsoon seasons.",
    },
    AnalysisLocation {
        name: "Terengganu",
        kind: LocationKind::State,
        country_code: "MY",
        latitude: 5.3117,
        longitude: 103.1324,
        exposure_share: 0.05,
        high_flood_risk: true,
        description: "East coast, directly exposed to the northeast monsoon.",
    },
];

/// Looks up a location by name, ignoring case. Returns `None` if not found.
pub fn find_location(name: &str) -> Option<&'static AnalysisLocation> {
    let name = name.trim();
    LOCATION_REGISTRY.iter().find(|l| l.name.eq_ignore_ascii_case(name))
}

pub fn all_location_names() -> Vec<&'static str> {
    LOCATION_REGISTRY.iter().map(|l| l.name).collect()
}

pub fn high_risk_locations() -> Vec<&'static str> {
    LOCATION_REGISTRY
        .iter()
        .filter(|l| l.high_flood_risk)
        .map(|l| l.name)
        .collect()
}

/// Return periods suited to `name`; unknown locations get the standard set.
pub fn automatic_return_periods(name: &str) -> &'static [f64] {
    find_location(name)
        .map(|l| l.automatic_return_periods())
        .unwrap_or(&STANDARD_RETURN_PERIODS)
}

/// Share of national exposure for `name`, with a small default for
/// locations outside the registry.
pub fn exposure_share(name: &str) -> f64 {
    find_location(name)
        .map(|l| l.exposure_share)
        .unwrap_or(DEFAULT_EXPOSURE_SHARE)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
