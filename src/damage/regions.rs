//! Region resolution for damage curves.
//!
//! Countries map to a region through a fixed membership table; a code not
//! listed has no region and resolving it fails with `UnknownRegion`.
//! Coordinates are matched against coarse
//! continental bounding boxes. When no box or several boxes contain the
//! point, the region with the nearest centroid (great-circle distance)
//! wins. Coordinates never resolve to `GLOBAL`.

use crate::model::{Location, Region, Result, RiskError};

/// ISO 3166-1 alpha-2 members of each damage-curve region.
pub static REGION_MEMBERS: &[(Region, &[&str])] = &[
    (
        Region::Europe,
        &[
            "DE", "FR", "IT", "ES", "NL", "BE", "AT", "CH", "SE", "NO", "DK", "FI", "PL", "CZ",
            "HU", "RO", "BG", "GR", "PT", "IE", "LU", "SK", "SI", "EE", "LV", "LT", "CY", "MT",
            "HR", "GB", "IS", "LI", "MC", "SM", "VA", "AD", "AL", "BA", "ME", "MK", "RS", "XK",
            "MD", "UA", "BY", "RU", "AX", "FO", "GG", "GI", "IM", "JE", "SJ",
        ],
    ),
    (
        Region::NorthAmerica,
        &[
            "US", "CA", "MX", "GT", "BZ", "SV", "HN", "NI", "CR", "PA", "GL", "PM", "BM", "CU",
            "DO", "HT", "JM", "BS", "TC", "KY", "AG", "AI", "AW", "BB", "BL", "BQ", "CW", "DM",
            "GD", "GP", "KN", "LC", "MF", "MQ", "MS", "SX", "TT", "VC", "VG",
        ],
    ),
    (
        Region::CentralSouthAmerica,
        &[
            "BR", "AR", "CL", "PE", "CO", "VE", "EC", "BO", "PY", "UY", "GY", "SR", "GF", "FK",
            "GS",
        ],
    ),
    (
        Region::Asia,
        &[
            "CN", "IN", "JP", "KR", "TH", "VN", "MY", "SG", "ID", "PH", "BD", "PK", "LK", "MM",
            "KH", "LA", "BN", "TL", "MN", "KZ", "UZ", "TM", "TJ", "KG", "AF", "IR", "IQ", "SY",
            "JO", "LB", "IL", "PS", "SA", "YE", "OM", "AE", "QA", "BH", "KW", "TR", "GE", "AM",
            "AZ", "NP", "BT", "MV", "TW", "HK", "MO", "KP", "IO", "CX", "CC",
        ],
    ),
    (
        Region::Africa,
        &[
            "NG", "ET", "EG", "ZA", "KE", "UG", "DZ", "SD", "MA", "AO", "GH", "MZ", "MG", "CM",
            "CI", "NE", "BF", "ML", "MW", "ZM", "SO", "SN", "TD", "ZW", "GN", "RW", "BJ", "TN",
            "BI", "ER", "SL", "TG", "CF", "LY", "LR", "MR", "GA", "BW", "LS", "GQ", "GM", "GW",
            "SZ", "DJ", "KM", "CV", "ST", "SC", "MU", "TZ", "CD", "CG", "NA", "SS", "EH", "RE",
            "YT", "SH", "TF",
        ],
    ),
    (
        Region::Oceania,
        &[
            "AU", "NZ", "PG", "FJ", "SB", "NC", "PF", "VU", "WS", "KI", "FM", "TO", "MH", "PW",
            "CK", "NU", "TK", "TV", "NR", "AS", "GU", "MP", "VI", "PR", "UM", "NF", "PN", "WF",
            "HM",
        ],
    ),
];

/// Continental bounding box with a representative centroid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionBounds {
    pub region: Region,
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
    pub centroid: (f64, f64),
}

impl RegionBounds {
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.lat_min..=self.lat_max).contains(&latitude)
            && (self.lon_min..=self.lon_max).contains(&longitude)
    }
}

pub static REGION_BOUNDS: &[RegionBounds] = &[
    RegionBounds {
        region: Region::Europe,
        lat_min: 35.0,
        lat_max: 72.0,
        lon_min: -25.0,
        lon_max: 45.0,
        centroid: (50.0, 10.0),
    },
    RegionBounds {
        region: Region::NorthAmerica,
        lat_min: 7.0,
        lat_max: 84.0,
        lon_min: -170.0,
        lon_max: -50.0,
        centroid: (45.0, -100.0),
    },
    RegionBounds {
        region: Region::CentralSouthAmerica,
        lat_min: -56.0,
        lat_max: 13.0,
        lon_min: -92.0,
        lon_max: -30.0,
        centroid: (-15.0, -60.0),
    },
    RegionBounds {
        region: Region::Asia,
        lat_min: -11.0,
        lat_max: 78.0,
        lon_min: 25.0,
        lon_max: 180.0,
        centroid: (25.0, 100.0),
    },
    RegionBounds {
        region: Region::Africa,
        lat_min: -35.0,
        lat_max: 38.0,
        lon_min: -18.0,
        lon_max: 52.0,
        centroid: (2.0, 20.0),
    },
    RegionBounds {
        region: Region::Oceania,
        lat_min: -50.0,
        lat_max: 0.0,
        lon_min: 110.0,
        lon_max: 180.0,
        centroid: (-25.0, 140.0),
    },
];

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometres.
pub fn haversine_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());
    let h = ((lat2 - lat1) / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * ((lon2 - lon1) / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Region of an ISO alpha-2 code; `None` when the code is not listed.
pub fn region_for_country(country_code: &str) -> Option<Region> {
    let code = country_code.trim().to_ascii_uppercase();
    REGION_MEMBERS
        .iter()
        .find(|(_, members)| members.contains(&code.as_str()))
        .map(|(region, _)| *region)
}

fn nearest_centroid<'a>(candidates: impl Iterator<Item = &'a RegionBounds>, point: (f64, f64)) -> Option<Region> {
    candidates
        .map(|b| (b.region, haversine_km(point, b.centroid)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(region, _)| region)
}

/// Region for a coordinate pair. Assumes validated coordinates.
pub fn region_for_coordinates(latitude: f64, longitude: f64) -> Region {
    let point = (latitude, longitude);
    let containing: Vec<&RegionBounds> = REGION_BOUNDS
        .iter()
        .filter(|b| b.contains(latitude, longitude))
        .collect();

    let region = match containing.len() {
        1 => Some(containing[0].region),
        0 => nearest_centroid(REGION_BOUNDS.iter(), point),
        _ => nearest_centroid(containing.into_iter(), point),
    };
    // REGION_BOUNDS is non-empty, so a region is always found.
    region.unwrap_or(Region::Asia)
}

/// Validates `location` and resolves its region. GLOBAL is never returned;
/// substituting it is the caller's decision.
pub fn resolve_region(location: &Location) -> Result<Region> {
    location.validate()?;
    match location {
        Location::Country(code) => region_for_country(code).ok_or_else(|| {
            RiskError::UnknownRegion(format!("country {} is not assigned to a damage region", code.trim()))
        }),
        Location::Coordinates { latitude, longitude } => Ok(region_for_coordinates(*latitude, *longitude)),
    }
}

/// Countries listed for `region`; empty for `GLOBAL`.
pub fn members(region: Region) -> &'static [&'static str] {
    REGION_MEMBERS
        .iter()
        .find(|(r, _)| *r == region)
        .map(|(_, members)| *members)
        .unwrap_or(&[])
}
