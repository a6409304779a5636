//! Core data types for the flood risk engine.
//!
//! This module defines the shared domain model imported by all other modules:
//! the closed event/season/scenario enumerations, the daily observation
//! series, the (region, building type) keys of the damage tables, and the
//! error taxonomy. It contains no numerical logic.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Climate events tracked by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Flood,
    HeavyRainfall,
    ExtremeRainfall,
    Heatwave,
    Drought,
}

impl EventType {
    pub const ALL: [EventType; 5] = [
        EventType::Flood,
        EventType::HeavyRainfall,
        EventType::ExtremeRainfall,
        EventType::Heatwave,
        EventType::Drought,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Flood => "flood",
            EventType::HeavyRainfall => "heavy_rainfall",
            EventType::ExtremeRainfall => "extreme_rainfall",
            EventType::Heatwave => "heatwave",
            EventType::Drought => "drought",
        }
    }

    /// Bit position used by `analysis::classifier::EventSet`.
    pub(crate) fn bit(&self) -> u8 {
        match self {
            EventType::Flood => 1 << 0,
            EventType::HeavyRainfall => 1 << 1,
            EventType::ExtremeRainfall => 1 << 2,
            EventType::Heatwave => 1 << 3,
            EventType::Drought => 1 << 4,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flood" => Ok(EventType::Flood),
            "heavy_rainfall" => Ok(EventType::HeavyRainfall),
            "extreme_rainfall" => Ok(EventType::ExtremeRainfall),
            "heatwave" => Ok(EventType::Heatwave),
            "drought" => Ok(EventType::Drought),
            other => Err(RiskError::InvalidInput(format!("unknown event type '{}'", other))),
        }
    }
}

// ---------------------------------------------------------------------------
// Seasons
// ---------------------------------------------------------------------------

/// Malaysian monsoon seasons. A season is a pure function of calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    /// November to March, the wet season on the east coast.
    NortheastMonsoon,
    /// May to September.
    SouthwestMonsoon,
    /// April and October.
    InterMonsoon,
}

impl Season {
    pub const ALL: [Season; 3] = [
        Season::NortheastMonsoon,
        Season::SouthwestMonsoon,
        Season::InterMonsoon,
    ];

    pub fn from_month(month: u32) -> Season {
        match month {
            11 | 12 | 1 | 2 | 3 => Season::NortheastMonsoon,
            5..=9 => Season::SouthwestMonsoon,
            _ => Season::InterMonsoon,
        }
    }

    pub fn of(date: NaiveDate) -> Season {
        Season::from_month(date.month())
    }

    pub fn months(&self) -> &'static [u32] {
        match self {
            Season::NortheastMonsoon => &[11, 12, 1, 2, 3],
            Season::SouthwestMonsoon => &[5, 6, 7, 8, 9],
            Season::InterMonsoon => &[4, 10],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Season::NortheastMonsoon => "northeast_monsoon",
            Season::SouthwestMonsoon => "southwest_monsoon",
            Season::InterMonsoon => "inter_monsoon",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Season {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "northeast_monsoon" => Ok(Season::NortheastMonsoon),
            "southwest_monsoon" => Ok(Season::SouthwestMonsoon),
            "inter_monsoon" => Ok(Season::InterMonsoon),
            other => Err(RiskError::InvalidInput(format!("unknown season '{}'", other))),
        }
    }
}

// ---------------------------------------------------------------------------
// Climate scenarios
// ---------------------------------------------------------------------------

/// Hazard scenario. `Historical` is the baseline for scenario comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    Historical,
    Rcp26,
    Rcp45,
    Rcp60,
    Rcp85,
}

impl Scenario {
    pub const ALL: [Scenario; 5] = [
        Scenario::Historical,
        Scenario::Rcp26,
        Scenario::Rcp45,
        Scenario::Rcp60,
        Scenario::Rcp85,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Historical => "historical",
            Scenario::Rcp26 => "rcp26",
            Scenario::Rcp45 => "rcp45",
            Scenario::Rcp60 => "rcp60",
            Scenario::Rcp85 => "rcp85",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scenario {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "historical" => Ok(Scenario::Historical),
            "rcp26" => Ok(Scenario::Rcp26),
            "rcp45" => Ok(Scenario::Rcp45),
            "rcp60" => Ok(Scenario::Rcp60),
            "rcp85" => Ok(Scenario::Rcp85),
            other => Err(RiskError::InvalidInput(format!("unknown scenario '{}'", other))),
        }
    }
}

// ---------------------------------------------------------------------------
// Damage table keys
// ---------------------------------------------------------------------------

/// Continental regions of the depth-damage dataset. `Global` holds the
/// averaged curves used as an explicit fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Region {
    Europe,
    NorthAmerica,
    CentralSouthAmerica,
    Asia,
    Africa,
    Oceania,
    Global,
}

impl Region {
    pub const ALL: [Region; 7] = [
        Region::Europe,
        Region::NorthAmerica,
        Region::CentralSouthAmerica,
        Region::Asia,
        Region::Africa,
        Region::Oceania,
        Region::Global,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Europe => "EUROPE",
            Region::NorthAmerica => "NORTH_AMERICA",
            Region::CentralSouthAmerica => "CENTRAL_SOUTH_AMERICA",
            Region::Asia => "ASIA",
            Region::Africa => "AFRICA",
            Region::Oceania => "OCEANIA",
            Region::Global => "GLOBAL",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = RiskError;

    /// Accepts the canonical names as well as the labels used in the raw
    /// JRC spreadsheets ("North AMERICA", "Centr&South_AMERICA").
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        match normalized.as_str() {
            "EUROPE" => Ok(Region::Europe),
            "NORTH_AMERICA" => Ok(Region::NorthAmerica),
            "CENTRAL_SOUTH_AMERICA" | "CENTR_SOUTH_AMERICA" => Ok(Region::CentralSouthAmerica),
            "ASIA" => Ok(Region::Asia),
            "AFRICA" => Ok(Region::Africa),
            "OCEANIA" => Ok(Region::Oceania),
            "GLOBAL" => Ok(Region::Global),
            _ => Err(RiskError::UnknownRegion(s.to_string())),
        }
    }
}

/// Asset classes with their own depth-damage curve and maximum value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingType {
    Residential,
    Commercial,
    Industrial,
    Agriculture,
    Infrastructure,
    Transport,
}

impl BuildingType {
    pub const ALL: [BuildingType; 6] = [
        BuildingType::Residential,
        BuildingType::Commercial,
        BuildingType::Industrial,
        BuildingType::Agriculture,
        BuildingType::Infrastructure,
        BuildingType::Transport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildingType::Residential => "residential",
            BuildingType::Commercial => "commercial",
            BuildingType::Industrial => "industrial",
            BuildingType::Agriculture => "agriculture",
            BuildingType::Infrastructure => "infrastructure",
            BuildingType::Transport => "transport",
        }
    }
}

impl fmt::Display for BuildingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildingType {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "residential" => Ok(BuildingType::Residential),
            "commercial" => Ok(BuildingType::Commercial),
            "industrial" => Ok(BuildingType::Industrial),
            "agriculture" => Ok(BuildingType::Agriculture),
            "infrastructure" => Ok(BuildingType::Infrastructure),
            "transport" => Ok(BuildingType::Transport),
            other => Err(RiskError::InvalidInput(format!(
                "unsupported building type '{}'; valid types: residential, commercial, \
                 industrial, agriculture, infrastructure, transport",
                other
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Observation series
// ---------------------------------------------------------------------------

/// One calendar day of observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub rainfall_mm: Option<f64>,
    pub temperature_c: Option<f64>,
    /// Event label supplied by the data source. Honoured as an override by
    /// the classifier.
    pub event_type: Option<EventType>,
}

impl DailyRecord {
    pub fn new(date: NaiveDate) -> Self {
        DailyRecord {
            date,
            rainfall_mm: None,
            temperature_c: None,
            event_type: None,
        }
    }

    pub fn with_rainfall(mut self, rainfall_mm: f64) -> Self {
        self.rainfall_mm = Some(rainfall_mm);
        self
    }

    pub fn with_temperature(mut self, temperature_c: f64) -> Self {
        self.temperature_c = Some(temperature_c);
        self
    }

    pub fn with_event(mut self, event_type: EventType) -> Self {
        self.event_type = Some(event_type);
        self
    }
}

/// Chronologically ordered, date-unique daily records spanning at least one
/// day. Gaps are allowed. The engine only ever reads it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalSeries {
    records: Vec<DailyRecord>,
}

impl HistoricalSeries {
    /// Validates ordering, uniqueness and value ranges.
    pub fn new(records: Vec<DailyRecord>) -> Result<Self> {
        if records.is_empty() {
            return Err(RiskError::InsufficientData {
                what: "daily records".to_string(),
                required: 1,
                found: 0,
            });
        }

        for pair in records.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(RiskError::InvalidInput(format!(
                    "records must be strictly chronological with unique dates: {} follows {}",
                    pair[1].date, pair[0].date
                )));
            }
        }

        for record in &records {
            if let Some(rain) = record.rainfall_mm {
                if !rain.is_finite() || rain < 0.0 {
                    return Err(RiskError::InvalidInput(format!(
                        "rainfall on {} must be a finite value >= 0, got {}",
                        record.date, rain
                    )));
                }
            }
            if let Some(temp) = record.temperature_c {
                if !temp.is_finite() {
                    return Err(RiskError::InvalidInput(format!(
                        "temperature on {} is not finite",
                        record.date
                    )));
                }
            }
        }

        Ok(HistoricalSeries { records })
    }

    /// Convenience constructor for a rainfall-only series.
    pub fn from_rainfall(days: impl IntoIterator<Item = (NaiveDate, f64)>) -> Result<Self> {
        Self::new(
            days.into_iter()
                .map(|(date, rain)| DailyRecord::new(date).with_rainfall(rain))
                .collect(),
        )
    }

    pub fn records(&self) -> &[DailyRecord] {
        &self.records
    }

    /// Number of distinct observed days.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first_date(&self) -> NaiveDate {
        self.records[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.records[self.records.len() - 1].date
    }

    /// Distinct calendar years present, ascending.
    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.records.iter().map(|r| r.date.year()).collect();
        years.dedup();
        years
    }
}

// ---------------------------------------------------------------------------
// Locations
// ---------------------------------------------------------------------------

/// Where a damage estimate applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    /// ISO 3166-1 alpha-2 country code.
    Country(String),
    /// WGS84 coordinates; the region is inferred, no country is assumed.
    Coordinates { latitude: f64, longitude: f64 },
}

impl Location {
    pub fn country(code: &str) -> Self {
        Location::Country(code.trim().to_ascii_uppercase())
    }

    pub fn coordinates(latitude: f64, longitude: f64) -> Self {
        Location::Coordinates { latitude, longitude }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Location::Country(code) => {
                if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
                    return Err(RiskError::InvalidInput(format!(
                        "country code '{}' is not an ISO 3166-1 alpha-2 code",
                        code
                    )));
                }
            }
            Location::Coordinates { latitude, longitude } => {
                if !(-90.0..=90.0).contains(latitude) {
                    return Err(RiskError::InvalidInput(format!(
                        "latitude {} outside [-90, 90]",
                        latitude
                    )));
                }
                if !(-180.0..=180.0).contains(longitude) {
                    return Err(RiskError::InvalidInput(format!(
                        "longitude {} outside [-180, 180]",
                        longitude
                    )));
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors surfaced by the engine. Fit quality problems are not errors; they
/// travel with the result as `extremes::FitWarning`.
#[derive(Debug, Error)]
pub enum RiskError {
    /// Out-of-range depth, area, threshold or return period, or an unknown
    /// enumeration name. Never retried.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Not enough observations for the requested analysis.
    #[error("Insufficient data: {what} requires at least {required}, found {found}")]
    InsufficientData {
        what: String,
        required: usize,
        found: usize,
    },

    /// Country code absent from the maximum-damage table.
    #[error("Unknown country: {0}")]
    UnknownCountry(String),

    /// Region name not recognised, or no curve for a (region, type) pair.
    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    /// A reference table row violated the expected layout or ranges.
    #[error("Table format error at row {row}: {message}")]
    TableFormat { row: usize, message: String },

    /// The process-wide damage table was requested before `damage::table::init`.
    #[error("Damage function table has not been loaded")]
    TableNotLoaded,

    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, RiskError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
