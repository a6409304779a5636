/// Hazard data sources
///
/// The risk aggregator does not compute hazard itself. It asks a
/// `HazardSource` for one extreme value per year (flood depth in metres)
/// for a location under a scenario, and fits return periods to that.
///
/// `HazardTable` is the in-memory source. It can be filled directly or
/// loaded from a JSON array of records:
///
/// ```json
/// [{"location": "Kelantan", "scenario": "rcp45", "annual_extremes": [0.8, 1.2, 0.6]}]
/// ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::{Result, RiskError, Scenario};

/// Supplies annual extremes per (location, scenario).
pub trait HazardSource: Sync {
    fn annual_extremes(&self, location: &str, scenario: Scenario) -> Result<Vec<f64>>;
}

// ============================================================================
// JSON records
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardRecord {
    pub location: String,
    pub scenario: Scenario,
    pub annual_extremes: Vec<f64>,
}

// ============================================================================
// In-memory table
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct HazardTable {
    /// Keyed by lower-cased location name.
    series: HashMap<(String, Scenario), Vec<f64>>,
}

fn key(location: &str) -> String {
    location.trim().to_lowercase()
}

impl HazardTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the series for (location, scenario).
    pub fn insert(&mut self, location: &str, scenario: Scenario, annual_extremes: Vec<f64>) -> Result<()> {
        if let Some(bad) = annual_extremes.iter().find(|v| !v.is_finite()) {
            return Err(RiskError::InvalidInput(format!(
                "hazard series for {} ({}) contains {}",
                location, scenario, bad
            )));
        }
        self.series.insert((key(location), scenario), annual_extremes);
        Ok(())
    }

    pub fn from_records(records: Vec<HazardRecord>) -> Result<Self> {
        let mut table = HazardTable::new();
        for record in records {
            table.insert(&record.location, record.scenario, record.annual_extremes)?;
        }
        Ok(table)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let records: Vec<HazardRecord> = serde_json::from_str(json)?;
        Self::from_records(records)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|source| RiskError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Scenarios available for `location`, in declaration order.
    pub fn scenarios_for(&self, location: &str) -> Vec<Scenario> {
        let location = key(location);
        Scenario::ALL
            .into_iter()
            .filter(|s| self.series.contains_key(&(location.clone(), *s)))
            .collect()
    }
}

impl HazardSource for HazardTable {
    fn annual_extremes(&self, location: &str, scenario: Scenario) -> Result<Vec<f64>> {
        self.series
            .get(&(key(location), scenario))
            .cloned()
            .ok_or_else(|| RiskError::InsufficientData {
                what: format!("hazard series for {} ({})", location.trim(), scenario),
                required: 1,
                found: 0,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut table = HazardTable::new();
        table.insert("Kelantan", Scenario::Historical, vec![0.5, 0.9]).unwrap();
        assert_eq!(
            table.annual_extremes(" kelantan ", Scenario::Historical).unwrap(),
            vec![0.5, 0.9]
        );
    }

    #[test]
    fn test_missing_series_is_insufficient_data() {
        let table = HazardTable::new();
        assert!(matches!(
            table.annual_extremes("Johor", Scenario::Rcp85),
            Err(RiskError::InsufficientData { required: 1, found: 0, .. })
        ));
    }

    #[test]
    fn test_json_loading() {
        let json = r#"[
            {"location": "Pahang", "scenario": "historical", "annual_extremes": [0.4, 0.7, 1.1]},
            {"location": "Pahang", "scenario": "rcp85", "annual_extremes": [0.6, 1.0, 1.6]}
        ]"#;
        let table = HazardTable::from_json_str(json).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.scenarios_for("pahang"),
            vec![Scenario::Historical, Scenario::Rcp85]
        );
    }

    #[test]
    fn test_bad_json_and_bad_values() {
        assert!(matches!(HazardTable::from_json_str("{not json"), Err(RiskError::Json(_))));
        let unknown_scenario = r#"[{"location": "X", "scenario": "rcp99", "annual_extremes": []}]"#;
        assert!(matches!(HazardTable::from_json_str(unknown_scenario), Err(RiskError::Json(_))));

        let mut table = HazardTable::new();
        assert!(table.insert("X", Scenario::Rcp26, vec![1.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hazard.json");
        let records = vec![HazardRecord {
            location: "Sabah".to_string(),
            scenario: Scenario::Rcp45,
            annual_extremes: vec![0.3, 0.8],
        }];
        std::fs::write(&path, serde_json::to_string(&records).unwrap()).unwrap();

        let table = HazardTable::from_json_file(&path).unwrap();
        assert_eq!(table.annual_extremes("Sabah", Scenario::Rcp45).unwrap(), vec![0.3, 0.8]);
    }
}
