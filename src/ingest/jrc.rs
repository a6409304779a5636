/// JRC global flood depth-damage tables
///
/// Parses the two processed reference tables:
/// - `damage_functions_jrc.csv`: one row per (region, building type, anchor depth)
/// - `max_damage_jrc.csv`: one row per country, one column per building type,
///   EUR per m² at 2010 prices
///
/// Both files ship with the crate and can be replaced by a directory of the
/// same two files at runtime.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::damage::table::{DamageFunctionEntry, MaxDamageEntry};
use crate::model::{BuildingType, Region, Result, RiskError};

pub const DAMAGE_FUNCTIONS_FILE: &str = "damage_functions_jrc.csv";
pub const MAX_DAMAGE_FILE: &str = "max_damage_jrc.csv";

pub const BUNDLED_DAMAGE_FUNCTIONS: &str = include_str!("../../data/damage_functions_jrc.csv");
pub const BUNDLED_MAX_DAMAGE: &str = include_str!("../../data/max_damage_jrc.csv");

// ============================================================================
// Raw CSV rows
// ============================================================================

#[derive(Debug, Deserialize)]
struct DamageFunctionRow {
    region: String,
    building_type: String,
    depth_m: f64,
    damage_ratio: f64,
    std_dev_ratio: f64,
}

#[derive(Debug, Deserialize)]
struct MaxDamageRow {
    country_code: String,
    residential: f64,
    commercial: f64,
    industrial: f64,
    agriculture: f64,
    infrastructure: f64,
    transport: f64,
}

impl MaxDamageRow {
    fn values(&self) -> [(BuildingType, f64); 6] {
        [
            (BuildingType::Residential, self.residential),
            (BuildingType::Commercial, self.commercial),
            (BuildingType::Industrial, self.industrial),
            (BuildingType::Agriculture, self.agriculture),
            (BuildingType::Infrastructure, self.infrastructure),
            (BuildingType::Transport, self.transport),
        ]
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Data rows are numbered from 2; row 1 is the header.
fn row_number(index: usize) -> usize {
    index + 2
}

fn table_error(index: usize, message: String) -> RiskError {
    RiskError::TableFormat {
        row: row_number(index),
        message,
    }
}

/// Parses depth-damage rows, checking names and value ranges. Curve-level
/// checks (anchor set, duplicates) happen when the table is assembled.
pub fn parse_damage_functions<R: Read>(reader: R) -> Result<Vec<DamageFunctionEntry>> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut entries = Vec::new();

    for (index, row) in csv_reader.deserialize::<DamageFunctionRow>().enumerate() {
        let row = row?;

        let region: Region = row
            .region
            .parse()
            .map_err(|_| table_error(index, format!("unknown region '{}'", row.region)))?;
        let building_type: BuildingType = row
            .building_type
            .parse()
            .map_err(|_| table_error(index, format!("unknown building type '{}'", row.building_type)))?;

        if !row.depth_m.is_finite() || row.depth_m < 0.0 {
            return Err(table_error(index, format!("depth_m {} is negative or not finite", row.depth_m)));
        }
        if !(0.0..=1.0).contains(&row.damage_ratio) {
            return Err(table_error(index, format!("damage_ratio {} outside [0, 1]", row.damage_ratio)));
        }
        if !row.std_dev_ratio.is_finite() || row.std_dev_ratio < 0.0 {
            return Err(table_error(index, format!("std_dev_ratio {} is negative or not finite", row.std_dev_ratio)));
        }

        entries.push(DamageFunctionEntry {
            region,
            building_type,
            depth_m: row.depth_m,
            damage_ratio: row.damage_ratio,
            std_dev_ratio: row.std_dev_ratio,
        });
    }

    Ok(entries)
}

/// Parses the wide max-damage table into one entry per (country, type).
pub fn parse_max_damage<R: Read>(reader: R) -> Result<Vec<MaxDamageEntry>> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut entries = Vec::new();

    for (index, row) in csv_reader.deserialize::<MaxDamageRow>().enumerate() {
        let row = row?;
        let code = row.country_code.to_ascii_uppercase();
        if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(table_error(index, format!("'{}' is not an ISO alpha-2 code", row.country_code)));
        }

        for (building_type, value) in row.values() {
            if !value.is_finite() || value < 0.0 {
                return Err(table_error(
                    index,
                    format!("{} {} value {} is negative or not finite", code, building_type, value),
                ));
            }
            entries.push(MaxDamageEntry::new(&code, building_type, value));
        }
    }

    Ok(entries)
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| RiskError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_damage_functions(path: &Path) -> Result<Vec<DamageFunctionEntry>> {
    parse_damage_functions(open(path)?)
}

pub fn read_max_damage(path: &Path) -> Result<Vec<MaxDamageEntry>> {
    parse_max_damage(open(path)?)
}
