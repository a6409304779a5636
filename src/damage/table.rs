//! Depth-damage curves and maximum damage values.
//!
//! The table is immutable once built. A process-wide instance is installed
//! once with [`init`] (or [`init_bundled`] / [`init_from_config`]) and read
//! concurrently through [`global`] afterwards.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::OnceLock;

use serde::Serialize;

use crate::config::DamageConfig;
use crate::damage::regions;
use crate::ingest::jrc;
use crate::logging::{self, Component};
use crate::model::{BuildingType, Region, Result, RiskError};

/// Depths (m) at which every curve is tabulated.
pub const ANCHOR_DEPTHS: [f64; 9] = [0.0, 0.5, 1.0, 1.5, 2.0, 3.0, 4.0, 5.0, 6.0];
pub const CURRENCY: &str = "EUR";
pub const PRICE_BASE_YEAR: u16 = 2010;

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DamageFunctionEntry {
    pub region: Region,
    pub building_type: BuildingType,
    pub depth_m: f64,
    pub damage_ratio: f64,
    pub std_dev_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaxDamageEntry {
    pub country_code: String,
    pub building_type: BuildingType,
    pub max_damage_per_m2: f64,
    pub currency: &'static str,
    pub base_year: u16,
}

impl MaxDamageEntry {
    pub fn new(country_code: &str, building_type: BuildingType, max_damage_per_m2: f64) -> Self {
        MaxDamageEntry {
            country_code: country_code.to_ascii_uppercase(),
            building_type,
            max_damage_per_m2,
            currency: CURRENCY,
            base_year: PRICE_BASE_YEAR,
        }
    }
}

// ---------------------------------------------------------------------------
// Curves
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DepthDamagePoint {
    pub depth_m: f64,
    pub damage_ratio: f64,
    pub std_dev_ratio: f64,
}

/// Result of reading a curve at one depth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interpolated {
    pub damage_ratio: f64,
    pub std_dev_ratio: f64,
    /// The depth exceeded the deepest anchor and was clamped to it.
    pub depth_saturated: bool,
}

/// One (region, building type) curve over the anchor depths, ascending.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepthDamageCurve {
    pub region: Region,
    pub building_type: BuildingType,
    points: Vec<DepthDamagePoint>,
}

impl DepthDamageCurve {
    pub fn points(&self) -> &[DepthDamagePoint] {
        &self.points
    }

    /// Linear interpolation between the bracketing anchors. Exact at
    /// anchors; depths past the last anchor take its values.
    pub fn interpolate(&self, depth_m: f64) -> Interpolated {
        let first = self.points[0];
        let last = self.points[self.points.len() - 1];

        if depth_m <= first.depth_m {
            return Interpolated {
                damage_ratio: first.damage_ratio,
                std_dev_ratio: first.std_dev_ratio,
                depth_saturated: false,
            };
        }
        if depth_m >= last.depth_m {
            return Interpolated {
                damage_ratio: last.damage_ratio,
                std_dev_ratio: last.std_dev_ratio,
                depth_saturated: depth_m > last.depth_m,
            };
        }

        // first.depth_m < depth_m < last.depth_m, so a bracket exists.
        let i = self
            .points
            .windows(2)
            .position(|w| w[0].depth_m <= depth_m && depth_m < w[1].depth_m)
            .unwrap_or(0);
        let (lo, hi) = (self.points[i], self.points[i + 1]);
        let fraction = (depth_m - lo.depth_m) / (hi.depth_m - lo.depth_m);

        Interpolated {
            damage_ratio: (lo.damage_ratio + fraction * (hi.damage_ratio - lo.damage_ratio)).clamp(0.0, 1.0),
            std_dev_ratio: (lo.std_dev_ratio + fraction * (hi.std_dev_ratio - lo.std_dev_ratio)).max(0.0),
            depth_saturated: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Maximum damage lookups
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxDamageSource {
    /// The country's own value.
    Country,
    /// Mean over the loaded countries of a region (coordinate-only locations).
    RegionAverage(Region),
    /// Mean over every loaded country, used only on explicit request.
    GlobalAverage,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MaxDamageLookup {
    pub max_damage_per_m2: f64,
    pub source: MaxDamageSource,
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DamageFunctionTable {
    curves: HashMap<(Region, BuildingType), DepthDamageCurve>,
    max_damage: HashMap<(String, BuildingType), f64>,
    countries: BTreeSet<String>,
    entry_count: usize,
}

impl DamageFunctionTable {
    /// Assembles and validates a table. Every curve must carry exactly the
    /// anchor depths, and GLOBAL must have a curve for every building type.
    pub fn from_entries(functions: Vec<DamageFunctionEntry>, max_damage: Vec<MaxDamageEntry>) -> Result<Self> {
        let entry_count = functions.len();
        let mut grouped: HashMap<(Region, BuildingType), Vec<DepthDamagePoint>> = HashMap::new();
        for entry in functions {
            grouped
                .entry((entry.region, entry.building_type))
                .or_default()
                .push(DepthDamagePoint {
                    depth_m: entry.depth_m,
                    damage_ratio: entry.damage_ratio,
                    std_dev_ratio: entry.std_dev_ratio,
                });
        }

        let mut curves = HashMap::with_capacity(grouped.len());
        for ((region, building_type), mut points) in grouped {
            points.sort_by(|a, b| a.depth_m.total_cmp(&b.depth_m));
            let depths: Vec<f64> = points.iter().map(|p| p.depth_m).collect();
            if depths != ANCHOR_DEPTHS {
                return Err(RiskError::TableFormat {
                    row: 0,
                    message: format!(
                        "{} {} curve has depths {:?}; expected {:?}",
                        region, building_type, depths, ANCHOR_DEPTHS
                    ),
                });
            }
            curves.insert(
                (region, building_type),
                DepthDamageCurve {
                    region,
                    building_type,
                    points,
                },
            );
        }

        for building_type in BuildingType::ALL {
            if !curves.contains_key(&(Region::Global, building_type)) {
                return Err(RiskError::TableFormat {
                    row: 0,
                    message: format!("GLOBAL has no {} curve", building_type),
                });
            }
        }

        let mut values = HashMap::with_capacity(max_damage.len());
        let mut countries = BTreeSet::new();
        for entry in max_damage {
            let key = (entry.country_code.to_ascii_uppercase(), entry.building_type);
            countries.insert(key.0.clone());
            if values.insert(key, entry.max_damage_per_m2).is_some() {
                return Err(RiskError::TableFormat {
                    row: 0,
                    message: format!(
                        "duplicate maximum damage for {} {}",
                        entry.country_code, entry.building_type
                    ),
                });
            }
        }
        if countries.is_empty() {
            return Err(RiskError::TableFormat {
                row: 0,
                message: "maximum damage table is empty".to_string(),
            });
        }

        let table = DamageFunctionTable {
            curves,
            max_damage: values,
            countries,
            entry_count,
        };
        logging::info(
            Component::DamageTable,
            None,
            &format!(
                "Loaded {} depth-damage entries ({} curves), maximum values for {} countries",
                table.entry_count,
                table.curves.len(),
                table.countries.len()
            ),
        );
        Ok(table)
    }

    /// The tables compiled into the crate.
    pub fn bundled() -> Result<Self> {
        Self::from_entries(
            jrc::parse_damage_functions(jrc::BUNDLED_DAMAGE_FUNCTIONS.as_bytes())?,
            jrc::parse_max_damage(jrc::BUNDLED_MAX_DAMAGE.as_bytes())?,
        )
    }

    /// Loads `damage_functions_jrc.csv` and `max_damage_jrc.csv` from `dir`.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        Self::from_entries(
            jrc::read_damage_functions(&dir.join(jrc::DAMAGE_FUNCTIONS_FILE))?,
            jrc::read_max_damage(&dir.join(jrc::MAX_DAMAGE_FILE))?,
        )
    }

    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    pub fn country_count(&self) -> usize {
        self.countries.len()
    }

    pub fn countries(&self) -> impl Iterator<Item = &str> {
        self.countries.iter().map(String::as_str)
    }

    pub fn has_country(&self, country_code: &str) -> bool {
        self.countries.contains(&country_code.trim().to_ascii_uppercase())
    }

    pub fn has_curve(&self, region: Region, building_type: BuildingType) -> bool {
        self.curves.contains_key(&(region, building_type))
    }

    pub fn curves(&self) -> impl Iterator<Item = &DepthDamageCurve> {
        self.curves.values()
    }

    pub fn lookup_curve(&self, region: Region, building_type: BuildingType) -> Result<&DepthDamageCurve> {
        self.curves.get(&(region, building_type)).ok_or_else(|| {
            RiskError::UnknownRegion(format!("no {} depth-damage curve for {}", building_type, region))
        })
    }

    /// Like [`lookup_curve`](Self::lookup_curve), substituting the GLOBAL
    /// curve when allowed. The flag reports whether the substitute was used.
    pub fn curve_or_global(
        &self,
        region: Region,
        building_type: BuildingType,
        fallback_to_global: bool,
    ) -> Result<(&DepthDamageCurve, bool)> {
        match self.lookup_curve(region, building_type) {
            Ok(curve) => Ok((curve, false)),
            Err(err) if !fallback_to_global => Err(err),
            Err(_) => {
                logging::warn(
                    Component::DamageTable,
                    Some(region.as_str()),
                    &format!("no {} curve; using GLOBAL", building_type),
                );
                Ok((self.lookup_curve(Region::Global, building_type)?, true))
            }
        }
    }

    pub fn max_damage_per_area(&self, country_code: &str, building_type: BuildingType) -> Result<f64> {
        let code = country_code.trim().to_ascii_uppercase();
        self.max_damage
            .get(&(code.clone(), building_type))
            .copied()
            .ok_or(RiskError::UnknownCountry(code))
    }

    /// Country value, or the GLOBAL average when the country is unknown and
    /// the caller asked for the fallback.
    pub fn max_damage_or_global(
        &self,
        country_code: &str,
        building_type: BuildingType,
        fallback_to_global: bool,
    ) -> Result<MaxDamageLookup> {
        match self.max_damage_per_area(country_code, building_type) {
            Ok(value) => Ok(MaxDamageLookup {
                max_damage_per_m2: value,
                source: MaxDamageSource::Country,
            }),
            Err(err) if !fallback_to_global => Err(err),
            Err(_) => {
                logging::warn(
                    Component::DamageTable,
                    Some(country_code),
                    &format!("unknown country; using GLOBAL average {} value", building_type),
                );
                Ok(MaxDamageLookup {
                    max_damage_per_m2: self.region_average_max_damage(Region::Global, building_type)?,
                    source: MaxDamageSource::GlobalAverage,
                })
            }
        }
    }

    /// Mean value over the loaded countries of `region`; for GLOBAL, over
    /// every loaded country.
    pub fn region_average_max_damage(&self, region: Region, building_type: BuildingType) -> Result<f64> {
        let values: Vec<f64> = self
            .countries
            .iter()
            .filter(|code| region == Region::Global || regions::region_for_country(code) == Some(region))
            .filter_map(|code| self.max_damage.get(&(code.clone(), building_type)).copied())
            .collect();

        if values.is_empty() {
            return Err(RiskError::UnknownRegion(format!(
                "no {} maximum damage values for countries in {}",
                building_type, region
            )));
        }
        Ok(values.iter().sum::<f64>() / values.len() as f64)
    }
}

// ---------------------------------------------------------------------------
// Process-wide instance
// ---------------------------------------------------------------------------

static TABLE: OnceLock<DamageFunctionTable> = OnceLock::new();

/// Installs `table` as the process-wide table. Only the first call takes
/// effect; later calls return the table already installed.
pub fn init(table: DamageFunctionTable) -> &'static DamageFunctionTable {
    if TABLE.get().is_some() {
        logging::debug(Component::DamageTable, None, "damage table already loaded; keeping existing");
    }
    TABLE.get_or_init(|| table)
}

/// Installs the bundled tables unless a table is already loaded.
pub fn init_bundled() -> Result<&'static DamageFunctionTable> {
    if let Some(table) = TABLE.get() {
        return Ok(table);
    }
    Ok(init(DamageFunctionTable::bundled()?))
}

/// Installs the tables from `config.data_dir`, or the bundled ones.
pub fn init_from_config(config: &DamageConfig) -> Result<&'static DamageFunctionTable> {
    if let Some(table) = TABLE.get() {
        return Ok(table);
    }
    match &config.data_dir {
        Some(dir) => Ok(init(DamageFunctionTable::load_dir(dir)?)),
        None => init_bundled(),
    }
}

/// The process-wide table; fails before any `init`.
pub fn global() -> Result<&'static DamageFunctionTable> {
    TABLE.get().ok_or(RiskError::TableNotLoaded)
}
