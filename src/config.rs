//! Engine configuration.
//!
//! Event thresholds, fitting parameters, return-period grids and logging
//! options are read from a TOML file (`risk_engine.toml` by default). Every
//! section and key is optional; omitted values fall back to the defaults
//! below. Two environment variables, optionally supplied through a `.env`
//! file, override the file: `RISK_DATA_DIR` and `RISK_LOG_LEVEL`.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::logging::{self, Component, LogLevel};
use crate::model::{EventType, Result, RiskError};

pub const CONFIG_PATH_VAR: &str = "RISK_ENGINE_CONFIG";
pub const DATA_DIR_VAR: &str = "RISK_DATA_DIR";
pub const LOG_LEVEL_VAR: &str = "RISK_LOG_LEVEL";
pub const DEFAULT_CONFIG_PATH: &str = "risk_engine.toml";

/// Return periods (years) reported by default for curves and EAI.
pub const DEFAULT_RETURN_PERIODS: [f64; 9] = [2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0];

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Per-event classification thresholds. Immutable for one analysis; callers
/// may build a modified copy for a single call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdSet {
    /// 24-hour rainfall (mm) at or above which a day counts as a flood.
    pub flood_mm: f64,
    pub heavy_rainfall_mm: f64,
    pub extreme_rainfall_mm: f64,
    /// Daily temperature (°C) at or above which a day counts as a heatwave.
    pub heatwave_c: f64,
    /// A day is dry when its rainfall is strictly below this value.
    pub drought_dry_day_mm: f64,
    /// Consecutive dry days needed before a drought begins.
    pub drought_min_days: u32,
}

impl Default for ThresholdSet {
    fn default() -> Self {
        ThresholdSet {
            flood_mm: 150.0,
            heavy_rainfall_mm: 100.0,
            extreme_rainfall_mm: 200.0,
            heatwave_c: 35.0,
            drought_dry_day_mm: 1.0,
            drought_min_days: 14,
        }
    }
}

impl ThresholdSet {
    /// The numeric threshold for an event type. For drought this is the
    /// dry-day rainfall limit; the run length is `drought_min_days`.
    pub fn threshold(&self, event: EventType) -> f64 {
        match event {
            EventType::Flood => self.flood_mm,
            EventType::HeavyRainfall => self.heavy_rainfall_mm,
            EventType::ExtremeRainfall => self.extreme_rainfall_mm,
            EventType::Heatwave => self.heatwave_c,
            EventType::Drought => self.drought_dry_day_mm,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let rainfall = [
            ("flood_mm", self.flood_mm),
            ("heavy_rainfall_mm", self.heavy_rainfall_mm),
            ("extreme_rainfall_mm", self.extreme_rainfall_mm),
            ("drought_dry_day_mm", self.drought_dry_day_mm),
        ];
        for (name, value) in rainfall {
            if !value.is_finite() || value < 0.0 {
                return Err(RiskError::InvalidInput(format!(
                    "threshold {} must be a finite value >= 0, got {}",
                    name, value
                )));
            }
        }
        if !self.heatwave_c.is_finite() {
            return Err(RiskError::InvalidInput("threshold heatwave_c is not finite".to_string()));
        }
        if self.drought_min_days == 0 {
            return Err(RiskError::InvalidInput(
                "drought_min_days must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtremesConfig {
    /// Below this many observations a fit carries a short-record warning.
    pub min_reliable_observations: usize,
    /// Iteration cap for the likelihood optimiser.
    pub max_iterations: usize,
    pub curve_return_periods: Vec<f64>,
}

impl Default for ExtremesConfig {
    fn default() -> Self {
        ExtremesConfig {
            min_reliable_observations: 10,
            max_iterations: 5000,
            curve_return_periods: DEFAULT_RETURN_PERIODS.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub eai_return_periods: Vec<f64>,
    /// Substitute GLOBAL curves and averages for unknown countries/regions.
    pub fallback_to_global: bool,
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            eai_return_periods: DEFAULT_RETURN_PERIODS.to_vec(),
            fallback_to_global: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DamageConfig {
    /// Directory holding `damage_functions_jrc.csv` and `max_damage_jrc.csv`.
    /// The bundled tables are used when unset.
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub file: Option<String>,
    pub console_timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            file: None,
            console_timestamps: false,
        }
    }
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub thresholds: ThresholdSet,
    pub extremes: ExtremesConfig,
    pub risk: RiskConfig,
    pub damage: DamageConfig,
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Loads `.env`, then the file named by `RISK_ENGINE_CONFIG` (or
    /// `./risk_engine.toml`). A missing file yields the defaults; a file that
    /// exists but fails to parse is an error.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let path = env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let path = Path::new(&path);

        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            EngineConfig::default()
        };

        config.apply_overrides(env::var(DATA_DIR_VAR).ok(), env::var(LOG_LEVEL_VAR).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| RiskError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies environment overrides. Empty values are ignored.
    pub fn apply_overrides(
        &mut self,
        data_dir: Option<String>,
        log_level: Option<String>,
    ) -> Result<()> {
        if let Some(dir) = data_dir.filter(|d| !d.trim().is_empty()) {
            self.damage.data_dir = Some(PathBuf::from(dir.trim()));
        }
        if let Some(level) = log_level.filter(|l| !l.trim().is_empty()) {
            self.logging.level = level
                .parse()
                .map_err(|_| RiskError::Config(format!("{} has invalid level '{}'", LOG_LEVEL_VAR, level)))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()?;

        if self.extremes.max_iterations == 0 {
            return Err(RiskError::Config("extremes.max_iterations must be at least 1".to_string()));
        }
        validate_return_periods("extremes.curve_return_periods", &self.extremes.curve_return_periods, 1)?;
        validate_return_periods("risk.eai_return_periods", &self.risk.eai_return_periods, 2)?;
        Ok(())
    }

    /// Installs the process-global logger from the `[logging]` section.
    pub fn init_logging(&self) {
        logging::init_logger(
            self.logging.level,
            self.logging.file.as_deref(),
            self.logging.console_timestamps,
        );
        logging::debug(Component::Config, None, &format!("configuration loaded: {:?}", self));
    }
}

fn validate_return_periods(name: &str, periods: &[f64], min_len: usize) -> Result<()> {
    if periods.len() < min_len {
        return Err(RiskError::Config(format!(
            "{} needs at least {} entries, has {}",
            name,
            min_len,
            periods.len()
        )));
    }
    for &t in periods {
        if !t.is_finite() || t <= 1.0 {
            return Err(RiskError::Config(format!(
                "{} contains {}; return periods must be finite and greater than 1 year",
                name, t
            )));
        }
    }
    Ok(())
}
