/// Flood and rainfall risk engine for Malaysian locations.
///
/// Modules:
/// - `model` — shared domain types and the error enum.
/// - `config` — thresholds and engine settings from TOML and the environment.
/// - `logging` — component-tagged console and file logging.
/// - `analysis` — event classification, probabilities and trends.
/// - `extremes` — GEV fitting and return-period curves.
/// - `damage` — depth-damage tables and economic damage estimates.
/// - `ingest` — reference table and hazard data loading.
/// - `risk` — scenario comparison and Expected Annual Impact.
/// - `locations` — registry of analysis locations.
/// - `verify` — damage table coverage checks.

pub mod analysis;
pub mod config;
pub mod damage;
pub mod extremes;
pub mod ingest;
pub mod locations;
pub mod logging;
pub mod model;
pub mod risk;
pub mod verify;

pub use config::{EngineConfig, ThresholdSet};
pub use model::{
    BuildingType, DailyRecord, EventType, HistoricalSeries, Location, Region, Result, RiskError, Scenario, Season,
};
