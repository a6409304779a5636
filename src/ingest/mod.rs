/// Reference and hazard data ingestion.
///
/// Submodules:
/// - `jrc` — depth-damage and maximum damage CSV tables.
/// - `hazard` — annual hazard extremes per location and scenario.

pub mod hazard;
pub mod jrc;
