/// Flood damage estimation.
///
/// Submodules:
/// - `table` — depth-damage curves and maximum values, loaded once per process.
/// - `regions` — country and coordinate to region resolution.
/// - `estimator` — damage with confidence bands, single and batch.

pub mod estimator;
pub mod regions;
pub mod table;

pub use estimator::{DamageEstimate, DamageEstimator, DamageRequest};
pub use table::{DamageFunctionTable, MaxDamageSource};
