/// Historical event analysis.
///
/// Turns a daily observation series into event labels and derives
/// empirical probabilities from them.
///
/// Submodules:
/// - `classifier` — per-day event labels, including the drought scanner.
/// - `probability` — daily, windowed and seasonal probabilities.
/// - `trend` — yearly count regression and forecasts.

pub mod classifier;
pub mod probability;
pub mod trend;

pub use classifier::{classify, ClassifiedSeries, DroughtScanner, DroughtSpell, EventOccurrence, EventSet};
pub use probability::{window_probability, ProbabilityEngine, ProbabilityResult, SeasonalBucket};
pub use trend::{Confidence, Trend, TrendForecast};
