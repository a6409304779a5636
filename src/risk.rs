//! Scenario comparison and Expected Annual Impact.
//!
//! Hazard extremes come from a [`HazardSource`]; each (location, scenario)
//! series is fitted with the GEV estimator and read at the requested return
//! periods. Damage at each return-period depth comes from the
//! [`DamageEstimator`].
//!
//! EAI integrates damage over annual exceedance probability with the
//! trapezoidal rule between consecutive return periods. No tail beyond the
//! shortest or longest return period is added, so the estimate is a lower
//! bound that tightens as the return-period grid gets denser.

use rayon::prelude::*;
use serde::Serialize;

use crate::config::EngineConfig;
use crate::damage::estimator::DamageEstimator;
use crate::damage::table::{DamageFunctionTable, CURRENCY};
use crate::extremes::{validate_return_period, FitMethod, FitWarning, GevFit, ReturnPeriodCurve, ReturnPeriodEstimator};
use crate::ingest::hazard::HazardSource;
use crate::locations;
use crate::logging::{self, Component};
use crate::model::{BuildingType, Location, Result, RiskError, Scenario};

const DAYS_PER_YEAR: f64 = 365.25;

// ---------------------------------------------------------------------------
// Inputs and results
// ---------------------------------------------------------------------------

/// An exposed asset at a named hazard location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Site {
    /// Hazard lookup key, e.g. a state name.
    pub name: String,
    pub location: Location,
    pub building_type: BuildingType,
    pub area_m2: f64,
}

impl Site {
    pub fn new(name: &str, location: Location, building_type: BuildingType, area_m2: f64) -> Self {
        Site {
            name: name.to_string(),
            location,
            building_type,
            area_m2,
        }
    }

    /// A registry location holding its share of `national_area_m2`.
    pub fn from_registry(name: &str, building_type: BuildingType, national_area_m2: f64) -> Option<Self> {
        let entry = locations::find_location(name)?;
        Some(Site::new(
            entry.name,
            entry.damage_location(),
            building_type,
            national_area_m2 * entry.exposure_share,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioComparison {
    pub scenario: Scenario,
    pub location: String,
    pub return_period: f64,
    pub intensity: f64,
    pub annual_probability: f64,
    /// Change against the historical intensity; `None` without a usable
    /// historical baseline.
    pub intensity_change_pct: Option<f64>,
    pub fit_method: FitMethod,
    pub warnings: Vec<FitWarning>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnPeriodImpact {
    pub return_period: f64,
    pub exceedance_probability: f64,
    pub depth_m: f64,
    /// The fitted intensity was negative and was raised to zero depth.
    pub intensity_clipped: bool,
    pub damage_ratio: f64,
    pub damage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EaiResult {
    pub location: String,
    pub scenario: Scenario,
    pub exposure: f64,
    pub expected_annual_impact: f64,
    pub eai_ratio: f64,
    /// Allowed, but unusual enough to be surfaced.
    pub exceeds_exposure: bool,
    pub currency: &'static str,
    pub impacts: Vec<ReturnPeriodImpact>,
    pub fit_method: FitMethod,
    pub warnings: Vec<FitWarning>,
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Probability that a `return_period` event occurs at least once within
/// `window_days`.
pub fn window_exceedance_probability(return_period: f64, window_days: f64) -> Result<f64> {
    validate_return_period(return_period)?;
    if !window_days.is_finite() || window_days < 0.0 {
        return Err(RiskError::InvalidInput(format!(
            "window_days must be a finite value >= 0, got {}",
            window_days
        )));
    }
    let annual = 1.0 / return_period;
    Ok((1.0 - (1.0 - annual).powf(window_days / DAYS_PER_YEAR)).clamp(0.0, 1.0))
}

/// Trapezoidal integral of damage over exceedance probability. Points are
/// `(exceedance_probability, damage)` in any order.
pub fn trapezoid_eai(points: &[(f64, f64)]) -> f64 {
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
    sorted
        .windows(2)
        .map(|w| 0.5 * (w[1].0 - w[0].0) * (w[0].1 + w[1].1))
        .sum::<f64>()
        .max(0.0)
}

fn sorted_periods(return_periods: &[f64], min_len: usize) -> Result<Vec<f64>> {
    for &t in return_periods {
        validate_return_period(t)?;
    }
    let mut periods = return_periods.to_vec();
    periods.sort_by(f64::total_cmp);
    periods.dedup();
    if periods.len() < min_len {
        return Err(RiskError::InvalidInput(format!(
            "at least {} distinct return periods are required, got {}",
            min_len,
            periods.len()
        )));
    }
    Ok(periods)
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

pub struct RiskAggregator<'a> {
    hazard: &'a dyn HazardSource,
    estimator: DamageEstimator<'a>,
    extremes: ReturnPeriodEstimator,
    eai_return_periods: Vec<f64>,
}

impl<'a> RiskAggregator<'a> {
    pub fn new(hazard: &'a dyn HazardSource, estimator: DamageEstimator<'a>) -> Self {
        let defaults = EngineConfig::default();
        RiskAggregator {
            hazard,
            estimator,
            extremes: ReturnPeriodEstimator::from_config(&defaults.extremes),
            eai_return_periods: defaults.risk.eai_return_periods,
        }
    }

    pub fn from_config(hazard: &'a dyn HazardSource, table: &'a DamageFunctionTable, config: &EngineConfig) -> Self {
        RiskAggregator {
            hazard,
            estimator: DamageEstimator::new(table).with_global_fallback(config.risk.fallback_to_global),
            extremes: ReturnPeriodEstimator::from_config(&config.extremes),
            eai_return_periods: config.risk.eai_return_periods.clone(),
        }
    }

    pub fn with_return_periods(mut self, return_periods: Vec<f64>) -> Self {
        self.eai_return_periods = return_periods;
        self
    }

    /// GEV fit of the hazard series for (location, scenario).
    pub fn fit_scenario(&self, location: &str, scenario: Scenario) -> Result<GevFit> {
        let extremes = self.hazard.annual_extremes(location, scenario)?;
        self.extremes.fit(&extremes)
    }

    /// Return-period curve for (location, scenario) over the configured
    /// `extremes.curve_return_periods`.
    pub fn scenario_curve(&self, location: &str, scenario: Scenario) -> Result<ReturnPeriodCurve> {
        let fit = self.fit_scenario(location, scenario)?;
        self.extremes.standard_curve(&fit)
    }

    /// Intensity at `return_period` under each scenario, in the order given.
    /// Any failing scenario fails the whole comparison.
    pub fn compare_scenarios(
        &self,
        location: &str,
        return_period: f64,
        scenarios: &[Scenario],
    ) -> Result<Vec<ScenarioComparison>> {
        validate_return_period(return_period)?;
        if scenarios.is_empty() {
            return Err(RiskError::InvalidInput("no scenarios to compare".to_string()));
        }

        let fitted: Vec<Result<(Scenario, GevFit, f64)>> = scenarios
            .par_iter()
            .map(|&scenario| {
                let fit = self.fit_scenario(location, scenario)?;
                let intensity = fit.intensity_for_return_period(return_period)?;
                Ok((scenario, fit, intensity))
            })
            .collect();
        let fitted = fitted.into_iter().collect::<Result<Vec<_>>>()?;

        let baseline = fitted
            .iter()
            .find(|(scenario, _, _)| *scenario == Scenario::Historical)
            .map(|(_, _, intensity)| *intensity)
            .filter(|intensity| *intensity != 0.0);
        if baseline.is_none() {
            logging::debug(
                Component::Risk,
                Some(location),
                "no usable historical baseline; change percentages omitted",
            );
        }

        Ok(fitted
            .into_iter()
            .map(|(scenario, fit, intensity)| ScenarioComparison {
                scenario,
                location: location.trim().to_string(),
                return_period,
                intensity,
                annual_probability: 1.0 / return_period,
                intensity_change_pct: baseline.map(|base| (intensity - base) / base * 100.0),
                fit_method: fit.method,
                warnings: fit.warnings,
            })
            .collect())
    }

    /// EAI over the configured return periods.
    pub fn expected_annual_impact(&self, site: &Site, scenario: Scenario) -> Result<EaiResult> {
        self.expected_annual_impact_for(site, scenario, &self.eai_return_periods)
    }

    /// EAI over the return periods recommended for the site's location.
    pub fn expected_annual_impact_auto(&self, site: &Site, scenario: Scenario) -> Result<EaiResult> {
        self.expected_annual_impact_for(site, scenario, locations::automatic_return_periods(&site.name))
    }

    pub fn expected_annual_impact_for(
        &self,
        site: &Site,
        scenario: Scenario,
        return_periods: &[f64],
    ) -> Result<EaiResult> {
        let periods = sorted_periods(return_periods, 2)?;
        let fit = self.fit_scenario(&site.name, scenario)?;
        let curve = fit.curve(&periods)?;

        let mut warnings = fit.warnings.clone();
        if curve.monotonicity_enforced {
            warnings.push(FitWarning::MonotonicityEnforced {
                adjusted_points: curve.adjusted_points,
            });
        }

        let mut impacts = Vec::with_capacity(curve.len());
        let mut exposure = 0.0;
        for point in curve.points() {
            let intensity_clipped = point.intensity < 0.0;
            let depth_m = point.intensity.max(0.0);
            if intensity_clipped {
                logging::warn(
                    Component::Risk,
                    Some(&site.name),
                    &format!(
                        "{} {}-year intensity {:.3} is negative; using zero depth",
                        scenario, point.return_period, point.intensity
                    ),
                );
            }

            let estimate = self
                .estimator
                .estimate(depth_m, &site.location, site.building_type, site.area_m2)?;
            exposure = estimate.total_value;
            impacts.push(ReturnPeriodImpact {
                return_period: point.return_period,
                exceedance_probability: point.annual_exceedance_probability,
                depth_m,
                intensity_clipped,
                damage_ratio: estimate.damage_ratio,
                damage: estimate.economic_damage,
            });
        }

        let pairs: Vec<(f64, f64)> = impacts
            .iter()
            .map(|i| (i.exceedance_probability, i.damage))
            .collect();
        let eai = trapezoid_eai(&pairs);
        let eai_ratio = if exposure > 0.0 { eai / exposure } else { 0.0 };
        let exceeds_exposure = eai > exposure;

        if exceeds_exposure {
            logging::warn(
                Component::Risk,
                Some(&site.name),
                &format!("EAI {:.2} exceeds exposure {:.2} under {}", eai, exposure, scenario),
            );
        }
        logging::info(
            Component::Risk,
            Some(&site.name),
            &format!(
                "{} EAI {:.2} {} ({:.4}% of exposure) over {} return periods",
                scenario,
                eai,
                CURRENCY,
                eai_ratio * 100.0,
                impacts.len()
            ),
        );

        Ok(EaiResult {
            location: site.name.clone(),
            scenario,
            exposure,
            expected_annual_impact: eai,
            eai_ratio,
            exceeds_exposure,
            currency: CURRENCY,
            impacts,
            fit_method: fit.method,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extremes::GevParams;
    use crate::ingest::hazard::HazardTable;
    use approx::assert_relative_eq;

    fn sample(location: f64, scale: f64) -> Vec<f64> {
        let params = GevParams::new(location, scale, 0.0).unwrap();
        (1..=30)
            .map(|i| params.quantile((i as f64 - 0.44) / 30.12))
            .collect()
    }

    fn hazard() -> HazardTable {
        let mut table = HazardTable::new();
        table.insert("Kelantan", Scenario::Historical, sample(1.0, 0.3)).unwrap();
        table.insert("Kelantan", Scenario::Rcp45, sample(1.25, 0.35)).unwrap();
        table.insert("Kelantan", Scenario::Rcp85, sample(1.5, 0.4)).unwrap();
        table.insert("Johor", Scenario::Rcp85, sample(0.8, 0.2)).unwrap();
        table
    }

    #[test]
    fn test_window_exceedance_probability() {
        assert_relative_eq!(window_exceedance_probability(100.0, 365.25).unwrap(), 0.01, epsilon = 1e-12);
        assert_eq!(window_exceedance_probability(10.0, 0.0).unwrap(), 0.0);
        let thirty_years = window_exceedance_probability(100.0, 30.0 * 365.25).unwrap();
        assert_relative_eq!(thirty_years, 1.0 - 0.99_f64.powi(30), epsilon = 1e-12);
        assert!(window_exceedance_probability(1.0, 10.0).is_err());
        assert!(window_exceedance_probability(10.0, -1.0).is_err());
    }

    #[test]
    fn test_trapezoid_eai() {
        // Damage 100 at p=0.5 and 300 at p=0.1: 0.5 * 0.4 * 400 = 80.
        assert_relative_eq!(trapezoid_eai(&[(0.1, 300.0), (0.5, 100.0)]), 80.0, epsilon = 1e-12);
        assert_eq!(trapezoid_eai(&[(0.1, 300.0)]), 0.0);
    }

    #[test]
    fn test_scenario_curve_uses_configured_grid() {
        let hazard = hazard();
        let table = DamageFunctionTable::bundled().unwrap();
        let mut config = EngineConfig::default();
        config.extremes.curve_return_periods = vec![5.0, 50.0, 500.0];
        let aggregator = RiskAggregator::from_config(&hazard, &table, &config);

        let curve = aggregator.scenario_curve("Kelantan", Scenario::Rcp85).unwrap();
        let periods: Vec<f64> = curve.points().iter().map(|p| p.return_period).collect();
        assert_eq!(periods, vec![5.0, 50.0, 500.0]);
        assert!(curve.points().windows(2).all(|w| w[0].intensity <= w[1].intensity));

        assert!(matches!(
            aggregator.scenario_curve("Johor", Scenario::Historical),
            Err(RiskError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_historical_against_itself_is_zero_change() {
        let hazard = hazard();
        let table = DamageFunctionTable::bundled().unwrap();
        let aggregator = RiskAggregator::new(&hazard, DamageEstimator::new(&table));

        let rows = aggregator
            .compare_scenarios("Kelantan", 100.0, &[Scenario::Historical])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].intensity_change_pct, Some(0.0));
        assert_relative_eq!(rows[0].annual_probability, 0.01);
    }

    #[test]
    fn test_scenarios_keep_order_and_rise_with_forcing() {
        let hazard = hazard();
        let table = DamageFunctionTable::bundled().unwrap();
        let aggregator = RiskAggregator::new(&hazard, DamageEstimator::new(&table));

        let rows = aggregator
            .compare_scenarios(
                "Kelantan",
                50.0,
                &[Scenario::Rcp85, Scenario::Historical, Scenario::Rcp45],
            )
            .unwrap();
        let order: Vec<Scenario> = rows.iter().map(|r| r.scenario).collect();
        assert_eq!(order, vec![Scenario::Rcp85, Scenario::Historical, Scenario::Rcp45]);
        assert!(rows[0].intensity_change_pct.unwrap() > rows[2].intensity_change_pct.unwrap());
        assert!(rows[2].intensity_change_pct.unwrap() > 0.0);
    }

    #[test]
    fn test_missing_baseline_omits_change() {
        let hazard = hazard();
        let table = DamageFunctionTable::bundled().unwrap();
        let aggregator = RiskAggregator::new(&hazard, DamageEstimator::new(&table));

        let rows = aggregator.compare_scenarios("Johor", 100.0, &[Scenario::Rcp85]).unwrap();
        assert_eq!(rows[0].intensity_change_pct, None);

        let missing = aggregator.compare_scenarios("Johor", 100.0, &[Scenario::Rcp85, Scenario::Historical]);
        assert!(matches!(missing, Err(RiskError::InsufficientData { .. })));
        assert!(aggregator.compare_scenarios("Johor", 1.0, &[Scenario::Rcp85]).is_err());
    }

    #[test]
    fn test_eai_is_bounded_and_grows_with_scenario() {
        let hazard = hazard();
        let table = DamageFunctionTable::bundled().unwrap();
        let aggregator = RiskAggregator::new(&hazard, DamageEstimator::new(&table));
        let site = Site::new("Kelantan", Location::country("MY"), BuildingType::Residential, 1_000.0);

        let historical = aggregator.expected_annual_impact(&site, Scenario::Historical).unwrap();
        let rcp85 = aggregator.expected_annual_impact(&site, Scenario::Rcp85).unwrap();

        assert_relative_eq!(historical.exposure, 316_200.0, epsilon = 1e-6);
        assert!(historical.expected_annual_impact > 0.0);
        assert!(!historical.exceeds_exposure);
        assert!(historical.eai_ratio < 1.0);
        assert_eq!(historical.impacts.len(), 9);
        assert!(rcp85.expected_annual_impact > historical.expected_annual_impact);
        assert!(historical
            .impacts
            .windows(2)
            .all(|w| w[0].damage <= w[1].damage));
    }

    #[test]
    fn test_eai_matches_manual_trapezoid() {
        let hazard = hazard();
        let table = DamageFunctionTable::bundled().unwrap();
        let aggregator = RiskAggregator::new(&hazard, DamageEstimator::new(&table));
        let site = Site::new("Kelantan", Location::country("MY"), BuildingType::Commercial, 200.0);

        let result = aggregator
            .expected_annual_impact_for(&site, Scenario::Historical, &[10.0, 100.0])
            .unwrap();
        let (a, b) = (&result.impacts[0], &result.impacts[1]);
        assert_relative_eq!(
            result.expected_annual_impact,
            0.5 * (0.1 - 0.01) * (a.damage + b.damage),
            epsilon = 1e-9
        );
        assert!(aggregator
            .expected_annual_impact_for(&site, Scenario::Historical, &[10.0])
            .is_err());
    }

    #[test]
    fn test_negative_intensity_is_clipped_and_flagged() {
        let mut hazard = HazardTable::new();
        hazard
            .insert("Dry", Scenario::Historical, sample(-5.0, 0.5))
            .unwrap();
        let table = DamageFunctionTable::bundled().unwrap();
        let aggregator = RiskAggregator::new(&hazard, DamageEstimator::new(&table));
        let site = Site::new("Dry", Location::country("MY"), BuildingType::Residential, 100.0);

        let result = aggregator
            .expected_annual_impact_for(&site, Scenario::Historical, &[2.0, 10.0])
            .unwrap();
        assert!(result.impacts.iter().all(|i| i.intensity_clipped && i.depth_m == 0.0));
        assert_eq!(result.expected_annual_impact, 0.0);
    }

    #[test]
    fn test_registry_site_and_automatic_periods() {
        let site = Site::from_registry("kelantan", BuildingType::Residential, 10_000.0).unwrap();
        assert_eq!(site.name, "Kelantan");
        assert_relative_eq!(site.area_m2, 600.0);
        assert!(Site::from_registry("Atlantis", BuildingType::Residential, 1.0).is_none());

        let hazard = hazard();
        let table = DamageFunctionTable::bundled().unwrap();
        let aggregator = RiskAggregator::new(&hazard, DamageEstimator::new(&table));
        let result = aggregator.expected_annual_impact_auto(&site, Scenario::Rcp45).unwrap();
        let periods: Vec<f64> = result.impacts.iter().map(|i| i.return_period).collect();
        assert_eq!(periods, vec![5.0, 10.0, 25.0, 50.0, 100.0]);
    }
}
