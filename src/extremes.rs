//! Return-period estimation from annual extremes.
//!
//! A Generalized Extreme Value distribution is fitted by maximum likelihood
//! (Nelder-Mead over location, log-scale and shape). When the optimiser
//! does not converge, or converges to an unusable point, the Gumbel
//! method-of-moments estimate is used instead and the fallback is recorded
//! in the result's warnings.
//!
//! Shape convention: `shape > 0` is the heavy-tailed (Fréchet) case,
//! `shape < 0` has a finite upper bound, `shape == 0` is Gumbel.

use std::f64::consts::PI;

use chrono::Datelike;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::{ExtremesConfig, DEFAULT_RETURN_PERIODS};
use crate::logging::{self, Component};
use crate::model::{HistoricalSeries, Result, RiskError};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;
/// Below this magnitude the shape is treated as exactly Gumbel.
const GUMBEL_EPS: f64 = 1e-8;
/// MLE shapes at or beyond this magnitude are rejected.
const MAX_ABS_SHAPE: f64 = 1.0;
/// 5% Kolmogorov-Smirnov critical value coefficient.
const KS_CRITICAL_5PCT: f64 = 1.36;

// ---------------------------------------------------------------------------
// Distribution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GevParams {
    pub location: f64,
    pub scale: f64,
    pub shape: f64,
}

impl GevParams {
    pub fn new(location: f64, scale: f64, shape: f64) -> Result<Self> {
        if !location.is_finite() || !shape.is_finite() || !scale.is_finite() || scale <= 0.0 {
            return Err(RiskError::InvalidInput(format!(
                "invalid GEV parameters (location {}, scale {}, shape {})",
                location, scale, shape
            )));
        }
        Ok(GevParams { location, scale, shape })
    }

    fn is_gumbel(&self) -> bool {
        self.shape.abs() < GUMBEL_EPS
    }

    pub fn cdf(&self, x: f64) -> f64 {
        let z = (x - self.location) / self.scale;
        if self.is_gumbel() {
            return (-(-z).exp()).exp();
        }
        let xi_z = self.shape * z;
        if 1.0 + xi_z <= 0.0 {
            // Outside the support: below the lower bound for a heavy tail,
            // above the upper bound for a bounded one.
            return if self.shape > 0.0 { 0.0 } else { 1.0 };
        }
        (-(-xi_z.ln_1p() / self.shape).exp()).exp()
    }

    /// Inverse CDF for `0 < p < 1`.
    pub fn quantile(&self, p: f64) -> f64 {
        let y = -(-p.ln()).ln();
        if self.is_gumbel() {
            self.location + self.scale * y
        } else {
            self.location + self.scale * (self.shape * y).exp_m1() / self.shape
        }
    }

    /// The intensity exceeded on average once every `return_period` years.
    pub fn intensity_for_return_period(&self, return_period: f64) -> Result<f64> {
        validate_return_period(return_period)?;
        Ok(self.quantile(1.0 - 1.0 / return_period))
    }

    /// Negative log-likelihood of `data`; `+inf` when any value lies
    /// outside the support.
    pub fn neg_log_likelihood(&self, data: &[f64]) -> f64 {
        let n = data.len() as f64;
        let mut nll = n * self.scale.ln();

        if self.is_gumbel() {
            for &x in data {
                let z = (x - self.location) / self.scale;
                nll += z + (-z).exp();
            }
        } else {
            let xi = self.shape;
            for &x in data {
                let xi_z = xi * (x - self.location) / self.scale;
                if 1.0 + xi_z <= 0.0 {
                    return f64::INFINITY;
                }
                let log_t = xi_z.ln_1p();
                nll += (1.0 + 1.0 / xi) * log_t + (-log_t / xi).exp();
            }
        }

        if nll.is_nan() { f64::INFINITY } else { nll }
    }
}

pub fn validate_return_period(return_period: f64) -> Result<()> {
    if !return_period.is_finite() || return_period <= 1.0 {
        return Err(RiskError::InvalidInput(format!(
            "return period must be finite and greater than 1 year, got {}",
            return_period
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Fit results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FitMethod {
    MaximumLikelihood,
    /// Gumbel method of moments (shape fixed at 0).
    MethodOfMoments,
}

/// Non-fatal problems that travel with a fit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FitWarning {
    ShortRecord { observations: usize, recommended: usize },
    MleDidNotConverge { iterations: usize },
    MleRejected { reason: String },
    MonotonicityEnforced { adjusted_points: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FitQuality {
    /// KS statistic below the 5% critical value.
    Good,
    Moderate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GevFit {
    pub params: GevParams,
    pub method: FitMethod,
    pub observations: usize,
    pub log_likelihood: f64,
    pub ks_statistic: f64,
    pub fit_quality: FitQuality,
    pub warnings: Vec<FitWarning>,
}

impl GevFit {
    pub fn intensity_for_return_period(&self, return_period: f64) -> Result<f64> {
        self.params.intensity_for_return_period(return_period)
    }

    /// True when nothing about the fit calls for caution.
    pub fn is_reliable(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Intensities for `return_periods`, sorted ascending and deduplicated.
    pub fn curve(&self, return_periods: &[f64]) -> Result<ReturnPeriodCurve> {
        let mut periods = return_periods.to_vec();
        for &t in &periods {
            validate_return_period(t)?;
        }
        periods.sort_by(f64::total_cmp);
        periods.dedup();

        let mut intensities = periods
            .iter()
            .map(|&t| self.params.intensity_for_return_period(t))
            .collect::<Result<Vec<f64>>>()?;
        let adjusted = cumulative_max(&mut intensities);

        if adjusted > 0 {
            logging::warn(
                Component::Extremes,
                None,
                &format!("return period curve not monotone; {} points raised", adjusted),
            );
        }

        let points = periods
            .into_iter()
            .zip(intensities)
            .map(|(return_period, intensity)| CurvePoint {
                return_period,
                annual_exceedance_probability: 1.0 / return_period,
                intensity,
            })
            .collect();

        Ok(ReturnPeriodCurve {
            points,
            monotonicity_enforced: adjusted > 0,
            adjusted_points: adjusted,
        })
    }
}

// ---------------------------------------------------------------------------
// Curves
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CurvePoint {
    pub return_period: f64,
    pub annual_exceedance_probability: f64,
    pub intensity: f64,
}

/// Intensity by return period, ascending in both.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnPeriodCurve {
    points: Vec<CurvePoint>,
    /// Set when a cumulative-max pass had to raise any point.
    pub monotonicity_enforced: bool,
    pub adjusted_points: usize,
}

impl ReturnPeriodCurve {
    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn intensity_at(&self, return_period: f64) -> Option<f64> {
        self.points
            .iter()
            .find(|p| p.return_period == return_period)
            .map(|p| p.intensity)
    }
}

/// Raises each value to the running maximum. Returns how many changed.
fn cumulative_max(values: &mut [f64]) -> usize {
    let mut running = f64::NEG_INFINITY;
    let mut adjusted = 0;
    for v in values.iter_mut() {
        if *v < running {
            *v = running;
            adjusted += 1;
        } else {
            running = *v;
        }
    }
    adjusted
}

// ---------------------------------------------------------------------------
// Optimiser
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Minimum<const N: usize> {
    pub point: [f64; N],
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

const NM_REFLECT: f64 = 1.0;
const NM_EXPAND: f64 = 2.0;
const NM_CONTRACT: f64 = 0.5;
const NM_SHRINK: f64 = 0.5;
const NM_XTOL: f64 = 1e-7;
const NM_FTOL: f64 = 1e-9;

/// Nelder-Mead simplex minimisation. NaN objective values count as `+inf`.
pub fn nelder_mead<const N: usize, F>(f: F, start: [f64; N], step: [f64; N], max_iterations: usize) -> Minimum<N>
where
    F: Fn(&[f64; N]) -> f64,
{
    let eval = |x: &[f64; N]| {
        let v = f(x);
        if v.is_nan() { f64::INFINITY } else { v }
    };

    let mut simplex: Vec<([f64; N], f64)> = Vec::with_capacity(N + 1);
    simplex.push((start, eval(&start)));
    for i in 0..N {
        let mut vertex = start;
        vertex[i] += step[i];
        simplex.push((vertex, eval(&vertex)));
    }

    let mut iterations = 0;
    let mut converged = false;
    loop {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        if simplex_converged(&simplex) {
            converged = true;
            break;
        }
        if iterations >= max_iterations {
            break;
        }
        iterations += 1;

        let mut centroid = [0.0; N];
        for (vertex, _) in &simplex[..N] {
            for i in 0..N {
                centroid[i] += vertex[i] / N as f64;
            }
        }
        let worst = simplex[N];
        let along = |coef: f64| {
            let mut p = [0.0; N];
            for i in 0..N {
                p[i] = centroid[i] + coef * (worst.0[i] - centroid[i]);
            }
            p
        };

        let reflected = along(-NM_REFLECT);
        let f_reflected = eval(&reflected);

        if f_reflected < simplex[0].1 {
            let expanded = along(-NM_EXPAND);
            let f_expanded = eval(&expanded);
            simplex[N] = if f_expanded < f_reflected {
                (expanded, f_expanded)
            } else {
                (reflected, f_reflected)
            };
        } else if f_reflected < simplex[N - 1].1 {
            simplex[N] = (reflected, f_reflected);
        } else {
            // Outside contraction when the reflection helped at all,
            // inside contraction otherwise.
            let coef = if f_reflected < worst.1 { -NM_CONTRACT } else { NM_CONTRACT };
            let contracted = along(coef);
            let f_contracted = eval(&contracted);
            if f_contracted < f_reflected.min(worst.1) {
                simplex[N] = (contracted, f_contracted);
            } else {
                let best = simplex[0].0;
                for vertex in simplex.iter_mut().skip(1) {
                    for i in 0..N {
                        vertex.0[i] = best[i] + NM_SHRINK * (vertex.0[i] - best[i]);
                    }
                    vertex.1 = eval(&vertex.0);
                }
            }
        }
    }

    let (point, value) = simplex[0];
    Minimum {
        point,
        value,
        iterations,
        converged,
    }
}

fn simplex_converged<const N: usize>(simplex: &[([f64; N], f64)]) -> bool {
    let best = &simplex[0];
    if !best.1.is_finite() {
        return false;
    }
    let f_spread = simplex.iter().map(|v| (v.1 - best.1).abs()).fold(0.0, f64::max);
    let x_spread = simplex
        .iter()
        .flat_map(|v| v.0.iter().zip(best.0.iter()).map(|(a, b)| (a - b).abs()))
        .fold(0.0, f64::max);
    f_spread <= NM_FTOL && x_spread <= NM_XTOL
}

// ---------------------------------------------------------------------------
// Estimator
// ---------------------------------------------------------------------------

/// Gumbel method-of-moments estimate on raw values.
pub fn gumbel_moments(data: &[f64]) -> Option<GevParams> {
    if data.len() < 2 {
        return None;
    }
    let n = data.len() as f64;
    let mean = data.iter().sum::<f64>() / n;
    let variance = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let scale = 6.0_f64.sqrt() * variance.sqrt() / PI;
    GevParams::new(mean - EULER_GAMMA * scale, scale, 0.0).ok()
}

/// Kolmogorov-Smirnov distance between the sample and `params`.
pub fn ks_statistic(data: &[f64], params: &GevParams) -> f64 {
    let mut sorted = data.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len() as f64;
    sorted
        .iter()
        .enumerate()
        .map(|(i, &x)| {
            let f = params.cdf(x);
            let upper = (i as f64 + 1.0) / n - f;
            let lower = f - i as f64 / n;
            upper.max(lower)
        })
        .fold(0.0, f64::max)
}

#[derive(Debug, Clone)]
pub struct ReturnPeriodEstimator {
    min_reliable_observations: usize,
    max_iterations: usize,
    curve_return_periods: Vec<f64>,
}

impl Default for ReturnPeriodEstimator {
    fn default() -> Self {
        Self::from_config(&ExtremesConfig::default())
    }
}

impl ReturnPeriodEstimator {
    pub fn new(min_reliable_observations: usize, max_iterations: usize) -> Self {
        ReturnPeriodEstimator {
            min_reliable_observations,
            max_iterations,
            curve_return_periods: DEFAULT_RETURN_PERIODS.to_vec(),
        }
    }

    pub fn from_config(config: &ExtremesConfig) -> Self {
        Self::new(config.min_reliable_observations, config.max_iterations)
            .with_curve_periods(config.curve_return_periods.clone())
    }

    /// Return periods used by [`standard_curve`](Self::standard_curve).
    pub fn with_curve_periods(mut self, return_periods: Vec<f64>) -> Self {
        self.curve_return_periods = return_periods;
        self
    }

    pub fn curve_periods(&self) -> &[f64] {
        &self.curve_return_periods
    }

    /// Curve of `fit` over the configured return periods.
    pub fn standard_curve(&self, fit: &GevFit) -> Result<ReturnPeriodCurve> {
        fit.curve(&self.curve_return_periods)
    }

    /// Fits a GEV to `values`, typically one maximum per year.
    ///
    /// Fails on non-finite input or fewer than two distinct values. Short
    /// records still fit, with a `ShortRecord` warning.
    pub fn fit(&self, values: &[f64]) -> Result<GevFit> {
        if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(RiskError::InvalidInput(format!(
                "extreme values must be finite, found {}",
                bad
            )));
        }

        let mut distinct = values.to_vec();
        distinct.sort_by(f64::total_cmp);
        distinct.dedup();
        if distinct.len() < 2 {
            return Err(RiskError::InsufficientData {
                what: "GEV fit (distinct extreme values)".to_string(),
                required: 2,
                found: distinct.len(),
            });
        }

        let mut warnings = Vec::new();
        if values.len() < self.min_reliable_observations {
            warnings.push(FitWarning::ShortRecord {
                observations: values.len(),
                recommended: self.min_reliable_observations,
            });
            logging::warn(
                Component::Extremes,
                None,
                &format!(
                    "fitting {} observations; at least {} are needed for a reliable fit",
                    values.len(),
                    self.min_reliable_observations
                ),
            );
        }

        let moments = gumbel_moments(values).ok_or_else(|| RiskError::InsufficientData {
            what: "GEV fit (observations)".to_string(),
            required: 2,
            found: values.len(),
        })?;

        let (params, method) = match self.maximum_likelihood(values) {
            Ok(params) => (params, FitMethod::MaximumLikelihood),
            Err(warning) => {
                logging::warn(
                    Component::Extremes,
                    None,
                    &format!("MLE unusable ({:?}); using Gumbel method of moments", warning),
                );
                warnings.push(warning);
                (moments, FitMethod::MethodOfMoments)
            }
        };

        let ks = ks_statistic(values, &params);
        let fit_quality = if ks < KS_CRITICAL_5PCT / (values.len() as f64).sqrt() {
            FitQuality::Good
        } else {
            FitQuality::Moderate
        };

        logging::debug(
            Component::Extremes,
            None,
            &format!(
                "{:?} fit on {} values: location {:.3}, scale {:.3}, shape {:.4}, KS {:.4}",
                method,
                values.len(),
                params.location,
                params.scale,
                params.shape,
                ks
            ),
        );

        Ok(GevFit {
            params,
            method,
            observations: values.len(),
            log_likelihood: -params.neg_log_likelihood(values),
            ks_statistic: ks,
            fit_quality,
            warnings,
        })
    }

    /// MLE in standardised units, mapped back to the data scale.
    fn maximum_likelihood(&self, values: &[f64]) -> std::result::Result<GevParams, FitWarning> {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let sd = (values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt();
        let standardised: Vec<f64> = values.iter().map(|x| (x - mean) / sd).collect();

        let scale0 = 6.0_f64.sqrt() / PI;
        let start = [-EULER_GAMMA * scale0, scale0.ln(), 0.0];

        let objective = |theta: &[f64; 3]| match GevParams::new(theta[0], theta[1].exp(), theta[2]) {
            Ok(params) => params.neg_log_likelihood(&standardised),
            Err(_) => f64::INFINITY,
        };
        let minimum = nelder_mead(objective, start, [0.2, 0.2, 0.1], self.max_iterations);

        if !minimum.converged {
            return Err(FitWarning::MleDidNotConverge {
                iterations: minimum.iterations,
            });
        }
        let [loc, log_scale, shape] = minimum.point;
        if !minimum.value.is_finite() {
            return Err(FitWarning::MleRejected {
                reason: "likelihood is not finite at the optimum".to_string(),
            });
        }
        if shape.abs() >= MAX_ABS_SHAPE {
            return Err(FitWarning::MleRejected {
                reason: format!("shape {:.3} outside (-1, 1)", shape),
            });
        }

        GevParams::new(mean + sd * loc, sd * log_scale.exp(), shape).map_err(|e| FitWarning::MleRejected {
            reason: e.to_string(),
        })
    }

    /// Fits each sample independently in parallel; results keep input order.
    pub fn fit_many<S>(&self, samples: &[S]) -> Vec<Result<GevFit>>
    where
        S: AsRef<[f64]> + Sync,
    {
        samples.par_iter().map(|sample| self.fit(sample.as_ref())).collect()
    }
}

// ---------------------------------------------------------------------------
// Annual maxima
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnnualMaximum {
    pub year: i32,
    pub rainfall_mm: f64,
    /// Days with a rainfall value in that year.
    pub observed_days: usize,
}

/// Largest daily rainfall per calendar year. Years without any rainfall
/// value are skipped.
pub fn annual_maxima(series: &HistoricalSeries) -> Vec<AnnualMaximum> {
    let mut maxima: Vec<AnnualMaximum> = Vec::new();
    for record in series.records() {
        let Some(rain) = record.rainfall_mm else {
            continue;
        };
        let year = record.date.year();
        match maxima.last_mut() {
            Some(last) if last.year == year => {
                last.rainfall_mm = last.rainfall_mm.max(rain);
                last.observed_days += 1;
            }
            _ => maxima.push(AnnualMaximum {
                year,
                rainfall_mm: rain,
                observed_days: 1,
            }),
        }
    }
    maxima
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    /// Sample placed at Gringorten plotting positions of a known GEV.
    fn synthetic_sample(params: &GevParams, n: usize) -> Vec<f64> {
        (1..=n)
            .map(|i| params.quantile((i as f64 - 0.44) / (n as f64 + 0.12)))
            .collect()
    }

    #[test]
    fn test_gumbel_quantile_matches_closed_form() {
        let params = GevParams::new(0.0, 1.0, 0.0).unwrap();
        let x = params.intensity_for_return_period(100.0).unwrap();
        assert_relative_eq!(x, -(-(0.99_f64).ln()).ln(), epsilon = 1e-12);
        assert_relative_eq!(x, 4.600149226, epsilon = 1e-8);
    }

    #[test]
    fn test_cdf_inverts_quantile() {
        for shape in [-0.3, -0.05, 0.0, 0.1, 0.4] {
            let params = GevParams::new(120.0, 30.0, shape).unwrap();
            for p in [0.01, 0.3, 0.5, 0.9, 0.999] {
                assert_relative_eq!(params.cdf(params.quantile(p)), p, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_cdf_outside_support() {
        let heavy = GevParams::new(0.0, 1.0, 0.5).unwrap();
        assert_eq!(heavy.cdf(-10.0), 0.0);
        let bounded = GevParams::new(0.0, 1.0, -0.5).unwrap();
        assert_eq!(bounded.cdf(10.0), 1.0);
        assert_eq!(bounded.neg_log_likelihood(&[0.0, 10.0]), f64::INFINITY);
    }

    #[test]
    fn test_invalid_return_periods() {
        let params = GevParams::new(0.0, 1.0, 0.0).unwrap();
        assert!(params.intensity_for_return_period(1.0).is_err());
        assert!(params.intensity_for_return_period(0.5).is_err());
        assert!(params.intensity_for_return_period(f64::INFINITY).is_err());
    }

    #[test]
    fn test_nelder_mead_finds_quadratic_minimum() {
        let minimum = nelder_mead(
            |x: &[f64; 2]| (x[0] - 3.0).powi(2) + 2.0 * (x[1] + 1.0).powi(2),
            [0.0, 0.0],
            [1.0, 1.0],
            5000,
        );
        assert!(minimum.converged);
        assert_relative_eq!(minimum.point[0], 3.0, epsilon = 1e-4);
        assert_relative_eq!(minimum.point[1], -1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_mle_recovers_known_parameters() {
        let truth = GevParams::new(100.0, 25.0, 0.1).unwrap();
        let sample = synthetic_sample(&truth, 200);
        let fit = ReturnPeriodEstimator::default().fit(&sample).unwrap();

        assert_eq!(fit.method, FitMethod::MaximumLikelihood);
        assert!(fit.is_reliable());
        assert_eq!(fit.fit_quality, FitQuality::Good);
        assert_relative_eq!(fit.params.location, 100.0, epsilon = 3.0);
        assert_relative_eq!(fit.params.scale, 25.0, epsilon = 3.0);
        assert_relative_eq!(fit.params.shape, 0.1, epsilon = 0.08);
    }

    #[test]
    fn test_short_record_warns_but_fits() {
        let fit = ReturnPeriodEstimator::default()
            .fit(&[110.0, 140.0, 95.0, 180.0, 123.0])
            .unwrap();
        assert!(fit.warnings.contains(&FitWarning::ShortRecord {
            observations: 5,
            recommended: 10,
        }));
        assert!(fit.intensity_for_return_period(50.0).unwrap() > 95.0);
    }

    #[test]
    fn test_iteration_cap_falls_back_to_moments() {
        let sample = synthetic_sample(&GevParams::new(80.0, 20.0, 0.0).unwrap(), 30);
        let fit = ReturnPeriodEstimator::new(10, 1).fit(&sample).unwrap();

        assert_eq!(fit.method, FitMethod::MethodOfMoments);
        assert_eq!(fit.params.shape, 0.0);
        assert!(matches!(fit.warnings[0], FitWarning::MleDidNotConverge { iterations: 1 }));
        assert_eq!(Some(fit.params), gumbel_moments(&sample));
    }

    #[test]
    fn test_standard_curve_uses_configured_periods() {
        let sample = synthetic_sample(&GevParams::new(80.0, 20.0, 0.0).unwrap(), 30);

        let estimator = ReturnPeriodEstimator::default();
        let fit = estimator.fit(&sample).unwrap();
        let curve = estimator.standard_curve(&fit).unwrap();
        let periods: Vec<f64> = curve.points().iter().map(|p| p.return_period).collect();
        assert_eq!(periods, DEFAULT_RETURN_PERIODS.to_vec());

        let config = ExtremesConfig {
            curve_return_periods: vec![100.0, 10.0],
            ..ExtremesConfig::default()
        };
        let estimator = ReturnPeriodEstimator::from_config(&config);
        assert_eq!(estimator.curve_periods(), &[100.0, 10.0]);
        let curve = estimator.standard_curve(&fit).unwrap();
        assert_eq!(curve.len(), 2);
        assert_eq!(curve.points()[0].return_period, 10.0);
        assert_eq!(curve.intensity_at(100.0), Some(fit.intensity_for_return_period(100.0).unwrap()));
    }

    #[test]
    fn test_degenerate_input_is_rejected() {
        let estimator = ReturnPeriodEstimator::default();
        assert!(matches!(
            estimator.fit(&[5.0; 12]),
            Err(RiskError::InsufficientData { found: 1, .. })
        ));
        assert!(matches!(estimator.fit(&[]), Err(RiskError::InsufficientData { .. })));
        assert!(matches!(
            estimator.fit(&[1.0, f64::NAN, 3.0]),
            Err(RiskError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_curve_is_sorted_monotone_and_deduplicated() {
        let sample = synthetic_sample(&GevParams::new(150.0, 40.0, -0.1).unwrap(), 40);
        let fit = ReturnPeriodEstimator::default().fit(&sample).unwrap();
        let curve = fit.curve(&[100.0, 2.0, 25.0, 10.0, 25.0]).unwrap();

        let periods: Vec<f64> = curve.points().iter().map(|p| p.return_period).collect();
        assert_eq!(periods, vec![2.0, 10.0, 25.0, 100.0]);
        assert!(curve.points().windows(2).all(|w| w[0].intensity <= w[1].intensity));
        assert!(!curve.monotonicity_enforced);
        assert_relative_eq!(curve.points()[0].annual_exceedance_probability, 0.5);
        assert_eq!(
            curve.intensity_at(25.0),
            Some(fit.intensity_for_return_period(25.0).unwrap())
        );
        assert!(fit.curve(&[10.0, 1.0]).is_err());
    }

    #[test]
    fn test_cumulative_max_counts_adjustments() {
        let mut values = vec![1.0, 3.0, 2.0, 2.5, 4.0];
        assert_eq!(cumulative_max(&mut values), 2);
        assert_eq!(values, vec![1.0, 3.0, 3.0, 3.0, 4.0]);
    }

    #[test]
    fn test_fit_many_keeps_order() {
        let low = synthetic_sample(&GevParams::new(50.0, 10.0, 0.0).unwrap(), 30);
        let high = synthetic_sample(&GevParams::new(500.0, 10.0, 0.0).unwrap(), 30);
        let fits = ReturnPeriodEstimator::default().fit_many(&[low, vec![1.0], high]);

        assert_eq!(fits.len(), 3);
        assert!(fits[0].as_ref().unwrap().params.location < 100.0);
        assert!(fits[1].is_err());
        assert!(fits[2].as_ref().unwrap().params.location > 400.0);
    }

    #[test]
    fn test_annual_maxima_per_year() {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        let records = vec![
            crate::model::DailyRecord::new(d(2019, 1, 1)).with_rainfall(12.0),
            crate::model::DailyRecord::new(d(2019, 11, 20)).with_rainfall(210.0),
            crate::model::DailyRecord::new(d(2020, 2, 2)),
            crate::model::DailyRecord::new(d(2021, 12, 24)).with_rainfall(95.5),
        ];
        let series = HistoricalSeries::new(records).unwrap();
        let maxima = annual_maxima(&series);

        assert_eq!(maxima.len(), 2);
        assert_eq!(maxima[0].year, 2019);
        assert_eq!(maxima[0].rainfall_mm, 210.0);
        assert_eq!(maxima[0].observed_days, 2);
        assert_eq!(maxima[1].year, 2021);
    }
}
