//! Yearly event-count trends.
//!
//! Counts are regressed on year index with ordinary least squares. The
//! trend label uses fixed slope magnitudes (±0.5 events per year), not a
//! significance test.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::analysis::classifier::ClassifiedSeries;
use crate::analysis::probability::window_probability;
use crate::logging::{self, Component};
use crate::model::{EventType, Result, RiskError};

const SLOPE_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// OLS fit of `ys` on `xs`. `None` when fewer than two points are given or
/// all `xs` are equal. A constant `ys` gives `r_squared = 0`.
pub fn linear_regression(xs: &[f64], ys: &[f64]) -> Option<LinearFit> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);
    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;

    let sxx: f64 = xs.iter().map(|x| (x - mean_x).powi(2)).sum();
    if sxx == 0.0 {
        return None;
    }
    let sxy: f64 = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    let ss_tot: f64 = ys.iter().map(|y| (y - mean_y).powi(2)).sum();
    let ss_res: f64 = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (y - (intercept + slope * x)).powi(2))
        .sum();
    let r_squared = if ss_tot == 0.0 {
        0.0
    } else {
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    };

    Some(LinearFit {
        slope,
        intercept,
        r_squared,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

impl Trend {
    pub fn from_slope(slope: f64) -> Self {
        if slope > SLOPE_THRESHOLD {
            Trend::Increasing
        } else if slope < -SLOPE_THRESHOLD {
            Trend::Decreasing
        } else {
            Trend::Stable
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn from_r_squared(r_squared: f64) -> Self {
        if r_squared > 0.7 {
            Confidence::High
        } else if r_squared > 0.4 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

/// Event days counted within one calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct YearCount {
    pub year: i32,
    pub events: usize,
    pub observed_days: usize,
}

impl YearCount {
    /// True when the year has fewer observed days than calendar days.
    pub fn is_partial(&self) -> bool {
        let days_in_year = NaiveDate::from_ymd_opt(self.year, 12, 31)
            .map(|d| d.ordinal() as usize)
            .unwrap_or(365);
        self.observed_days < days_in_year
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendForecast {
    pub event_type: EventType,
    pub years_ahead: u32,
    /// Probability of at least one event within a year, from the whole record.
    pub current_probability: f64,
    /// Same quantity from the extrapolated yearly count.
    pub predicted_probability: f64,
    pub predicted_count: f64,
    pub trend: Trend,
    pub confidence: Confidence,
    pub r_squared: f64,
    pub slope: f64,
    pub yearly_counts: Vec<YearCount>,
    /// Years included in the regression despite incomplete coverage.
    pub partial_years: Vec<i32>,
}

/// Per-year event counts for every year with at least one observation,
/// ascending. Years with observations but no events count as zero.
pub fn yearly_counts(classified: &ClassifiedSeries, event: EventType) -> Vec<YearCount> {
    let mut counts: Vec<YearCount> = Vec::new();
    for day in classified.days() {
        let year = day.date.year();
        let hit = usize::from(day.events.contains(event));
        match counts.last_mut() {
            Some(last) if last.year == year => {
                last.observed_days += 1;
                last.events += hit;
            }
            _ => counts.push(YearCount {
                year,
                events: hit,
                observed_days: 1,
            }),
        }
    }
    counts
}

/// Extrapolates the yearly count of `event` by `years_ahead` years.
///
/// Partial years stay in the regression and are listed in
/// `partial_years`; they lower the reliability of the forecast.
pub fn predict_trend(
    classified: &ClassifiedSeries,
    event: EventType,
    years_ahead: u32,
) -> Result<TrendForecast> {
    let counts = yearly_counts(classified, event);
    if counts.len() < 2 {
        return Err(RiskError::InsufficientData {
            what: format!("{} trend forecast (distinct years)", event),
            required: 2,
            found: counts.len(),
        });
    }

    let first_year = counts[0].year;
    let xs: Vec<f64> = counts.iter().map(|c| f64::from(c.year - first_year)).collect();
    let ys: Vec<f64> = counts.iter().map(|c| c.events as f64).collect();

    let fit = linear_regression(&xs, &ys).ok_or_else(|| RiskError::InsufficientData {
        what: format!("{} trend forecast (distinct years)", event),
        required: 2,
        found: 1,
    })?;

    let last_index = xs[xs.len() - 1];
    let predicted_count = fit.predict(last_index + f64::from(years_ahead)).max(0.0);
    let predicted_probability = window_probability(predicted_count / 365.0, 365);

    let event_days: usize = counts.iter().map(|c| c.events).sum();
    let observed_days: usize = counts.iter().map(|c| c.observed_days).sum();
    let current_probability = window_probability(event_days as f64 / observed_days as f64, 365);

    let partial_years: Vec<i32> = counts.iter().filter(|c| c.is_partial()).map(|c| c.year).collect();
    if !partial_years.is_empty() {
        logging::warn(
            Component::Probability,
            Some(event.as_str()),
            &format!("trend includes partial years {:?}", partial_years),
        );
    }

    Ok(TrendForecast {
        event_type: event,
        years_ahead,
        current_probability,
        predicted_probability,
        predicted_count,
        trend: Trend::from_slope(fit.slope),
        confidence: Confidence::from_r_squared(fit.r_squared),
        r_squared: fit.r_squared,
        slope: fit.slope,
        yearly_counts: counts,
        partial_years,
    })
}
