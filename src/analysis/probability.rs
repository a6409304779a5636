//! Empirical event probabilities.
//!
//! Daily probability is the share of observed days on which an event
//! occurred. Longer windows use the complement rule
//! `P = 1 - (1 - p)^window_days`, which treats days as independent. That is
//! a modelling simplification; rainfall is autocorrelated.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::analysis::classifier::{classify, ClassifiedSeries};
use crate::analysis::trend::{self, TrendForecast};
use crate::config::ThresholdSet;
use crate::model::{EventType, HistoricalSeries, Result, Season};

/// Window for seasonal probabilities: one year.
pub const SEASONAL_WINDOW_DAYS: u32 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProbabilityResult {
    pub event_type: EventType,
    pub time_window_days: u32,
    /// Probability of at least one event day within the window, in [0, 1].
    pub probability: f64,
    pub daily_probability: f64,
    pub event_days: usize,
    pub observed_days: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeasonalBucket {
    pub season: Season,
    pub flood_probability: f64,
    pub observed_days: usize,
}

/// Complement rule for `window_days` independent days, clipped to [0, 1].
pub fn window_probability(daily_probability: f64, window_days: u32) -> f64 {
    let p = daily_probability.clamp(0.0, 1.0);
    let window = i32::try_from(window_days).unwrap_or(i32::MAX);
    (1.0 - (1.0 - p).powi(window)).clamp(0.0, 1.0)
}

fn daily_probability(event_days: usize, observed_days: usize) -> f64 {
    if observed_days == 0 {
        0.0
    } else {
        event_days as f64 / observed_days as f64
    }
}

/// Probability queries over one classified series.
#[derive(Debug, Clone)]
pub struct ProbabilityEngine {
    classified: ClassifiedSeries,
}

impl ProbabilityEngine {
    /// Classifies `series` once; every query reuses the labels.
    pub fn new(series: &HistoricalSeries, thresholds: &ThresholdSet) -> Result<Self> {
        Ok(ProbabilityEngine {
            classified: classify(series, thresholds)?,
        })
    }

    pub fn from_classified(classified: ClassifiedSeries) -> Self {
        ProbabilityEngine { classified }
    }

    pub fn classified(&self) -> &ClassifiedSeries {
        &self.classified
    }

    /// Probability of `event` occurring at least once in `window_days`.
    /// An event never observed has probability 0.
    pub fn event_probability(&self, event: EventType, window_days: u32) -> ProbabilityResult {
        let event_days = self.classified.event_days(event);
        let observed_days = self.classified.observed_days();
        let daily = daily_probability(event_days, observed_days);

        ProbabilityResult {
            event_type: event,
            time_window_days: window_days,
            probability: window_probability(daily, window_days),
            daily_probability: daily,
            event_days,
            observed_days,
        }
    }

    /// Window probabilities for every event type seen at least once. Types
    /// never observed are absent rather than zero.
    pub fn all_probabilities(&self, window_days: u32) -> BTreeMap<EventType, ProbabilityResult> {
        EventType::ALL
            .into_iter()
            .filter(|event| self.classified.event_days(*event) > 0)
            .map(|event| (event, self.event_probability(event, window_days)))
            .collect()
    }

    /// One-year probability of `event` using only the days observed in
    /// `season`'s months for the daily rate.
    pub fn seasonal_probability(&self, event: EventType, season: Season) -> f64 {
        let (observed, hits) = self
            .classified
            .days()
            .iter()
            .filter(|d| Season::of(d.date) == season)
            .fold((0usize, 0usize), |(observed, hits), d| {
                (observed + 1, hits + usize::from(d.events.contains(event)))
            });

        window_probability(daily_probability(hits, observed), SEASONAL_WINDOW_DAYS)
    }

    /// Flood probability for each of the three seasons.
    pub fn seasonal_flood_breakdown(&self) -> Vec<SeasonalBucket> {
        Season::ALL
            .into_iter()
            .map(|season| SeasonalBucket {
                season,
                flood_probability: self.seasonal_probability(EventType::Flood, season),
                observed_days: self
                    .classified
                    .days()
                    .iter()
                    .filter(|d| Season::of(d.date) == season)
                    .count(),
            })
            .collect()
    }

    pub fn predict_trend(&self, event: EventType, years_ahead: u32) -> Result<TrendForecast> {
        trend::predict_trend(&self.classified, event, years_ahead)
    }
}
