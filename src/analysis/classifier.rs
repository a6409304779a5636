//! Daily event classification.
//!
//! Flood, heavy rainfall, extreme rainfall and heatwave are evaluated
//! independently from each day's own values, so one day may carry several
//! labels. Drought depends on the days before it and is tracked by
//! [`DroughtScanner`], an explicit idle → counting → active state machine.

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::ThresholdSet;
use crate::logging::{self, Component};
use crate::model::{EventType, HistoricalSeries, Result};

// ---------------------------------------------------------------------------
// Event sets
// ---------------------------------------------------------------------------

/// The set of event types observed on a single day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EventSet(u8);

impl EventSet {
    pub fn empty() -> Self {
        EventSet(0)
    }

    pub fn insert(&mut self, event: EventType) {
        self.0 |= event.bit();
    }

    pub fn contains(&self, event: EventType) -> bool {
        self.0 & event.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Members in `EventType::ALL` order.
    pub fn iter(&self) -> impl Iterator<Item = EventType> + '_ {
        EventType::ALL.into_iter().filter(move |e| self.contains(*e))
    }
}

impl FromIterator<EventType> for EventSet {
    fn from_iter<I: IntoIterator<Item = EventType>>(iter: I) -> Self {
        let mut set = EventSet::empty();
        for event in iter {
            set.insert(event);
        }
        set
    }
}

/// One (date, event type) pair derived from a classified series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventOccurrence {
    pub date: NaiveDate,
    pub event_type: EventType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifiedDay {
    pub date: NaiveDate,
    pub events: EventSet,
}

// ---------------------------------------------------------------------------
// Drought scanner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DroughtState {
    Idle,
    /// A dry run shorter than the drought threshold.
    Counting {
        start: NaiveDate,
        last: NaiveDate,
        length: u32,
    },
    /// A dry run that has reached the threshold; `onset` is its first
    /// drought day.
    Active {
        start: NaiveDate,
        onset: NaiveDate,
        last: NaiveDate,
        length: u32,
    },
}

/// A completed (or still open at end of series) drought.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DroughtSpell {
    /// First dry day of the run.
    pub start: NaiveDate,
    /// First day labelled drought.
    pub onset: NaiveDate,
    /// Last dry day of the run.
    pub end: NaiveDate,
    /// Dry days in the run, including the ones before onset.
    pub length: u32,
}

/// Streak detector for droughts.
///
/// A day is dry when its rainfall is present and below the dry-day limit.
/// Missing rainfall and calendar gaps both break the run: a missing value is
/// never assumed to be dry.
#[derive(Debug, Clone)]
pub struct DroughtScanner {
    dry_day_mm: f64,
    min_days: u32,
    state: DroughtState,
    previous_date: Option<NaiveDate>,
    spells: Vec<DroughtSpell>,
}

impl DroughtScanner {
    pub fn new(dry_day_mm: f64, min_days: u32) -> Self {
        DroughtScanner {
            dry_day_mm,
            min_days: min_days.max(1),
            state: DroughtState::Idle,
            previous_date: None,
            spells: Vec::new(),
        }
    }

    pub fn from_thresholds(thresholds: &ThresholdSet) -> Self {
        Self::new(thresholds.drought_dry_day_mm, thresholds.drought_min_days)
    }

    pub fn state(&self) -> DroughtState {
        self.state
    }

    /// Feeds the next day in chronological order. Returns `true` when the
    /// day falls inside an active drought.
    pub fn step(&mut self, date: NaiveDate, rainfall_mm: Option<f64>) -> bool {
        let consecutive = match self.previous_date {
            Some(prev) => prev.succ_opt() == Some(date),
            None => true,
        };
        self.previous_date = Some(date);
        if !consecutive {
            self.close();
        }

        let dry = matches!(rainfall_mm, Some(r) if r < self.dry_day_mm);
        if !dry {
            self.close();
            return false;
        }

        self.state = match self.state {
            DroughtState::Idle => DroughtState::Counting {
                start: date,
                last: date,
                length: 1,
            },
            DroughtState::Counting { start, length, .. } => DroughtState::Counting {
                start,
                last: date,
                length: length + 1,
            },
            DroughtState::Active { start, onset, length, .. } => DroughtState::Active {
                start,
                onset,
                last: date,
                length: length + 1,
            },
        };

        if let DroughtState::Counting { start, last, length } = self.state {
            if length >= self.min_days {
                self.state = DroughtState::Active {
                    start,
                    onset: date,
                    last,
                    length,
                };
            }
        }

        matches!(self.state, DroughtState::Active { .. })
    }

    /// Ends the current run, recording it if it had become a drought.
    fn close(&mut self) {
        if let DroughtState::Active { start, onset, last, length } = self.state {
            self.spells.push(DroughtSpell {
                start,
                onset,
                end: last,
                length,
            });
        }
        self.state = DroughtState::Idle;
    }

    /// Closes any open run and returns every drought seen.
    pub fn finish(mut self) -> Vec<DroughtSpell> {
        self.close();
        self.spells
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// A series with its per-day event labels. Owns only the derived view; the
/// input series is left untouched.
#[derive(Debug, Clone)]
pub struct ClassifiedSeries {
    days: Vec<ClassifiedDay>,
    droughts: Vec<DroughtSpell>,
}

impl ClassifiedSeries {
    pub fn days(&self) -> &[ClassifiedDay] {
        &self.days
    }

    pub fn droughts(&self) -> &[DroughtSpell] {
        &self.droughts
    }

    /// Number of distinct observed days.
    pub fn observed_days(&self) -> usize {
        self.days.len()
    }

    /// Number of distinct days on which `event` occurred.
    pub fn event_days(&self, event: EventType) -> usize {
        self.days.iter().filter(|d| d.events.contains(event)).count()
    }

    pub fn occurrences(&self) -> Vec<EventOccurrence> {
        self.days
            .iter()
            .flat_map(|day| {
                day.events.iter().map(move |event_type| EventOccurrence {
                    date: day.date,
                    event_type,
                })
            })
            .collect()
    }
}

/// Types decided by one day's reading; drought needs the scanner.
const DAILY_THRESHOLD_EVENTS: [EventType; 4] = [
    EventType::Flood,
    EventType::HeavyRainfall,
    EventType::ExtremeRainfall,
    EventType::Heatwave,
];

fn meets(value: Option<f64>, threshold: f64) -> bool {
    matches!(value, Some(v) if v >= threshold)
}

/// Labels every day of `series`.
///
/// A pre-classified `event_type` on a record is added as-is and that type's
/// threshold test is skipped for the record; the other types are still
/// evaluated.
pub fn classify(series: &HistoricalSeries, thresholds: &ThresholdSet) -> Result<ClassifiedSeries> {
    thresholds.validate()?;

    let mut scanner = DroughtScanner::from_thresholds(thresholds);
    let mut days = Vec::with_capacity(series.len());

    for record in series.records() {
        let mut events = EventSet::empty();
        let preset = record.event_type;
        if let Some(event) = preset {
            events.insert(event);
        }

        let rain = record.rainfall_mm;
        for event in DAILY_THRESHOLD_EVENTS {
            let reading = match event {
                EventType::Heatwave => record.temperature_c,
                _ => rain,
            };
            if preset != Some(event) && meets(reading, thresholds.threshold(event)) {
                events.insert(event);
            }
        }

        // The scanner sees every day so overridden days keep the run intact.
        let in_drought = scanner.step(record.date, rain);
        if preset != Some(EventType::Drought) && in_drought {
            events.insert(EventType::Drought);
        }

        days.push(ClassifiedDay {
            date: record.date,
            events,
        });
    }

    let droughts = scanner.finish();
    let classified = ClassifiedSeries { days, droughts };

    logging::debug(
        Component::Classifier,
        None,
        &format!(
            "classified {} days: {} flood, {} heavy, {} extreme, {} heatwave, {} drought ({} spells)",
            classified.observed_days(),
            classified.event_days(EventType::Flood),
            classified.event_days(EventType::HeavyRainfall),
            classified.event_days(EventType::ExtremeRainfall),
            classified.event_days(EventType::Heatwave),
            classified.event_days(EventType::Drought),
            classified.droughts.len()
        ),
    );

    Ok(classified)
}
