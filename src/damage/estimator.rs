//! Economic damage for one flooded asset.
//!
//! `damage = max_damage_per_m2 × area × ratio(depth)` with a normal-theory
//! band from the curve's interpolated standard deviation. Country locations
//! use the country's own maximum value; coordinate-only locations use the
//! average over the countries of the inferred region.

use rayon::prelude::*;
use serde::Serialize;

use crate::damage::regions;
use crate::damage::table::{self, DamageFunctionTable, MaxDamageLookup, MaxDamageSource, CURRENCY};
use crate::logging::{self, Component};
use crate::model::{BuildingType, Location, Region, Result, RiskError};

const Z_68: f64 = 1.0;
const Z_95: f64 = 1.96;

/// Inputs for one estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DamageRequest {
    pub depth_m: f64,
    pub location: Location,
    pub building_type: BuildingType,
    pub area_m2: f64,
}

impl DamageRequest {
    pub fn new(depth_m: f64, location: Location, building_type: BuildingType, area_m2: f64) -> Self {
        DamageRequest {
            depth_m,
            location,
            building_type,
            area_m2,
        }
    }

    fn subject(&self) -> String {
        match &self.location {
            Location::Country(code) => code.clone(),
            Location::Coordinates { latitude, longitude } => format!("{:.3},{:.3}", latitude, longitude),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DamageEstimate {
    pub location: Location,
    /// Region resolved from the location.
    pub region: Region,
    /// Region whose curve was used; GLOBAL when the fallback applied.
    pub curve_region: Region,
    pub depth_m: f64,
    pub depth_saturated: bool,
    pub building_type: BuildingType,
    pub area_m2: f64,
    pub max_damage_per_m2: f64,
    pub max_damage_source: MaxDamageSource,
    pub total_value: f64,
    pub damage_ratio: f64,
    pub economic_damage: f64,
    pub standard_deviation: f64,
    pub confidence_interval_68: (f64, f64),
    pub confidence_interval_95: (f64, f64),
    pub used_global_fallback: bool,
    pub currency: &'static str,
}

fn validate(depth_m: f64, area_m2: f64) -> Result<()> {
    if !depth_m.is_finite() || depth_m < 0.0 {
        return Err(RiskError::InvalidInput(format!(
            "depth_m must be a finite value >= 0, got {}",
            depth_m
        )));
    }
    if !area_m2.is_finite() || area_m2 <= 0.0 {
        return Err(RiskError::InvalidInput(format!(
            "area_m2 must be a finite value > 0, got {}",
            area_m2
        )));
    }
    Ok(())
}

fn band(center: f64, half_width: f64, upper: f64) -> (f64, f64) {
    ((center - half_width).clamp(0.0, upper), (center + half_width).clamp(0.0, upper))
}

#[derive(Debug, Clone, Copy)]
pub struct DamageEstimator<'t> {
    table: &'t DamageFunctionTable,
    fallback_to_global: bool,
}

impl<'t> DamageEstimator<'t> {
    pub fn new(table: &'t DamageFunctionTable) -> Self {
        DamageEstimator {
            table,
            fallback_to_global: false,
        }
    }

    /// Allows GLOBAL curves and averages to stand in for missing ones.
    pub fn with_global_fallback(mut self, enabled: bool) -> Self {
        self.fallback_to_global = enabled;
        self
    }

    pub fn table(&self) -> &'t DamageFunctionTable {
        self.table
    }

    /// Region of `location`, or GLOBAL for a country outside every region
    /// when the fallback is enabled. The flag reports the substitution.
    fn region_for(&self, location: &Location) -> Result<(Region, bool)> {
        let reason = match regions::resolve_region(location) {
            Ok(region) => return Ok((region, false)),
            Err(RiskError::UnknownRegion(reason)) => reason,
            Err(err) => return Err(err),
        };
        // Only country codes can miss a region.
        let code = match location {
            Location::Country(code) => code.trim().to_ascii_uppercase(),
            Location::Coordinates { .. } => return Err(RiskError::UnknownRegion(reason)),
        };

        if self.fallback_to_global {
            logging::warn(
                Component::Damage,
                Some(&code),
                "no damage region for this country; using GLOBAL curves",
            );
            Ok((Region::Global, true))
        } else if self.table.has_country(&code) {
            Err(RiskError::UnknownRegion(reason))
        } else {
            Err(RiskError::UnknownCountry(code))
        }
    }

    fn max_damage(&self, location: &Location, region: Region, building_type: BuildingType) -> Result<MaxDamageLookup> {
        match location {
            Location::Country(code) => self.table.max_damage_or_global(code, building_type, self.fallback_to_global),
            Location::Coordinates { .. } => match self.table.region_average_max_damage(region, building_type) {
                Ok(value) => Ok(MaxDamageLookup {
                    max_damage_per_m2: value,
                    source: MaxDamageSource::RegionAverage(region),
                }),
                Err(err) if !self.fallback_to_global => Err(err),
                Err(_) => Ok(MaxDamageLookup {
                    max_damage_per_m2: self.table.region_average_max_damage(Region::Global, building_type)?,
                    source: MaxDamageSource::GlobalAverage,
                }),
            },
        }
    }

    pub fn estimate(
        &self,
        depth_m: f64,
        location: &Location,
        building_type: BuildingType,
        area_m2: f64,
    ) -> Result<DamageEstimate> {
        validate(depth_m, area_m2)?;
        let (region, region_fallback) = self.region_for(location)?;

        let (curve, curve_fallback) = self.table.curve_or_global(region, building_type, self.fallback_to_global)?;
        let lookup = self.max_damage(location, region, building_type)?;

        let point = curve.interpolate(depth_m);
        let total_value = lookup.max_damage_per_m2 * area_m2;
        let economic_damage = total_value * point.damage_ratio;
        let standard_deviation = point.std_dev_ratio * total_value;

        Ok(DamageEstimate {
            location: location.clone(),
            region,
            curve_region: curve.region,
            depth_m,
            depth_saturated: point.depth_saturated,
            building_type,
            area_m2,
            max_damage_per_m2: lookup.max_damage_per_m2,
            max_damage_source: lookup.source,
            total_value,
            damage_ratio: point.damage_ratio,
            economic_damage,
            standard_deviation,
            confidence_interval_68: band(economic_damage, Z_68 * standard_deviation, total_value),
            confidence_interval_95: band(economic_damage, Z_95 * standard_deviation, total_value),
            used_global_fallback: region_fallback
                || curve_fallback
                || lookup.source == MaxDamageSource::GlobalAverage,
            currency: CURRENCY,
        })
    }

    pub fn estimate_request(&self, request: &DamageRequest) -> Result<DamageEstimate> {
        self.estimate(request.depth_m, &request.location, request.building_type, request.area_m2)
    }

    /// Estimates each request independently. One bad request does not stop
    /// the others; results are returned in request order.
    pub fn estimate_batch(&self, requests: &[DamageRequest]) -> Vec<Result<DamageEstimate>> {
        let results: Vec<Result<DamageEstimate>> = requests
            .par_iter()
            .map(|request| self.estimate_request(request))
            .collect();

        let mut failed = 0;
        for (request, result) in requests.iter().zip(&results) {
            if let Err(err) = result {
                failed += 1;
                logging::log_item_failure(Component::Damage, &request.subject(), "Damage estimate", err);
            }
        }
        logging::log_batch_summary(
            Component::Damage,
            "Damage batch",
            requests.len(),
            requests.len() - failed,
            failed,
        );

        results
    }
}

impl DamageEstimator<'static> {
    /// Estimator over the process-wide table.
    pub fn from_global() -> Result<Self> {
        Ok(DamageEstimator::new(table::global()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bundled() -> DamageFunctionTable {
        DamageFunctionTable::bundled().unwrap()
    }

    #[test]
    fn test_country_estimate_arithmetic() {
        let table = bundled();
        let estimator = DamageEstimator::new(&table);
        let estimate = estimator
            .estimate(1.0, &Location::country("MY"), BuildingType::Residential, 100.0)
            .unwrap();

        // MY residential 316.2 EUR/m²; ASIA residential ratio 0.49 at 1 m.
        assert_eq!(estimate.region, Region::Asia);
        assert_eq!(estimate.max_damage_source, MaxDamageSource::Country);
        assert_relative_eq!(estimate.total_value, 31_620.0, epsilon = 1e-9);
        assert_relative_eq!(estimate.damage_ratio, 0.49);
        assert_relative_eq!(estimate.economic_damage, 31_620.0 * 0.49, epsilon = 1e-9);
        assert_relative_eq!(estimate.standard_deviation, 0.2 * 31_620.0, epsilon = 1e-9);
        assert!(!estimate.used_global_fallback);
        assert_eq!(estimate.currency, "EUR");
    }

    #[test]
    fn test_confidence_bands_are_clipped() {
        let table = bundled();
        let estimator = DamageEstimator::new(&table);
        let estimate = estimator
            .estimate(0.5, &Location::country("MY"), BuildingType::Residential, 50.0)
            .unwrap();

        let (lo68, hi68) = estimate.confidence_interval_68;
        let (lo95, hi95) = estimate.confidence_interval_95;
        assert!(lo95 <= lo68 && lo68 <= estimate.economic_damage);
        assert!(estimate.economic_damage <= hi68 && hi68 <= hi95);
        assert!(lo95 >= 0.0);
        assert!(hi95 <= estimate.total_value);

        let deep = estimator
            .estimate(6.0, &Location::country("MY"), BuildingType::Residential, 50.0)
            .unwrap();
        assert_eq!(deep.confidence_interval_95.1, deep.total_value);
    }

    #[test]
    fn test_zero_depth_is_zero_damage() {
        let table = bundled();
        let estimate = DamageEstimator::new(&table)
            .estimate(0.0, &Location::country("DE"), BuildingType::Commercial, 250.0)
            .unwrap();
        assert_eq!(estimate.damage_ratio, 0.0);
        assert_eq!(estimate.economic_damage, 0.0);
        assert_eq!(estimate.confidence_interval_95, (0.0, 0.0));
    }

    #[test]
    fn test_saturation_is_flagged() {
        let table = bundled();
        let estimator = DamageEstimator::new(&table);
        let at_six = estimator
            .estimate(6.0, &Location::country("MY"), BuildingType::Commercial, 10.0)
            .unwrap();
        let beyond = estimator
            .estimate(6.5, &Location::country("MY"), BuildingType::Commercial, 10.0)
            .unwrap();
        assert_eq!(at_six.damage_ratio, beyond.damage_ratio);
        assert!(beyond.depth_saturated);
        assert!(!at_six.depth_saturated);
    }

    #[test]
    fn test_invalid_inputs_are_rejected_not_coerced() {
        let table = bundled();
        let estimator = DamageEstimator::new(&table);
        let my = Location::country("MY");
        for (depth, area) in [(-0.1, 10.0), (f64::NAN, 10.0), (1.0, 0.0), (1.0, -5.0), (1.0, f64::INFINITY)] {
            assert!(matches!(
                estimator.estimate(depth, &my, BuildingType::Residential, area),
                Err(RiskError::InvalidInput(_))
            ));
        }
        assert!(matches!(
            estimator.estimate(1.0, &Location::coordinates(91.0, 0.0), BuildingType::Residential, 10.0),
            Err(RiskError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_coordinates_use_region_average() {
        let table = bundled();
        let estimate = DamageEstimator::new(&table)
            .estimate(1.0, &Location::coordinates(3.139, 101.687), BuildingType::Residential, 100.0)
            .unwrap();
        assert_eq!(estimate.region, Region::Asia);
        assert_eq!(estimate.max_damage_source, MaxDamageSource::RegionAverage(Region::Asia));
        assert_relative_eq!(
            estimate.max_damage_per_m2,
            table
                .region_average_max_damage(Region::Asia, BuildingType::Residential)
                .unwrap()
        );
    }

    #[test]
    fn test_unknown_country_needs_fallback_flag() {
        let table = bundled();
        let strict = DamageEstimator::new(&table);
        let err = strict
            .estimate(1.0, &Location::country("ZZ"), BuildingType::Residential, 100.0)
            .unwrap_err();
        assert!(matches!(err, RiskError::UnknownCountry(_)));

        let lenient = strict.with_global_fallback(true);
        let estimate = lenient
            .estimate(1.0, &Location::country("ZZ"), BuildingType::Residential, 100.0)
            .unwrap();
        assert_eq!(estimate.region, Region::Global);
        assert_eq!(estimate.max_damage_source, MaxDamageSource::GlobalAverage);
        assert!(estimate.used_global_fallback);
    }

    #[test]
    fn test_every_bundled_country_has_a_region() {
        let table = bundled();
        let unmapped: Vec<&str> = table
            .countries()
            .filter(|code| regions::region_for_country(code).is_none())
            .collect();
        assert!(unmapped.is_empty(), "{:?}", unmapped);

        let estimator = DamageEstimator::new(&table);
        for (code, region) in [("NP", Region::Asia), ("TW", Region::Asia), ("TZ", Region::Africa), ("CU", Region::NorthAmerica)] {
            let estimate = estimator
                .estimate(1.0, &Location::country(code), BuildingType::Residential, 100.0)
                .unwrap();
            assert_eq!(estimate.region, region, "{}", code);
            assert_eq!(estimate.curve_region, region, "{}", code);
            assert!(!estimate.used_global_fallback, "{}", code);
        }
    }

    #[test]
    fn test_country_without_region_needs_fallback_flag() {
        let ratios = [0.0, 0.2, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0];
        let functions = BuildingType::ALL
            .into_iter()
            .flat_map(|building_type| {
                table::ANCHOR_DEPTHS
                    .into_iter()
                    .zip(ratios)
                    .map(move |(depth_m, damage_ratio)| table::DamageFunctionEntry {
                        region: Region::Global,
                        building_type,
                        depth_m,
                        damage_ratio,
                        std_dev_ratio: 0.1,
                    })
            })
            .collect();
        let max = vec![table::MaxDamageEntry::new("XX", BuildingType::Residential, 200.0)];
        let table = DamageFunctionTable::from_entries(functions, max).unwrap();
        let location = Location::country("XX");

        let strict = DamageEstimator::new(&table);
        assert!(matches!(
            strict.estimate(1.0, &location, BuildingType::Residential, 10.0),
            Err(RiskError::UnknownRegion(_))
        ));

        let estimate = strict
            .with_global_fallback(true)
            .estimate(1.0, &location, BuildingType::Residential, 10.0)
            .unwrap();
        assert_eq!(estimate.region, Region::Global);
        assert_eq!(estimate.curve_region, Region::Global);
        assert_eq!(estimate.max_damage_source, MaxDamageSource::Country);
        assert_relative_eq!(estimate.total_value, 2_000.0);
        assert!(estimate.used_global_fallback);
    }

    #[test]
    fn test_missing_regional_curve_needs_fallback_flag() {
        let table = bundled();
        // No ASIA infrastructure curve in the dataset.
        let strict = DamageEstimator::new(&table);
        assert!(matches!(
            strict.estimate(1.0, &Location::country("MY"), BuildingType::Infrastructure, 100.0),
            Err(RiskError::UnknownRegion(_))
        ));

        let estimate = strict
            .with_global_fallback(true)
            .estimate(1.0, &Location::country("MY"), BuildingType::Infrastructure, 100.0)
            .unwrap();
        assert_eq!(estimate.curve_region, Region::Global);
        assert_eq!(estimate.max_damage_source, MaxDamageSource::Country);
        assert!(estimate.used_global_fallback);
    }

    #[test]
    fn test_estimate_is_deterministic() {
        let table = bundled();
        let estimator = DamageEstimator::new(&table);
        let location = Location::country("TH");
        let a = estimator.estimate(2.3, &location, BuildingType::Industrial, 420.0).unwrap();
        let b = estimator.estimate(2.3, &location, BuildingType::Industrial, 420.0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_batch_isolates_failures_and_keeps_order() {
        let table = bundled();
        let estimator = DamageEstimator::new(&table);
        let requests = vec![
            DamageRequest::new(0.5, Location::country("MY"), BuildingType::Residential, 100.0),
            DamageRequest::new(1.0, Location::country("ZZ"), BuildingType::Residential, 100.0),
            DamageRequest::new(1.0, Location::country("MY"), BuildingType::Residential, -1.0),
            DamageRequest::new(2.0, Location::coordinates(5.4, 100.3), BuildingType::Commercial, 80.0),
        ];
        let results = estimator.estimate_batch(&requests);

        assert_eq!(results.len(), 4);
        assert_eq!(results[0].as_ref().unwrap().depth_m, 0.5);
        assert!(matches!(results[1], Err(RiskError::UnknownCountry(_))));
        assert!(matches!(results[2], Err(RiskError::InvalidInput(_))));
        assert_eq!(results[3].as_ref().unwrap().building_type, BuildingType::Commercial);
    }
}
