//! Property-based tests for the risk engine.
//!
//! These tests use proptest to generate inputs and check that the numeric
//! building blocks keep their invariants:
//! 1. **Bounds**: probabilities stay in [0, 1], damage stays within exposure
//! 2. **Monotonicity**: longer windows, longer return periods and deeper
//!    water never lower the result
//! 3. **Exactness**: curves reproduce their anchors
//! 4. **Clipping**: depths past the deepest anchor saturate
//!
//! ```bash
//! cargo test --test property_tests
//! PROPTEST_CASES=10000 cargo test --test property_tests
//! ```

use proptest::prelude::*;

use flood_risk_engine::analysis::window_probability;
use flood_risk_engine::damage::table::ANCHOR_DEPTHS;
use flood_risk_engine::damage::{DamageEstimator, DamageFunctionTable};
use flood_risk_engine::extremes::{FitMethod, FitQuality, GevFit, GevParams};
use flood_risk_engine::risk::{trapezoid_eai, window_exceedance_probability};
use flood_risk_engine::{BuildingType, Location, Region};

// =============================================================================
// Test Strategies
// =============================================================================

fn gev_params() -> impl Strategy<Value = GevParams> {
    (-10.0..10.0f64, 0.01..5.0f64, -0.45..0.45f64)
        .prop_map(|(location, scale, shape)| GevParams::new(location, scale, shape).unwrap())
}

fn return_periods() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1.01..2000.0f64, 2..12)
}

fn building_type() -> impl Strategy<Value = BuildingType> {
    prop::sample::select(BuildingType::ALL.to_vec())
}

fn fit_of(params: GevParams) -> GevFit {
    GevFit {
        params,
        method: FitMethod::MaximumLikelihood,
        observations: 30,
        log_likelihood: 0.0,
        ks_statistic: 0.0,
        fit_quality: FitQuality::Good,
        warnings: Vec::new(),
    }
}

// =============================================================================
// Probabilities
// =============================================================================

proptest! {
    #[test]
    fn window_probability_is_bounded_and_monotone(p in 0.0..=1.0f64, a in 0u32..2000, b in 0u32..2000) {
        let (short, long) = if a <= b { (a, b) } else { (b, a) };
        let ps = window_probability(p, short);
        let pl = window_probability(p, long);
        prop_assert!((0.0..=1.0).contains(&ps));
        prop_assert!((0.0..=1.0).contains(&pl));
        prop_assert!(ps <= pl);
    }

    #[test]
    fn window_exceedance_is_monotone_in_window(t in 1.01..5000.0f64, a in 0.0..40_000.0f64, b in 0.0..40_000.0f64) {
        let (short, long) = if a <= b { (a, b) } else { (b, a) };
        let ps = window_exceedance_probability(t, short).unwrap();
        let pl = window_exceedance_probability(t, long).unwrap();
        prop_assert!((0.0..=1.0).contains(&ps));
        prop_assert!(ps <= pl + 1e-15);
    }

    #[test]
    fn trapezoid_eai_is_never_negative(points in prop::collection::vec((0.0..1.0f64, 0.0..1e6f64), 0..20)) {
        prop_assert!(trapezoid_eai(&points) >= 0.0);
    }
}

// =============================================================================
// Extremes
// =============================================================================

proptest! {
    #[test]
    fn cdf_inverts_quantile(params in gev_params(), p in 0.01..0.99f64) {
        let x = params.quantile(p);
        prop_assert!((params.cdf(x) - p).abs() < 1e-9);
    }

    #[test]
    fn curve_is_sorted_and_non_decreasing(params in gev_params(), periods in return_periods()) {
        let curve = fit_of(params).curve(&periods).unwrap();
        prop_assert!(!curve.is_empty());
        for pair in curve.points().windows(2) {
            prop_assert!(pair[0].return_period < pair[1].return_period);
            prop_assert!(pair[0].intensity <= pair[1].intensity);
            prop_assert!(pair[0].annual_exceedance_probability >= pair[1].annual_exceedance_probability);
        }
    }
}

// =============================================================================
// Damage
// =============================================================================

proptest! {
    #[test]
    fn curves_reproduce_their_anchors(bt in building_type(), index in 0usize..ANCHOR_DEPTHS.len()) {
        let table = DamageFunctionTable::bundled().unwrap();
        let curve = table.lookup_curve(Region::Global, bt).unwrap();
        let anchor = curve.points()[index];
        let read = curve.interpolate(ANCHOR_DEPTHS[index]);
        prop_assert_eq!(read.damage_ratio, anchor.damage_ratio);
        prop_assert_eq!(read.std_dev_ratio, anchor.std_dev_ratio);
        prop_assert!(!read.depth_saturated);
    }

    #[test]
    fn damage_is_bounded_and_monotone_in_depth(
        bt in building_type(),
        a in 0.0..8.0f64,
        b in 0.0..8.0f64,
        area in 1.0..10_000.0f64,
    ) {
        let table = DamageFunctionTable::bundled().unwrap();
        let estimator = DamageEstimator::new(&table).with_global_fallback(true);
        let location = Location::country("MY");
        let (shallow, deep) = if a <= b { (a, b) } else { (b, a) };

        let low = estimator.estimate(shallow, &location, bt, area).unwrap();
        let high = estimator.estimate(deep, &location, bt, area).unwrap();
        prop_assert!((0.0..=1.0).contains(&low.damage_ratio));
        prop_assert!(low.economic_damage <= low.total_value + 1e-9);
        prop_assert!(low.economic_damage <= high.economic_damage * (1.0 + 1e-12) + 1e-9);
        prop_assert!(low.confidence_interval_95.1 <= low.total_value + 1e-9);
    }

    #[test]
    fn depths_past_the_last_anchor_saturate(bt in building_type(), extra in 1e-6..50.0f64) {
        let table = DamageFunctionTable::bundled().unwrap();
        let estimator = DamageEstimator::new(&table).with_global_fallback(true);
        let location = Location::country("MY");
        let last = ANCHOR_DEPTHS[ANCHOR_DEPTHS.len() - 1];

        let at_edge = estimator.estimate(last, &location, bt, 100.0).unwrap();
        let beyond = estimator.estimate(last + extra, &location, bt, 100.0).unwrap();
        prop_assert!(!at_edge.depth_saturated);
        prop_assert!(beyond.depth_saturated);
        prop_assert_eq!(beyond.damage_ratio, at_edge.damage_ratio);
        prop_assert_eq!(beyond.economic_damage, at_edge.economic_damage);
    }
}
