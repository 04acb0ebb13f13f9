//! End-to-end gravity model scenarios
//!
//! Runs the driver and batch runner against the four-zone fixture model
//! and checks the headline behaviours: convergence, unreachable zones,
//! wrong-shape distributions and the report record.

mod fixtures;

use lgv_gravity::calibrate::CancelToken;
use lgv_gravity::distribution::{ObservedBand, ObservedDistribution};
use lgv_gravity::errors::ModelWarning;
use lgv_gravity::furness::{Axis, FurnessConstraint};
use lgv_gravity::gravity::{GravityConfig, gravity_model};
use lgv_gravity::segments::{run_segment, run_segments};

use fixtures::*;

#[test]
fn double_constraint_hits_both_margins() {
    let zones = four_zones();
    let trip_ends = four_zone_trip_ends();
    let config = GravityConfig::new(tanner(1.0, -0.3), FurnessConstraint::Double);
    let outcome = gravity_model(
        &zones,
        &trip_ends,
        &four_zone_costs(),
        None,
        &four_zone_bands([100.0, 150.0, 70.0, 40.0]),
        None,
        &config,
    )
    .unwrap();

    assert!(outcome.furness.converged);
    for (achieved, target) in outcome
        .matrix
        .row_sums()
        .iter()
        .zip(&trip_ends.productions)
    {
        assert!((achieved - target).abs() <= config.furness.tolerance);
    }
    for (achieved, target) in outcome
        .matrix
        .col_sums()
        .iter()
        .zip(&trip_ends.attractions)
    {
        assert!((achieved - target).abs() <= config.furness.tolerance);
    }
    // Residual history covers the start plus every loop.
    assert_eq!(
        outcome.furness.residual_history.len(),
        outcome.furness.loops + 1
    );
}

#[test]
fn zero_cost_row_leaves_zone_unreachable() {
    let zones = four_zones();
    let mut costs = four_zone_costs();
    for col in 0..4 {
        costs.set(3, col, 0.0);
    }
    // Attractions total matches the reachable productions so the rest of
    // the matrix can still balance.
    let mut trip_ends = four_zone_trip_ends();
    trip_ends.attractions = vec![90.0, 110.0, 40.0, 60.0];
    let config = GravityConfig::new(tanner(1.0, -0.3), FurnessConstraint::Double);
    let outcome = gravity_model(
        &zones,
        &trip_ends,
        &costs,
        None,
        &four_zone_bands([100.0, 150.0, 70.0, 40.0]),
        None,
        &config,
    )
    .unwrap();

    // Zone 104 produces nothing; its demand is reported, not invented.
    assert_eq!(outcome.matrix.row(3), &[0.0; 4]);
    assert!(outcome.warnings.contains(&ModelWarning::UnreachableDemand {
        axis: Axis::Rows,
        zone: 104,
        target: 60.0,
    }));
    // The production/attraction gap is warned about but not rescaled.
    assert!(outcome
        .warnings
        .iter()
        .any(|w| matches!(w, ModelWarning::TripEndImbalance { .. })));
    // The reachable rows still converge.
    assert!(outcome.furness.converged);
    for (achieved, target) in outcome.matrix.row_sums().iter().zip([120.0, 80.0, 100.0]) {
        assert!((achieved - target).abs() <= config.furness.tolerance);
    }
}

#[test]
fn all_mass_in_wrong_band_scores_zero_r_squared() {
    let zones = four_zones();
    // Scale every cost below 5 so the whole matrix lands in the first of
    // two observed bands.
    let mut costs = four_zone_costs();
    for row in 0..4 {
        for col in 0..4 {
            costs.set(row, col, costs.get(row, col) * 0.1);
        }
    }
    let observed = ObservedDistribution::new(vec![
        ObservedBand {
            start: 0.0,
            end: 5.0,
            observed: 40.0,
            average_cost: 2.5,
        },
        ObservedBand {
            start: 5.0,
            end: 100.0,
            observed: 60.0,
            average_cost: 20.0,
        },
    ])
    .unwrap();
    let config = GravityConfig::new(tanner(1.0, -0.3), FurnessConstraint::Double);
    let outcome = gravity_model(
        &zones,
        &four_zone_trip_ends(),
        &costs,
        None,
        &observed,
        None,
        &config,
    )
    .unwrap();

    assert_eq!(outcome.comparison.r_squared, 0.0);
    assert!(outcome.comparison.squared_error > 0.0);
    assert_eq!(outcome.comparison.bands[1].modelled, 0.0);
}

#[test]
fn single_column_constraint_matches_attractions() {
    let zones = four_zones();
    let trip_ends = four_zone_trip_ends();
    let config = GravityConfig::new(
        tanner(1.0, -0.3),
        FurnessConstraint::Single(Axis::Columns),
    );
    let outcome = gravity_model(
        &zones,
        &trip_ends,
        &four_zone_costs(),
        None,
        &four_zone_bands([100.0, 150.0, 70.0, 40.0]),
        None,
        &config,
    )
    .unwrap();

    let attractions_total: f64 = trip_ends.attractions.iter().sum();
    assert!((outcome.matrix.total() - attractions_total).abs() < 1e-9);
    for (achieved, target) in outcome.matrix.col_sums().iter().zip(&trip_ends.attractions) {
        assert!((achieved - target).abs() < 1e-9);
    }
}

#[test]
fn batch_isolates_segment_failures() {
    let zones = four_zones();
    let good = segment_spec("service", tanner(1.0, -0.3));
    let mut bad = segment_spec("delivery_grocery", tanner(1.0, -0.3));
    bad.costs.set(1, 2, -4.0);

    let results = run_segments(&zones, &[good, bad], &CancelToken::new());

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].report.segment, "service");
    assert!(results[0].matrix.is_some());
    assert!(results[0].report.error.is_none());

    // The bad segment fails alone and keeps its diagnostic context.
    assert_eq!(results[1].report.segment, "delivery_grocery");
    assert!(results[1].matrix.is_none());
    let error = results[1].report.error.as_ref().unwrap();
    assert!(error.contains("negative cost"), "unexpected error: {error}");
    assert!(error.contains("(1, 2)"), "unexpected error: {error}");
}

#[test]
fn segment_report_serializes_for_the_consumer() {
    let zones = four_zones();
    let spec = segment_spec("commuting_drivers", tanner(1.0, -0.3));
    let result = run_segment(&zones, &spec, &CancelToken::new());

    let json = serde_json::to_value(&result.report).unwrap();
    assert_eq!(json["segment"], "commuting_drivers");
    assert_eq!(json["cost_function"]["function"], "tanner");
    assert!(json["r_squared"].is_number());
    assert!(json["furness"]["residual_history"].is_array());
    assert_eq!(json["error"], serde_json::Value::Null);

    // Band table carries observed and modelled columns for the log.
    let bands = json["comparison"]["bands"].as_array().unwrap();
    assert_eq!(bands.len(), 4);
    assert!(bands[0]["observed"].is_number());
    assert!(bands[0]["modelled"].is_number());
}
