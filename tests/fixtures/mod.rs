//! Test fixtures for lgv-gravity.
//!
//! Provides a small but realistic four-zone model: a cost matrix with
//! short intrazonal and long peripheral movements, balanced trip ends and
//! a builder for segment specs.

use lgv_gravity::cost_function::CostFunction;
use lgv_gravity::distribution::{ObservedBand, ObservedDistribution};
use lgv_gravity::furness::FurnessConstraint;
use lgv_gravity::gravity::{GravityConfig, TripEnds};
use lgv_gravity::matrix::SquareMatrix;
use lgv_gravity::segments::SegmentSpec;
use lgv_gravity::zones::ZoneSystem;

pub fn four_zones() -> ZoneSystem {
    ZoneSystem::new(vec![101, 102, 103, 104]).unwrap()
}

/// Cost matrix in kilometres, spanning every distribution band.
pub fn four_zone_costs() -> SquareMatrix {
    SquareMatrix::from_rows(vec![
        vec![2.0, 6.0, 12.0, 25.0],
        vec![6.0, 3.0, 8.0, 18.0],
        vec![12.0, 8.0, 2.0, 9.0],
        vec![25.0, 18.0, 9.0, 4.0],
    ])
    .unwrap()
}

/// Balanced productions and attractions, both summing to 360 trips.
pub fn four_zone_trip_ends() -> TripEnds {
    TripEnds {
        productions: vec![120.0, 80.0, 100.0, 60.0],
        attractions: vec![90.0, 110.0, 70.0, 90.0],
    }
}

/// Distribution bands covering the fixture cost range.
pub fn four_zone_bands(observed: [f64; 4]) -> ObservedDistribution {
    ObservedDistribution::new(vec![
        ObservedBand {
            start: 0.0,
            end: 5.0,
            observed: observed[0],
            average_cost: 3.0,
        },
        ObservedBand {
            start: 5.0,
            end: 10.0,
            observed: observed[1],
            average_cost: 7.5,
        },
        ObservedBand {
            start: 10.0,
            end: 20.0,
            observed: observed[2],
            average_cost: 15.0,
        },
        ObservedBand {
            start: 20.0,
            end: 50.0,
            observed: observed[3],
            average_cost: 25.0,
        },
    ])
    .unwrap()
}

pub fn tanner(alpha: f64, beta: f64) -> CostFunction {
    CostFunction::Tanner { alpha, beta }
}

/// Segment spec with the four-zone fixture inputs and no calibration.
pub fn segment_spec(name: &str, cost_function: CostFunction) -> SegmentSpec {
    SegmentSpec {
        name: name.to_string(),
        trip_ends: four_zone_trip_ends(),
        costs: four_zone_costs(),
        calibration: None,
        observed: four_zone_bands([100.0, 150.0, 70.0, 40.0]),
        mask: None,
        config: GravityConfig::new(cost_function, FurnessConstraint::Double),
        calibrate: None,
    }
}
