//! Gravity model driver: seed, furness, compare.
//!
//! One invocation distributes a single segment's trip ends into an OD
//! matrix and scores it against the observed trip-length distribution.
//! All configuration is passed in explicitly; there is no shared state
//! between invocations.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cost_function::CostFunction;
use crate::distribution::{AreaMask, DistributionComparison, ObservedDistribution};
use crate::errors::{DataError, ModelError, ModelWarning};
use crate::furness::{
    Axis, FurnessConfig, FurnessConstraint, FurnessReport, factor_single, furness_double,
};
use crate::matrix::{SquareMatrix, check_matrix_dim, check_vector_len};
use crate::zones::ZoneSystem;

/// Default relative tolerance for the production/attraction grand-total
/// check.
pub const DEFAULT_TRIP_END_TOLERANCE: f64 = 0.05;

/// Per-zone trip-end totals for one segment.
///
/// Productions constrain matrix rows, attractions constrain columns. For
/// origin/destination segments the same struct carries origins as
/// productions and destinations as attractions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripEnds {
    pub productions: Vec<f64>,
    pub attractions: Vec<f64>,
}

/// Explicit per-run configuration for the gravity model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GravityConfig {
    pub cost_function: CostFunction,
    pub constraint: FurnessConstraint,
    pub furness: FurnessConfig,
    /// Relative production/attraction grand-total mismatch above which a
    /// warning is raised. Targets are never rescaled to match.
    pub trip_end_tolerance: f64,
}

impl GravityConfig {
    pub fn new(cost_function: CostFunction, constraint: FurnessConstraint) -> Self {
        Self {
            cost_function,
            constraint,
            furness: FurnessConfig::default(),
            trip_end_tolerance: DEFAULT_TRIP_END_TOLERANCE,
        }
    }
}

/// Result of one gravity model invocation, owned by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct GravityOutcome {
    pub matrix: SquareMatrix,
    pub furness: FurnessReport,
    pub comparison: DistributionComparison,
    pub warnings: Vec<ModelWarning>,
}

/// Runs the gravity model for one segment.
///
/// Seeds a matrix from the cost function, multiplies in the optional
/// calibration matrix, furnesses to the trip ends per the configured
/// constraint and scores the result against the observed distribution.
/// Non-fatal conditions are collected as warnings on the outcome.
pub fn gravity_model(
    zones: &ZoneSystem,
    trip_ends: &TripEnds,
    costs: &SquareMatrix,
    calibration: Option<&SquareMatrix>,
    observed: &ObservedDistribution,
    mask: Option<&AreaMask>,
    config: &GravityConfig,
) -> Result<GravityOutcome, ModelError> {
    let n = zones.len();
    check_matrix_dim("cost matrix", costs, n)?;
    check_vector_len("productions", &trip_ends.productions, n)?;
    check_vector_len("attractions", &trip_ends.attractions, n)?;
    if let Some(calibration) = calibration {
        check_calibration(calibration, n)?;
    }

    let mut warnings = Vec::new();
    // Only the double constraint uses both margins, so only there can a
    // grand-total mismatch bite.
    if config.constraint == FurnessConstraint::Double {
        if let Some(warning) = trip_end_imbalance(trip_ends, config.trip_end_tolerance) {
            warn!(?warning, "trip end totals mismatch, proceeding unscaled");
            warnings.push(warning);
        }
    }

    // SEEDED
    let mut seed = config.cost_function.deterrence(costs)?;
    if let Some(calibration) = calibration {
        seed.mul_elementwise(calibration)?;
    }

    // FURNESSED
    let (matrix, furness) = match config.constraint {
        FurnessConstraint::Single(Axis::Rows) => {
            factor_single(&seed, &trip_ends.productions, Axis::Rows)?
        }
        FurnessConstraint::Single(Axis::Columns) => {
            factor_single(&seed, &trip_ends.attractions, Axis::Columns)?
        }
        FurnessConstraint::Double => furness_double(
            &seed,
            &trip_ends.productions,
            &trip_ends.attractions,
            &config.furness,
        )?,
    };

    for unreachable in &furness.unreachable {
        warnings.push(ModelWarning::UnreachableDemand {
            axis: unreachable.axis,
            zone: zones.id_at(unreachable.index),
            target: unreachable.target,
        });
    }
    if !furness.converged && matches!(config.constraint, FurnessConstraint::Double) {
        warnings.push(ModelWarning::FurnessNotConverged {
            loops: furness.loops,
            residual: furness.residual,
        });
    }

    // COMPARED
    let comparison = observed.compare(&matrix, costs, mask)?;
    info!(
        function = config.cost_function.name(),
        loops = furness.loops,
        residual = furness.residual,
        r_squared = comparison.r_squared,
        "gravity model run complete"
    );

    Ok(GravityOutcome {
        matrix,
        furness,
        comparison,
        warnings,
    })
}

/// Calibration factors must be finite and non-negative; the nominal domain
/// is 0-2 and values outside it are only logged.
fn check_calibration(calibration: &SquareMatrix, n: usize) -> Result<(), DataError> {
    check_matrix_dim("calibration matrix", calibration, n)?;
    let mut outside_nominal = 0usize;
    for row in 0..n {
        for col in 0..n {
            let value = calibration.get(row, col);
            if !value.is_finite() || value < 0.0 {
                return Err(DataError::InvalidCalibrationFactor { row, col, value });
            }
            if value > 2.0 {
                outside_nominal += 1;
            }
        }
    }
    if outside_nominal > 0 {
        warn!(
            cells = outside_nominal,
            "calibration matrix values above nominal domain 0-2"
        );
    }
    Ok(())
}

fn trip_end_imbalance(trip_ends: &TripEnds, tolerance: f64) -> Option<ModelWarning> {
    let production_total: f64 = trip_ends.productions.iter().sum();
    let attraction_total: f64 = trip_ends.attractions.iter().sum();
    let mean = (production_total + attraction_total) / 2.0;
    if mean == 0.0 {
        return None;
    }
    let relative_gap = (production_total - attraction_total).abs() / mean;
    if relative_gap > tolerance {
        return Some(ModelWarning::TripEndImbalance {
            production_total,
            attraction_total,
            relative_gap,
        });
    }
    None
}
