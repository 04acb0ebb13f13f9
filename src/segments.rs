//! Batch execution of gravity model segments.
//!
//! Each LGV segment (service, delivery stem/bush, grocery, commuting) is
//! an independent gravity model run with its own trip ends, costs and
//! parameters. Segments share nothing mutable, so the batch fans out
//! across threads; a fatal error aborts only its own segment.

use rayon::prelude::*;
use tracing::info_span;

use crate::calibrate::{CalibrationConfig, CancelToken, calibrate};
use crate::distribution::{AreaMask, ObservedDistribution};
use crate::gravity::{GravityConfig, TripEnds, gravity_model};
use crate::matrix::SquareMatrix;
use crate::report::SegmentReport;
use crate::zones::ZoneSystem;

/// Inputs and parameters for one segment's run, mirroring one row of the
/// gravity model parameter table.
#[derive(Debug, Clone)]
pub struct SegmentSpec {
    pub name: String,
    pub trip_ends: TripEnds,
    pub costs: SquareMatrix,
    /// Optional calibration matrix applied to the seed.
    pub calibration: Option<SquareMatrix>,
    pub observed: ObservedDistribution,
    /// Optional calibration sub-area restriction for scoring.
    pub mask: Option<AreaMask>,
    pub config: GravityConfig,
    /// When present, self-calibration runs with these stopping rules;
    /// otherwise the configured parameters are final.
    pub calibrate: Option<CalibrationConfig>,
}

/// OD matrix and run record for one segment.
#[derive(Debug, Clone)]
pub struct SegmentResult {
    /// Absent when the segment failed with a fatal error.
    pub matrix: Option<SquareMatrix>,
    pub report: SegmentReport,
}

/// Runs a single segment to completion, capturing any fatal error in the
/// report instead of propagating it.
pub fn run_segment(zones: &ZoneSystem, spec: &SegmentSpec, cancel: &CancelToken) -> SegmentResult {
    let span = info_span!("segment", name = %spec.name);
    let _guard = span.enter();

    match &spec.calibrate {
        Some(search) => {
            let result = calibrate(
                zones,
                &spec.trip_ends,
                &spec.costs,
                spec.calibration.as_ref(),
                &spec.observed,
                spec.mask.as_ref(),
                &spec.config,
                search,
                cancel,
            );
            match result {
                Ok(outcome) => SegmentResult {
                    report: SegmentReport::from_calibration(spec.name.as_str(), &outcome),
                    matrix: Some(outcome.outcome.matrix),
                },
                Err(error) => SegmentResult {
                    matrix: None,
                    report: SegmentReport::from_error(spec.name.as_str(), &error),
                },
            }
        }
        None => {
            let result = gravity_model(
                zones,
                &spec.trip_ends,
                &spec.costs,
                spec.calibration.as_ref(),
                &spec.observed,
                spec.mask.as_ref(),
                &spec.config,
            );
            match result {
                Ok(outcome) => {
                    let report = SegmentReport::from_gravity(
                        spec.name.as_str(),
                        spec.config.cost_function,
                        &outcome,
                    );
                    SegmentResult {
                        matrix: Some(outcome.matrix),
                        report,
                    }
                }
                Err(error) => SegmentResult {
                    matrix: None,
                    report: SegmentReport::from_error(spec.name.as_str(), &error),
                },
            }
        }
    }
}

/// Runs every segment in parallel, preserving input order in the results.
///
/// Each segment owns its matrices exclusively, so the only shared state is
/// the cancellation token.
pub fn run_segments(
    zones: &ZoneSystem,
    specs: &[SegmentSpec],
    cancel: &CancelToken,
) -> Vec<SegmentResult> {
    specs
        .par_iter()
        .map(|spec| run_segment(zones, spec, cancel))
        .collect()
}
