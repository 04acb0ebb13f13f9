//! Structured run records for the report consumer.
//!
//! The core emits one serializable record per segment run; rendering it
//! to spreadsheets or plots is the consumer's concern.

use serde::Serialize;

use crate::calibrate::{CalibrationOutcome, Evaluation};
use crate::cost_function::CostFunction;
use crate::distribution::DistributionComparison;
use crate::errors::{ModelError, ModelWarning};
use crate::furness::FurnessReport;
use crate::gravity::GravityOutcome;

/// Search diagnostics attached to a report when calibration ran.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationSummary {
    pub converged: bool,
    pub cancelled: bool,
    /// Full evaluation trace in search order.
    pub evaluations: Vec<Evaluation>,
}

/// Structured record of one segment's gravity model run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentReport {
    pub segment: String,
    /// Cost function with the final (possibly calibrated) parameters.
    pub cost_function: Option<CostFunction>,
    pub furness: Option<FurnessReport>,
    pub comparison: Option<DistributionComparison>,
    pub r_squared: Option<f64>,
    pub calibration: Option<CalibrationSummary>,
    pub warnings: Vec<ModelWarning>,
    /// Fatal error that aborted this segment, if any.
    pub error: Option<String>,
}

impl SegmentReport {
    /// Record for an uncalibrated run.
    pub fn from_gravity(
        segment: impl Into<String>,
        cost_function: CostFunction,
        outcome: &GravityOutcome,
    ) -> Self {
        Self {
            segment: segment.into(),
            cost_function: Some(cost_function),
            furness: Some(outcome.furness.clone()),
            comparison: Some(outcome.comparison.clone()),
            r_squared: Some(outcome.comparison.r_squared),
            calibration: None,
            warnings: outcome.warnings.clone(),
            error: None,
        }
    }

    /// Record for a calibrated run.
    pub fn from_calibration(segment: impl Into<String>, outcome: &CalibrationOutcome) -> Self {
        let mut warnings = outcome.outcome.warnings.clone();
        warnings.extend(outcome.warnings.iter().cloned());
        Self {
            segment: segment.into(),
            cost_function: Some(outcome.cost_function),
            furness: Some(outcome.outcome.furness.clone()),
            comparison: Some(outcome.outcome.comparison.clone()),
            r_squared: Some(outcome.r_squared),
            calibration: Some(CalibrationSummary {
                converged: outcome.converged,
                cancelled: outcome.cancelled,
                evaluations: outcome.evaluations.clone(),
            }),
            warnings,
            error: None,
        }
    }

    /// Record for a segment aborted by a fatal error.
    pub fn from_error(segment: impl Into<String>, error: &ModelError) -> Self {
        Self {
            segment: segment.into(),
            cost_function: None,
            furness: None,
            comparison: None,
            r_squared: None,
            calibration: None,
            warnings: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}
