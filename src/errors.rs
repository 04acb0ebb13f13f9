//! Error and warning types for the gravity model engine.
//!
//! Fatal errors abort a single segment's run. Warnings are data: they are
//! accumulated onto results and reports and never abort anything.

use serde::Serialize;
use thiserror::Error;

use crate::furness::Axis;

/// Top-level error for a gravity model run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Data(#[from] DataError),
}

/// Invalid configuration, surfaced before any computation starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Cost function name from the parameter supplier isn't recognised.
    #[error("unknown cost function {name:?}, expected one of: tanner, log_normal")]
    UnknownCostFunction { name: String },

    /// Log-normal requires a strictly positive sigma.
    #[error("log normal sigma must be > 0, got {sigma}")]
    NonPositiveSigma { sigma: f64 },
}

/// Invalid input data, with enough context to locate the offending cell.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    /// Costs must be non-negative.
    #[error("negative cost {value} at zone pair ({row}, {col})")]
    NegativeCost { row: usize, col: usize, value: f64 },

    /// Cost function evaluation produced a non-finite deterrence value.
    #[error("non-finite deterrence at zone pair ({row}, {col}) from cost {cost}")]
    NonFiniteDeterrence { row: usize, col: usize, cost: f64 },

    #[error("{name} should be a {expected}x{expected} matrix, got {rows}x{cols}")]
    MatrixDimensions {
        name: &'static str,
        expected: usize,
        rows: usize,
        cols: usize,
    },

    #[error("{name} should have length {expected}, got {actual}")]
    VectorLength {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("duplicate zone id {zone} in zone system")]
    DuplicateZone { zone: u32 },

    /// Distribution bands must be contiguous, non-overlapping and ascending.
    #[error("distribution band {index} [{start}, {end}) does not follow previous end {previous_end}")]
    NonContiguousBands {
        index: usize,
        start: f64,
        end: f64,
        previous_end: f64,
    },

    #[error("distribution band {index} has start {start} >= end {end}")]
    InvalidBand { index: usize, start: f64, end: f64 },

    #[error("distribution band {index} has negative observed trips {observed}")]
    NegativeObserved { index: usize, observed: f64 },

    #[error("observed distribution has no bands")]
    EmptyDistribution,

    #[error("calibration matrix entry {value} at zone pair ({row}, {col}) is not a non-negative finite number")]
    InvalidCalibrationFactor { row: usize, col: usize, value: f64 },

    /// Zones present in the data but missing from a zone correspondence.
    #[error("{count} zones missing from the {name} correspondence, first: {first}")]
    MissingCorrespondence {
        name: &'static str,
        count: usize,
        first: u32,
    },
}

/// Non-fatal conditions attached to run results and reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ModelWarning {
    /// Production and attraction grand totals differ by more than the
    /// configured relative tolerance. Targets are not rescaled.
    TripEndImbalance {
        production_total: f64,
        attraction_total: f64,
        relative_gap: f64,
    },

    /// Furnessing stopped at the loop cap or stalled before reaching the
    /// convergence tolerance. The partially converged matrix is still used.
    FurnessNotConverged { loops: usize, residual: f64 },

    /// Calibration hit its evaluation cap before the improvement tolerance.
    CalibrationNotConverged { evaluations: usize, objective: f64 },

    /// A zone with a positive target total but zero seed mass cannot be
    /// filled by furnessing; it is left at zero.
    UnreachableDemand { axis: Axis, zone: u32, target: f64 },
}
