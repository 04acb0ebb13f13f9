//! Matrix furnessing and factoring.
//!
//! Single-constrained factoring is one elementwise scaling pass against a
//! target marginal. Double-constrained furnessing is classic iterative
//! proportional fitting: alternately scale rows then columns until the
//! achieved marginals match the targets within tolerance.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::DataError;
use crate::matrix::{SquareMatrix, check_vector_len};

/// Matrix axis a marginal total applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    Rows,
    Columns,
}

/// Constraint mode for the furnessing engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FurnessConstraint {
    /// Factor once against one marginal only, used for bush segments where
    /// only one side has trip-end control.
    Single(Axis),
    /// Iterative proportional fitting against both marginals.
    Double,
}

/// Tunable convergence parameters for double-constrained furnessing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FurnessConfig {
    /// Stop once the largest absolute marginal difference is below this.
    pub tolerance: f64,
    /// Hard cap on furness loops; hitting it is a warning, not an error.
    pub max_loops: usize,
    /// Stop early when the residual has not improved for this many loops.
    pub stall_loops: usize,
}

impl Default for FurnessConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.1,
            max_loops: 1000,
            stall_loops: 10,
        }
    }
}

/// A zone whose target total cannot be met because its seed mass is zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UnreachableZone {
    pub axis: Axis,
    /// Matrix index; the driver maps this back to a zone id.
    pub index: usize,
    pub target: f64,
}

/// Diagnostics from a furness or factoring run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FurnessReport {
    pub constraint: FurnessConstraint,
    pub converged: bool,
    /// Number of row+column factor passes performed.
    pub loops: usize,
    /// Final largest absolute difference between achieved and target
    /// marginals, ignoring unreachable zones.
    pub residual: f64,
    /// Residual before the first loop and after each loop, for the log.
    pub residual_history: Vec<f64>,
    pub unreachable: Vec<UnreachableZone>,
}

/// Scales `seed` so the marginal totals along `axis` equal `targets`.
///
/// Zones with zero seed mass are left at zero: with a zero target that is
/// the correct answer, with a positive target they are flagged as
/// unreachable. Relative cell proportions along the other axis are
/// untouched.
pub fn factor_single(
    seed: &SquareMatrix,
    targets: &[f64],
    axis: Axis,
) -> Result<(SquareMatrix, FurnessReport), DataError> {
    check_vector_len("single furness targets", targets, seed.n())?;

    let mut matrix = seed.clone();
    let current = match axis {
        Axis::Rows => matrix.row_sums(),
        Axis::Columns => matrix.col_sums(),
    };
    let mut unreachable = Vec::new();
    for (index, (&current_total, &target)) in current.iter().zip(targets).enumerate() {
        if current_total == 0.0 {
            if target > 0.0 {
                unreachable.push(UnreachableZone {
                    axis,
                    index,
                    target,
                });
            }
            continue;
        }
        let factor = target / current_total;
        match axis {
            Axis::Rows => matrix.scale_row(index, factor),
            Axis::Columns => matrix.scale_col(index, factor),
        }
    }

    let residual = marginal_residual(&matrix, targets, axis, &unreachable);
    let report = FurnessReport {
        constraint: FurnessConstraint::Single(axis),
        converged: unreachable.is_empty(),
        loops: 1,
        residual,
        residual_history: vec![residual],
        unreachable,
    };
    Ok((matrix, report))
}

/// Doubly constrained furness of `seed` to match row and column targets.
///
/// Stops at the tolerance, the loop cap, a stalled residual, or a
/// non-finite matrix, whichever comes first. The matrix reached at that
/// point is always returned together with the convergence diagnostics;
/// failing to converge is the caller's warning to raise, not an error.
pub fn furness_double(
    seed: &SquareMatrix,
    row_targets: &[f64],
    col_targets: &[f64],
    config: &FurnessConfig,
) -> Result<(SquareMatrix, FurnessReport), DataError> {
    let n = seed.n();
    check_vector_len("row targets", row_targets, n)?;
    check_vector_len("column targets", col_targets, n)?;

    let mut matrix = seed.clone();

    // Zones with no seed mass can never be filled, so they are excluded
    // from the convergence test and reported instead.
    let mut unreachable = Vec::new();
    for (index, (&sum, &target)) in matrix.row_sums().iter().zip(row_targets).enumerate() {
        if sum == 0.0 && target > 0.0 {
            unreachable.push(UnreachableZone {
                axis: Axis::Rows,
                index,
                target,
            });
        }
    }
    for (index, (&sum, &target)) in matrix.col_sums().iter().zip(col_targets).enumerate() {
        if sum == 0.0 && target > 0.0 {
            unreachable.push(UnreachableZone {
                axis: Axis::Columns,
                index,
                target,
            });
        }
    }

    let mut loops = 0;
    let mut residual = double_residual(&matrix, row_targets, col_targets, &unreachable);
    let mut history = vec![residual];

    while residual > config.tolerance {
        if loops >= config.max_loops {
            warn!(loops, residual, "furness hit loop cap before tolerance");
            break;
        }
        if stalled(&history, config.stall_loops) {
            warn!(
                loops,
                residual, "furness residual stalled, stopping early"
            );
            break;
        }

        scale_to_targets(&mut matrix, row_targets, Axis::Rows);
        scale_to_targets(&mut matrix, col_targets, Axis::Columns);
        loops += 1;

        if !matrix.is_finite() {
            warn!(loops, "furness produced non-finite values, stopping");
            break;
        }

        residual = double_residual(&matrix, row_targets, col_targets, &unreachable);
        history.push(residual);
        debug!(loops, residual, "furness loop");
    }
    // Covers both a seed already within tolerance and convergence mid-loop.
    let converged = residual <= config.tolerance;

    let report = FurnessReport {
        constraint: FurnessConstraint::Double,
        converged,
        loops,
        residual,
        residual_history: history,
        unreachable,
    };
    Ok((matrix, report))
}

/// One factor pass: scale each row (or column) towards its target total,
/// skipping zero marginals to avoid 0/0.
fn scale_to_targets(matrix: &mut SquareMatrix, targets: &[f64], axis: Axis) {
    let current = match axis {
        Axis::Rows => matrix.row_sums(),
        Axis::Columns => matrix.col_sums(),
    };
    for (index, (&current_total, &target)) in current.iter().zip(targets).enumerate() {
        if current_total == 0.0 {
            continue;
        }
        let factor = target / current_total;
        match axis {
            Axis::Rows => matrix.scale_row(index, factor),
            Axis::Columns => matrix.scale_col(index, factor),
        }
    }
}

/// Largest absolute difference between achieved and target marginals along
/// one axis, ignoring unreachable zones.
fn marginal_residual(
    matrix: &SquareMatrix,
    targets: &[f64],
    axis: Axis,
    unreachable: &[UnreachableZone],
) -> f64 {
    let achieved = match axis {
        Axis::Rows => matrix.row_sums(),
        Axis::Columns => matrix.col_sums(),
    };
    achieved
        .iter()
        .zip(targets)
        .enumerate()
        .filter(|(index, _)| {
            !unreachable
                .iter()
                .any(|u| u.axis == axis && u.index == *index)
        })
        .map(|(_, (achieved, target))| (achieved - target).abs())
        .fold(0.0, f64::max)
}

fn double_residual(
    matrix: &SquareMatrix,
    row_targets: &[f64],
    col_targets: &[f64],
    unreachable: &[UnreachableZone],
) -> f64 {
    let rows = marginal_residual(matrix, row_targets, Axis::Rows, unreachable);
    let cols = marginal_residual(matrix, col_targets, Axis::Columns, unreachable);
    rows.max(cols)
}

/// True when the residual has stopped improving over the last `window`
/// loops.
fn stalled(history: &[f64], window: usize) -> bool {
    if window == 0 || history.len() < window {
        return false;
    }
    let recent = &history[history.len() - window..];
    let first = recent[0];
    recent
        .iter()
        .all(|&d| (d - first).abs() <= 1e-8 + 1e-5 * first.abs())
}
