//! Self-calibration of the gravity model cost function.
//!
//! Derivative-free compass search over the two cost-function parameters,
//! minimising the squared difference between observed and modelled
//! trip-length shares. Every evaluation is one full gravity model pass,
//! so the evaluation cap is the dominant cost control of a model run.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cost_function::CostFunction;
use crate::distribution::{AreaMask, ObservedDistribution};
use crate::errors::{ModelError, ModelWarning};
use crate::gravity::{GravityConfig, GravityOutcome, TripEnds, gravity_model};
use crate::matrix::SquareMatrix;
use crate::zones::ZoneSystem;

/// Cooperative cancellation flag for long calibration runs.
///
/// Checked between evaluations only; each evaluation is stateless and
/// idempotent, so cancelling never leaves partial shared state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Tunable stopping rules for the calibration search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Hard cap on gravity model evaluations.
    pub max_evaluations: usize,
    /// An objective improvement below this does not count as progress.
    pub improvement_tolerance: f64,
    /// First compass step, as a fraction of each parameter's bound range.
    pub initial_step: f64,
    /// Search has converged once the step fraction shrinks below this.
    pub min_step: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            max_evaluations: 100,
            improvement_tolerance: 1e-6,
            initial_step: 0.05,
            min_step: 1e-4,
        }
    }
}

/// One scored point of the search, kept for the run log.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Evaluation {
    pub params: (f64, f64),
    pub objective: f64,
    pub r_squared: f64,
}

/// Result of a calibration run.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationOutcome {
    /// Cost function with the best parameters found.
    pub cost_function: CostFunction,
    /// Gravity model outcome at those parameters.
    pub outcome: GravityOutcome,
    pub r_squared: f64,
    /// Every scored evaluation in search order.
    pub evaluations: Vec<Evaluation>,
    pub converged: bool,
    pub cancelled: bool,
    pub warnings: Vec<ModelWarning>,
}

/// Calibrates the cost-function parameters for one segment.
///
/// Starts from the parameters in `config.cost_function` and never accepts
/// a point scoring worse than the current best, so the final objective is
/// at most the objective at the initial parameters. A candidate whose
/// evaluation fails on a data error (e.g. deterrence overflow at an
/// extreme parameter pair) is skipped; failure at the initial parameters
/// is fatal.
pub fn calibrate(
    zones: &ZoneSystem,
    trip_ends: &TripEnds,
    costs: &SquareMatrix,
    calibration: Option<&SquareMatrix>,
    observed: &ObservedDistribution,
    mask: Option<&AreaMask>,
    config: &GravityConfig,
    search: &CalibrationConfig,
    cancel: &CancelToken,
) -> Result<CalibrationOutcome, ModelError> {
    let bounds = config.cost_function.param_bounds();
    let mut evaluations = Vec::new();

    let run = |params: (f64, f64)| -> Result<GravityOutcome, ModelError> {
        let run_config = GravityConfig {
            cost_function: config.cost_function.with_params(params.0, params.1),
            ..config.clone()
        };
        gravity_model(zones, trip_ends, costs, calibration, observed, mask, &run_config)
    };

    // The initial parameters must evaluate; any error here is fatal.
    let initial = config.cost_function.params();
    let mut best_outcome = run(initial)?;
    let mut best_objective = best_outcome.comparison.squared_error;
    let mut best_params = initial;
    evaluations.push(Evaluation {
        params: initial,
        objective: best_objective,
        r_squared: best_outcome.comparison.r_squared,
    });

    let mut step = search.initial_step;
    let mut converged = false;
    let mut cancelled = false;

    'search: while evaluations.len() < search.max_evaluations {
        if step < search.min_step {
            converged = true;
            break;
        }

        let mut improved = false;
        for (param_index, sign) in [(0, 1.0), (0, -1.0), (1, 1.0), (1, -1.0)] {
            if evaluations.len() >= search.max_evaluations {
                break;
            }
            if cancel.is_cancelled() {
                cancelled = true;
                break 'search;
            }

            let (low, high) = bounds[param_index];
            let delta = sign * step * (high - low);
            let mut candidate = best_params;
            if param_index == 0 {
                candidate.0 = (candidate.0 + delta).clamp(low, high);
            } else {
                candidate.1 = (candidate.1 + delta).clamp(low, high);
            }
            if candidate == best_params {
                continue;
            }

            let outcome = match run(candidate) {
                Ok(outcome) => outcome,
                Err(ModelError::Data(error)) => {
                    warn!(?candidate, %error, "skipping candidate parameters");
                    continue;
                }
                Err(error) => return Err(error),
            };
            let objective = outcome.comparison.squared_error;
            evaluations.push(Evaluation {
                params: candidate,
                objective,
                r_squared: outcome.comparison.r_squared,
            });
            debug!(?candidate, objective, "calibration evaluation");

            if objective < best_objective - search.improvement_tolerance {
                best_objective = objective;
                best_outcome = outcome;
                best_params = candidate;
                improved = true;
            }
        }

        if !improved {
            step /= 2.0;
        }
    }

    let mut warnings = Vec::new();
    if !converged && !cancelled {
        warn!(
            evaluations = evaluations.len(),
            objective = best_objective,
            "calibration hit evaluation cap before converging"
        );
        warnings.push(ModelWarning::CalibrationNotConverged {
            evaluations: evaluations.len(),
            objective: best_objective,
        });
    }

    let r_squared = best_outcome.comparison.r_squared;
    Ok(CalibrationOutcome {
        cost_function: config.cost_function.with_params(best_params.0, best_params.1),
        outcome: best_outcome,
        r_squared,
        evaluations,
        converged,
        cancelled,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_flags_all_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
