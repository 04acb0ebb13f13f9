//! Deterrence cost functions for seeding the gravity model.
//!
//! The two supported forms are a closed enum so the configuration layer
//! cannot name a function the engine doesn't implement.

use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, DataError, ModelError};
use crate::matrix::SquareMatrix;

/// Parametric deterrence function mapping travel cost to relative trip
/// likelihood.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "function", rename_all = "snake_case")]
pub enum CostFunction {
    /// `f(c) = c^alpha * exp(beta * c)`
    Tanner { alpha: f64, beta: f64 },
    /// `f(c) = 1 / (c * sigma * sqrt(2 pi)) * exp(-(ln c - mu)^2 / (2 sigma^2))`
    LogNormal { sigma: f64, mu: f64 },
}

impl CostFunction {
    /// Builds a cost function from a configuration name and two parameters.
    ///
    /// Names are matched case- and whitespace-insensitively, mirroring the
    /// parameter supplier's table format.
    pub fn parse(name: &str, p1: f64, p2: f64) -> Result<Self, ConfigError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "tanner" => Ok(Self::Tanner { alpha: p1, beta: p2 }),
            "log_normal" | "log normal" => Ok(Self::LogNormal { sigma: p1, mu: p2 }),
            _ => Err(ConfigError::UnknownCostFunction {
                name: name.to_string(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Tanner { .. } => "tanner",
            Self::LogNormal { .. } => "log_normal",
        }
    }

    /// The two parameters in configuration order.
    pub fn params(&self) -> (f64, f64) {
        match *self {
            Self::Tanner { alpha, beta } => (alpha, beta),
            Self::LogNormal { sigma, mu } => (sigma, mu),
        }
    }

    /// Same functional form with replacement parameters.
    pub fn with_params(&self, p1: f64, p2: f64) -> Self {
        match self {
            Self::Tanner { .. } => Self::Tanner { alpha: p1, beta: p2 },
            Self::LogNormal { .. } => Self::LogNormal { sigma: p1, mu: p2 },
        }
    }

    /// Default starting parameters for calibration.
    pub fn initial_params(&self) -> (f64, f64) {
        match self {
            Self::Tanner { .. } => (1.0, -1.0),
            Self::LogNormal { .. } => (1.0, 1.0),
        }
    }

    /// Calibration search bounds as `[(low, high); 2]` per parameter.
    pub fn param_bounds(&self) -> [(f64, f64); 2] {
        match self {
            Self::Tanner { .. } => [(0.0, 100.0), (-100.0, 0.0)],
            // Sigma must stay strictly positive.
            Self::LogNormal { .. } => [(1e-6, 100.0), (-100.0, 100.0)],
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Self::LogNormal { sigma, .. } = *self {
            if sigma <= 0.0 {
                return Err(ConfigError::NonPositiveSigma { sigma });
            }
        }
        Ok(())
    }

    /// Evaluates the deterrence value for every cell of `costs`.
    ///
    /// Zero-cost pairs always map to zero deterrence: they contribute no
    /// synthetic demand and avoid the undefined `0^a` / `ln 0` cases.
    /// Negative costs and parameter/cost combinations that overflow to a
    /// non-finite value are errors, so the returned matrix contains only
    /// finite non-negative values.
    pub fn deterrence(&self, costs: &SquareMatrix) -> Result<SquareMatrix, ModelError> {
        self.validate()?;
        let n = costs.n();
        let mut out = SquareMatrix::zeros(n);
        for row in 0..n {
            for col in 0..n {
                let cost = costs.get(row, col);
                if cost < 0.0 {
                    return Err(DataError::NegativeCost {
                        row,
                        col,
                        value: cost,
                    }
                    .into());
                }
                if cost == 0.0 {
                    continue;
                }
                let value = self.evaluate(cost);
                if !value.is_finite() {
                    return Err(DataError::NonFiniteDeterrence { row, col, cost }.into());
                }
                out.set(row, col, value);
            }
        }
        Ok(out)
    }

    /// Single-cell evaluation for a strictly positive cost.
    fn evaluate(&self, cost: f64) -> f64 {
        match *self {
            // Fused as exp(alpha*ln c + beta*c) so a huge power times a
            // vanishing exponential cannot produce inf * 0 = NaN.
            Self::Tanner { alpha, beta } => (alpha * cost.ln() + beta * cost).exp(),
            Self::LogNormal { sigma, mu } => {
                let frac = 1.0 / (cost * sigma * (2.0 * std::f64::consts::PI).sqrt());
                let deviation = cost.ln() - mu;
                frac * (-(deviation * deviation) / (2.0 * sigma * sigma)).exp()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        let tanner = CostFunction::parse(" Tanner ", 1.0, -0.5).unwrap();
        assert_eq!(tanner, CostFunction::Tanner { alpha: 1.0, beta: -0.5 });

        let log_normal = CostFunction::parse("LOG_NORMAL", 1.2, 0.3).unwrap();
        assert_eq!(log_normal, CostFunction::LogNormal { sigma: 1.2, mu: 0.3 });

        let err = CostFunction::parse("gamma", 1.0, 1.0).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownCostFunction { .. }));
    }

    #[test]
    fn test_default_parameters_sit_inside_bounds() {
        for f in [
            CostFunction::Tanner { alpha: 0.0, beta: 0.0 },
            CostFunction::LogNormal { sigma: 1.0, mu: 0.0 },
        ] {
            let (p1, p2) = f.initial_params();
            let [(low1, high1), (low2, high2)] = f.param_bounds();
            assert!(low1 <= p1 && p1 <= high1);
            assert!(low2 <= p2 && p2 <= high2);
            assert!(f.with_params(p1, p2).validate().is_ok());
        }
    }

    #[test]
    fn test_tanner_matches_direct_form() {
        let f = CostFunction::Tanner { alpha: 1.5, beta: -0.2 };
        let costs = SquareMatrix::filled(1, 7.0);
        let d = f.deterrence(&costs).unwrap();
        let expected = 7.0_f64.powf(1.5) * (-0.2_f64 * 7.0).exp();
        assert!((d.get(0, 0) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_zero_cost_maps_to_zero() {
        let costs = SquareMatrix::from_rows(vec![vec![0.0, 5.0], vec![5.0, 0.0]]).unwrap();
        for f in [
            CostFunction::Tanner { alpha: -2.0, beta: -0.1 },
            CostFunction::LogNormal { sigma: 1.0, mu: 1.0 },
        ] {
            let d = f.deterrence(&costs).unwrap();
            assert_eq!(d.get(0, 0), 0.0);
            assert_eq!(d.get(1, 1), 0.0);
            assert!(d.get(0, 1) > 0.0);
        }
    }

    #[test]
    fn test_values_always_finite_and_non_negative() {
        let costs = SquareMatrix::from_rows(vec![
            vec![0.0, 0.5, 80.0],
            vec![1.0, 0.0, 250.0],
            vec![12.0, 3.0, 0.0],
        ])
        .unwrap();
        for f in [
            CostFunction::Tanner { alpha: 10.0, beta: -1.0 },
            CostFunction::Tanner { alpha: 0.0, beta: -0.01 },
            CostFunction::LogNormal { sigma: 0.5, mu: 2.0 },
        ] {
            let d = f.deterrence(&costs).unwrap();
            assert!(d.is_finite());
            assert!(d.as_slice().iter().all(|&v| v >= 0.0));
        }
    }

    #[test]
    fn test_negative_cost_rejected() {
        let costs = SquareMatrix::from_rows(vec![vec![0.0, -1.0], vec![1.0, 0.0]]).unwrap();
        let err = CostFunction::Tanner { alpha: 1.0, beta: -1.0 }
            .deterrence(&costs)
            .unwrap_err();
        assert_eq!(
            err,
            ModelError::Data(DataError::NegativeCost {
                row: 0,
                col: 1,
                value: -1.0
            })
        );
    }

    #[test]
    fn test_overflow_is_an_error_not_infinity() {
        // alpha at its upper bound with beta = 0 overflows for large costs.
        let costs = SquareMatrix::filled(1, 1e6);
        let err = CostFunction::Tanner { alpha: 100.0, beta: 0.0 }
            .deterrence(&costs)
            .unwrap_err();
        assert!(matches!(
            err,
            ModelError::Data(DataError::NonFiniteDeterrence { .. })
        ));
    }

    #[test]
    fn test_non_positive_sigma_rejected() {
        let costs = SquareMatrix::filled(1, 1.0);
        let err = CostFunction::LogNormal { sigma: 0.0, mu: 1.0 }
            .deterrence(&costs)
            .unwrap_err();
        assert_eq!(err, ModelError::Config(ConfigError::NonPositiveSigma { sigma: 0.0 }));
    }
}
