//! Observed trip-length distributions and goodness-of-fit scoring.
//!
//! The comparator bins a trip matrix by travel cost and scores the binned
//! totals against an observed distribution. Shares are compared rather
//! than raw totals so the fit measures shape, independent of the matrix
//! grand total.

use serde::{Deserialize, Serialize};

use crate::errors::DataError;
use crate::matrix::{SquareMatrix, check_matrix_dim};

/// One band of an observed trip-length distribution.
///
/// Covers the half-open cost interval `[start, end)`. The final band of a
/// distribution is treated as unbounded above regardless of its `end`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObservedBand {
    pub start: f64,
    pub end: f64,
    pub observed: f64,
    pub average_cost: f64,
}

/// Validated, ordered set of observed distribution bands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedDistribution {
    bands: Vec<ObservedBand>,
}

impl ObservedDistribution {
    /// Validates that bands are contiguous, non-overlapping and ascending.
    pub fn new(bands: Vec<ObservedBand>) -> Result<Self, DataError> {
        if bands.is_empty() {
            return Err(DataError::EmptyDistribution);
        }
        let mut previous_end: Option<f64> = None;
        for (index, band) in bands.iter().enumerate() {
            if band.start >= band.end {
                return Err(DataError::InvalidBand {
                    index,
                    start: band.start,
                    end: band.end,
                });
            }
            if band.observed < 0.0 {
                return Err(DataError::NegativeObserved {
                    index,
                    observed: band.observed,
                });
            }
            if let Some(previous_end) = previous_end {
                if (band.start - previous_end).abs() > 1e-9 {
                    return Err(DataError::NonContiguousBands {
                        index,
                        start: band.start,
                        end: band.end,
                        previous_end,
                    });
                }
            }
            previous_end = Some(band.end);
        }
        Ok(Self { bands })
    }

    pub fn bands(&self) -> &[ObservedBand] {
        &self.bands
    }

    /// Index of the band containing `cost`, the final band catching all
    /// costs at or above its start.
    fn band_index(&self, cost: f64) -> Option<usize> {
        let last = self.bands.len() - 1;
        if cost >= self.bands[last].start {
            return Some(last);
        }
        self.bands
            .iter()
            .position(|band| cost >= band.start && cost < band.end)
    }

    /// Bins `matrix` trips by travel cost and scores them against the
    /// observed bands. A mask restricts the comparison to a calibration
    /// sub-area of zone pairs.
    pub fn compare(
        &self,
        matrix: &SquareMatrix,
        costs: &SquareMatrix,
        mask: Option<&AreaMask>,
    ) -> Result<DistributionComparison, DataError> {
        let n = matrix.n();
        check_matrix_dim("cost matrix", costs, n)?;
        if let Some(mask) = mask {
            if mask.n() != n {
                return Err(DataError::MatrixDimensions {
                    name: "calibration area mask",
                    expected: n,
                    rows: mask.n(),
                    cols: mask.n(),
                });
            }
        }

        let mut modelled = vec![0.0; self.bands.len()];
        for row in 0..n {
            for col in 0..n {
                if let Some(mask) = mask {
                    if !mask.includes(row, col) {
                        continue;
                    }
                }
                if let Some(index) = self.band_index(costs.get(row, col)) {
                    modelled[index] += matrix.get(row, col);
                }
            }
        }

        let observed: Vec<f64> = self.bands.iter().map(|band| band.observed).collect();
        let observed_shares = shares(&observed);
        let modelled_shares = shares(&modelled);

        let squared_error = observed_shares
            .iter()
            .zip(&modelled_shares)
            .map(|(o, m)| (o - m) * (o - m))
            .sum();
        let r_squared = r_squared(&observed_shares, &modelled_shares);

        let bands = self
            .bands
            .iter()
            .enumerate()
            .map(|(i, band)| BandComparison {
                start: band.start,
                end: band.end,
                observed: observed[i],
                modelled: modelled[i],
                observed_share: observed_shares[i],
                modelled_share: modelled_shares[i],
            })
            .collect();

        Ok(DistributionComparison {
            bands,
            squared_error,
            r_squared,
        })
    }
}

/// Subset of zone pairs included in a calibration-area comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaMask {
    n: usize,
    include: Vec<bool>,
}

impl AreaMask {
    /// An empty mask including no zone pairs.
    pub fn none(n: usize) -> Self {
        Self {
            n,
            include: vec![false; n * n],
        }
    }

    /// Mask including every pair whose origin and destination are both in
    /// the given zone index subset.
    pub fn from_zone_subset(n: usize, zone_indices: &[usize]) -> Self {
        let mut mask = Self::none(n);
        for &row in zone_indices {
            for &col in zone_indices {
                mask.include[row * n + col] = true;
            }
        }
        mask
    }

    pub fn include_pair(&mut self, row: usize, col: usize) {
        self.include[row * self.n + col] = true;
    }

    pub fn includes(&self, row: usize, col: usize) -> bool {
        self.include[row * self.n + col]
    }

    pub fn n(&self) -> usize {
        self.n
    }
}

/// Observed vs modelled totals for one band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandComparison {
    pub start: f64,
    pub end: f64,
    pub observed: f64,
    pub modelled: f64,
    pub observed_share: f64,
    pub modelled_share: f64,
}

/// Goodness-of-fit between an observed distribution and a trip matrix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionComparison {
    pub bands: Vec<BandComparison>,
    /// Sum of squared differences between observed and modelled shares.
    /// This is the calibration objective.
    pub squared_error: f64,
    /// R squared between observed and modelled shares, clamped at zero.
    pub r_squared: f64,
}

/// Normalises totals to sum to one; an all-zero vector stays all zero.
fn shares(totals: &[f64]) -> Vec<f64> {
    let sum: f64 = totals.iter().sum();
    if sum == 0.0 {
        return vec![0.0; totals.len()];
    }
    totals.iter().map(|t| t / sum).collect()
}

fn r_squared(observed: &[f64], modelled: &[f64]) -> f64 {
    let mean = observed.iter().sum::<f64>() / observed.len() as f64;
    let ss_tot: f64 = observed.iter().map(|o| (o - mean) * (o - mean)).sum();
    let ss_res: f64 = observed
        .iter()
        .zip(modelled)
        .map(|(o, m)| (o - m) * (o - m))
        .sum();
    if ss_tot == 0.0 {
        // Flat observed distribution: perfect if matched, no fit otherwise.
        return if ss_res < 1e-12 { 1.0 } else { 0.0 };
    }
    (1.0 - ss_res / ss_tot).max(0.0)
}
