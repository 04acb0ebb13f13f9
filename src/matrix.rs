//! Dense square matrix storage for costs, seeds and trip matrices.
//!
//! Stored as a flat row-major vector. Matrices are value objects: each
//! gravity model invocation builds its own and nothing is shared between
//! concurrent runs.

use serde::{Deserialize, Serialize};

use crate::errors::DataError;

/// Dense square `n x n` matrix of f64 values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SquareMatrix {
    n: usize,
    data: Vec<f64>,
}

impl SquareMatrix {
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            data: vec![0.0; n * n],
        }
    }

    pub fn filled(n: usize, value: f64) -> Self {
        Self {
            n,
            data: vec![value; n * n],
        }
    }

    /// Builds a matrix from nested rows, checking it is square.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, DataError> {
        let n = rows.len();
        let mut data = Vec::with_capacity(n * n);
        for row in &rows {
            if row.len() != n {
                return Err(DataError::MatrixDimensions {
                    name: "matrix",
                    expected: n,
                    rows: n,
                    cols: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self { n, data })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.n + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.n + col] = value;
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.n..(row + 1) * self.n]
    }

    pub fn row_sums(&self) -> Vec<f64> {
        self.data
            .chunks_exact(self.n)
            .map(|row| row.iter().sum())
            .collect()
    }

    pub fn col_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.n];
        for row in self.data.chunks_exact(self.n) {
            for (sum, value) in sums.iter_mut().zip(row) {
                *sum += value;
            }
        }
        sums
    }

    pub fn total(&self) -> f64 {
        self.data.iter().sum()
    }

    pub fn scale_row(&mut self, row: usize, factor: f64) {
        for value in &mut self.data[row * self.n..(row + 1) * self.n] {
            *value *= factor;
        }
    }

    pub fn scale_col(&mut self, col: usize, factor: f64) {
        for row in self.data.chunks_exact_mut(self.n) {
            row[col] *= factor;
        }
    }

    /// Element-wise multiplication by another matrix of the same size.
    pub fn mul_elementwise(&mut self, other: &SquareMatrix) -> Result<(), DataError> {
        if other.n != self.n {
            return Err(DataError::MatrixDimensions {
                name: "factor matrix",
                expected: self.n,
                rows: other.n,
                cols: other.n,
            });
        }
        for (value, factor) in self.data.iter_mut().zip(&other.data) {
            *value *= factor;
        }
        Ok(())
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }
}

/// Checks a vector has the expected length for the current zone system.
pub fn check_vector_len(name: &'static str, values: &[f64], n: usize) -> Result<(), DataError> {
    if values.len() != n {
        return Err(DataError::VectorLength {
            name,
            expected: n,
            actual: values.len(),
        });
    }
    Ok(())
}

/// Checks a matrix has the expected dimension for the current zone system.
pub fn check_matrix_dim(
    name: &'static str,
    matrix: &SquareMatrix,
    n: usize,
) -> Result<(), DataError> {
    if matrix.n() != n {
        return Err(DataError::MatrixDimensions {
            name,
            expected: n,
            rows: matrix.n(),
            cols: matrix.n(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows_rejects_ragged() {
        let err = SquareMatrix::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(err, DataError::MatrixDimensions { .. }));
    }

    #[test]
    fn test_marginal_sums() {
        let m = SquareMatrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(m.row_sums(), vec![3.0, 7.0]);
        assert_eq!(m.col_sums(), vec![4.0, 6.0]);
        assert_eq!(m.total(), 10.0);
    }

    #[test]
    fn test_scaling() {
        let mut m = SquareMatrix::filled(2, 1.0);
        m.scale_row(0, 2.0);
        m.scale_col(1, 3.0);
        assert_eq!(m.get(0, 0), 2.0);
        assert_eq!(m.get(0, 1), 6.0);
        assert_eq!(m.get(1, 1), 3.0);
    }

    #[test]
    fn test_mul_elementwise() {
        let mut m = SquareMatrix::filled(2, 2.0);
        let k = SquareMatrix::from_rows(vec![vec![1.0, 0.5], vec![0.0, 2.0]]).unwrap();
        m.mul_elementwise(&k).unwrap();
        assert_eq!(m.get(0, 1), 1.0);
        assert_eq!(m.get(1, 0), 0.0);
        assert_eq!(m.get(1, 1), 4.0);

        let wrong = SquareMatrix::zeros(3);
        assert!(m.mul_elementwise(&wrong).is_err());
    }
}
