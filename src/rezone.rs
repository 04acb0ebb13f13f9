//! Applying zone correspondences before and after a model run.
//!
//! The correspondence itself (zone to zone with splitting factors) comes
//! from an external collaborator; this module only applies it to trip-end
//! vectors and OD matrices so they enter or leave the core in the right
//! zone system.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::DataError;
use crate::matrix::{SquareMatrix, check_matrix_dim, check_vector_len};
use crate::zones::ZoneSystem;

/// One splitting-factor row of a zone correspondence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrespondenceRow {
    pub from_zone: u32,
    pub to_zone: u32,
    pub factor: f64,
}

/// Zone-to-zone correspondence with splitting factors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneCorrespondence {
    rows: Vec<CorrespondenceRow>,
}

impl ZoneCorrespondence {
    pub fn new(rows: Vec<CorrespondenceRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[CorrespondenceRow] {
        &self.rows
    }

    /// Resolves the correspondence to index pairs between two zone
    /// systems: for each source index, the target indices and factors.
    ///
    /// Every source zone must appear in the correspondence and every
    /// referenced target zone must exist in the target system.
    fn splits(
        &self,
        from: &ZoneSystem,
        to: &ZoneSystem,
    ) -> Result<Vec<Vec<(usize, f64)>>, DataError> {
        let mut splits: Vec<Vec<(usize, f64)>> = vec![Vec::new(); from.len()];
        let mut missing_targets = Vec::new();
        for row in &self.rows {
            let Some(from_index) = from.index_of(row.from_zone) else {
                // Rows for zones outside this run's system are ignored.
                continue;
            };
            match to.index_of(row.to_zone) {
                Some(to_index) => splits[from_index].push((to_index, row.factor)),
                None => missing_targets.push(row.to_zone),
            }
        }
        if let Some(&first) = missing_targets.first() {
            return Err(DataError::MissingCorrespondence {
                name: "target zone system",
                count: missing_targets.len(),
                first,
            });
        }

        let missing: Vec<u32> = splits
            .iter()
            .enumerate()
            .filter(|(_, targets)| targets.is_empty())
            .map(|(index, _)| from.id_at(index))
            .collect();
        if let Some(&first) = missing.first() {
            return Err(DataError::MissingCorrespondence {
                name: "source zone",
                count: missing.len(),
                first,
            });
        }

        let unbalanced = splits
            .iter()
            .filter(|targets| {
                let total: f64 = targets.iter().map(|(_, factor)| factor).sum();
                (total - 1.0).abs() > 1e-6
            })
            .count();
        if unbalanced > 0 {
            warn!(
                zones = unbalanced,
                "correspondence splitting factors do not sum to 1"
            );
        }
        Ok(splits)
    }

    /// Rezones a trip-end vector from one zone system to another.
    pub fn rezone_trip_ends(
        &self,
        from: &ZoneSystem,
        to: &ZoneSystem,
        values: &[f64],
    ) -> Result<Vec<f64>, DataError> {
        check_vector_len("trip ends", values, from.len())?;
        let splits = self.splits(from, to)?;
        let mut out = vec![0.0; to.len()];
        for (from_index, targets) in splits.iter().enumerate() {
            for &(to_index, factor) in targets {
                out[to_index] += values[from_index] * factor;
            }
        }
        Ok(out)
    }

    /// Rezones an OD matrix on both origins and destinations.
    pub fn rezone_matrix(
        &self,
        from: &ZoneSystem,
        to: &ZoneSystem,
        matrix: &SquareMatrix,
    ) -> Result<SquareMatrix, DataError> {
        check_matrix_dim("matrix", matrix, from.len())?;
        let splits = self.splits(from, to)?;
        let mut out = SquareMatrix::zeros(to.len());
        for (origin, origin_targets) in splits.iter().enumerate() {
            for (destination, destination_targets) in splits.iter().enumerate() {
                let trips = matrix.get(origin, destination);
                if trips == 0.0 {
                    continue;
                }
                for &(new_origin, origin_factor) in origin_targets {
                    for &(new_destination, destination_factor) in destination_targets {
                        let value = out.get(new_origin, new_destination)
                            + trips * origin_factor * destination_factor;
                        out.set(new_origin, new_destination, value);
                    }
                }
            }
        }
        Ok(out)
    }
}
