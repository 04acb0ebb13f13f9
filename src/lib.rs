//! lgv-gravity core engine
//!
//! Gravity model with self-calibrating doubly-constrained distribution and
//! furnessing: converts per-zone trip-end totals into a full
//! origin-destination matrix consistent with an observed trip-length
//! distribution. File loading, GUI and plotting live elsewhere; this crate
//! only takes materialized matrices and vectors and returns matrices and
//! run records.

pub mod calibrate;
pub mod cost_function;
pub mod distribution;
pub mod errors;
pub mod furness;
pub mod gravity;
pub mod matrix;
pub mod report;
pub mod rezone;
pub mod segments;
pub mod zones;
