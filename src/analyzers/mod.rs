//! Trip aggregation and summary statistics.
//!
//! Validated batches are reduced to [`types::PartialAggregate`]s, folded into
//! a running [`types::GlobalAggregate`] by the [`reducer::GlobalReducer`], and
//! summarised once the input is exhausted. The sequential driver lives in
//! [`analyzer`], the multi-worker one in [`parallel`].

pub mod aggregate;
pub mod analyzer;
pub mod anomalies;
pub mod parallel;
pub mod reducer;
pub mod types;
pub mod utility;
