//! Row-level validity rules.
//!
//! Each [`Validator`] is a stateless filter over one batch. Apart from
//! [`Validator::RequiredColumns`], which rejects a whole batch, a validator
//! never fails: rows that break its rule are simply dropped.

use chrono::Duration;
use std::collections::HashSet;

use crate::config::FarePolicy;
use crate::errors::PipelineError;
use crate::trip::{Batch, TripRecord};

/// Longest plausible trip, exclusive.
pub const MAX_TRIP_SECONDS: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validator {
    /// Fails the batch if any required column is not declared.
    RequiredColumns,
    /// Drops rows with a null or NaN required field.
    NoMissingValues,
    /// Keeps `passenger_count > 0`.
    PositivePassengerCount,
    /// Keeps `trip_distance > 0`.
    PositiveDistance,
    /// Keeps fare and total above (or at, when allowed) zero.
    PositiveFare(FarePolicy),
    /// Keeps `tip_amount >= 0`.
    NonNegativeTip,
    /// Keeps `dropoff > pickup`.
    ValidDateRange,
    /// Keeps trips lasting strictly between zero and 24 hours.
    TripDuration,
    /// Drops exact repeats of an earlier row in the same batch.
    DropDuplicates,
}

impl Validator {
    pub fn name(&self) -> &'static str {
        match self {
            Validator::RequiredColumns => "required_columns",
            Validator::NoMissingValues => "no_missing_values",
            Validator::PositivePassengerCount => "positive_passenger_count",
            Validator::PositiveDistance => "positive_distance",
            Validator::PositiveFare(_) => "positive_fare",
            Validator::NonNegativeTip => "non_negative_tip",
            Validator::ValidDateRange => "valid_date_range",
            Validator::TripDuration => "trip_duration",
            Validator::DropDuplicates => "drop_duplicates",
        }
    }

    /// Returns the rows of `batch` this rule accepts, in their input order.
    pub fn apply(&self, batch: Batch) -> Result<Batch, PipelineError> {
        match self {
            Validator::RequiredColumns => {
                let missing = batch.missing_columns();
                if missing.is_empty() {
                    Ok(batch)
                } else {
                    Err(PipelineError::Schema { missing })
                }
            }
            Validator::DropDuplicates => {
                let mut seen = HashSet::with_capacity(batch.len());
                Ok(retain(batch, |row| seen.insert(row.identity())))
            }
            rule => Ok(retain(batch, |row| rule.accepts(row))),
        }
    }

    /// Per-row verdict for the stateless row rules.
    fn accepts(&self, row: &TripRecord) -> bool {
        match self {
            Validator::RequiredColumns | Validator::DropDuplicates => true,
            Validator::NoMissingValues => !row.has_missing_values(),
            Validator::PositivePassengerCount => row.passenger_count.is_some_and(|p| p > 0),
            Validator::PositiveDistance => row.trip_distance.is_some_and(|d| d > 0.0),
            Validator::PositiveFare(policy) => {
                let ok = |amount: Option<f64>| match policy {
                    FarePolicy::Strict => amount.is_some_and(|a| a > 0.0),
                    FarePolicy::AllowZero => amount.is_some_and(|a| a >= 0.0),
                };
                ok(row.fare_amount) && ok(row.total_amount)
            }
            Validator::NonNegativeTip => row.tip_amount.is_some_and(|t| t >= 0.0),
            Validator::ValidDateRange => match (row.pickup, row.dropoff) {
                (Some(pickup), Some(dropoff)) => dropoff > pickup,
                _ => false,
            },
            Validator::TripDuration => row
                .duration()
                .is_some_and(|d| d > Duration::zero() && d < Duration::seconds(MAX_TRIP_SECONDS)),
        }
    }
}

fn retain(mut batch: Batch, mut keep: impl FnMut(&TripRecord) -> bool) -> Batch {
    batch.rows.retain(|row| keep(row));
    batch
}
