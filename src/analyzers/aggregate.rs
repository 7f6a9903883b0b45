//! Batch Aggregator: one validated batch in, one partial aggregate out.

use tracing::warn;

use crate::analyzers::types::PartialAggregate;
use crate::errors::AggregationError;
use crate::trip::{Batch, PASSENGER_COUNT, TIP_AMOUNT, TOTAL_AMOUNT, TRIP_DISTANCE, TripRecord};

/// Trips longer than this many miles count as long trips.
pub const LONG_TRIP_MILES: f64 = 10.0;

/// Reduces one batch to its sums and counts.
///
/// Expects every summed field to be present, which the validator chain
/// guarantees; an unvalidated batch with gaps is reported as an error.
pub fn aggregate_batch(batch: &Batch) -> Result<PartialAggregate, AggregationError> {
    let missing: Vec<String> = batch
        .missing_columns()
        .into_iter()
        .filter(|c| {
            [PASSENGER_COUNT, TRIP_DISTANCE, TIP_AMOUNT, TOTAL_AMOUNT].contains(&c.as_str())
        })
        .collect();
    if !missing.is_empty() {
        return Err(AggregationError::MissingColumns(missing));
    }

    batch
        .rows
        .iter()
        .enumerate()
        .try_fold(PartialAggregate::default(), |acc, (i, row)| {
            Ok(acc.combine(single(i, row)?))
        })
}

/// Like [`aggregate_batch`], but a failed batch contributes zeros.
///
/// The failure is logged and handed back so the caller can count it.
pub fn aggregate_or_zero(batch: &Batch) -> (PartialAggregate, Option<AggregationError>) {
    match aggregate_batch(batch) {
        Ok(partial) => (partial, None),
        Err(e) => {
            warn!(error = %e, rows = batch.len(), "Batch aggregation failed, counting it as empty");
            (PartialAggregate::default(), Some(e))
        }
    }
}

fn single(row_index: usize, row: &TripRecord) -> Result<PartialAggregate, AggregationError> {
    // NaN counts as missing, same as an empty cell.
    let field = |value: Option<f64>, field: &'static str| {
        value.filter(|v| !v.is_nan()).ok_or(AggregationError::MissingField {
            row: row_index,
            field,
        })
    };

    let distance = field(row.trip_distance, TRIP_DISTANCE)?;
    let tip = field(row.tip_amount, TIP_AMOUNT)?;
    let amount = field(row.total_amount, TOTAL_AMOUNT)?;
    let passengers = row.passenger_count.ok_or(AggregationError::MissingField {
        row: row_index,
        field: PASSENGER_COUNT,
    })?;
    let passengers = u64::try_from(passengers)
        .map_err(|_| AggregationError::NegativePassengers { row: row_index })?;

    Ok(PartialAggregate {
        rows: 1,
        distance,
        tip,
        amount,
        passengers,
        long_trips: u64::from(distance > LONG_TRIP_MILES),
    })
}
