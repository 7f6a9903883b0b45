//! Trip records and the fixed-size batches they travel in.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const VENDOR_ID: &str = "VendorID";
pub const PICKUP_DATETIME: &str = "tpep_pickup_datetime";
pub const DROPOFF_DATETIME: &str = "tpep_dropoff_datetime";
pub const PASSENGER_COUNT: &str = "passenger_count";
pub const TRIP_DISTANCE: &str = "trip_distance";
pub const FARE_AMOUNT: &str = "fare_amount";
pub const TIP_AMOUNT: &str = "tip_amount";
pub const TOTAL_AMOUNT: &str = "total_amount";

/// Columns every dataset must declare before any row is processed.
pub const REQUIRED_COLUMNS: [&str; 7] = [
    PASSENGER_COUNT,
    TRIP_DISTANCE,
    TIP_AMOUNT,
    TOTAL_AMOUNT,
    FARE_AMOUNT,
    PICKUP_DATETIME,
    DROPOFF_DATETIME,
];

/// Returns the full column list of a dataset carrying every known field.
pub fn all_columns() -> Vec<String> {
    std::iter::once(VENDOR_ID)
        .chain(REQUIRED_COLUMNS)
        .map(str::to_string)
        .collect()
}

/// One trip as read from the dataset.
///
/// Every field is optional because the source may carry nulls; the
/// validator chain is what turns a record into a trustworthy one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    pub vendor_id: Option<i64>,
    pub pickup: Option<NaiveDateTime>,
    pub dropoff: Option<NaiveDateTime>,
    pub passenger_count: Option<i64>,
    pub trip_distance: Option<f64>,
    pub fare_amount: Option<f64>,
    pub tip_amount: Option<f64>,
    pub total_amount: Option<f64>,
}

impl TripRecord {
    /// Builds a record with every required field present.
    pub fn new(
        pickup: NaiveDateTime,
        dropoff: NaiveDateTime,
        passenger_count: i64,
        trip_distance: f64,
        fare_amount: f64,
        tip_amount: f64,
        total_amount: f64,
    ) -> Self {
        TripRecord {
            vendor_id: None,
            pickup: Some(pickup),
            dropoff: Some(dropoff),
            passenger_count: Some(passenger_count),
            trip_distance: Some(trip_distance),
            fare_amount: Some(fare_amount),
            tip_amount: Some(tip_amount),
            total_amount: Some(total_amount),
        }
    }

    pub fn with_vendor(mut self, vendor_id: i64) -> Self {
        self.vendor_id = Some(vendor_id);
        self
    }

    /// Dropoff minus pickup, if both timestamps are known.
    pub fn duration(&self) -> Option<Duration> {
        match (self.pickup, self.dropoff) {
            (Some(pickup), Some(dropoff)) => Some(dropoff - pickup),
            _ => None,
        }
    }

    /// True when a required field is null or a float field is NaN.
    pub fn has_missing_values(&self) -> bool {
        let missing_float = |v: Option<f64>| v.is_none_or(f64::is_nan);

        self.pickup.is_none()
            || self.dropoff.is_none()
            || self.passenger_count.is_none()
            || missing_float(self.trip_distance)
            || missing_float(self.fare_amount)
            || missing_float(self.tip_amount)
            || missing_float(self.total_amount)
    }

    /// Hashable key under full-field equality (floats compared bitwise).
    pub(crate) fn identity(&self) -> RecordIdentity {
        let bits = |v: Option<f64>| v.map(f64::to_bits);
        (
            self.vendor_id,
            self.pickup,
            self.dropoff,
            self.passenger_count,
            bits(self.trip_distance),
            bits(self.fare_amount),
            bits(self.tip_amount),
            bits(self.total_amount),
        )
    }
}

pub(crate) type RecordIdentity = (
    Option<i64>,
    Option<NaiveDateTime>,
    Option<NaiveDateTime>,
    Option<i64>,
    Option<u64>,
    Option<u64>,
    Option<u64>,
    Option<u64>,
);

/// An ordered group of rows handled as one unit.
///
/// The column list is shared with the source that produced the batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    columns: Arc<Vec<String>>,
    pub rows: Vec<TripRecord>,
}

impl Batch {
    pub fn new(columns: Arc<Vec<String>>, rows: Vec<TripRecord>) -> Self {
        Batch { columns, rows }
    }

    /// A batch declaring every known column.
    pub fn from_rows(rows: Vec<TripRecord>) -> Self {
        Batch::new(Arc::new(all_columns()), rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Required columns the batch does not declare, in declaration order.
    pub fn missing_columns(&self) -> Vec<String> {
        missing_columns(&self.columns)
    }

    /// Same columns, different rows.
    pub fn with_rows(&self, rows: Vec<TripRecord>) -> Self {
        Batch::new(Arc::clone(&self.columns), rows)
    }
}

/// Required columns absent from `columns`.
pub fn missing_columns(columns: &[String]) -> Vec<String> {
    REQUIRED_COLUMNS
        .iter()
        .filter(|required| !columns.iter().any(|c| c == *required))
        .map(|c| c.to_string())
        .collect()
}
