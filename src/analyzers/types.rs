//! Data types used by the aggregation pipeline.

use serde::Serialize;
use std::fmt;

/// Sums and counts for one validated batch (or one worker's partition).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PartialAggregate {
    pub rows: u64,
    pub distance: f64,
    pub tip: f64,
    pub amount: f64,
    pub passengers: u64,
    pub long_trips: u64,
}

impl PartialAggregate {
    pub fn is_zero(&self) -> bool {
        *self == PartialAggregate::default()
    }

    /// Field-wise sum of two partials.
    pub fn combine(self, other: PartialAggregate) -> PartialAggregate {
        PartialAggregate {
            rows: self.rows + other.rows,
            distance: self.distance + other.distance,
            tip: self.tip + other.tip,
            amount: self.amount + other.amount,
            passengers: self.passengers + other.passengers,
            long_trips: self.long_trips + other.long_trips,
        }
    }
}

/// Running totals for a whole run. Only ever grows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GlobalAggregate {
    pub rows: u64,
    pub distance: f64,
    pub tip: f64,
    pub amount: f64,
    pub passengers: u64,
    pub long_trips: u64,
}

impl GlobalAggregate {
    pub(crate) fn add(&mut self, partial: &PartialAggregate) {
        self.rows += partial.rows;
        self.distance += partial.distance;
        self.tip += partial.tip;
        self.amount += partial.amount;
        self.passengers += partial.passengers;
        self.long_trips += partial.long_trips;
    }
}

impl From<GlobalAggregate> for PartialAggregate {
    fn from(g: GlobalAggregate) -> Self {
        PartialAggregate {
            rows: g.rows,
            distance: g.distance,
            tip: g.tip,
            amount: g.amount,
            passengers: g.passengers,
            long_trips: g.long_trips,
        }
    }
}

/// A single reported number: raw counts stay integral, everything else is
/// rounded to two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Count(u64),
    Amount(f64),
}

impl MetricValue {
    pub fn as_f64(&self) -> f64 {
        match *self {
            MetricValue::Count(c) => c as f64,
            MetricValue::Amount(a) => a,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Count(c) => write!(f, "{c}"),
            MetricValue::Amount(a) => write!(f, "{a:.2}"),
        }
    }
}

pub const RECORD_COUNT: &str = "Record count";
pub const MEAN_DISTANCE: &str = "Mean trip distance (miles)";
pub const MEAN_TIP: &str = "Mean tip ($)";
pub const TOTAL_AMOUNT: &str = "Total amount ($)";
pub const MEAN_FARE: &str = "Mean fare per trip ($)";
pub const PASSENGER_TOTAL: &str = "Passenger total";
pub const MEAN_PASSENGERS: &str = "Mean passengers per trip";
pub const LONG_TRIPS: &str = "Long trips (>10 miles)";

/// Metric keys in report order. Consumers look values up by key.
pub const METRIC_KEYS: [&str; 8] = [
    RECORD_COUNT,
    MEAN_DISTANCE,
    MEAN_TIP,
    TOTAL_AMOUNT,
    MEAN_FARE,
    PASSENGER_TOTAL,
    MEAN_PASSENGERS,
    LONG_TRIPS,
];

/// Final figures derived from a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Summary {
    pub record_count: u64,
    pub mean_distance: f64,
    pub mean_tip: f64,
    pub total_amount: f64,
    pub mean_fare: f64,
    pub passenger_total: u64,
    pub mean_passengers: f64,
    pub long_trips: u64,
}

impl Summary {
    /// `(key, value)` pairs in [`METRIC_KEYS`] order.
    pub fn entries(&self) -> [(&'static str, MetricValue); 8] {
        [
            (RECORD_COUNT, MetricValue::Count(self.record_count)),
            (MEAN_DISTANCE, MetricValue::Amount(self.mean_distance)),
            (MEAN_TIP, MetricValue::Amount(self.mean_tip)),
            (TOTAL_AMOUNT, MetricValue::Amount(self.total_amount)),
            (MEAN_FARE, MetricValue::Amount(self.mean_fare)),
            (PASSENGER_TOTAL, MetricValue::Count(self.passenger_total)),
            (MEAN_PASSENGERS, MetricValue::Amount(self.mean_passengers)),
            (LONG_TRIPS, MetricValue::Count(self.long_trips)),
        ]
    }

    pub fn get(&self, key: &str) -> Option<MetricValue> {
        self.entries()
            .into_iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }
}

/// One worker's contribution, tagged with the worker that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WorkerReport {
    pub worker: usize,
    pub batches: usize,
    /// Batches whose aggregation failed and were counted as zeros.
    pub failed_batches: usize,
    pub partial: PartialAggregate,
}
