//! Rows whose tip is larger than the total amount.

use serde::Serialize;

use crate::trip::{Batch, TripRecord};

/// How many offending rows are kept for the report.
pub const SAMPLE_LIMIT: usize = 10;

/// Counts rows whose tip exceeds the total charged, keeping the first few.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnomalyScan {
    pub count: u64,
    pub samples: Vec<TripRecord>,
}

impl AnomalyScan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_anomalous(row: &TripRecord) -> bool {
        match (row.tip_amount, row.total_amount) {
            (Some(tip), Some(total)) => tip > total,
            _ => false,
        }
    }

    pub fn scan(&mut self, batch: &Batch) {
        for row in batch.rows.iter().filter(|r| Self::is_anomalous(r)) {
            self.count += 1;
            if self.samples.len() < SAMPLE_LIMIT {
                self.samples.push(row.clone());
            }
        }
    }
}
