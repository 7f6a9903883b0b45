//! CSV batch source using the dataset's own header names.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use csv::{DeserializeRecordsIntoIter, ReaderBuilder};
use serde::{Deserialize, Deserializer};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use super::BatchSource;
use crate::trip::{Batch, TripRecord};

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// One CSV line, named after the dataset's own headers.
#[derive(Debug, Deserialize)]
struct CsvTripRow {
    #[serde(rename = "VendorID", default)]
    vendor_id: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_datetime")]
    tpep_pickup_datetime: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "deserialize_datetime")]
    tpep_dropoff_datetime: Option<NaiveDateTime>,
    #[serde(default)]
    passenger_count: Option<f64>,
    #[serde(default)]
    trip_distance: Option<f64>,
    #[serde(default)]
    fare_amount: Option<f64>,
    #[serde(default)]
    tip_amount: Option<f64>,
    #[serde(default)]
    total_amount: Option<f64>,
}

impl From<CsvTripRow> for TripRecord {
    fn from(row: CsvTripRow) -> Self {
        TripRecord {
            vendor_id: row.vendor_id,
            pickup: row.tpep_pickup_datetime,
            dropoff: row.tpep_dropoff_datetime,
            // The column is stored as a float upstream; a fractional count is not a count.
            passenger_count: row
                .passenger_count
                .filter(|p| p.is_finite() && p.fract() == 0.0)
                .map(|p| p as i64),
            trip_distance: row.trip_distance,
            fare_amount: row.fare_amount,
            tip_amount: row.tip_amount,
            total_amount: row.total_amount,
        }
    }
}

fn deserialize_datetime<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&raw, fmt).ok())
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("unparseable timestamp '{raw}'")))
}

/// Streams a headered CSV file in fixed-size batches.
pub struct CsvBatchSource {
    columns: Arc<Vec<String>>,
    records: DeserializeRecordsIntoIter<File, CsvTripRow>,
    chunk_size: usize,
    line: usize,
}

impl CsvBatchSource {
    pub fn open(path: impl AsRef<Path>, chunk_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

        let columns: Vec<String> = reader
            .headers()
            .with_context(|| format!("read header of {}", path.display()))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        debug!(path = %path.display(), ?columns, "CSV dataset opened");

        Ok(CsvBatchSource {
            columns: Arc::new(columns),
            records: reader.into_deserialize(),
            chunk_size: chunk_size.max(1),
            line: 1,
        })
    }
}

impl BatchSource for CsvBatchSource {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_batch(&mut self) -> Result<Option<Batch>> {
        let mut rows = Vec::with_capacity(self.chunk_size.min(8192));

        while rows.len() < self.chunk_size {
            match self.records.next() {
                Some(record) => {
                    self.line += 1;
                    let row = record.with_context(|| format!("decode CSV line {}", self.line))?;
                    rows.push(TripRecord::from(row));
                }
                None => break,
            }
        }

        if rows.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Batch::new(Arc::clone(&self.columns), rows)))
        }
    }
}
