use anyhow::{Context, Result};
use arrow::array::{Array, AsArray, PrimitiveArray};
use arrow::compute::cast;
use arrow::datatypes::{
    ArrowPrimitiveType, DataType, Float64Type, Int64Type, TimeUnit, TimestampMicrosecondType,
};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDateTime};
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use super::BatchSource;
use crate::trip::{
    Batch, DROPOFF_DATETIME, FARE_AMOUNT, PASSENGER_COUNT, PICKUP_DATETIME, TIP_AMOUNT,
    TOTAL_AMOUNT, TRIP_DISTANCE, TripRecord, VENDOR_ID,
};

/// Streams a Parquet file as Arrow record batches of `chunk_size` rows.
pub struct ParquetBatchSource {
    columns: Arc<Vec<String>>,
    reader: ParquetRecordBatchReader,
}

impl ParquetBatchSource {
    pub fn open(path: impl AsRef<Path>, chunk_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .context("open ParquetRecordBatchReader")?;

        let columns: Vec<String> = builder
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        debug!(
            path = %path.display(),
            rows = builder.metadata().file_metadata().num_rows(),
            "Parquet dataset opened"
        );

        let reader = builder
            .with_batch_size(chunk_size.max(1))
            .build()
            .context("build ParquetRecordBatchReader")?;

        Ok(ParquetBatchSource {
            columns: Arc::new(columns),
            reader,
        })
    }
}

impl BatchSource for ParquetBatchSource {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_batch(&mut self) -> Result<Option<Batch>> {
        let Some(batch) = self.reader.next().transpose().context("read next batch")? else {
            return Ok(None);
        };
        let rows = decode_rows(&batch)?;
        Ok(Some(Batch::new(Arc::clone(&self.columns), rows)))
    }
}

fn decode_rows(batch: &RecordBatch) -> Result<Vec<TripRecord>> {
    let micros = DataType::Timestamp(TimeUnit::Microsecond, None);

    let vendor = column::<Int64Type>(batch, VENDOR_ID, &DataType::Int64)?;
    let pickup = column::<TimestampMicrosecondType>(batch, PICKUP_DATETIME, &micros)?;
    let dropoff = column::<TimestampMicrosecondType>(batch, DROPOFF_DATETIME, &micros)?;
    let passengers = column::<Float64Type>(batch, PASSENGER_COUNT, &DataType::Float64)?;
    let distance = column::<Float64Type>(batch, TRIP_DISTANCE, &DataType::Float64)?;
    let fare = column::<Float64Type>(batch, FARE_AMOUNT, &DataType::Float64)?;
    let tip = column::<Float64Type>(batch, TIP_AMOUNT, &DataType::Float64)?;
    let total = column::<Float64Type>(batch, TOTAL_AMOUNT, &DataType::Float64)?;

    let rows = (0..batch.num_rows())
        .map(|i| TripRecord {
            vendor_id: value_at(&vendor, i),
            pickup: value_at(&pickup, i).and_then(micros_to_datetime),
            dropoff: value_at(&dropoff, i).and_then(micros_to_datetime),
            passenger_count: value_at(&passengers, i)
                .filter(|p| p.is_finite() && p.fract() == 0.0)
                .map(|p| p as i64),
            trip_distance: value_at(&distance, i),
            fare_amount: value_at(&fare, i),
            tip_amount: value_at(&tip, i),
            total_amount: value_at(&total, i),
        })
        .collect();

    Ok(rows)
}

/// The named column cast to `target`, or `None` if the file lacks it.
fn column<T: ArrowPrimitiveType>(
    batch: &RecordBatch,
    name: &str,
    target: &DataType,
) -> Result<Option<PrimitiveArray<T>>> {
    let Some(array) = batch.column_by_name(name) else {
        return Ok(None);
    };
    let casted = cast(array, target).with_context(|| format!("cast column '{name}'"))?;
    Ok(Some(casted.as_primitive::<T>().clone()))
}

fn value_at<T: ArrowPrimitiveType>(
    array: &Option<PrimitiveArray<T>>,
    i: usize,
) -> Option<T::Native> {
    array
        .as_ref()
        .filter(|a| a.is_valid(i))
        .map(|a| a.value(i))
}

fn micros_to_datetime(micros: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_micros(micros).map(|dt| dt.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Float64Array, Int64Array, TimestampMicrosecondArray};
    use parquet::arrow::ArrowWriter;
    use tempfile::NamedTempFile;

    #[test]
    fn test_reads_typed_columns_with_nulls() {
        let pickups = vec![
            Some(1_704_067_200_000_000),
            Some(1_704_067_800_000_000),
            Some(1_704_068_400_000_000),
        ];
        let dropoffs = vec![Some(1_704_068_100_000_000), None, Some(1_704_069_000_000_000)];

        let file = write_parquet(vec![
            (VENDOR_ID, int64(vec![Some(1), Some(2), None])),
            (PICKUP_DATETIME, timestamps(pickups)),
            (DROPOFF_DATETIME, timestamps(dropoffs)),
            (PASSENGER_COUNT, float64(vec![Some(1.0), Some(2.0), None])),
            (TRIP_DISTANCE, float64(vec![Some(2.0), Some(11.5), Some(0.7)])),
            (FARE_AMOUNT, float64(vec![Some(12.0), Some(40.0), Some(5.0)])),
            (TIP_AMOUNT, float64(vec![Some(1.0), Some(5.0), Some(0.0)])),
            (TOTAL_AMOUNT, float64(vec![Some(15.0), Some(48.0), Some(6.5)])),
        ]);

        let mut source = ParquetBatchSource::open(file.path(), 2).unwrap();
        assert!(source.columns().iter().any(|c| c == PASSENGER_COUNT));

        let first = source.next_batch().unwrap().unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first.rows[0].vendor_id, Some(1));
        assert_eq!(first.rows[0].passenger_count, Some(1));
        assert_eq!(first.rows[0].duration().map(|d| d.num_minutes()), Some(15));
        assert!(first.rows[1].dropoff.is_none());

        let second = source.next_batch().unwrap().unwrap();
        assert_eq!(second.len(), 1);
        assert!(second.rows[0].vendor_id.is_none());
        assert!(second.rows[0].passenger_count.is_none());

        assert!(source.next_batch().unwrap().is_none());
    }

    #[test]
    fn test_absent_column_decodes_as_missing() {
        let file = write_parquet(vec![(TRIP_DISTANCE, float64(vec![Some(3.0)]))]);

        let mut source = ParquetBatchSource::open(file.path(), 10).unwrap();
        let batch = source.next_batch().unwrap().unwrap();

        assert_eq!(batch.rows[0].trip_distance, Some(3.0));
        assert!(batch.rows[0].fare_amount.is_none());
        assert_eq!(batch.missing_columns().len(), 6);
    }

    fn write_parquet(columns: Vec<(&str, ArrayRef)>) -> NamedTempFile {
        let batch = RecordBatch::try_from_iter(columns).unwrap();
        let file = NamedTempFile::new().unwrap();
        let mut writer =
            ArrowWriter::try_new(file.reopen().unwrap(), batch.schema(), None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
        file
    }

    fn int64(values: Vec<Option<i64>>) -> ArrayRef {
        Arc::new(Int64Array::from(values))
    }

    fn float64(values: Vec<Option<f64>>) -> ArrayRef {
        Arc::new(Float64Array::from(values))
    }

    fn timestamps(values: Vec<Option<i64>>) -> ArrayRef {
        Arc::new(TimestampMicrosecondArray::from(values))
    }
}
