use std::io::Write;
use std::path::PathBuf;

use tempfile::TempDir;
use tripstat::analyzers::analyzer::analyze_path;
use tripstat::analyzers::parallel::analyze_parallel;
use tripstat::analyzers::types::{MEAN_DISTANCE, MetricValue};
use tripstat::config::{AggregationMode, FarePolicy, PipelineConfig};
use tripstat::errors::PipelineError;
use tripstat::output::{self, parse_summary};
use tripstat::pipeline::TripPipeline;

const HEADER: &str = "VendorID,tpep_pickup_datetime,tpep_dropoff_datetime,passenger_count,trip_distance,fare_amount,tip_amount,total_amount";

const VALID_A: &str = "1,2024-01-01 00:57:55,2024-01-01 01:17:43,1,2.0,12.0,1.0,15.0";
const VALID_B: &str = "2,2024-01-01 00:03:00,2024-01-01 00:09:36,2,1.5,9.0,0.5,12.0";
const NO_PASSENGERS: &str = "2,2024-01-01 00:10:00,2024-01-01 00:20:00,0,3.0,14.0,2.0,18.0";
const REVERSED: &str = "1,2024-01-01 00:30:00,2024-01-01 00:25:00,1,2.5,11.0,1.0,14.0";
const ZERO_FARE: &str = "1,2024-01-01 02:00:00,2024-01-01 02:05:00,1,0.4,0.0,0.0,0.0";
const LONG_TRIP: &str = "2,2024-01-01 03:00:00,2024-01-01 03:40:00,1,12.5,40.0,6.0,50.0";

#[test]
fn test_five_row_batch() {
    let dir = TempDir::new().unwrap();
    let data = write_csv(&dir, &[VALID_A, VALID_B, NO_PASSENGERS, REVERSED, VALID_A]);
    let config = PipelineConfig::default().with_chunk_size(5);

    let report = analyze_path(&data, &config).unwrap().unwrap();

    assert_eq!(report.batches, 1);
    assert_eq!(report.rows_read, 5);
    assert_eq!(report.summary.record_count, 2);
    assert_eq!(report.summary.mean_distance, 1.75);
    assert_eq!(report.summary.total_amount, 27.0);
    assert_eq!(report.summary.mean_fare, 13.5);
    assert_eq!(report.summary.passenger_total, 3);
    assert_eq!(report.summary.mean_passengers, 1.5);
    assert_eq!(report.summary.long_trips, 0);
}

#[test]
fn test_duplicates_across_batches_survive() {
    let dir = TempDir::new().unwrap();
    let data = write_csv(&dir, &[VALID_A, VALID_A]);

    let same_batch = analyze_path(&data, &PipelineConfig::default().with_chunk_size(2))
        .unwrap()
        .unwrap();
    let split = analyze_path(&data, &PipelineConfig::default().with_chunk_size(1))
        .unwrap()
        .unwrap();

    assert_eq!(same_batch.summary.record_count, 1);
    assert_eq!(split.summary.record_count, 2);
}

#[test]
fn test_empty_dataset_gives_zero_summary() {
    let dir = TempDir::new().unwrap();
    let data = write_csv(&dir, &[]);

    let report = analyze_path(&data, &PipelineConfig::default())
        .unwrap()
        .unwrap();

    assert_eq!(report.batches, 0);
    assert_eq!(report.summary, Default::default());
}

#[test]
fn test_missing_file_gives_no_aggregate() {
    let dir = TempDir::new().unwrap();
    let result = analyze_path(dir.path().join("nope.csv"), &PipelineConfig::default()).unwrap();
    assert!(result.is_none());
}

#[test]
fn test_missing_column_is_schema_error() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("narrow.csv");
    std::fs::write(
        &data,
        "tpep_pickup_datetime,trip_distance\n2024-01-01 00:00:00,1.0\n",
    )
    .unwrap();

    let result = analyze_path(&data, &PipelineConfig::default());

    match result {
        Err(PipelineError::Schema { missing }) => {
            assert!(missing.contains(&"fare_amount".to_string()));
        }
        other => panic!("expected schema error, got {other:?}"),
    }
}

#[test]
fn test_fare_policy_and_raw_mode() {
    let dir = TempDir::new().unwrap();
    let data = write_csv(&dir, &[VALID_A, ZERO_FARE, NO_PASSENGERS]);

    let strict = analyze_path(&data, &PipelineConfig::default()).unwrap().unwrap();
    let lenient = analyze_path(
        &data,
        &PipelineConfig::default().with_fare_policy(FarePolicy::AllowZero),
    )
    .unwrap()
    .unwrap();
    let raw = analyze_path(
        &data,
        &PipelineConfig::default().with_mode(AggregationMode::Raw),
    )
    .unwrap()
    .unwrap();

    assert_eq!(strict.summary.record_count, 1);
    assert_eq!(lenient.summary.record_count, 2);
    assert_eq!(raw.summary.record_count, 3);
}

#[tokio::test]
async fn test_parallel_matches_streaming() {
    let dir = TempDir::new().unwrap();
    let rows = [
        VALID_A,
        VALID_B,
        NO_PASSENGERS,
        REVERSED,
        LONG_TRIP,
        VALID_B,
        ZERO_FARE,
        LONG_TRIP,
    ];
    let data = write_csv(&dir, &rows);
    let config = PipelineConfig::default().with_chunk_size(3).with_workers(3);

    let streaming = analyze_path(&data, &config).unwrap().unwrap();
    let parallel = analyze_parallel(&data, &config).await.unwrap().unwrap();

    assert_eq!(parallel.batches, 3);
    assert_eq!(parallel.workers.len(), 3);
    assert_eq!(streaming.summary, parallel.summary);
    assert_eq!(parallel.summary.long_trips, 2);
}

#[tokio::test]
async fn test_more_workers_than_batches() {
    let dir = TempDir::new().unwrap();
    let data = write_csv(&dir, &[VALID_A, VALID_B]);
    let config = PipelineConfig::default().with_chunk_size(10).with_workers(8);

    let report = analyze_parallel(&data, &config).await.unwrap().unwrap();

    assert_eq!(report.workers.len(), 1);
    assert_eq!(report.summary.record_count, 2);
}

#[tokio::test]
async fn test_pipeline_reports_on_disk() {
    let dir = TempDir::new().unwrap();
    let data = write_csv(&dir, &[VALID_A, VALID_B, LONG_TRIP]);
    let out = dir.path().join("reports");
    let config = PipelineConfig::default()
        .with_chunk_size(2)
        .with_workers(2)
        .with_output_dir(&out);

    TripPipeline::new(&data, config).run().await.unwrap();

    let text = std::fs::read_to_string(out.join(output::STREAMING_SUMMARY_FILE)).unwrap();
    let parallel = std::fs::read_to_string(out.join(output::PARALLEL_SUMMARY_FILE)).unwrap();
    assert_eq!(text, parallel);

    let parsed = parse_summary(&text);
    let distance = parsed.iter().find(|(k, _)| k == MEAN_DISTANCE).map(|(_, v)| *v);
    assert_eq!(distance, Some(5.33));

    let json: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(out.join(output::PARALLEL_SUMMARY_JSON)).unwrap(),
    )
    .unwrap();
    assert_eq!(json["summary"]["record_count"], 3);
}

#[test]
fn test_summary_lookup_by_key() {
    let dir = TempDir::new().unwrap();
    let data = write_csv(&dir, &[VALID_A, VALID_B]);

    let report = analyze_path(&data, &PipelineConfig::default()).unwrap().unwrap();

    assert_eq!(
        report.summary.get(MEAN_DISTANCE),
        Some(MetricValue::Amount(1.75))
    );
}

fn write_csv(dir: &TempDir, rows: &[&str]) -> PathBuf {
    let path = dir.path().join("trips.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "{HEADER}").unwrap();
    for row in rows {
        writeln!(file, "{row}").unwrap();
    }
    path
}
