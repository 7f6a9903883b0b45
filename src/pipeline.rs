//! The end-to-end trip pipeline: an ordered list of steps declared up front
//! and run one after the other.

use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{Span, info, warn};

use crate::analyzers::analyzer::{StreamReport, analyze_path};
use crate::analyzers::parallel::{ParallelReport, analyze_parallel};
use crate::config::PipelineConfig;
use crate::instrument::{measured, measured_async};
use crate::output;
use crate::source;

/// Rows shown by the preview step.
pub const PREVIEW_ROWS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineStep {
    /// Log the first few rows of the first batch.
    Preview,
    /// Sequential validate-aggregate-reduce pass, plus the anomaly report.
    Streaming,
    /// Multi-worker pass.
    Parallel,
}

impl PipelineStep {
    pub const DEFAULT_ORDER: [PipelineStep; 3] = [
        PipelineStep::Preview,
        PipelineStep::Streaming,
        PipelineStep::Parallel,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PipelineStep::Preview => "preview",
            PipelineStep::Streaming => "streaming",
            PipelineStep::Parallel => "parallel",
        }
    }
}

/// What a pipeline run produced. A step whose dataset could not be read
/// leaves its field empty.
#[derive(Debug, Default, Serialize)]
pub struct PipelineReport {
    pub steps_run: Vec<PipelineStep>,
    pub streaming: Option<StreamReport>,
    pub parallel: Option<ParallelReport>,
    pub written: Vec<PathBuf>,
}

pub struct TripPipeline {
    path: PathBuf,
    config: PipelineConfig,
    steps: Vec<PipelineStep>,
}

impl TripPipeline {
    pub fn new(path: impl Into<PathBuf>, config: PipelineConfig) -> Self {
        TripPipeline {
            path: path.into(),
            config,
            steps: PipelineStep::DEFAULT_ORDER.to_vec(),
        }
    }

    /// Replaces the step list. Steps run in the order given.
    pub fn with_steps(mut self, steps: impl IntoIterator<Item = PipelineStep>) -> Self {
        self.steps = steps.into_iter().collect();
        self
    }

    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    /// Runs every step in order. Stops at the first hard failure.
    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn run(&self) -> Result<PipelineReport> {
        self.config.validate()?;
        let mut report = PipelineReport::default();

        for step in &self.steps {
            info!(step = step.name(), "Running step");
            match step {
                PipelineStep::Preview => measured("step_preview", || self.preview())?,
                PipelineStep::Streaming => {
                    measured_async("step_streaming", self.streaming(&mut report)).await?
                }
                PipelineStep::Parallel => {
                    measured_async("step_parallel", self.parallel(&mut report)).await?
                }
            }
            report.steps_run.push(*step);
        }

        Ok(report)
    }

    fn preview(&self) -> Result<()> {
        let mut source = match source::open(&self.path, self.config.chunk_size) {
            Ok(source) => source,
            Err(e) => {
                warn!(error = %e, "Preview skipped");
                return Ok(());
            }
        };

        match source.next_batch() {
            Ok(Some(batch)) => {
                info!(rows = batch.len(), columns = ?batch.columns(), "First batch");
                for row in batch.rows.iter().take(PREVIEW_ROWS) {
                    info!(?row, "Preview");
                }
            }
            Ok(None) => info!("Dataset is empty"),
            Err(e) => warn!(error = %e, "Preview skipped"),
        }
        Ok(())
    }

    async fn streaming(&self, report: &mut PipelineReport) -> Result<()> {
        let path = self.path.clone();
        let config = self.config.clone();
        let current = Span::current();
        let stream = tokio::task::spawn_blocking(move || {
            current.in_scope(|| analyze_path(&path, &config))
        })
        .await??;

        let Some(stream) = stream else {
            warn!("Streaming analysis produced no aggregate");
            return Ok(());
        };

        let dir = &self.config.output_dir;
        report.written.push(output::write_summary(
            dir,
            output::STREAMING_SUMMARY_FILE,
            &stream.summary,
        )?);
        report
            .written
            .push(output::write_anomalies(dir, &stream.anomalies)?);
        report.streaming = Some(stream);
        Ok(())
    }

    async fn parallel(&self, report: &mut PipelineReport) -> Result<()> {
        let Some(parallel) = analyze_parallel(&self.path, &self.config).await? else {
            warn!("Parallel analysis produced no aggregate");
            return Ok(());
        };

        let dir = &self.config.output_dir;
        report.written.push(output::write_summary(
            dir,
            output::PARALLEL_SUMMARY_FILE,
            &parallel.summary,
        )?);
        report.written.push(output::write_json(
            dir,
            output::PARALLEL_SUMMARY_JSON,
            &parallel,
        )?);
        report.parallel = Some(parallel);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const HEADER: &str = "VendorID,tpep_pickup_datetime,tpep_dropoff_datetime,passenger_count,trip_distance,fare_amount,tip_amount,total_amount";

    #[test]
    fn test_default_step_order() {
        let pipeline = TripPipeline::new("trips.csv", PipelineConfig::default());
        assert_eq!(
            pipeline.steps(),
            &[
                PipelineStep::Preview,
                PipelineStep::Streaming,
                PipelineStep::Parallel
            ]
        );
    }

    #[tokio::test]
    async fn test_run_writes_reports() {
        let dir = TempDir::new().unwrap();
        let data = write_dataset(&dir);
        let config = PipelineConfig::default()
            .with_chunk_size(2)
            .with_workers(2)
            .with_output_dir(dir.path().join("out"));

        let report = TripPipeline::new(data, config).run().await.unwrap();

        assert_eq!(report.steps_run, PipelineStep::DEFAULT_ORDER.to_vec());
        let streaming = report.streaming.unwrap();
        let parallel = report.parallel.unwrap();
        assert_eq!(streaming.summary, parallel.summary);
        assert_eq!(streaming.summary.record_count, 2);
        assert_eq!(report.written.len(), 4);
        assert!(dir.path().join("out/parallel_summary.txt").exists());
        assert!(dir.path().join("out/anomalies_report.txt").exists());
    }

    #[tokio::test]
    async fn test_selected_steps_only() {
        let dir = TempDir::new().unwrap();
        let data = write_dataset(&dir);
        let config = PipelineConfig::default().with_output_dir(dir.path().join("out"));

        let report = TripPipeline::new(data, config)
            .with_steps([PipelineStep::Streaming])
            .run()
            .await
            .unwrap();

        assert!(report.streaming.is_some());
        assert!(report.parallel.is_none());
        assert!(!dir.path().join("out/parallel_summary.txt").exists());
    }

    #[tokio::test]
    async fn test_missing_dataset_runs_without_output() {
        let dir = TempDir::new().unwrap();
        let config = PipelineConfig::default().with_output_dir(dir.path().join("out"));

        let report = TripPipeline::new(dir.path().join("absent.csv"), config)
            .run()
            .await
            .unwrap();

        assert_eq!(report.steps_run.len(), 3);
        assert!(report.streaming.is_none());
        assert!(report.parallel.is_none());
        assert!(report.written.is_empty());
    }

    #[tokio::test]
    async fn test_schema_error_aborts_run() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("narrow.csv");
        std::fs::write(&data, "trip_distance,fare_amount\n1.0,5.0\n").unwrap();
        let config = PipelineConfig::default().with_output_dir(dir.path().join("out"));

        let result = TripPipeline::new(data, config).run().await;

        assert!(result.is_err());
        assert!(!dir.path().join("out").exists());
    }

    fn write_dataset(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("trips.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{HEADER}").unwrap();
        writeln!(file, "1,2024-01-01 00:57:55,2024-01-01 01:17:43,1,2.0,12.0,1.0,15.0").unwrap();
        writeln!(file, "2,2024-01-01 00:03:00,2024-01-01 00:09:36,2,1.5,9.0,0.5,12.0").unwrap();
        writeln!(file, "2,2024-01-01 00:10:00,2024-01-01 00:20:00,0,3.0,14.0,2.0,18.0").unwrap();
        writeln!(file, "1,2024-01-01 00:30:00,2024-01-01 00:25:00,1,2.5,11.0,1.0,14.0").unwrap();
        path
    }
}
