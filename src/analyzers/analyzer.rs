//! Sequential analysis: pull one batch, validate it, aggregate it, fold it
//! into the running totals, then ask for the next one.

use serde::Serialize;
use std::path::Path;
use tracing::{debug, error, info};

use crate::analyzers::aggregate::aggregate_or_zero;
use crate::analyzers::anomalies::AnomalyScan;
use crate::analyzers::reducer::GlobalReducer;
use crate::analyzers::types::{GlobalAggregate, Summary};
use crate::config::{AggregationMode, PipelineConfig};
use crate::errors::PipelineError;
use crate::instrument::measured;
use crate::source::{self, BatchSource};
use crate::trip::missing_columns;
use crate::validation::ValidatorChain;

/// Phase of a single pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Idle,
    Loading,
    Validating,
    Aggregating,
    Reducing,
    Finalized,
}

impl RunState {
    /// Whether `next` may follow `self`. Runs only move forward; after
    /// reducing a batch the run either loads the next one or finalizes.
    pub fn can_advance_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle, Loading)
                | (Loading, Validating)
                | (Loading, Finalized)
                | (Validating, Aggregating)
                | (Aggregating, Reducing)
                | (Reducing, Loading)
                | (Reducing, Finalized)
        )
    }
}

/// Tracks the current [`RunState`] and logs each transition.
#[derive(Debug)]
pub struct RunTracker {
    state: RunState,
}

impl Default for RunTracker {
    fn default() -> Self {
        RunTracker {
            state: RunState::Idle,
        }
    }
}

impl RunTracker {
    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn advance(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(from = ?self.state, to = ?next, "Run state");
        self.state = next;
    }
}

/// Everything a finished sequential run produced.
#[derive(Debug, Clone, Serialize)]
pub struct StreamReport {
    pub summary: Summary,
    pub total: GlobalAggregate,
    pub batches: usize,
    pub rows_read: u64,
    pub failed_batches: usize,
    pub anomalies: AnomalyScan,
}

/// Streams `source` through the validator chain and the reducer.
///
/// Returns `Ok(None)` when the source fails mid-read: the run then has no
/// aggregate at all. A schema error is returned before any row is touched.
#[tracing::instrument(skip_all, fields(mode = ?mode))]
pub fn analyze_stream(
    source: &mut dyn BatchSource,
    chain: &ValidatorChain,
    mode: AggregationMode,
) -> Result<Option<StreamReport>, PipelineError> {
    let mut tracker = RunTracker::default();
    tracker.advance(RunState::Loading);

    let missing = missing_columns(source.columns());
    if !missing.is_empty() {
        return Err(PipelineError::Schema { missing });
    }

    let mut reducer = GlobalReducer::new();
    let mut anomalies = AnomalyScan::new();
    let mut batches = 0usize;
    let mut rows_read = 0u64;
    let mut failed_batches = 0usize;

    loop {
        let batch = match source.next_batch() {
            Ok(Some(batch)) => batch,
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, batch = batches + 1, "Reading dataset failed");
                return Ok(None);
            }
        };
        batches += 1;
        rows_read += batch.len() as u64;
        anomalies.scan(&batch);

        tracker.advance(RunState::Validating);
        let rows_in = batch.len();
        let batch = match mode {
            AggregationMode::Validated => measured("validate_batch", || chain.apply(batch))?,
            AggregationMode::Raw => batch,
        };
        info!(batch = batches, rows_in, rows_out = batch.len(), "Batch validated");

        tracker.advance(RunState::Aggregating);
        let (partial, failure) = measured("aggregate_batch", || aggregate_or_zero(&batch));
        if failure.is_some() {
            failed_batches += 1;
        }

        tracker.advance(RunState::Reducing);
        reducer.accumulate(&partial);
        tracker.advance(RunState::Loading);
    }

    tracker.advance(RunState::Finalized);
    let total = *reducer.total();
    let summary = reducer.finalize();
    info!(
        batches,
        rows_read,
        rows_kept = summary.record_count,
        failed_batches,
        "Streaming analysis finished"
    );

    Ok(Some(StreamReport {
        summary,
        total,
        batches,
        rows_read,
        failed_batches,
        anomalies,
    }))
}

/// Opens the dataset at `path` and streams it with the configured policy.
///
/// A dataset that cannot be opened yields `Ok(None)`, like a failed read.
pub fn analyze_path(
    path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<Option<StreamReport>, PipelineError> {
    config.validate()?;
    let path = path.as_ref();

    let mut source = match source::open(path, config.chunk_size) {
        Ok(source) => source,
        Err(e) => {
            error!(path = %path.display(), error = %e, "Could not open dataset");
            return Ok(None);
        }
    };

    let chain = ValidatorChain::standard(config.fare_policy);
    analyze_stream(&mut source, &chain, config.mode)
}
