//! Parallel analysis: split the batch list into one partition per worker,
//! reduce every partition on its own blocking task, then fold the partial
//! results exactly as the sequential path does.
//!
//! Every worker pushes a single [`WorkerReport`] onto a shared channel and
//! exits. The coordinator joins all workers before it reads the channel.

use serde::Serialize;
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{Instrument, Span, debug, error, info, info_span};

use crate::analyzers::aggregate::aggregate_or_zero;
use crate::analyzers::reducer::GlobalReducer;
use crate::analyzers::types::{GlobalAggregate, PartialAggregate, Summary, WorkerReport};
use crate::config::{AggregationMode, PipelineConfig};
use crate::errors::PipelineError;
use crate::source::{self, collect_batches};
use crate::trip::{Batch, missing_columns};
use crate::validation::ValidatorChain;

/// Result of a parallel run.
#[derive(Debug, Clone, Serialize)]
pub struct ParallelReport {
    pub summary: Summary,
    pub total: GlobalAggregate,
    pub batches: usize,
    /// Batches that fell back to zeros, summed over all workers.
    pub failed_batches: usize,
    /// Per-worker partials, sorted by worker index.
    pub workers: Vec<WorkerReport>,
}

/// Splits `batches` into `parts` contiguous groups whose sizes differ by at
/// most one, earlier groups taking the extra batch. Order is kept within
/// and across groups.
pub fn partition_batches(batches: Vec<Batch>, parts: usize) -> Vec<Vec<Batch>> {
    let parts = parts.max(1);
    let base = batches.len() / parts;
    let extra = batches.len() % parts;

    let mut iter = batches.into_iter();
    (0..parts)
        .map(|i| {
            let size = base + usize::from(i < extra);
            iter.by_ref().take(size).collect()
        })
        .collect()
}

/// Validates (unless `mode` is raw) and aggregates one partition.
///
/// Returns the partition's partial aggregate and the number of batches
/// whose aggregation failed and contributed zeros.
pub fn reduce_partition(
    partition: Vec<Batch>,
    chain: &ValidatorChain,
    mode: AggregationMode,
) -> Result<(PartialAggregate, usize), PipelineError> {
    partition
        .into_iter()
        .try_fold((PartialAggregate::default(), 0), |(acc, failed), batch| {
            let batch = match mode {
                AggregationMode::Validated => chain.apply(batch)?,
                AggregationMode::Raw => batch,
            };
            let (partial, failure) = aggregate_or_zero(&batch);
            Ok((acc.combine(partial), failed + usize::from(failure.is_some())))
        })
}

/// Runs `work` on every non-empty partition, each on its own blocking
/// task, and folds the reports once all of them have finished.
///
/// A worker that panics or returns an error fails the whole run; partials
/// from the surviving workers are discarded.
pub async fn dispatch<F>(
    partitions: Vec<Vec<Batch>>,
    work: F,
) -> Result<(GlobalReducer, Vec<WorkerReport>), PipelineError>
where
    F: Fn(Vec<Batch>) -> Result<(PartialAggregate, usize), PipelineError>
        + Clone
        + Send
        + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<WorkerReport>();
    let mut handles = Vec::with_capacity(partitions.len());

    for (worker, partition) in partitions.into_iter().enumerate() {
        if partition.is_empty() {
            debug!(worker, "Empty partition, not dispatched");
            continue;
        }

        let tx = tx.clone();
        let work = work.clone();
        let span = info_span!("worker", worker, batches = partition.len());

        let handle = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            debug!("Start");
            let batches = partition.len();
            let (partial, failed_batches) = work(partition)?;
            tx.send(WorkerReport {
                worker,
                batches,
                failed_batches,
                partial,
            })
            .map_err(|e| PipelineError::WorkerFailed {
                worker,
                reason: format!("result channel closed: {e}"),
            })?;
            debug!(rows = partial.rows, failed_batches, "Done");
            Ok::<(), PipelineError>(())
        });
        handles.push((worker, handle));
    }
    drop(tx);

    let mut failure = None;
    for (worker, handle) in handles {
        let outcome = match handle.await {
            Ok(result) => result,
            Err(e) => Err(PipelineError::WorkerFailed {
                worker,
                reason: e.to_string(),
            }),
        };
        if let Err(e) = outcome {
            error!(worker, error = %e, "Worker failed");
            failure.get_or_insert(e);
        }
    }
    if let Some(e) = failure {
        return Err(e);
    }

    let mut reducer = GlobalReducer::new();
    let mut reports = Vec::new();
    while let Ok(report) = rx.try_recv() {
        reducer.accumulate(&report.partial);
        reports.push(report);
    }
    reports.sort_by_key(|r| r.worker);

    Ok((reducer, reports))
}

/// Partitions `batches` across `workers` and reduces them in parallel.
pub async fn analyze_batches(
    batches: Vec<Batch>,
    workers: usize,
    chain: ValidatorChain,
    mode: AggregationMode,
) -> Result<ParallelReport, PipelineError> {
    let batch_count = batches.len();
    let partitions = partition_batches(batches, workers);

    let (reducer, workers) =
        dispatch(partitions, move |partition| reduce_partition(partition, &chain, mode)).await?;

    let total = *reducer.total();
    let summary = reducer.finalize();
    let failed_batches: usize = workers.iter().map(|w| w.failed_batches).sum();
    info!(
        batches = batch_count,
        workers = workers.len(),
        rows_kept = summary.record_count,
        failed_batches,
        "Parallel analysis finished"
    );

    Ok(ParallelReport {
        summary,
        total,
        batches: batch_count,
        failed_batches,
        workers,
    })
}

/// Loads every batch of the dataset at `path` up front, then analyzes the
/// batches on `config.workers` workers.
///
/// Returns `Ok(None)` if the dataset cannot be opened or read.
pub async fn analyze_parallel(
    path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<Option<ParallelReport>, PipelineError> {
    config.validate()?;
    let path = path.as_ref();
    let span = info_span!("parallel", path = %path.display(), workers = config.workers);

    load_and_analyze(path, config).instrument(span).await
}

async fn load_and_analyze(
    path: &Path,
    config: &PipelineConfig,
) -> Result<Option<ParallelReport>, PipelineError> {
    let owned = path.to_path_buf();
    let chunk_size = config.chunk_size;
    let current = Span::current();
    let loaded = tokio::task::spawn_blocking(move || {
        current.in_scope(|| load_batches(&owned, chunk_size))
    })
    .await
    .map_err(std::io::Error::from)??;

    let Some(batches) = loaded else {
        return Ok(None);
    };
    info!(batches = batches.len(), "Dataset loaded");

    let chain = ValidatorChain::standard(config.fare_policy);
    analyze_batches(batches, config.workers, chain, config.mode)
        .await
        .map(Some)
}

/// Reads the whole dataset. `Ok(None)` when it cannot be opened or read.
fn load_batches(path: &Path, chunk_size: usize) -> Result<Option<Vec<Batch>>, PipelineError> {
    let mut source = match source::open(path, chunk_size) {
        Ok(source) => source,
        Err(e) => {
            error!(error = %e, "Could not open dataset");
            return Ok(None);
        }
    };

    let missing = missing_columns(source.columns());
    if !missing.is_empty() {
        return Err(PipelineError::Schema { missing });
    }

    match collect_batches(&mut source) {
        Ok(batches) => Ok(Some(batches)),
        Err(e) => {
            error!(error = %e, "Reading dataset failed");
            Ok(None)
        }
    }
}
