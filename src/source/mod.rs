//! Batch sources: the pull-based "next batch or end of data" contract and
//! its file-backed and in-memory implementations.

mod csv_file;
mod memory;
#[cfg(feature = "parquet")]
mod parquet_file;

pub use csv_file::CsvBatchSource;
pub use memory::MemorySource;
#[cfg(feature = "parquet")]
pub use parquet_file::ParquetBatchSource;

use anyhow::{Result, bail};
use std::path::Path;

use crate::trip::Batch;

/// Yields successive batches of at most `chunk_size` rows.
pub trait BatchSource: Send {
    /// Logical columns the dataset declares.
    fn columns(&self) -> &[String];

    /// The next batch, or `Ok(None)` once the dataset is exhausted.
    fn next_batch(&mut self) -> Result<Option<Batch>>;
}

impl<S: BatchSource + ?Sized> BatchSource for Box<S> {
    fn columns(&self) -> &[String] {
        (**self).columns()
    }

    fn next_batch(&mut self) -> Result<Option<Batch>> {
        (**self).next_batch()
    }
}

/// Opens a dataset file, choosing the reader from its extension.
pub fn open(path: impl AsRef<Path>, chunk_size: usize) -> Result<Box<dyn BatchSource>> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("csv") => Ok(Box::new(CsvBatchSource::open(path, chunk_size)?)),
        #[cfg(feature = "parquet")]
        Some("parquet") | Some("pq") => Ok(Box::new(ParquetBatchSource::open(path, chunk_size)?)),
        _ => bail!("unsupported dataset format: {}", path.display()),
    }
}

/// Reads every remaining batch from `source`.
pub fn collect_batches(source: &mut dyn BatchSource) -> Result<Vec<Batch>> {
    let mut batches = Vec::new();
    while let Some(batch) = source.next_batch()? {
        batches.push(batch);
    }
    Ok(batches)
}
