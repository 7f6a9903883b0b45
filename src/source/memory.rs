//! In-memory batch source over rows already held by the caller.

use anyhow::Result;
use std::collections::VecDeque;
use std::sync::Arc;

use super::BatchSource;
use crate::trip::{Batch, TripRecord, all_columns};

/// Serves rows already held in memory, `chunk_size` at a time.
pub struct MemorySource {
    columns: Arc<Vec<String>>,
    rows: VecDeque<TripRecord>,
    chunk_size: usize,
}

impl MemorySource {
    pub fn new(columns: Vec<String>, rows: Vec<TripRecord>, chunk_size: usize) -> Self {
        MemorySource {
            columns: Arc::new(columns),
            rows: rows.into(),
            chunk_size: chunk_size.max(1),
        }
    }

    /// A source declaring every known column.
    pub fn from_records(rows: Vec<TripRecord>, chunk_size: usize) -> Self {
        MemorySource::new(all_columns(), rows, chunk_size)
    }
}

impl BatchSource for MemorySource {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_batch(&mut self) -> Result<Option<Batch>> {
        if self.rows.is_empty() {
            return Ok(None);
        }
        let take = self.chunk_size.min(self.rows.len());
        let rows: Vec<TripRecord> = self.rows.drain(..take).collect();
        Ok(Some(Batch::new(Arc::clone(&self.columns), rows)))
    }
}
