//! Run tunables: batch size, worker count, and validation policy.
//!
//! Defaults can be overridden from the environment (a `.env` file is loaded
//! by the binary first) and then from command-line flags.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;

use crate::errors::PipelineError;

pub const DEFAULT_CHUNK_SIZE: usize = 100_000;
pub const DEFAULT_OUTPUT_DIR: &str = "data/output";

/// Whether a zero fare or total is an acceptable value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum FarePolicy {
    /// Fare and total must be strictly positive.
    #[default]
    Strict,
    /// Fare and total may be zero.
    AllowZero,
}

/// What each worker does with its partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum AggregationMode {
    /// Run the validator chain before aggregating.
    #[default]
    Validated,
    /// Aggregate rows as read.
    Raw,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineConfig {
    pub chunk_size: usize,
    pub workers: usize,
    pub fare_policy: FarePolicy,
    pub mode: AggregationMode,
    pub output_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            chunk_size: DEFAULT_CHUNK_SIZE,
            workers: num_cpus::get().max(1),
            fare_policy: FarePolicy::default(),
            mode: AggregationMode::default(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

impl PipelineConfig {
    /// Defaults overridden by `TRIPSTAT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let vars: Vec<(String, String)> = std::env::vars()
            .filter(|(k, _)| k.starts_with("TRIPSTAT_"))
            .collect();
        Self::from_vars(vars.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    fn from_vars<'a>(vars: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<Self> {
        let mut config = PipelineConfig::default();

        for (key, value) in vars {
            match key {
                "TRIPSTAT_CHUNK_SIZE" => {
                    config.chunk_size = value
                        .parse()
                        .with_context(|| format!("TRIPSTAT_CHUNK_SIZE='{value}'"))?;
                }
                "TRIPSTAT_WORKERS" => {
                    config.workers = value
                        .parse()
                        .with_context(|| format!("TRIPSTAT_WORKERS='{value}'"))?;
                }
                "TRIPSTAT_ALLOW_ZERO_FARE" => {
                    if parse_flag(value)? {
                        config.fare_policy = FarePolicy::AllowZero;
                    }
                }
                "TRIPSTAT_RAW_AGGREGATE" => {
                    if parse_flag(value)? {
                        config.mode = AggregationMode::Raw;
                    }
                }
                "TRIPSTAT_OUTPUT_DIR" => config.output_dir = PathBuf::from(value),
                _ => {}
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_fare_policy(mut self, fare_policy: FarePolicy) -> Self {
        self.fare_policy = fare_policy;
        self
    }

    pub fn with_mode(mut self, mode: AggregationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.chunk_size == 0 {
            return Err(PipelineError::Configuration(
                "chunk size must be at least 1 row".into(),
            ));
        }
        if self.workers == 0 {
            return Err(PipelineError::Configuration(
                "worker count must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("expected a boolean flag, got '{other}'"),
    }
}
