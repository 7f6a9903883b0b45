//! Output formatting and persistence for run summaries.
//!
//! Supports pretty-printing, JSON serialization, and the line-per-metric
//! text report.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::analyzers::anomalies::AnomalyScan;
use crate::analyzers::types::Summary;

pub const STREAMING_SUMMARY_FILE: &str = "streaming_summary.txt";
pub const PARALLEL_SUMMARY_FILE: &str = "parallel_summary.txt";
pub const PARALLEL_SUMMARY_JSON: &str = "parallel_summary.json";
pub const ANOMALIES_FILE: &str = "anomalies_report.txt";

/// Logs a summary using Rust's debug pretty-print format.
pub fn print_pretty(summary: &Summary) {
    debug!("{:#?}", summary);
}

/// Logs any serializable report as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Renders `"<metric>: <value>"` lines in the fixed metric order.
pub fn render_summary(summary: &Summary) -> String {
    summary
        .entries()
        .iter()
        .fold(String::new(), |mut out, (key, value)| {
            let _ = writeln!(out, "{key}: {value}");
            out
        })
}

/// Parses a rendered summary back into `(key, value)` pairs.
pub fn parse_summary(text: &str) -> Vec<(String, f64)> {
    text.lines()
        .filter_map(|line| line.split_once(": "))
        .filter_map(|(k, v)| v.trim().parse().ok().map(|v| (k.to_string(), v)))
        .collect()
}

/// Writes the text report for `summary` to `dir/file_name`, creating `dir`.
pub fn write_summary(dir: &Path, file_name: &str, summary: &Summary) -> Result<PathBuf> {
    write_text(dir, file_name, &render_summary(summary))
}

/// Writes `value` as pretty JSON to `dir/file_name`.
pub fn write_json(dir: &Path, file_name: &str, value: &impl Serialize) -> Result<PathBuf> {
    write_text(dir, file_name, &serde_json::to_string_pretty(value)?)
}

pub fn render_anomalies(scan: &AnomalyScan) -> String {
    let mut out = String::from("Anomalies: tip_amount > total_amount\n");
    let _ = writeln!(out, "Suspicious records: {}", scan.count);

    if !scan.samples.is_empty() {
        let _ = writeln!(
            out,
            "\n{:>8} {:>12} {:>12} {:>12}",
            "VendorID", "fare_amount", "tip_amount", "total_amount"
        );
        for row in &scan.samples {
            let cell = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
            let vendor = row.vendor_id.map_or_else(|| "-".to_string(), |v| v.to_string());
            let _ = writeln!(
                out,
                "{:>8} {:>12} {:>12} {:>12}",
                vendor,
                cell(row.fare_amount),
                cell(row.tip_amount),
                cell(row.total_amount)
            );
        }
    }
    out
}

pub fn write_anomalies(dir: &Path, scan: &AnomalyScan) -> Result<PathBuf> {
    write_text(dir, ANOMALIES_FILE, &render_anomalies(scan))
}

fn write_text(dir: &Path, file_name: &str, contents: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let path = dir.join(file_name);
    fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
    debug!(path = %path.display(), bytes = contents.len(), "Report written");
    Ok(path)
}
