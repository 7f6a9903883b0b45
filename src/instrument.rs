//! Call counting and timing for named operations.
//!
//! Wrap an operation with [`measured`] (or [`measured_async`]) and every
//! call is counted and timed, with the result emitted as a `debug` event.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{LazyLock, Mutex, PoisonError};
use std::time::Instant;
use tracing::debug;

static CALLS: LazyLock<Mutex<HashMap<&'static str, u64>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn record_call(name: &'static str) -> u64 {
    let mut calls = CALLS.lock().unwrap_or_else(PoisonError::into_inner);
    let count = calls.entry(name).or_default();
    *count += 1;
    *count
}

/// How many times `name` has been entered in this process.
pub fn call_count(name: &str) -> u64 {
    CALLS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(name)
        .copied()
        .unwrap_or(0)
}

/// Runs `f`, counting the call and logging how long it took.
pub fn measured<T>(name: &'static str, f: impl FnOnce() -> T) -> T {
    let calls = record_call(name);
    let start = Instant::now();
    let out = f();
    debug!(
        operation = name,
        calls,
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Operation finished"
    );
    out
}

/// Async counterpart of [`measured`].
pub async fn measured_async<T>(name: &'static str, fut: impl Future<Output = T>) -> T {
    let calls = record_call(name);
    let start = Instant::now();
    let out = fut.await;
    debug!(
        operation = name,
        calls,
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Operation finished"
    );
    out
}
