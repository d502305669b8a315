//! Execution Timing
//!
//! Runs an async operation a fixed number of times, records each run in the
//! `edr_operation_duration_seconds` histogram and logs the average.

use serde::Serialize;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Histogram fed by [`measure`], labelled by `operation`
pub const DURATION_METRIC: &str = "edr_operation_duration_seconds";

/// Result of a measured operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingSummary {
    pub label: String,
    pub runs: usize,
    pub total_secs: f64,
    pub average_secs: f64,
}

async fn timed<F, Fut, T>(label: &str, operation: &mut F) -> (T, Duration)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = T>,
{
    let start = Instant::now();
    let output = operation().await;
    let elapsed = start.elapsed();

    metrics::histogram!(DURATION_METRIC, "operation" => label.to_string())
        .record(elapsed.as_secs_f64());
    debug!("{} run took {:?}", label, elapsed);

    (output, elapsed)
}

/// Run `operation` `runs` times (at least once) and return the last output
pub async fn measure<F, Fut, T>(label: &str, runs: usize, mut operation: F) -> (T, TimingSummary)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = T>,
{
    let runs = runs.max(1);

    let (mut output, mut total) = timed(label, &mut operation).await;
    for _ in 1..runs {
        let (next, elapsed) = timed(label, &mut operation).await;
        output = next;
        total += elapsed;
    }

    let total_secs = total.as_secs_f64();
    let average_secs = total_secs / runs as f64;
    info!("Average execution time for {} is [{:.6}] seconds", label, average_secs);

    (
        output,
        TimingSummary {
            label: label.to_string(),
            runs,
            total_secs,
            average_secs,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_runs_requested_times() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let (last, summary) = measure("count", 3, move || async move {
            counter.fetch_add(1, Ordering::SeqCst) + 1
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(last, 3);
        assert_eq!(summary.runs, 3);
        assert_eq!(summary.label, "count");
        assert!(summary.average_secs <= summary.total_secs);
    }

    #[tokio::test]
    async fn test_zero_runs_still_runs_once() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let (_, summary) = measure("once", 0, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(summary.runs, 1);
    }

    #[tokio::test]
    async fn test_passes_errors_through() {
        let (result, _) = measure("fail", 2, || async { Err::<(), String>("boom".to_string()) }).await;
        assert_eq!(result, Err("boom".to_string()));
    }
}
