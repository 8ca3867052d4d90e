use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::metrics::PERFORMANCE_LOG_FAILURES;
use crate::perf_log::{PerformanceEntry, PerformanceLog};
use crate::queue::Notifier;

// Everything one finished request left behind
#[derive(Debug)]
pub struct DrainJob {
    pub messages: Vec<Value>, // insertion order
    pub performance: Option<PerformanceEntry>,
    pub finished_at: DateTime<Utc>,
}

// Start the worker, returns the sending side of its queue
pub fn spawn_worker(
    notifier: Notifier,
    perf_log: PerformanceLog,
    capacity: usize,
) -> (mpsc::Sender<DrainJob>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel::<DrainJob>(capacity.max(1));
    let handle = tokio::spawn(notification_worker(rx, notifier, perf_log));
    (tx, handle)
}

// Background worker -> one request at a time: log files first, then notifications
pub async fn notification_worker(
    mut rx: mpsc::Receiver<DrainJob>,
    notifier: Notifier,
    perf_log: PerformanceLog,
) {
    tracing::info!(enabled = notifier.is_enabled(), "Notification worker started");

    // keep receiving until every sender is gone
    while let Some(job) = rx.recv().await {
        write_logs(&perf_log, job.performance, job.finished_at).await;

        if job.messages.is_empty() {
            continue;
        }
        let count = job.messages.len();
        let report = notifier.drain_and_dispatch(job.messages).await;
        tracing::debug!(
            count,
            delivered = report.delivered,
            rate_limited = report.rate_limited,
            disabled = report.disabled,
            failed = report.failed,
            "Drained request notifications"
        );
    }

    tracing::info!("Notification worker stopped");
}

// append + cleanup are plain file I/O, keep them off the async workers
async fn write_logs(perf_log: &PerformanceLog, entry: Option<PerformanceEntry>, at: DateTime<Utc>) {
    let perf_log = perf_log.clone();
    let written = tokio::task::spawn_blocking(move || {
        let appended = entry.map(|e| perf_log.append(&e, at)).transpose();
        perf_log.cleanup(at.date_naive());
        appended.map_err(|e| (perf_log.dir().display().to_string(), e))
    })
    .await;

    match written {
        Ok(Ok(_)) => {}
        Ok(Err((dir, e))) => {
            PERFORMANCE_LOG_FAILURES.inc();
            tracing::warn!(dir = %dir, error = %e, "Failed to write performance log");
        }
        Err(e) => tracing::warn!(error = %e, "Performance log task failed"),
    }
}
