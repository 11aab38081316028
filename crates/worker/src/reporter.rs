//! Turns scheduler events and snapshots into log lines.

use std::time::Duration;

use framecast_core::estimation::{format_duration, ProgressSnapshot};
use framecast_events::JobEvent;
use framecast_pipeline::Scheduler;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Log every lifecycle event until the bus closes.
pub async fn report_events(mut receiver: broadcast::Receiver<JobEvent>) {
    loop {
        match receiver.recv().await {
            Ok(event) => log_event(&event),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "Event reporter lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn log_event(event: &JobEvent) {
    match event {
        JobEvent::Started { job, .. } => tracing::info!(
            job_id = job.id,
            image = %job.request.image.display(),
            remote_job_id = job.remote_job_id.as_deref().unwrap_or_default(),
            "Generation started",
        ),
        JobEvent::Completed { job, .. } => tracing::info!(
            job_id = job.id,
            destination = %job.request.destination.display(),
            duration = %job.duration_secs().map(format_duration).unwrap_or_default(),
            "Video saved",
        ),
        JobEvent::Failed { job, .. } => tracing::error!(
            job_id = job.id,
            image = %job.request.image.display(),
            error = %job.error.as_ref().map(ToString::to_string).unwrap_or_default(),
            "Generation failed",
        ),
        JobEvent::QueueChanged { .. } => {}
    }
}

/// Log a statistics line every `interval` until cancelled.
pub async fn report_progress(scheduler: Scheduler, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let snapshot = scheduler.snapshot().await;
                tracing::info!(
                    progress = %format!("{:.0}%", snapshot.progress_percent()),
                    "{}",
                    describe(&snapshot),
                );
            }
        }
    }
}

/// One-line human summary of a snapshot.
pub fn describe(snapshot: &ProgressSnapshot) -> String {
    let done = snapshot.completed + snapshot.failed;
    let mean = snapshot
        .mean_duration_secs
        .map(format_duration)
        .unwrap_or_else(|| "n/a".to_string());
    let eta = snapshot
        .eta_secs
        .map(format_duration)
        .unwrap_or_else(|| "n/a".to_string());

    format!(
        "{done}/{total} done ({completed} ok, {failed} failed), {in_flight} running, \
         {pending} queued, success {rate:.1}%, avg {mean}, eta {eta}",
        total = snapshot.total,
        completed = snapshot.completed,
        failed = snapshot.failed,
        in_flight = snapshot.in_flight,
        pending = snapshot.pending,
        rate = snapshot.success_rate * 100.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> ProgressSnapshot {
        ProgressSnapshot {
            total: 10,
            pending: 4,
            in_flight: 3,
            completed: 2,
            failed: 1,
            success_rate: 2.0 / 3.0,
            mean_duration_secs: Some(90.0),
            eta_secs: Some(7200.0),
        }
    }

    #[test]
    fn describe_includes_counts_and_estimates() {
        assert_eq!(
            describe(&snapshot()),
            "3/10 done (2 ok, 1 failed), 3 running, 4 queued, success 66.7%, \
             avg 1.5 min, eta 2.0 h"
        );
    }

    #[test]
    fn describe_without_history_reports_na() {
        let snapshot = ProgressSnapshot {
            completed: 0,
            failed: 0,
            success_rate: 0.0,
            mean_duration_secs: None,
            eta_secs: None,
            ..snapshot()
        };
        let line = describe(&snapshot);
        assert!(line.contains("avg n/a"));
        assert!(line.contains("eta n/a"));
        assert!(line.contains("success 0.0%"));
    }
}
