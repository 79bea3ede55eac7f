use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::domain::{RecordingId, TranscriptionStatus};

use super::{TranscriptionService, TranscriptionServiceError, TransitionOutcome};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub batch_size: usize,
    /// A `processing` recording without a job whose attempt is older than this is closed as failed.
    pub stall_timeout: Duration,
    /// A `pending` recording older than this is started by the sweep.
    pub pending_grace: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            batch_size: 50,
            stall_timeout: Duration::from_secs(1800),
            pending_grace: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStats {
    pub total_runs: u64,
    pub successful_runs: u64,
    pub failed_runs: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub success_rate: f64,
    pub is_running: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub recovered: usize,
    pub resumed: usize,
    pub polled: usize,
    pub retried: usize,
    pub completed: usize,
    pub failed: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RunResult {
    Completed(RunSummary),
    /// Another run was already in flight.
    Skipped,
}

/// Periodic sweep over recordings that need the engine's attention: stalled
/// attempts, uploads that were never started, in-flight provider jobs and
/// recordings due for a retry.
pub struct RetryScheduler {
    service: Arc<TranscriptionService>,
    config: SchedulerConfig,
    in_flight: AtomicBool,
    stats: Mutex<SchedulerStats>,
    worker: Mutex<Option<(watch::Sender<bool>, JoinHandle<()>)>>,
}

impl RetryScheduler {
    pub fn new(service: Arc<TranscriptionService>, config: SchedulerConfig) -> Self {
        Self {
            service,
            config,
            in_flight: AtomicBool::new(false),
            stats: Mutex::new(SchedulerStats::default()),
            worker: Mutex::new(None),
        }
    }

    /// Spawns the periodic loop. A second call while running is ignored.
    pub fn start(self: &Arc<Self>) {
        let Ok(mut worker) = self.worker.lock() else {
            tracing::error!("Scheduler lifecycle lock poisoned");
            return;
        };
        if worker.is_some() {
            tracing::debug!("Retry scheduler already running");
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let scheduler = Arc::clone(self);
        let period = self.config.interval;

        let handle = tokio::spawn(async move {
            tracing::info!(interval_secs = period.as_secs(), "Retry scheduler started");
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately and resolves anything left over from a restart.
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        scheduler.run_once().await;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("Retry scheduler stopped");
        });

        *worker = Some((shutdown_tx, handle));
    }

    /// Signals the loop to stop and waits for an in-flight run to finish.
    pub async fn stop(&self) {
        let worker = match self.worker.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if let Some((shutdown_tx, handle)) = worker {
            let _ = shutdown_tx.send(true);
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Retry scheduler task ended abnormally");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().map(|w| w.is_some()).unwrap_or(false)
    }

    pub fn stats(&self) -> SchedulerStats {
        let mut stats = self
            .stats
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default();
        stats.is_running = self.is_running();
        stats
    }

    /// One sweep. Used by the periodic loop and by manual triggers.
    pub async fn run_once(&self) -> RunResult {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            tracing::debug!("Retry sweep already in progress, skipping");
            return RunResult::Skipped;
        };

        let (summary, last_error) = self
            .sweep()
            .instrument(tracing::info_span!("retry_sweep"))
            .await;

        self.record_run(&summary, last_error);

        tracing::info!(
            recovered = summary.recovered,
            resumed = summary.resumed,
            polled = summary.polled,
            retried = summary.retried,
            completed = summary.completed,
            failed = summary.failed,
            errors = summary.errors,
            "Retry sweep finished"
        );
        RunResult::Completed(summary)
    }

    async fn sweep(&self) -> (RunSummary, Option<String>) {
        let mut summary = RunSummary::default();
        let mut last_error = None;
        let repository = self.service.repository();
        let mut seen: HashSet<RecordingId> = HashSet::new();
        let limit = self.config.batch_size;

        let stall_cutoff = Utc::now()
            - chrono::Duration::from_std(self.config.stall_timeout)
                .unwrap_or_else(|_| chrono::Duration::minutes(30));
        match repository.find_stalled(stall_cutoff, limit).await {
            Ok(stalled) => {
                for recording in stalled {
                    if !seen.insert(recording.id) {
                        continue;
                    }
                    let id = recording.id;
                    summary.recovered += 1;
                    let result = self.service.recover_stalled(recording).await;
                    self.tally(id, result, &mut summary, &mut last_error);
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to query stalled recordings");
                summary.errors += 1;
                last_error = Some(e.to_string());
            }
        }

        let pending_cutoff = Utc::now()
            - chrono::Duration::from_std(self.config.pending_grace)
                .unwrap_or_else(|_| chrono::Duration::minutes(2));
        match repository.find_stale_pending(pending_cutoff, limit).await {
            Ok(pending) => {
                for recording in pending {
                    if !seen.insert(recording.id) {
                        continue;
                    }
                    let id = recording.id;
                    summary.resumed += 1;
                    let result = self.service.resume_pending(recording).await;
                    self.tally(id, result, &mut summary, &mut last_error);
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to query pending recordings");
                summary.errors += 1;
                last_error = Some(e.to_string());
            }
        }

        let pollable = self.service.providers().pollable();
        if !pollable.is_empty() {
            match repository.find_in_flight_jobs(&pollable, limit).await {
                Ok(in_flight) => {
                    for recording in in_flight {
                        if !seen.insert(recording.id) {
                            continue;
                        }
                        let id = recording.id;
                        summary.polled += 1;
                        let result = self.service.poll(recording).await;
                        self.tally(id, result, &mut summary, &mut last_error);
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to query in-flight jobs");
                    summary.errors += 1;
                    last_error = Some(e.to_string());
                }
            }
        }

        let now = Utc::now();
        match repository.find_retry_eligible(now, limit).await {
            Ok(eligible) => {
                for recording in eligible {
                    // Re-checked in process; the query is only a pre-filter.
                    if !recording.is_retry_eligible(now) || !seen.insert(recording.id) {
                        continue;
                    }
                    let id = recording.id;
                    summary.retried += 1;
                    let result = self.service.retry(recording).await;
                    self.tally(id, result, &mut summary, &mut last_error);
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to query retry-eligible recordings");
                summary.errors += 1;
                last_error = Some(e.to_string());
            }
        }

        (summary, last_error)
    }

    fn tally(
        &self,
        id: RecordingId,
        result: Result<TransitionOutcome, TranscriptionServiceError>,
        summary: &mut RunSummary,
        last_error: &mut Option<String>,
    ) {
        match result {
            Ok(outcome) => match outcome.status() {
                Some(TranscriptionStatus::Completed) => summary.completed += 1,
                Some(TranscriptionStatus::Failed) => summary.failed += 1,
                _ => {}
            },
            Err(TranscriptionServiceError::NotEligible(_)) => {}
            Err(e) => {
                tracing::error!(recording_id = %id, error = %e, "Sweep step failed");
                summary.errors += 1;
                *last_error = Some(e.to_string());
            }
        }
    }

    fn record_run(&self, summary: &RunSummary, last_error: Option<String>) {
        let Ok(mut stats) = self.stats.lock() else {
            tracing::error!("Scheduler stats lock poisoned");
            return;
        };
        stats.total_runs += 1;
        if summary.errors == 0 {
            stats.successful_runs += 1;
        } else {
            stats.failed_runs += 1;
            stats.last_error = last_error;
        }
        stats.last_run = Some(Utc::now());
        stats.success_rate = stats.successful_runs as f64 / stats.total_runs as f64;
    }
}

/// Holds the reentrancy flag for one sweep and clears it on drop, including on unwind.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
