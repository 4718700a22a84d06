//! Periodic trigger for the harvest service.
//!
//! Each invocation produces a [`RunReport`] value that is handed to a
//! [`RunReportSink`]. There is no shared "last run" state beyond what a sink
//! chooses to keep.
//!
//! # Loop
//!
//! ```text
//! loop {
//!     1. Run a full sync with the default window
//!     2. Publish the RunReport
//!     3. Sleep for the interval, or stop if cancelled
//! }
//! ```
//!
//! Cancellation is only observed between runs; a run in progress always
//! finishes.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::ScheduleConfig;
use crate::harvest::HarvestService;
use crate::progress::ProgressReporter;
use crate::sync::SyncResult;
use crate::traits::{ReportClient, ReportStore, TerritoryDirectory};
use crate::window::WindowParams;

// =============================================================================
// Run Report
// =============================================================================

/// Outcome of a scheduled run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }
}

/// Report of one scheduled invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    /// Present when the run reached the end of the orchestration.
    pub result: Option<SyncResult>,
    /// Present when the run aborted (configuration or directory error).
    pub error: Option<String>,
    /// Whether the abort looks transient, so the next run may succeed.
    #[serde(default)]
    pub retryable: bool,
}

impl RunReport {
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

// =============================================================================
// Report Sinks
// =============================================================================

/// Destination for run reports (status store, health endpoint, logs).
pub trait RunReportSink: Send + Sync {
    fn publish(&self, report: &RunReport);
}

/// In-memory sink keeping only the most recent report.
#[derive(Debug, Default, Clone)]
pub struct LatestRunReport {
    inner: Arc<Mutex<Option<RunReport>>>,
}

impl LatestRunReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the most recent report, if any.
    pub fn get(&self) -> Option<RunReport> {
        self.inner.lock().ok().and_then(|guard| guard.clone())
    }
}

impl RunReportSink for LatestRunReport {
    fn publish(&self, report: &RunReport) {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = Some(report.clone());
        }
    }
}

// =============================================================================
// Scheduler Events
// =============================================================================

/// Events emitted by the scheduler loop.
#[derive(Debug, Clone, Copy)]
pub enum SchedulerEvent<'a> {
    Started { interval: Duration },
    RunStarted { run: usize },
    RunFinished { run: usize, report: &'a RunReport },
    Sleeping { interval: Duration },
    Stopped { runs: usize },
}

/// Trait for reporting scheduler events.
pub trait SchedulerReporter: Send + Sync {
    fn report(&self, event: SchedulerEvent<'_>) {
        let _ = event;
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSchedulerReporter;

impl SchedulerReporter for SilentSchedulerReporter {}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSchedulerReporter;

impl SchedulerReporter for TracingSchedulerReporter {
    fn report(&self, event: SchedulerEvent<'_>) {
        match event {
            SchedulerEvent::Started { interval } => {
                info!(interval_secs = interval.as_secs(), "Scheduler started");
            }
            SchedulerEvent::RunStarted { run } => {
                info!(run, "Scheduled sync starting");
            }
            SchedulerEvent::RunFinished { run, report } => match report.status {
                RunStatus::Success => {
                    let stats = report.result.as_ref().map(|r| r.stats).unwrap_or_default();
                    info!(
                        run,
                        duration_ms = report.duration().num_milliseconds(),
                        inserted = stats.inserted,
                        updated = stats.updated,
                        geocodes_synced = stats.geocodes_synced,
                        geocodes_failed = stats.geocodes_failed,
                        "Scheduled sync finished"
                    );
                }
                RunStatus::Failed => {
                    error!(
                        run,
                        error = report.error.as_deref().unwrap_or("unknown"),
                        retryable = report.retryable,
                        "Scheduled sync failed"
                    );
                }
            },
            SchedulerEvent::Sleeping { interval } => {
                tracing::debug!(interval_secs = interval.as_secs(), "Waiting for next run");
            }
            SchedulerEvent::Stopped { runs } => {
                info!(runs, "Scheduler stopped");
            }
        }
    }
}

// =============================================================================
// Periodic Sync
// =============================================================================

/// Runs the harvest service on a fixed interval.
pub struct PeriodicSync<D, S, C> {
    service: HarvestService<D, S, C>,
    config: ScheduleConfig,
}

impl<D, S, C> PeriodicSync<D, S, C>
where
    D: TerritoryDirectory,
    S: ReportStore,
    C: ReportClient + 'static,
{
    pub fn new(service: HarvestService<D, S, C>, config: ScheduleConfig) -> Self {
        Self { service, config }
    }

    /// Runs one sync with the default window and wraps it in a report.
    pub async fn run_once<R: ProgressReporter>(&self, progress: &R) -> RunReport {
        let started_at = Utc::now();
        let outcome = self
            .service
            .run_full_sync_with_progress(WindowParams::default(), progress)
            .await;
        let finished_at = Utc::now();

        match outcome {
            Ok(result) => RunReport {
                started_at,
                finished_at,
                status: RunStatus::Success,
                result: Some(result),
                error: None,
                retryable: false,
            },
            Err(e) => RunReport {
                started_at,
                finished_at,
                status: RunStatus::Failed,
                result: None,
                error: Some(e.to_string()),
                retryable: e.is_retryable(),
            },
        }
    }

    /// Runs until `cancel_token` is triggered.
    ///
    /// # Returns
    ///
    /// The number of completed runs.
    pub async fn run<W, R, K>(
        &self,
        cancel_token: CancellationToken,
        reporter: &W,
        progress: &R,
        sink: &K,
    ) -> usize
    where
        W: SchedulerReporter,
        R: ProgressReporter,
        K: RunReportSink,
    {
        reporter.report(SchedulerEvent::Started {
            interval: self.config.interval,
        });

        let mut runs = 0;
        let mut first = true;

        loop {
            if !(first && self.config.run_on_start) {
                reporter.report(SchedulerEvent::Sleeping {
                    interval: self.config.interval,
                });
                tokio::select! {
                    _ = sleep(self.config.interval) => {}
                    _ = cancel_token.cancelled() => break,
                }
            }
            first = false;

            if cancel_token.is_cancelled() {
                break;
            }

            runs += 1;
            reporter.report(SchedulerEvent::RunStarted { run: runs });
            let report = self.run_once(progress).await;
            sink.publish(&report);
            reporter.report(SchedulerEvent::RunFinished {
                run: runs,
                report: &report,
            });
        }

        reporter.report(SchedulerEvent::Stopped { runs });
        runs
    }
}
