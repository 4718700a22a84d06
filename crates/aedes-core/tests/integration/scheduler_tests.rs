//! Integration tests for PeriodicSync.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use aedes_core::{
    HarvestService, LatestRunReport, PeriodicSync, RunReport, RunReportSink, RunStatus,
    ScheduleConfig, SilentReporter, SilentSchedulerReporter, SyncConfig,
};
use tokio_util::sync::CancellationToken;

use crate::integration::common::{
    MockDirectory, MockReportClient, MockReportStore, MockResponse, raw_records,
};

const RECIFE: &str = "2611606";

/// Sink that cancels the scheduler after a fixed number of reports.
struct StopAfter {
    limit: usize,
    seen: AtomicUsize,
    token: CancellationToken,
    latest: LatestRunReport,
}

impl RunReportSink for StopAfter {
    fn publish(&self, report: &RunReport) {
        self.latest.publish(report);
        if self.seen.fetch_add(1, Ordering::SeqCst) + 1 >= self.limit {
            self.token.cancel();
        }
    }
}

/// Test 1: A successful run yields a success report with the stats.
#[tokio::test]
async fn test_run_once_success_report() {
    let client = MockReportClient::new().respond(RECIFE, MockResponse::Records(raw_records(2)));
    let service = HarvestService::new(
        MockDirectory::new(&[RECIFE]),
        MockReportStore::new(),
        client,
    );
    let scheduler = PeriodicSync::new(service, ScheduleConfig::default());

    let report = scheduler.run_once(&SilentReporter).await;

    assert_eq!(report.status, RunStatus::Success);
    assert!(report.error.is_none());
    assert!(!report.retryable);
    assert!(report.finished_at >= report.started_at);
    let result = report.result.expect("successful run carries a result");
    assert_eq!(result.stats.inserted, 2);
}

/// Test 2: A directory failure yields a failed report instead of an error.
#[tokio::test]
async fn test_run_once_failure_report() {
    let service = HarvestService::new(
        MockDirectory::failing(),
        MockReportStore::new(),
        MockReportClient::new(),
    );
    let scheduler = PeriodicSync::new(service, ScheduleConfig::default());

    let report = scheduler.run_once(&SilentReporter).await;

    assert_eq!(report.status, RunStatus::Failed);
    assert!(report.result.is_none());
    assert!(report.retryable, "A pool timeout should be retryable");
    assert!(report.error.unwrap().contains("Database error"));
}

/// Test 2b: A configuration error is reported as not retryable.
#[tokio::test]
async fn test_run_once_config_error_not_retryable() {
    let service = HarvestService::with_config(
        MockDirectory::new(&[RECIFE]),
        MockReportStore::new(),
        MockReportClient::new(),
        SyncConfig::default().with_batch_size(100_000),
    );
    let scheduler = PeriodicSync::new(service, ScheduleConfig::default());

    let report = scheduler.run_once(&SilentReporter).await;

    assert_eq!(report.status, RunStatus::Failed);
    assert!(!report.retryable);
    assert!(report.error.unwrap().contains("Configuration error"));
}

/// Test 3: The loop runs on the interval and stops on cancellation.
#[tokio::test(start_paused = true)]
async fn test_periodic_sync_runs_until_cancelled() {
    // Arrange
    let client = MockReportClient::new();
    let service = HarvestService::new(
        MockDirectory::new(&[RECIFE]),
        MockReportStore::new(),
        client.clone(),
    );
    let config = ScheduleConfig::default().with_interval_minutes(60);
    let scheduler = PeriodicSync::new(service, config);
    let token = CancellationToken::new();
    let sink = StopAfter {
        limit: 3,
        seen: AtomicUsize::new(0),
        token: token.clone(),
        latest: LatestRunReport::new(),
    };

    // Act
    let runs = scheduler
        .run(token, &SilentSchedulerReporter, &SilentReporter, &sink)
        .await;

    // Assert
    assert_eq!(runs, 3);
    assert_eq!(client.calls(), 3);
    assert_eq!(sink.latest.get().unwrap().status, RunStatus::Success);
}

/// Test 4: Cancellation before the first run with run_on_start disabled.
#[tokio::test(start_paused = true)]
async fn test_periodic_sync_cancelled_while_sleeping() {
    let client = MockReportClient::new();
    let service = HarvestService::new(
        MockDirectory::new(&[RECIFE]),
        MockReportStore::new(),
        client.clone(),
    );
    let config = ScheduleConfig::default().with_run_on_start(false);
    let scheduler = PeriodicSync::new(service, config);
    let token = CancellationToken::new();
    let latest = LatestRunReport::new();

    let cancel = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(60)).await;
        cancel.cancel();
    });

    let runs = scheduler
        .run(token, &SilentSchedulerReporter, &SilentReporter, &latest)
        .await;

    assert_eq!(runs, 0);
    assert_eq!(client.calls(), 0);
    assert!(latest.get().is_none());
}
