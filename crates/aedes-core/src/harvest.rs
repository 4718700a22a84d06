//! Harvest service: one full synchronization run.
//!
//! # Architecture
//!
//! The [`HarvestService`] is generic over three traits:
//! - [`TerritoryDirectory`] - lists the territories to refresh
//! - [`ReportStore`] - persists weekly reports
//! - [`ReportClient`] - fetches weekly reports from the remote API
//!
//! # Run
//!
//! ```text
//! resolve window
//!   -> list territories            (error aborts the run)
//!   -> spawn one fetch per territory, capped by the admission gate
//!   -> for each finished fetch (completion order):
//!        hard failure -> count it
//!        otherwise    -> normalize, buffer rows
//!        buffer >= batch_size -> flush
//!   -> flush the remainder
//!   -> SyncResult
//! ```
//!
//! Only the orchestrating task touches the buffer and the counters. Batch
//! failures are logged and absorbed; they never abort the run.

use chrono::{NaiveDate, Utc};
use tracing::error;

use crate::fetch::BoundedFetcher;
use crate::models::NewWeeklyReport;
use crate::normalize::normalize_records;
use crate::progress::{ProgressReporter, SilentReporter, SyncEvent};
use crate::sync::{SyncResult, SyncStats, SyncStatus};
use crate::traits::{ReportClient, ReportStore, TerritoryDirectory};
use crate::upsert::BatchUpserter;
use crate::window::{SyncWindow, WindowParams};
use crate::{AppError, SyncConfig};

/// Service for synchronizing weekly reports from the remote API.
///
/// # Type Parameters
///
/// * `D` - Territory directory (e.g. `TerritoryRepository`)
/// * `S` - Report store (e.g. `WeeklyReportRepository`)
/// * `C` - Report client (e.g. `InfoDengueClient`)
///
/// # Example
///
/// ```ignore
/// use aedes_core::{HarvestService, WindowParams};
///
/// let service = HarvestService::new(territories, reports, client);
/// let stats = service.run_full_sync(WindowParams::default()).await?;
/// println!("{} inserted, {} updated", stats.inserted, stats.updated);
/// ```
pub struct HarvestService<D, S, C> {
    directory: D,
    upserter: BatchUpserter<S>,
    fetcher: BoundedFetcher<C>,
    config: SyncConfig,
}

impl<D, S, C> Clone for HarvestService<D, S, C>
where
    D: Clone,
    S: Clone,
    C: Clone,
{
    fn clone(&self) -> Self {
        Self {
            directory: self.directory.clone(),
            upserter: self.upserter.clone(),
            fetcher: self.fetcher.clone(),
            config: self.config.clone(),
        }
    }
}

impl<D, S, C> HarvestService<D, S, C>
where
    D: TerritoryDirectory,
    S: ReportStore,
    C: ReportClient + 'static,
{
    /// Creates a new harvest service with default configuration.
    pub fn new(directory: D, store: S, client: C) -> Self {
        Self::with_config(directory, store, client, SyncConfig::default())
    }

    /// Creates a harvest service with custom configuration.
    ///
    /// # Arguments
    ///
    /// * `directory` - Territory directory
    /// * `store` - Report store for persistence
    /// * `client` - Remote API client
    /// * `config` - Concurrency cap and batch size
    pub fn with_config(directory: D, store: S, client: C, config: SyncConfig) -> Self {
        Self {
            directory,
            upserter: BatchUpserter::new(store, config.batch_size),
            fetcher: BoundedFetcher::new(client, config.concurrency),
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Runs a full sync and returns the statistics.
    ///
    /// The window fields must be supplied together; a partial window is
    /// ignored and the default trailing window is used.
    ///
    /// # Errors
    ///
    /// Returns an error only if the configuration is invalid or the
    /// territory directory cannot be read. Every other failure is folded
    /// into the statistics.
    pub async fn run_full_sync(&self, params: WindowParams) -> Result<SyncStats, AppError> {
        let result = self
            .run_full_sync_with_progress(params, &SilentReporter)
            .await?;
        Ok(result.stats)
    }

    /// Same as [`run_full_sync`](Self::run_full_sync), with progress events
    /// and the full [`SyncResult`].
    pub async fn run_full_sync_with_progress<R: ProgressReporter>(
        &self,
        params: WindowParams,
        reporter: &R,
    ) -> Result<SyncResult, AppError> {
        self.run_full_sync_at(params, Utc::now().date_naive(), reporter)
            .await
    }

    /// Runs a full sync resolving the default window against `today`.
    pub async fn run_full_sync_at<R: ProgressReporter>(
        &self,
        params: WindowParams,
        today: NaiveDate,
        reporter: &R,
    ) -> Result<SyncResult, AppError> {
        let window = SyncWindow::resolve(&params, today);
        self.sync_window(window, reporter).await
    }

    /// Synchronizes every territory for an already resolved window.
    pub async fn sync_window<R: ProgressReporter>(
        &self,
        window: SyncWindow,
        reporter: &R,
    ) -> Result<SyncResult, AppError> {
        self.config.validate()?;
        reporter.report(SyncEvent::Started { window: &window });

        let geocodes = self.directory.list_geocodes().await?;
        if geocodes.is_empty() {
            reporter.report(SyncEvent::NoTerritories);
            let result = SyncResult::no_territories(window);
            reporter.report(SyncEvent::Completed { result: &result });
            return Ok(result);
        }

        let total = geocodes.len();
        reporter.report(SyncEvent::TerritoriesListed { count: total });

        let mut result = SyncResult::new(window, SyncStatus::Completed);
        let mut buffer: Vec<NewWeeklyReport> = Vec::new();
        let mut tasks = self.fetcher.spawn_all(geocodes, window);

        while let Some(fetch) = tasks.next().await {
            let kind = fetch.outcome.kind();
            match fetch.outcome.into_records() {
                Ok(records) => {
                    let normalized = normalize_records(&fetch.geocode, &records);
                    reporter.report(SyncEvent::TerritoryFetched {
                        geocode: &fetch.geocode,
                        outcome: kind,
                        rows: normalized.rows.len(),
                    });
                    result.records_skipped += normalized.skipped;
                    result.records_malformed += normalized.malformed;
                    buffer.extend(normalized.rows);
                }
                Err(e) => {
                    error!(geocode = %fetch.geocode, error = %e, "Territory fetch failed");
                    reporter.report(SyncEvent::TerritoryFailed {
                        geocode: &fetch.geocode,
                        error: &e,
                    });
                    result.failed_geocodes.insert(fetch.geocode);
                }
            }

            if buffer.len() >= self.upserter.batch_size() {
                self.flush(std::mem::take(&mut buffer), &mut result, reporter)
                    .await;
            }
        }

        if !buffer.is_empty() {
            self.flush(buffer, &mut result, reporter).await;
        }

        let failed = result.failed_geocodes.len();
        result.stats.geocodes_failed = failed;
        result.stats.geocodes_synced = total - failed;

        reporter.report(SyncEvent::Completed { result: &result });
        Ok(result)
    }

    /// Writes buffered rows. Batch failures are recorded, never propagated.
    async fn flush<R: ProgressReporter>(
        &self,
        rows: Vec<NewWeeklyReport>,
        result: &mut SyncResult,
        reporter: &R,
    ) {
        for batch in self.upserter.plan(rows) {
            match self.upserter.upsert(&batch).await {
                Ok(counts) => {
                    result.record_written_batch(counts);
                    reporter.report(SyncEvent::BatchWritten {
                        rows: batch.len(),
                        counts,
                    });
                }
                Err(e) => {
                    error!(rows = batch.len(), error = %e, "Batch upsert failed, rows discarded");
                    result.record_failed_batch(&batch);
                    reporter.report(SyncEvent::BatchFailed {
                        rows: batch.len(),
                        error: &e,
                    });
                }
            }
        }
    }
}
