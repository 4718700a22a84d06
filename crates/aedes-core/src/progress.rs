//! Progress reporting for sync runs.
//!
//! The orchestrator emits [`SyncEvent`]s instead of logging directly, so the
//! CLI can log through `tracing` while tests stay silent.

use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::sync::{SyncResult, UpsertCounts};
use crate::window::SyncWindow;

/// Events emitted during a sync run.
#[derive(Debug, Clone, Copy)]
pub enum SyncEvent<'a> {
    /// Window resolved, run starting.
    Started { window: &'a SyncWindow },
    /// Territory list loaded.
    TerritoriesListed { count: usize },
    /// Directory returned no territories.
    NoTerritories,
    /// A territory fetch resolved without a hard failure.
    TerritoryFetched {
        geocode: &'a str,
        outcome: &'static str,
        rows: usize,
    },
    /// A territory fetch failed at the transport level.
    TerritoryFailed { geocode: &'a str, error: &'a AppError },
    /// A batch was written.
    BatchWritten { rows: usize, counts: UpsertCounts },
    /// A batch failed; its rows are lost for this run.
    BatchFailed { rows: usize, error: &'a AppError },
    /// Run finished.
    Completed { result: &'a SyncResult },
}

/// Trait for reporting sync progress.
pub trait ProgressReporter: Send + Sync {
    /// Called when a sync event occurs.
    ///
    /// The default implementation does nothing (silent mode).
    fn report(&self, event: SyncEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that ignores all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}

/// Tracing-based reporter for CLI logging.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn report(&self, event: SyncEvent<'_>) {
        match event {
            SyncEvent::Started { window } => {
                info!(window = %window, "Starting sync");
            }
            SyncEvent::TerritoriesListed { count } => {
                info!(count, "Fetching territories");
            }
            SyncEvent::NoTerritories => {
                warn!("No territories found, nothing to sync");
            }
            SyncEvent::TerritoryFetched {
                geocode,
                outcome,
                rows,
            } => {
                debug!(geocode, outcome, rows, "Territory fetched");
            }
            SyncEvent::BatchWritten { rows, counts } => {
                info!(
                    rows,
                    inserted = counts.inserted,
                    updated = counts.updated,
                    "Batch written"
                );
            }
            // Failures are logged by the orchestrator itself
            SyncEvent::TerritoryFailed { .. } | SyncEvent::BatchFailed { .. } => {}
            SyncEvent::Completed { result } => {
                info!(
                    status = result.status.as_str(),
                    inserted = result.stats.inserted,
                    updated = result.stats.updated,
                    geocodes_synced = result.stats.geocodes_synced,
                    geocodes_failed = result.stats.geocodes_failed,
                    batches_failed = result.batches_failed,
                    "Sync finished"
                );
            }
        }
    }
}
