//! Sync statistics and run results.
//!
//! This module holds pure bookkeeping types, decoupled from I/O. The
//! orchestrator in [`crate::harvest`] is the only writer.

use std::collections::BTreeSet;
use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

use crate::models::NewWeeklyReport;
use crate::window::SyncWindow;

/// Rows inserted vs. updated by one or more upsert statements.
///
/// Rows whose significant fields were unchanged are in neither count.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertCounts {
    pub inserted: usize,
    pub updated: usize,
}

impl UpsertCounts {
    pub fn new(inserted: usize, updated: usize) -> Self {
        Self { inserted, updated }
    }

    /// Rows actually written.
    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }
}

impl AddAssign for UpsertCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.inserted += rhs.inserted;
        self.updated += rhs.updated;
    }
}

/// Statistics for a sync run.
///
/// This is the externally observed result shape; it never changes with
/// batch-level failures.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub inserted: usize,
    pub updated: usize,
    pub geocodes_synced: usize,
    pub geocodes_failed: usize,
}

impl SyncStats {
    /// Creates a new empty stats tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the counts of a successfully written batch.
    pub fn record_batch(&mut self, counts: UpsertCounts) {
        self.inserted += counts.inserted;
        self.updated += counts.updated;
    }

    /// Returns the number of territories attempted.
    pub fn total_geocodes(&self) -> usize {
        self.geocodes_synced + self.geocodes_failed
    }

    /// Returns the number of rows inserted or updated.
    pub fn rows_written(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Terminal state of an orchestration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Every territory was attempted.
    Completed,
    /// The directory returned no territories; nothing was fetched.
    NoTerritories,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Completed => "completed",
            SyncStatus::NoTerritories => "no_territories",
        }
    }
}

/// Full result of one orchestration.
///
/// Wraps [`SyncStats`] with the resolved window and the details that the
/// stats shape cannot express: which territories failed to fetch, and which
/// territories had rows in a batch that failed to persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    pub window: SyncWindow,
    pub status: SyncStatus,
    pub stats: SyncStats,
    /// Territories with a hard fetch failure.
    pub failed_geocodes: BTreeSet<String>,
    pub batches_written: usize,
    pub batches_failed: usize,
    /// Rows dropped because their batch failed.
    pub rows_lost: usize,
    /// Territories counted as synced whose rows were (at least partly) lost.
    pub unpersisted_geocodes: BTreeSet<String>,
    /// Raw records without a period-start date.
    pub records_skipped: usize,
    /// Raw records that failed conversion.
    pub records_malformed: usize,
}

impl SyncResult {
    pub fn new(window: SyncWindow, status: SyncStatus) -> Self {
        Self {
            window,
            status,
            stats: SyncStats::default(),
            failed_geocodes: BTreeSet::new(),
            batches_written: 0,
            batches_failed: 0,
            rows_lost: 0,
            unpersisted_geocodes: BTreeSet::new(),
            records_skipped: 0,
            records_malformed: 0,
        }
    }

    /// Result for a run that found no territories.
    pub fn no_territories(window: SyncWindow) -> Self {
        Self::new(window, SyncStatus::NoTerritories)
    }

    pub fn record_written_batch(&mut self, counts: UpsertCounts) {
        self.stats.record_batch(counts);
        self.batches_written += 1;
    }

    /// Tracks the provenance of a batch that failed to persist.
    pub fn record_failed_batch(&mut self, batch: &[NewWeeklyReport]) {
        self.batches_failed += 1;
        self.rows_lost += batch.len();
        self.unpersisted_geocodes
            .extend(batch.iter().map(|row| row.geocode.clone()));
    }

    /// Returns true if every fetched row was persisted and no territory failed.
    pub fn is_clean(&self) -> bool {
        self.stats.geocodes_failed == 0 && self.batches_failed == 0
    }
}
