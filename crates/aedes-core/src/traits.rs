//! Trait definitions for external dependencies.
//!
//! The engine talks to three collaborators: the territory directory, the
//! report store and the surveillance API. Each is a trait so the orchestrator
//! can run against PostgreSQL and reqwest in production and against in-memory
//! mocks in tests.

use std::future::Future;

use crate::AppError;
use crate::fetch::FetchOutcome;
use crate::models::NewWeeklyReport;
use crate::sync::UpsertCounts;
use crate::window::SyncWindow;

/// Read-only source of territory keys.
pub trait TerritoryDirectory: Send + Sync + Clone {
    /// Lists every territory geocode known to the store.
    ///
    /// No filtering and no pagination. An empty list is a valid result.
    ///
    /// # Errors
    ///
    /// Propagates store connectivity errors; the run must abort.
    fn list_geocodes(&self) -> impl Future<Output = Result<Vec<String>, AppError>> + Send;
}

/// Upsert target for weekly reports.
pub trait ReportStore: Send + Sync + Clone {
    /// Inserts or conditionally updates a batch of rows keyed on `(geocode, se)`.
    ///
    /// Implementations must execute the batch as a single atomic statement.
    /// Rows are only rewritten when a significant field (`reported_cases`,
    /// `estimated_cases`, `alert_level`) differs from the stored value.
    ///
    /// # Arguments
    ///
    /// * `rows` - Canonical rows with unique natural keys
    ///
    /// # Returns
    ///
    /// The number of rows inserted and the number of rows updated, derived
    /// from the statement outcome.
    fn upsert_batch(
        &self,
        rows: &[NewWeeklyReport],
    ) -> impl Future<Output = Result<UpsertCounts, AppError>> + Send;
}

/// Client for the per-territory surveillance API.
pub trait ReportClient: Send + Sync + Clone {
    /// Fetches one territory's weekly records for the given window.
    ///
    /// Never fails: every response is classified into a [`FetchOutcome`].
    ///
    /// # Arguments
    ///
    /// * `geocode` - The territory geocode
    /// * `window` - The resolved epidemiological-week window
    fn fetch_reports(
        &self,
        geocode: &str,
        window: &SyncWindow,
    ) -> impl Future<Output = FetchOutcome> + Send;
}
