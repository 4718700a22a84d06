//! Aedes Core - Domain types and the synchronization engine.
//!
//! This crate provides the core functionality for Aedes, including:
//!
//! - **Domain models**: [`Territory`], [`NewWeeklyReport`], [`WeeklyReport`], [`ReportFilter`]
//! - **Window calculation**: [`SyncWindow`] resolution from optional trigger parameters
//! - **Normalization**: raw `alertcity` records to canonical rows
//! - **Services**: [`HarvestService`] for a full sync run, [`PeriodicSync`] for scheduled runs
//! - **Traits**: [`TerritoryDirectory`], [`ReportStore`], [`ReportClient`] for dependency injection
//! - **Progress reporting**: [`ProgressReporter`] trait for decoupled logging
//!
//! # Architecture
//!
//! This crate is designed to be reusable by different frontends (CLI,
//! scheduler, HTTP trigger). Business logic is decoupled from I/O through traits:
//!
//! - [`TerritoryDirectory`] - abstracts the territory lookup (e.g., PostgreSQL)
//! - [`ReportStore`] - abstracts the batch upsert (e.g., PostgreSQL)
//! - [`ReportClient`] - abstracts the remote API (e.g., InfoDengue)
//!
//! # Example
//!
//! ```ignore
//! use aedes_core::{HarvestService, TracingReporter, WindowParams};
//!
//! let service = HarvestService::new(territories, reports, client);
//! let result = service
//!     .run_full_sync_with_progress(WindowParams::explicit(1, 2023, 46, 2025), &TracingReporter)
//!     .await?;
//! println!("{} territories failed", result.stats.geocodes_failed);
//! ```

pub mod config;
pub mod error;
pub mod fetch;
pub mod harvest;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod scheduler;
pub mod sync;
pub mod traits;
pub mod upsert;
pub mod window;

// Configuration
pub use config::{
    DEFAULT_API_URL, DbConfig, HttpConfig, MAX_BATCH_SIZE, ScheduleConfig, SyncConfig,
};

// Error handling
pub use error::AppError;

// Domain models
pub use models::{
    DEFAULT_REPORT_LIMIT, NewWeeklyReport, ReportFilter, StateAggregation, Territory,
    WeeklyReport,
};

// Window and normalization
pub use normalize::{Normalized, normalize_record, normalize_records};
pub use window::{DEFAULT_TRAILING_WEEKS, SyncWindow, WindowParams};

// Sync types
pub use sync::{SyncResult, SyncStats, SyncStatus, UpsertCounts};

// Fetching and upserting
pub use fetch::{BoundedFetcher, FetchOutcome, FetchTasks, TerritoryFetch};
pub use upsert::BatchUpserter;

// Progress reporting
pub use progress::{ProgressReporter, SilentReporter, SyncEvent, TracingReporter};

// Traits for dependency injection
pub use traits::{ReportClient, ReportStore, TerritoryDirectory};

// Services
pub use harvest::HarvestService;
pub use scheduler::{
    LatestRunReport, PeriodicSync, RunReport, RunReportSink, RunStatus, SchedulerEvent,
    SchedulerReporter, SilentSchedulerReporter, TracingSchedulerReporter,
};
