//! Aedes DB - PostgreSQL repository layer.
//!
//! # Overview
//!
//! - [`TerritoryRepository`] - territory reference table, source of geocodes
//! - [`WeeklyReportRepository`] - weekly reports with the batch conditional upsert
//!
//! Both implement the corresponding `aedes_core` traits so they can be
//! handed straight to `HarvestService`.

mod report_repository;
mod territory_repository;

pub use report_repository::WeeklyReportRepository;
pub use territory_repository::TerritoryRepository;
