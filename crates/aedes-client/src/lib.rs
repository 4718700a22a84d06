//! Aedes Client - HTTP clients for external APIs
//!
//! This crate provides the HTTP client for:
//!
//! - [`infodengue`] - InfoDengue `alertcity` weekly series
//! - [`municipalities`] - IBGE municipality list for seeding territories
//!
//! # Overview
//!
//! The report client handles request building, timeouts and response
//! classification. It never fails a call: every response maps to a
//! [`aedes_core::FetchOutcome`] that the orchestrator pattern-matches.

pub mod infodengue;
pub mod municipalities;

pub use infodengue::InfoDengueClient;
pub use municipalities::{DEFAULT_MUNICIPALITIES_URL, MunicipalitySource, parse_municipalities_csv};
