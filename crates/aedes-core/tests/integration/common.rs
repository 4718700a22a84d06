//! Test utilities and mock implementations for integration tests.
//!
//! Provides in-memory implementations of the core traits for testing
//! `HarvestService` and `PeriodicSync` in isolation.

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aedes_core::traits::{ReportClient, ReportStore, TerritoryDirectory};
use aedes_core::{AppError, FetchOutcome, NewWeeklyReport, SyncWindow, UpsertCounts};
use serde_json::{Value, json};
use tokio::sync::Notify;
use tracing_subscriber::fmt::MakeWriter;

// =============================================================================
// MockDirectory
// =============================================================================

/// Territory directory backed by a fixed list.
#[derive(Clone, Default)]
pub struct MockDirectory {
    geocodes: Vec<String>,
    fail: bool,
}

impl MockDirectory {
    pub fn new(geocodes: &[&str]) -> Self {
        Self {
            geocodes: geocodes.iter().map(|g| g.to_string()).collect(),
            fail: false,
        }
    }

    /// Directory whose lookups always fail.
    #[allow(dead_code)]
    pub fn failing() -> Self {
        Self {
            geocodes: Vec::new(),
            fail: true,
        }
    }
}

impl TerritoryDirectory for MockDirectory {
    async fn list_geocodes(&self) -> Result<Vec<String>, AppError> {
        if self.fail {
            return Err(AppError::DatabaseError(sqlx::Error::PoolTimedOut));
        }
        Ok(self.geocodes.clone())
    }
}

// =============================================================================
// MockReportStore
// =============================================================================

/// In-memory report store with the same conditional-update semantics as the
/// PostgreSQL repository.
#[derive(Clone, Default)]
pub struct MockReportStore {
    rows: Arc<Mutex<HashMap<(String, i32), NewWeeklyReport>>>,
    batch_sizes: Arc<Mutex<Vec<usize>>>,
    failing_geocodes: Arc<HashSet<String>>,
}

impl MockReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that rejects any batch containing a row for one of `geocodes`.
    #[allow(dead_code)]
    pub fn failing_for(geocodes: &[&str]) -> Self {
        Self {
            failing_geocodes: Arc::new(geocodes.iter().map(|g| g.to_string()).collect()),
            ..Default::default()
        }
    }

    pub fn get(&self, geocode: &str, se: i32) -> Option<NewWeeklyReport> {
        self.rows
            .lock()
            .unwrap()
            .get(&(geocode.to_string(), se))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// Sizes of all batches received, in call order.
    #[allow(dead_code)]
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().unwrap().clone()
    }

    /// Snapshot of stored rows keyed by natural key.
    #[allow(dead_code)]
    pub fn snapshot(&self) -> HashMap<(String, i32), NewWeeklyReport> {
        self.rows.lock().unwrap().clone()
    }
}

fn significant_fields_differ(a: &NewWeeklyReport, b: &NewWeeklyReport) -> bool {
    a.reported_cases != b.reported_cases
        || a.estimated_cases != b.estimated_cases
        || a.alert_level != b.alert_level
}

impl ReportStore for MockReportStore {
    async fn upsert_batch(&self, batch: &[NewWeeklyReport]) -> Result<UpsertCounts, AppError> {
        self.batch_sizes.lock().unwrap().push(batch.len());

        if batch
            .iter()
            .any(|row| self.failing_geocodes.contains(&row.geocode))
        {
            return Err(AppError::Generic("simulated statement failure".to_string()));
        }

        let mut rows = self.rows.lock().unwrap();
        let mut counts = UpsertCounts::default();
        for row in batch {
            let key = (row.geocode.clone(), row.se);
            match rows.get(&key) {
                None => {
                    rows.insert(key, row.clone());
                    counts.inserted += 1;
                }
                Some(existing) if significant_fields_differ(existing, row) => {
                    rows.insert(key, row.clone());
                    counts.updated += 1;
                }
                Some(_) => {}
            }
        }
        Ok(counts)
    }
}

// =============================================================================
// MockReportClient
// =============================================================================

/// Scripted response for one territory.
#[derive(Clone, Debug)]
#[allow(dead_code)]
pub enum MockResponse {
    Records(Vec<Value>),
    NotFound,
    ServerError(u16),
    Timeout,
    /// The client task panics.
    Panic,
}

/// Report client returning scripted responses, tracking concurrency.
///
/// Territories without a script return an empty record list.
#[derive(Clone, Default)]
pub struct MockReportClient {
    responses: Arc<Mutex<HashMap<String, MockResponse>>>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    windows: Arc<Mutex<Vec<SyncWindow>>>,
    gates: Arc<Mutex<HashMap<String, Arc<Notify>>>>,
    completed: Arc<Mutex<Vec<String>>>,
}

impl MockReportClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a simulated latency to every call.
    #[allow(dead_code)]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Holds the response for `geocode` until `gate` is notified.
    #[allow(dead_code)]
    pub fn gated(self, geocode: &str, gate: Arc<Notify>) -> Self {
        self.gates
            .lock()
            .unwrap()
            .insert(geocode.to_string(), gate);
        self
    }

    pub fn respond(self, geocode: &str, response: MockResponse) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(geocode.to_string(), response);
        self
    }

    /// Replaces a scripted response between runs.
    #[allow(dead_code)]
    pub fn set_response(&self, geocode: &str, response: MockResponse) {
        self.responses
            .lock()
            .unwrap()
            .insert(geocode.to_string(), response);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    #[allow(dead_code)]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Geocodes whose call has returned, in completion order.
    #[allow(dead_code)]
    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }

    /// Windows received, in call order.
    #[allow(dead_code)]
    pub fn windows(&self) -> Vec<SyncWindow> {
        self.windows.lock().unwrap().clone()
    }
}

impl ReportClient for MockReportClient {
    async fn fetch_reports(&self, geocode: &str, window: &SyncWindow) -> FetchOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.windows.lock().unwrap().push(*window);

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let gate = self.gates.lock().unwrap().get(geocode).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let response = self.responses.lock().unwrap().get(geocode).cloned();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.lock().unwrap().push(geocode.to_string());

        match response {
            None => FetchOutcome::Records(Vec::new()),
            Some(MockResponse::Records(records)) => FetchOutcome::Records(records),
            Some(MockResponse::NotFound) => FetchOutcome::NotFound,
            Some(MockResponse::ServerError(status)) => {
                FetchOutcome::SoftError(format!("HTTP {}", status))
            }
            Some(MockResponse::Timeout) => {
                FetchOutcome::HardError(AppError::Timeout(Duration::from_secs(15)))
            }
            Some(MockResponse::Panic) => panic!("simulated client panic for {}", geocode),
        }
    }
}

// =============================================================================
// Log capture
// =============================================================================

/// In-memory log sink for a `tracing_subscriber::fmt` subscriber.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

pub struct LogCaptureWriter(Arc<Mutex<Vec<u8>>>);

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogCaptureWriter(Arc::clone(&self.0))
    }
}

impl io::Write for LogCaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .0
            .lock()
            .map_err(|_| io::Error::other("lock poisoned"))?;
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LogCapture {
    /// Installs a capturing subscriber for the current thread.
    #[allow(dead_code)]
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// Captured lines at ERROR level.
    #[allow(dead_code)]
    pub fn error_lines(&self) -> Vec<String> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8_lossy(&bytes)
            .lines()
            .filter(|line| line.contains("ERROR"))
            .map(str::to_string)
            .collect()
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// Epoch milliseconds of 2024-10-27 03:33:20 UTC.
pub const SE_202544_START_MS: i64 = 1_730_000_000_000;

const WEEK_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Raw `alertcity` record for the given week offset after 2024-W44.
pub fn raw_record(offset: i32, casos: i32, nivel: i32) -> Value {
    json!({
        "SE": 202544 + offset,
        "data_iniSE": SE_202544_START_MS + i64::from(offset) * WEEK_MS,
        "casos": casos,
        "casos_est": f64::from(casos) * 1.2,
        "casos_est_min": casos,
        "casos_est_max": casos * 2,
        "nivel": nivel,
        "pop": 1_661_017.0,
        "Rt": 0.95
    })
}

/// `count` consecutive weekly records starting at 2024-W44.
#[allow(dead_code)]
pub fn raw_records(count: i32) -> Vec<Value> {
    (0..count).map(|i| raw_record(i, 10 + i, 1)).collect()
}
