//! Concurrent per-territory fetching under a global cap.
//!
//! Every territory gets its own task on the tokio runtime. Tasks share one
//! [`Semaphore`]: a task waits for a permit before issuing its request and the
//! permit is dropped when the request resolves, whatever the outcome. The
//! number of requests in flight therefore never exceeds the configured cap,
//! however many territories are queued.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};

use crate::error::AppError;
use crate::traits::ReportClient;
use crate::window::SyncWindow;

/// Classified result of one territory request.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The API answered with a JSON array (possibly empty).
    Records(Vec<Value>),
    /// The API has no series for this territory (HTTP 404).
    NotFound,
    /// Error status other than 404, or an unexpected body.
    SoftError(String),
    /// Transport failure: timeout, connection reset, DNS.
    HardError(AppError),
}

impl FetchOutcome {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchOutcome::Records(_) => "records",
            FetchOutcome::NotFound => "not_found",
            FetchOutcome::SoftError(_) => "soft_error",
            FetchOutcome::HardError(_) => "hard_error",
        }
    }

    /// Collapses the outcome into records.
    ///
    /// Not-found and soft errors count as a successful call with no data.
    /// Only hard errors are returned as `Err`.
    pub fn into_records(self) -> Result<Vec<Value>, AppError> {
        match self {
            FetchOutcome::Records(records) => Ok(records),
            FetchOutcome::NotFound | FetchOutcome::SoftError(_) => Ok(Vec::new()),
            FetchOutcome::HardError(e) => Err(e),
        }
    }
}

/// Outcome paired with the territory it belongs to.
#[derive(Debug)]
pub struct TerritoryFetch {
    pub geocode: String,
    pub outcome: FetchOutcome,
}

/// Fetcher enforcing a global concurrency cap on territory requests.
#[derive(Clone)]
pub struct BoundedFetcher<C> {
    client: C,
    gate: Arc<Semaphore>,
}

impl<C> BoundedFetcher<C>
where
    C: ReportClient + 'static,
{
    /// Creates a fetcher allowing at most `limit` requests in flight.
    pub fn new(client: C, limit: usize) -> Self {
        Self {
            client,
            gate: Arc::new(Semaphore::new(limit.max(1))),
        }
    }

    /// Fetches one territory, waiting for an admission slot first.
    ///
    /// Hard failures are tagged with the geocode.
    pub async fn fetch(&self, geocode: String, window: SyncWindow) -> TerritoryFetch {
        let outcome = match self.gate.clone().acquire_owned().await {
            Ok(_permit) => self.client.fetch_reports(&geocode, &window).await,
            Err(_) => FetchOutcome::HardError(AppError::Generic(
                "admission gate closed".to_string(),
            )),
        };

        let outcome = match outcome {
            FetchOutcome::NotFound => {
                tracing::debug!(geocode = %geocode, "No data for territory (404)");
                FetchOutcome::NotFound
            }
            FetchOutcome::SoftError(reason) => {
                tracing::warn!(
                    geocode = %geocode,
                    reason = %reason,
                    "Upstream error, treating as empty"
                );
                FetchOutcome::SoftError(reason)
            }
            FetchOutcome::HardError(e) => FetchOutcome::HardError(tag(&geocode, e)),
            records => records,
        };

        TerritoryFetch { geocode, outcome }
    }

    /// Spawns one fetch task per territory.
    pub fn spawn_all(&self, geocodes: Vec<String>, window: SyncWindow) -> FetchTasks {
        let mut set = JoinSet::new();
        let mut geocode_by_task = HashMap::with_capacity(geocodes.len());

        for geocode in geocodes {
            let fetcher = self.clone();
            let handle = set.spawn({
                let geocode = geocode.clone();
                async move { fetcher.fetch(geocode, window).await }
            });
            geocode_by_task.insert(handle.id(), geocode);
        }

        FetchTasks {
            set,
            geocode_by_task,
        }
    }
}

fn tag(geocode: &str, error: AppError) -> AppError {
    match error {
        tagged @ AppError::TerritoryFetchFailed { .. } => tagged,
        other => AppError::TerritoryFetchFailed {
            geocode: geocode.to_string(),
            reason: other.to_string(),
        },
    }
}

/// Running fetch tasks, yielded in completion order.
pub struct FetchTasks {
    set: JoinSet<TerritoryFetch>,
    geocode_by_task: HashMap<Id, String>,
}

impl FetchTasks {
    /// Number of tasks not yet collected.
    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Waits for the next task to finish.
    ///
    /// A task that panicked is reported as a hard failure of its territory.
    pub async fn next(&mut self) -> Option<TerritoryFetch> {
        let joined = self.set.join_next_with_id().await?;
        Some(match joined {
            Ok((id, fetch)) => {
                self.geocode_by_task.remove(&id);
                fetch
            }
            Err(e) => {
                let geocode = self
                    .geocode_by_task
                    .remove(&e.id())
                    .unwrap_or_else(|| "unknown".to_string());
                TerritoryFetch {
                    outcome: FetchOutcome::HardError(AppError::TerritoryFetchFailed {
                        geocode: geocode.clone(),
                        reason: format!("fetch task aborted: {}", e),
                    }),
                    geocode,
                }
            }
        })
    }
}
