//! Bounded-size batch upserts.

use std::collections::HashMap;

use crate::error::AppError;
use crate::models::NewWeeklyReport;
use crate::sync::UpsertCounts;
use crate::traits::ReportStore;

/// Splits buffered rows into statements of at most `batch_size` rows and
/// runs them against a [`ReportStore`].
#[derive(Clone)]
pub struct BatchUpserter<S> {
    store: S,
    batch_size: usize,
}

impl<S: ReportStore> BatchUpserter<S> {
    pub fn new(store: S, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Deduplicates rows on `(geocode, se)` and splits them into batches.
    ///
    /// The last occurrence of a key wins and keeps the position of the first.
    /// PostgreSQL rejects an `ON CONFLICT DO UPDATE` statement that touches the
    /// same row twice, so keys must be unique per statement.
    pub fn plan(&self, rows: Vec<NewWeeklyReport>) -> Vec<Vec<NewWeeklyReport>> {
        let mut position: HashMap<(String, i32), usize> = HashMap::with_capacity(rows.len());
        let mut unique: Vec<NewWeeklyReport> = Vec::with_capacity(rows.len());

        for row in rows {
            let key = (row.geocode.clone(), row.se);
            match position.get(&key) {
                Some(&idx) => unique[idx] = row,
                None => {
                    position.insert(key, unique.len());
                    unique.push(row);
                }
            }
        }

        let mut batches = Vec::with_capacity(unique.len().div_ceil(self.batch_size));
        let mut rest = unique.into_iter().peekable();
        while rest.peek().is_some() {
            batches.push(rest.by_ref().take(self.batch_size).collect());
        }
        batches
    }

    /// Runs a single batch.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BatchUpsertFailed` carrying the batch size; the
    /// caller decides whether to continue.
    pub async fn upsert(&self, batch: &[NewWeeklyReport]) -> Result<UpsertCounts, AppError> {
        if batch.is_empty() {
            return Ok(UpsertCounts::default());
        }
        self.store
            .upsert_batch(batch)
            .await
            .map_err(|e| AppError::BatchUpsertFailed {
                rows: batch.len(),
                reason: e.to_string(),
            })
    }
}
