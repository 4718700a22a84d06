use std::time::Duration;

use thiserror::Error;

/// Application-wide error types.
///
/// This enum represents all possible errors that can occur while synchronizing
/// weekly reports. It uses the `thiserror` crate for ergonomic error handling and
/// automatic conversion from underlying library errors.
///
/// # Error Conversion
///
/// Most errors automatically convert from their source types using the `#[from]` attribute:
/// - `sqlx::Error` → `AppError::DatabaseError`
/// - `serde_json::Error` → `AppError::SerializationError`
///
/// # Examples
///
/// ```no_run
/// use aedes_core::error::AppError;
///
/// fn example() -> Result<(), AppError> {
///     Err(AppError::Generic("Something went wrong".to_string()))
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Database operation failed.
    ///
    /// Wraps all errors from SQLx, including connection failures,
    /// query errors and constraint violations.
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// HTTP client could not be built or a request could not be issued.
    #[error("API Client error: {0}")]
    ClientError(String),

    /// JSON serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Network or connection error.
    ///
    /// Connection refused or reset, DNS resolution failures, or the remote
    /// server being unreachable.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timeout, carrying the configured per-call limit.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// A territory fetch failed at the transport level.
    ///
    /// Tagged with the territory geocode so the orchestrator can count it
    /// against that territory only.
    #[error("Fetch failed for territory {geocode}: {reason}")]
    TerritoryFetchFailed { geocode: String, reason: String },

    /// A batch upsert statement failed.
    ///
    /// All rows of the batch are lost for this run; other batches are unaffected.
    #[error("Batch upsert of {rows} rows failed: {reason}")]
    BatchUpsertFailed { rows: usize, reason: String },

    /// A raw weekly record could not be converted to a canonical row.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Configuration error.
    ///
    /// Missing or out-of-range settings detected before any work starts.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic application error for cases not covered by specific variants.
    #[error("Error: {0}")]
    Generic(String),
}

impl AppError {
    /// Returns a user-friendly error message suitable for CLI output.
    pub fn user_message(&self) -> String {
        match self {
            AppError::DatabaseError(e) => {
                if e.to_string().contains("connection") {
                    "Cannot connect to database. Is PostgreSQL running?\n   Check DATABASE_URL and try again.".to_string()
                } else {
                    format!("Database error: {}", e)
                }
            }
            AppError::ClientError(msg) => format!("API error: {}", msg),
            AppError::NetworkError(msg) => {
                format!("Network error: {}\n   Check your internet connection.", msg)
            }
            AppError::Timeout(limit) => {
                format!(
                    "Request timed out after {:?}.\n   The InfoDengue API may be overloaded. Try again later.",
                    limit
                )
            }
            AppError::TerritoryFetchFailed { geocode, reason } => {
                format!("Could not fetch territory {}: {}", geocode, reason)
            }
            AppError::ConfigError(msg) => {
                format!(
                    "Configuration error: {}\n   Check your environment variables or .env file.",
                    msg
                )
            }
            _ => self.to_string(),
        }
    }

    /// Returns true if this error is transient.
    ///
    /// The engine never retries within a run; this only informs callers
    /// (e.g. the scheduler) whether the next run is likely to succeed.
    ///
    /// # Examples
    ///
    /// ```
    /// use aedes_core::error::AppError;
    ///
    /// let err = AppError::NetworkError("connection reset".to_string());
    /// assert!(err.is_retryable());
    ///
    /// let err = AppError::ConfigError("missing DATABASE_URL".to_string());
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::NetworkError(_)
            | AppError::Timeout(_)
            | AppError::TerritoryFetchFailed { .. } => true,
            AppError::DatabaseError(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::PoolClosed
            ),
            _ => false,
        }
    }
}
