//! Configuration types for Aedes components.
//!
//! Defaults mirror the production deployment. The CLI overrides them from
//! environment variables (see `aedes-cli`), always through the `with_*`
//! builders so that out-of-range values are clamped the same way everywhere.

use std::time::Duration;

use crate::error::AppError;

/// Default InfoDengue endpoint for per-city alert series.
pub const DEFAULT_API_URL: &str = "https://info.dengue.mat.br/api/alertcity/";

/// Largest accepted `batch_size`.
///
/// One upsert statement carries a whole batch. PostgreSQL binds at most
/// 65535 parameters per statement and a weekly report row binds 10.
pub const MAX_BATCH_SIZE: usize = 6553;

// =============================================================================
// Database Configuration
// =============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self { max_connections: 5 }
    }
}

impl DbConfig {
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }
}

// =============================================================================
// HTTP Configuration
// =============================================================================

/// HTTP client configuration for the InfoDengue API.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Base URL of the `alertcity` endpoint.
    pub base_url: String,
    /// Disease identifier sent with every request.
    pub disease: String,
    /// Per-call timeout. There is no run-wide deadline.
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            disease: "dengue".to_string(),
            timeout: Duration::from_secs(15),
            user_agent: concat!("Aedes/", env!("CARGO_PKG_VERSION"), " (surveillance-sync)")
                .to_string(),
        }
    }
}

impl HttpConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_disease(mut self, disease: impl Into<String>) -> Self {
        self.disease = disease.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// =============================================================================
// Sync Configuration
// =============================================================================

/// Synchronization engine configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum number of territory fetches in flight across the whole run.
    pub concurrency: usize,
    /// Buffered row count that triggers a flush, and the maximum number of
    /// rows per upsert statement.
    pub batch_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: 100,
            batch_size: 1000,
        }
    }
}

impl SyncConfig {
    /// Creates a new SyncConfig with a custom concurrency cap.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Creates a new SyncConfig with a custom batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Rejects values that would stall the engine or fail every write.
    ///
    /// A zero concurrency cap would leave every fetch task waiting on the
    /// admission gate forever. A batch above [`MAX_BATCH_SIZE`] cannot be
    /// bound in one statement.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.concurrency == 0 {
            return Err(AppError::ConfigError(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(AppError::ConfigError(
                "batch size must be at least 1".to_string(),
            ));
        }
        if self.batch_size > MAX_BATCH_SIZE {
            return Err(AppError::ConfigError(format!(
                "batch size {} exceeds the maximum of {} rows per statement",
                self.batch_size, MAX_BATCH_SIZE
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Schedule Configuration
// =============================================================================

/// Periodic trigger configuration.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Delay between the end of one run and the start of the next.
    pub interval: Duration,
    /// Whether to run once immediately on startup.
    pub run_on_start: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60 * 60),
            run_on_start: true,
        }
    }
}

impl ScheduleConfig {
    pub fn with_interval_minutes(mut self, minutes: u64) -> Self {
        self.interval = Duration::from_secs(minutes.max(1) * 60);
        self
    }

    pub fn with_run_on_start(mut self, run_on_start: bool) -> Self {
        self.run_on_start = run_on_start;
        self
    }
}
