//! InfoDengue client for the `alertcity` endpoint.
//!
//! API reference: <https://info.dengue.mat.br/services/api>
//!
//! One request returns the weekly series of one municipality:
//!
//! ```text
//! GET /api/alertcity/?geocode=2611606&disease=dengue&format=json
//!     &ew_start=1&ey_start=2023&ew_end=46&ey_end=2025
//! ```
//!
//! The body is a JSON array of weekly records (`SE`, `data_iniSE`, `casos`, ...).

use std::time::Duration;

use aedes_core::HttpConfig;
use aedes_core::error::AppError;
use aedes_core::fetch::FetchOutcome;
use aedes_core::traits::ReportClient;
use aedes_core::window::SyncWindow;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use url::Url;

/// HTTP client for the InfoDengue API.
///
/// # Examples
///
/// ```no_run
/// use aedes_client::InfoDengueClient;
/// use aedes_core::{HttpConfig, SyncWindow};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = InfoDengueClient::new(&HttpConfig::default())?;
/// let window = SyncWindow { week_start: 1, year_start: 2025, week_end: 10, year_end: 2025 };
/// let outcome = client.fetch_alertcity("2611606", &window).await;
/// println!("{}", outcome.kind());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct InfoDengueClient {
    client: Client,
    base_url: Url,
    disease: String,
    timeout: Duration,
}

impl InfoDengueClient {
    /// Creates a new client from the HTTP configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidUrl` if the base URL is malformed.
    /// Returns `AppError::ClientError` if the HTTP client cannot be built.
    pub fn new(config: &HttpConfig) -> Result<Self, AppError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| AppError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::ClientError(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            disease: config.disease.clone(),
            timeout: config.timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds the request URL for one territory and window.
    pub fn request_url(&self, geocode: &str, window: &SyncWindow) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("geocode", geocode)
                .append_pair("disease", &self.disease)
                .append_pair("format", "json");
            for (key, value) in window.query_pairs() {
                query.append_pair(key, &value);
            }
        }
        url
    }

    /// Fetches the weekly series of one territory.
    ///
    /// Never returns an error; the response is classified instead:
    ///
    /// | Response | Outcome |
    /// |---|---|
    /// | 2xx with a JSON array | `Records` |
    /// | 404 | `NotFound` |
    /// | other 4xx/5xx | `SoftError` |
    /// | 2xx with any other body | `SoftError` |
    /// | timeout, connect, transport error | `HardError` |
    pub async fn fetch_alertcity(&self, geocode: &str, window: &SyncWindow) -> FetchOutcome {
        let url = self.request_url(geocode, window);
        tracing::debug!(geocode = %geocode, url = %url, "Requesting alertcity series");

        let resp = match self.client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => return FetchOutcome::HardError(self.map_transport_error(e)),
        };

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return FetchOutcome::NotFound;
        }
        if !status.is_success() {
            return FetchOutcome::SoftError(format!("HTTP {}", status.as_u16()));
        }

        match resp.json::<Value>().await {
            Ok(Value::Array(records)) => FetchOutcome::Records(records),
            Ok(other) => FetchOutcome::SoftError(format!(
                "unexpected response shape: {}",
                json_type(&other)
            )),
            Err(e) if e.is_decode() => {
                FetchOutcome::SoftError(format!("invalid JSON body: {}", e))
            }
            Err(e) => FetchOutcome::HardError(self.map_transport_error(e)),
        }
    }

    fn map_transport_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(self.timeout)
        } else if e.is_connect() {
            AppError::NetworkError(format!("Connection failed: {}", e))
        } else {
            AppError::NetworkError(e.to_string())
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl ReportClient for InfoDengueClient {
    async fn fetch_reports(&self, geocode: &str, window: &SyncWindow) -> FetchOutcome {
        self.fetch_alertcity(geocode, window).await
    }
}
