//! Municipality list used to seed the territories table.
//!
//! The source is the `municipios.csv` file of the `kelvins/municipios-brasileiros`
//! dataset. Only three columns are read:
//!
//! | Column | Field |
//! |---|---|
//! | `codigo_ibge` | `geocode` |
//! | `nome` | `name` |
//! | `codigo_uf` | `state_code` |

use std::collections::HashSet;
use std::time::Duration;

use aedes_core::HttpConfig;
use aedes_core::error::AppError;
use aedes_core::models::Territory;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_MUNICIPALITIES_URL: &str =
    "https://raw.githubusercontent.com/kelvins/municipios-brasileiros/main/csv/municipios.csv";

#[derive(Debug, Deserialize)]
struct MunicipalityRow {
    codigo_ibge: i64,
    nome: String,
    codigo_uf: i32,
}

/// Parses the municipality CSV into territories.
///
/// Extra columns are ignored. Duplicate geocodes keep their first
/// occurrence. Codes that are not 7 digits are skipped with a warning.
///
/// # Errors
///
/// Returns `AppError::InvalidRecord` if a required column is missing or a
/// row cannot be decoded.
pub fn parse_municipalities_csv(data: &[u8]) -> Result<Vec<Territory>, AppError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(data);

    let mut seen = HashSet::new();
    let mut territories = Vec::new();
    for row in reader.deserialize::<MunicipalityRow>() {
        let row = row.map_err(|e| AppError::InvalidRecord(format!("municipality CSV: {}", e)))?;

        let geocode = row.codigo_ibge.to_string();
        if row.codigo_ibge < 0 || geocode.len() != 7 {
            warn!(
                geocode = %geocode,
                name = %row.nome,
                "Skipping municipality with invalid IBGE code"
            );
            continue;
        }
        if !seen.insert(geocode.clone()) {
            continue;
        }
        territories.push(Territory {
            geocode,
            name: row.nome,
            state_code: row.codigo_uf,
        });
    }

    Ok(territories)
}

/// Downloads the municipality list over HTTP.
#[derive(Clone)]
pub struct MunicipalitySource {
    client: Client,
    url: Url,
    timeout: Duration,
}

impl MunicipalitySource {
    /// # Errors
    ///
    /// Returns `AppError::InvalidUrl` if `url` is malformed.
    /// Returns `AppError::ClientError` if the HTTP client cannot be built.
    pub fn new(url: &str, config: &HttpConfig) -> Result<Self, AppError> {
        let url = Url::parse(url).map_err(|e| AppError::InvalidUrl(format!("{}: {}", url, e)))?;
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::ClientError(e.to_string()))?;

        Ok(Self {
            client,
            url,
            timeout: config.timeout,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Fetches and parses the list.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ClientError` on a non-success status,
    /// `AppError::Timeout` or `AppError::NetworkError` on transport
    /// failures, and `AppError::InvalidRecord` on a malformed file.
    pub async fn fetch(&self) -> Result<Vec<Territory>, AppError> {
        let resp = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::ClientError(format!(
                "municipality list returned HTTP {}",
                status.as_u16()
            )));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| self.map_transport_error(e))?;
        debug!(bytes = body.len(), url = %self.url, "Municipality list downloaded");

        parse_municipalities_csv(&body)
    }

    fn map_transport_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(self.timeout)
        } else {
            AppError::NetworkError(e.to_string())
        }
    }
}
