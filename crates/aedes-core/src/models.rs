//! Domain models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A municipality known to the store.
///
/// Territories are seeded externally; the engine only reads their geocodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Territory {
    /// 7-digit IBGE code.
    pub geocode: String,
    pub name: String,
    pub state_code: i32,
}

/// Canonical weekly report row, ready to be upserted.
///
/// `(geocode, se)` is the natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWeeklyReport {
    pub geocode: String,
    /// Epidemiological week encoded as `YYYYWW`.
    pub se: i32,
    pub period_start_date: NaiveDate,
    pub reported_cases: Option<i32>,
    pub estimated_cases: Option<f64>,
    pub estimated_cases_min: Option<i32>,
    pub estimated_cases_max: Option<i32>,
    /// 1 (green) to 4 (red).
    pub alert_level: Option<i32>,
    pub population: Option<f64>,
    pub reproduction_number: Option<f64>,
}

impl NewWeeklyReport {
    /// Natural key of the row.
    pub fn key(&self) -> (&str, i32) {
        (&self.geocode, self.se)
    }
}

/// Stored weekly report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WeeklyReport {
    pub id: i32,
    pub geocode: String,
    pub se: i32,
    #[sqlx(rename = "data_ini_se")]
    pub period_start_date: NaiveDate,
    pub reported_cases: Option<i32>,
    pub estimated_cases: Option<f64>,
    pub estimated_cases_min: Option<i32>,
    pub estimated_cases_max: Option<i32>,
    pub alert_level: Option<i32>,
    pub population: Option<f64>,
    #[sqlx(rename = "rt_value")]
    pub reproduction_number: Option<f64>,
    pub last_synced_at: DateTime<Utc>,
}

/// Default page size of a report listing.
pub const DEFAULT_REPORT_LIMIT: i64 = 100;

/// Filters for listing stored reports.
///
/// Unset fields do not constrain the listing. Results are ordered by week,
/// newest first, then by geocode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFilter {
    pub geocode: Option<String>,
    /// Restricts to territories of one state (IBGE state code).
    pub state_code: Option<i32>,
    /// Exact epidemiological week (`YYYYWW`).
    pub se: Option<i32>,
    /// Inclusive lower bound on the week.
    pub se_start: Option<i32>,
    /// Inclusive upper bound on the week.
    pub se_end: Option<i32>,
    pub offset: i64,
    pub limit: i64,
}

impl Default for ReportFilter {
    fn default() -> Self {
        Self {
            geocode: None,
            state_code: None,
            se: None,
            se_start: None,
            se_end: None,
            offset: 0,
            limit: DEFAULT_REPORT_LIMIT,
        }
    }
}

impl ReportFilter {
    pub fn for_geocode(geocode: impl Into<String>) -> Self {
        Self {
            geocode: Some(geocode.into()),
            ..Default::default()
        }
    }

    pub fn with_state_code(mut self, state_code: i32) -> Self {
        self.state_code = Some(state_code);
        self
    }

    pub fn with_week(mut self, se: i32) -> Self {
        self.se = Some(se);
        self
    }

    /// Inclusive week range.
    pub fn with_week_range(mut self, se_start: Option<i32>, se_end: Option<i32>) -> Self {
        self.se_start = se_start;
        self.se_end = se_end;
        self
    }

    /// Page bounds. Negative values are clamped to zero.
    pub fn with_page(mut self, offset: i64, limit: i64) -> Self {
        self.offset = offset.max(0);
        self.limit = limit.max(0);
        self
    }
}

/// Per-state totals for one epidemiological week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StateAggregation {
    pub state_code: i32,
    /// Sum of reported cases; missing values count as zero.
    pub total_cases: i64,
    /// Mean alert level over reports that carry one.
    pub avg_alert_level: f64,
    pub total_population: f64,
    pub report_count: i64,
}
