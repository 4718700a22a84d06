//! Weekly report repository.
//!
//! The batch upsert is the only write path. It is a single multi-row
//! `INSERT .. ON CONFLICT (geocode, se) DO UPDATE .. WHERE ..` statement:
//!
//! - new keys are inserted and stamped with `NOW()`
//! - existing keys are rewritten only when `reported_cases`,
//!   `estimated_cases` or `alert_level` differ (null-safe)
//! - unchanged keys are left untouched and not returned
//!
//! `RETURNING (xmax = 0)` is true for freshly inserted tuples and false for
//! tuples rewritten by the conflict branch, which gives the insert/update
//! split straight from the statement outcome.

use aedes_core::MAX_BATCH_SIZE;
use aedes_core::error::AppError;
use aedes_core::models::{NewWeeklyReport, ReportFilter, StateAggregation, WeeklyReport};
use aedes_core::sync::UpsertCounts;
use aedes_core::traits::ReportStore;
use sqlx::{PgPool, Pool, Postgres, QueryBuilder};
use tracing::debug;

/// Column list for SELECT queries.
const REPORT_COLUMNS: &str = "id, geocode, se, data_ini_se, reported_cases, estimated_cases, estimated_cases_min, estimated_cases_max, alert_level, population, rt_value, last_synced_at";

const UPSERT_INSERT: &str = "INSERT INTO weekly_reports (geocode, se, data_ini_se, reported_cases, estimated_cases, estimated_cases_min, estimated_cases_max, alert_level, population, rt_value) ";

const UPSERT_CONFLICT: &str = r#"
    ON CONFLICT (geocode, se)
    DO UPDATE SET
        data_ini_se = EXCLUDED.data_ini_se,
        reported_cases = EXCLUDED.reported_cases,
        estimated_cases = EXCLUDED.estimated_cases,
        estimated_cases_min = EXCLUDED.estimated_cases_min,
        estimated_cases_max = EXCLUDED.estimated_cases_max,
        alert_level = EXCLUDED.alert_level,
        population = EXCLUDED.population,
        rt_value = EXCLUDED.rt_value,
        last_synced_at = NOW()
    WHERE weekly_reports.reported_cases IS DISTINCT FROM EXCLUDED.reported_cases
       OR weekly_reports.estimated_cases IS DISTINCT FROM EXCLUDED.estimated_cases
       OR weekly_reports.alert_level IS DISTINCT FROM EXCLUDED.alert_level
    RETURNING (xmax = 0) AS inserted
"#;

const STATE_AGGREGATION: &str = r#"
    SELECT t.state_code,
           COALESCE(SUM(wr.reported_cases), 0)::BIGINT AS total_cases,
           COALESCE(AVG(wr.alert_level), 0)::FLOAT8 AS avg_alert_level,
           COALESCE(SUM(wr.population), 0)::FLOAT8 AS total_population,
           COUNT(wr.id) AS report_count
    FROM weekly_reports wr
    JOIN territories t ON t.geocode = wr.geocode
    WHERE wr.se = $1
    GROUP BY t.state_code
    ORDER BY t.state_code
"#;

/// Bind parameters per row. PostgreSQL caps a statement at 65535.
const PARAMS_PER_ROW: usize = 10;

/// Repository for weekly reports in PostgreSQL.
///
/// # Examples
///
/// ```no_run
/// use sqlx::postgres::PgPoolOptions;
/// use aedes_db::WeeklyReportRepository;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = PgPoolOptions::new()
///     .max_connections(5)
///     .connect("postgresql://localhost/aedes")
///     .await?;
///
/// let repo = WeeklyReportRepository::new(pool);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct WeeklyReportRepository {
    pool: Pool<Postgres>,
}

impl WeeklyReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upserts a batch of rows in one statement.
    ///
    /// Natural keys must be unique within `rows`; PostgreSQL rejects a
    /// statement that would update the same row twice.
    ///
    /// # Errors
    ///
    /// Returns `AppError::DatabaseError` on any statement failure (foreign
    /// key violation, duplicate key in batch, lost connection). Nothing from
    /// the batch is written in that case.
    pub async fn upsert_batch(&self, rows: &[NewWeeklyReport]) -> Result<UpsertCounts, AppError> {
        if rows.is_empty() {
            return Ok(UpsertCounts::default());
        }
        if rows.len() > MAX_BATCH_SIZE {
            return Err(AppError::Generic(format!(
                "batch of {} rows exceeds the {} rows a statement can bind",
                rows.len(),
                MAX_BATCH_SIZE
            )));
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(UPSERT_INSERT);
        builder.push_values(rows, |mut b, row| {
            b.push_bind(row.geocode.clone())
                .push_bind(row.se)
                .push_bind(row.period_start_date)
                .push_bind(row.reported_cases)
                .push_bind(row.estimated_cases)
                .push_bind(row.estimated_cases_min)
                .push_bind(row.estimated_cases_max)
                .push_bind(row.alert_level)
                .push_bind(row.population)
                .push_bind(row.reproduction_number);
        });
        builder.push(UPSERT_CONFLICT);

        let inserted_flags: Vec<bool> = builder
            .build_query_scalar()
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        let inserted = inserted_flags.iter().filter(|&&inserted| inserted).count();
        let counts = UpsertCounts::new(inserted, inserted_flags.len() - inserted);
        debug!(
            rows = rows.len(),
            inserted = counts.inserted,
            updated = counts.updated,
            "Batch upserted"
        );
        Ok(counts)
    }

    /// Retrieves a single report by natural key.
    pub async fn get(&self, geocode: &str, se: i32) -> Result<Option<WeeklyReport>, AppError> {
        let query = format!(
            "SELECT {} FROM weekly_reports WHERE geocode = $1 AND se = $2",
            REPORT_COLUMNS
        );
        let report = sqlx::query_as::<_, WeeklyReport>(&query)
            .bind(geocode)
            .bind(se)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        Ok(report)
    }

    /// Lists the most recent reports of a territory, newest week first.
    pub async fn list_for_territory(
        &self,
        geocode: &str,
        limit: i64,
    ) -> Result<Vec<WeeklyReport>, AppError> {
        let query = format!(
            "SELECT {} FROM weekly_reports WHERE geocode = $1 ORDER BY se DESC LIMIT $2",
            REPORT_COLUMNS
        );
        let reports = sqlx::query_as::<_, WeeklyReport>(&query)
            .bind(geocode)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        Ok(reports)
    }

    /// Lists reports matching `filter`, newest week first, then by geocode.
    pub async fn list(&self, filter: &ReportFilter) -> Result<Vec<WeeklyReport>, AppError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM weekly_reports WHERE TRUE",
            REPORT_COLUMNS
        ));
        if let Some(geocode) = &filter.geocode {
            builder.push(" AND geocode = ").push_bind(geocode.clone());
        }
        if let Some(state_code) = filter.state_code {
            builder
                .push(" AND geocode IN (SELECT geocode FROM territories WHERE state_code = ")
                .push_bind(state_code)
                .push(")");
        }
        if let Some(se) = filter.se {
            builder.push(" AND se = ").push_bind(se);
        }
        if let Some(se_start) = filter.se_start {
            builder.push(" AND se >= ").push_bind(se_start);
        }
        if let Some(se_end) = filter.se_end {
            builder.push(" AND se <= ").push_bind(se_end);
        }
        builder
            .push(" ORDER BY se DESC, geocode LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);

        let reports = builder
            .build_query_as::<WeeklyReport>()
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        Ok(reports)
    }

    /// Per-state totals for one week, ordered by state code.
    ///
    /// States without any report for `se` are absent from the result.
    pub async fn aggregate_by_state(&self, se: i32) -> Result<Vec<StateAggregation>, AppError> {
        let rows = sqlx::query_as::<_, StateAggregation>(STATE_AGGREGATION)
            .bind(se)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        Ok(rows)
    }

    /// Total number of stored reports.
    pub async fn count(&self) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM weekly_reports")
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;
        Ok(count)
    }

    /// Checks database connectivity.
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;
        Ok(())
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl ReportStore for WeeklyReportRepository {
    async fn upsert_batch(&self, rows: &[NewWeeklyReport]) -> Result<UpsertCounts, AppError> {
        WeeklyReportRepository::upsert_batch(self, rows).await
    }
}
