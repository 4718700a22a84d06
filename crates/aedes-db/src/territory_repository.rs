use aedes_core::error::AppError;
use aedes_core::models::Territory;
use aedes_core::traits::TerritoryDirectory;
use sqlx::{PgPool, Pool, Postgres, QueryBuilder};
use tracing::debug;

/// Rows per seeding statement (3 bind parameters each).
const INSERT_CHUNK_ROWS: usize = 1000;

/// Repository for the territory reference table.
///
/// The sync engine only reads geocodes. Seeding goes through
/// [`insert_many`](Self::insert_many).
#[derive(Clone)]
pub struct TerritoryRepository {
    pool: Pool<Postgres>,
}

impl TerritoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Lists every territory geocode, sorted.
    pub async fn list_geocodes(&self) -> Result<Vec<String>, AppError> {
        let geocodes: Vec<String> =
            sqlx::query_scalar("SELECT geocode FROM territories ORDER BY geocode")
                .fetch_all(&self.pool)
                .await
                .map_err(AppError::DatabaseError)?;

        Ok(geocodes)
    }

    /// Retrieves a territory by geocode.
    pub async fn get(&self, geocode: &str) -> Result<Option<Territory>, AppError> {
        let territory = sqlx::query_as::<_, Territory>(
            "SELECT geocode, name, state_code FROM territories WHERE geocode = $1",
        )
        .bind(geocode)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(territory)
    }

    pub async fn count(&self) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM territories")
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;
        Ok(count)
    }

    /// Inserts territories, skipping geocodes that already exist.
    ///
    /// Large inputs are written in chunks inside one transaction, so either
    /// every new territory lands or none does.
    ///
    /// Returns the number of newly inserted rows.
    pub async fn insert_many(&self, territories: &[Territory]) -> Result<u64, AppError> {
        if territories.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(AppError::DatabaseError)?;
        let mut inserted = 0;
        for chunk in territories.chunks(INSERT_CHUNK_ROWS) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO territories (geocode, name, state_code) ");
            builder.push_values(chunk, |mut b, territory| {
                b.push_bind(territory.geocode.clone())
                    .push_bind(territory.name.clone())
                    .push_bind(territory.state_code);
            });
            builder.push(" ON CONFLICT (geocode) DO NOTHING");

            let result = builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(AppError::DatabaseError)?;
            inserted += result.rows_affected();
        }
        tx.commit().await.map_err(AppError::DatabaseError)?;

        debug!(
            submitted = territories.len(),
            inserted,
            "Territories seeded"
        );
        Ok(inserted)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl TerritoryDirectory for TerritoryRepository {
    async fn list_geocodes(&self) -> Result<Vec<String>, AppError> {
        TerritoryRepository::list_geocodes(self).await
    }
}
