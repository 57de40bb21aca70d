use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{MatchRecord, MatchStatus};
use crate::services::store::{MatchStore, StoreError};

/// Errors that can occur when interacting with PostgreSQL
#[derive(Debug, Error)]
pub enum PostgresError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid stored value: {0}")]
    InvalidValue(String),
}

/// Match status as stored in the `match_status` enum column
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "match_status", rename_all = "lowercase")]
pub enum DbMatchStatus {
    Pending,
    Accepted,
    Declined,
    Completed,
}

impl From<MatchStatus> for DbMatchStatus {
    fn from(value: MatchStatus) -> Self {
        match value {
            MatchStatus::Pending => DbMatchStatus::Pending,
            MatchStatus::Accepted => DbMatchStatus::Accepted,
            MatchStatus::Declined => DbMatchStatus::Declined,
            MatchStatus::Completed => DbMatchStatus::Completed,
        }
    }
}

impl From<DbMatchStatus> for MatchStatus {
    fn from(value: DbMatchStatus) -> Self {
        match value {
            DbMatchStatus::Pending => MatchStatus::Pending,
            DbMatchStatus::Accepted => MatchStatus::Accepted,
            DbMatchStatus::Declined => MatchStatus::Declined,
            DbMatchStatus::Completed => MatchStatus::Completed,
        }
    }
}

const MATCH_COLUMNS: &str = "id, user1_id, user2_id, user1_card_id, user2_card_id, match_score, \
    value_difference, mutual_benefit_score, confidence, price_source, status, created_at";

/// PostgreSQL match store
///
/// Replacing a user's pending matches runs delete and insert inside one
/// transaction, so readers see either the old set or the new one.
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Create a new PostgreSQL client from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, PostgresError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        // Run migrations on startup
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a new PostgreSQL client from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
        acquire_timeout_secs: Option<u64>,
        idle_timeout_secs: Option<u64>,
    ) -> Result<Self, PostgresError> {
        tracing::info!("Connecting to PostgreSQL");

        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
            Duration::from_secs(acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(idle_timeout_secs.unwrap_or(600)),
        )
        .await
    }

    fn insert_builder(matches: &[MatchRecord]) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new(format!("INSERT INTO trade_matches ({}) ", MATCH_COLUMNS));
        builder.push_values(matches, |mut row, m| {
            row.push_bind(m.id)
                .push_bind(m.user1_id.clone())
                .push_bind(m.user2_id.clone())
                .push_bind(m.user1_card_id.clone())
                .push_bind(m.user2_card_id.clone())
                .push_bind(m.match_score)
                .push_bind(m.value_difference)
                .push_bind(m.mutual_benefit_score)
                .push_bind(m.confidence.as_str())
                .push_bind(m.price_source.as_str())
                .push_bind(DbMatchStatus::from(m.status))
                .push_bind(m.created_at);
        });
        builder
    }
}

/// Map a `trade_matches` row
fn record_from_row(row: &PgRow) -> Result<MatchRecord, PostgresError> {
    let confidence: String = row.try_get("confidence")?;
    let price_source: String = row.try_get("price_source")?;
    let status: DbMatchStatus = row.try_get("status")?;

    Ok(MatchRecord {
        id: row.try_get("id")?,
        user1_id: row.try_get("user1_id")?,
        user2_id: row.try_get("user2_id")?,
        user1_card_id: row.try_get("user1_card_id")?,
        user2_card_id: row.try_get("user2_card_id")?,
        match_score: row.try_get("match_score")?,
        value_difference: row.try_get("value_difference")?,
        mutual_benefit_score: row.try_get("mutual_benefit_score")?,
        confidence: confidence.parse().map_err(PostgresError::InvalidValue)?,
        price_source: match price_source.as_str() {
            "live" => crate::models::PriceSource::Live,
            "estimated" => crate::models::PriceSource::Estimated,
            other => return Err(PostgresError::InvalidValue(format!("unknown price source: {}", other))),
        },
        status: status.into(),
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl MatchStore for PostgresClient {
    async fn delete_pending_matches_for_user(&self, user_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM trade_matches WHERE user1_id = $1 AND status = 'pending'")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(PostgresError::from)?;

        Ok(result.rows_affected())
    }

    async fn insert_matches(&self, matches: &[MatchRecord]) -> Result<(), StoreError> {
        if matches.is_empty() {
            return Ok(());
        }

        Self::insert_builder(matches)
            .build()
            .execute(&self.pool)
            .await
            .map_err(PostgresError::from)?;

        Ok(())
    }

    async fn pending_matches_for_user(&self, user_id: &str) -> Result<Vec<MatchRecord>, StoreError> {
        let query = format!(
            "SELECT {} FROM trade_matches WHERE user1_id = $1 AND status = 'pending' \
             ORDER BY match_score DESC, mutual_benefit_score DESC",
            MATCH_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(PostgresError::from)?;

        let records = rows
            .iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    async fn update_status(&self, match_id: Uuid, status: MatchStatus) -> Result<MatchRecord, StoreError> {
        let mut tx = self.pool.begin().await.map_err(PostgresError::from)?;

        let current: Option<DbMatchStatus> =
            sqlx::query_scalar("SELECT status FROM trade_matches WHERE id = $1 FOR UPDATE")
                .bind(match_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(PostgresError::from)?;

        let current = MatchStatus::from(current.ok_or(StoreError::NotFound(match_id))?);
        if !current.can_advance_to(status) {
            return Err(StoreError::InvalidTransition {
                id: match_id,
                from: current.as_str(),
                to: status.as_str(),
            });
        }

        let query = format!(
            "UPDATE trade_matches SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            MATCH_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(match_id)
            .bind(DbMatchStatus::from(status))
            .fetch_one(&mut *tx)
            .await
            .map_err(PostgresError::from)?;
        let record = record_from_row(&row)?;

        tx.commit().await.map_err(PostgresError::from)?;

        tracing::debug!("Match {} moved from {:?} to {:?}", match_id, current, status);
        Ok(record)
    }

    async fn replace_pending_matches(&self, user_id: &str, matches: &[MatchRecord]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(PostgresError::from)?;

        let deleted = sqlx::query("DELETE FROM trade_matches WHERE user1_id = $1 AND status = 'pending'")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(PostgresError::from)?;

        if !matches.is_empty() {
            Self::insert_builder(matches)
                .build()
                .execute(&mut *tx)
                .await
                .map_err(PostgresError::from)?;
        }

        tx.commit().await.map_err(PostgresError::from)?;

        tracing::info!(
            "Replaced {} pending matches with {} for user {}",
            deleted.rows_affected(),
            matches.len(),
            user_id
        );

        Ok(())
    }

    /// Health check for the database connection
    async fn health_check(&self) -> Result<bool, StoreError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(|e| StoreError::from(PostgresError::from(e)))
    }

    fn store_name(&self) -> &'static str {
        "postgres"
    }
}
