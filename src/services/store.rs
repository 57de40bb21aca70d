use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{MatchRecord, MatchStatus};
use crate::services::postgres::PostgresError;

/// Errors that can occur when reading or writing stored matches
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Match not found: {0}")]
    NotFound(Uuid),

    #[error("Cannot move match {id} from {from} to {to}")]
    InvalidTransition {
        id: Uuid,
        from: &'static str,
        to: &'static str,
    },

    #[error("Match store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Postgres(#[from] PostgresError),
}

/// Persistent home of discovered matches
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Delete pending matches initiated by `user_id`; returns how many were removed
    async fn delete_pending_matches_for_user(&self, user_id: &str) -> Result<u64, StoreError>;

    /// Insert new match rows
    async fn insert_matches(&self, matches: &[MatchRecord]) -> Result<(), StoreError>;

    /// Pending matches initiated by `user_id`, best first
    async fn pending_matches_for_user(&self, user_id: &str) -> Result<Vec<MatchRecord>, StoreError>;

    /// Advance a match through its lifecycle
    async fn update_status(&self, match_id: Uuid, status: MatchStatus) -> Result<MatchRecord, StoreError>;

    /// Replace a user's pending matches with a new set
    ///
    /// Stale rows are deleted even when `matches` is empty. This default runs
    /// delete and insert as two steps, so a reader can briefly see no pending
    /// matches; stores with transactions override it.
    async fn replace_pending_matches(&self, user_id: &str, matches: &[MatchRecord]) -> Result<(), StoreError> {
        self.delete_pending_matches_for_user(user_id).await?;
        if !matches.is_empty() {
            self.insert_matches(matches).await?;
        }
        Ok(())
    }

    /// Whether the store can currently serve requests
    async fn health_check(&self) -> Result<bool, StoreError> {
        Ok(true)
    }

    /// Name for logging
    fn store_name(&self) -> &'static str;
}

/// Match store held in process memory
#[derive(Debug, Default)]
pub struct InMemoryMatchStore {
    rows: Mutex<Vec<MatchRecord>>,
}

impl InMemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored row, in insertion order
    pub async fn all(&self) -> Vec<MatchRecord> {
        self.rows.lock().await.clone()
    }
}

fn by_score_desc(rows: &mut [MatchRecord]) {
    rows.sort_by(|a, b| {
        b.match_score
            .partial_cmp(&a.match_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.mutual_benefit_score
                    .partial_cmp(&a.mutual_benefit_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    });
}

#[async_trait]
impl MatchStore for InMemoryMatchStore {
    async fn delete_pending_matches_for_user(&self, user_id: &str) -> Result<u64, StoreError> {
        let mut rows = self.rows.lock().await;
        let before = rows.len();
        rows.retain(|r| !(r.user1_id == user_id && r.status == MatchStatus::Pending));
        Ok((before - rows.len()) as u64)
    }

    async fn insert_matches(&self, matches: &[MatchRecord]) -> Result<(), StoreError> {
        self.rows.lock().await.extend_from_slice(matches);
        Ok(())
    }

    async fn pending_matches_for_user(&self, user_id: &str) -> Result<Vec<MatchRecord>, StoreError> {
        let mut pending: Vec<MatchRecord> = self
            .rows
            .lock()
            .await
            .iter()
            .filter(|r| r.user1_id == user_id && r.status == MatchStatus::Pending)
            .cloned()
            .collect();
        by_score_desc(&mut pending);
        Ok(pending)
    }

    async fn update_status(&self, match_id: Uuid, status: MatchStatus) -> Result<MatchRecord, StoreError> {
        let mut rows = self.rows.lock().await;
        let row = rows
            .iter_mut()
            .find(|r| r.id == match_id)
            .ok_or(StoreError::NotFound(match_id))?;

        if !row.status.can_advance_to(status) {
            return Err(StoreError::InvalidTransition {
                id: match_id,
                from: row.status.as_str(),
                to: status.as_str(),
            });
        }

        row.status = status;
        Ok(row.clone())
    }

    /// Delete and insert under one lock, so readers never see the gap
    async fn replace_pending_matches(&self, user_id: &str, matches: &[MatchRecord]) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().await;
        rows.retain(|r| !(r.user1_id == user_id && r.status == MatchStatus::Pending));
        rows.extend_from_slice(matches);
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}
