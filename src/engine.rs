use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::core::{MatchResult, Matcher};
use crate::models::{MatchOptions, MatchRecord, MatchThresholds, TradeMatch};
use crate::services::inventory::{InventoryError, InventoryProvider};
use crate::services::store::{MatchStore, StoreError};

/// Errors returned by a discovery run
///
/// An `Ok` run with no matches is the "nothing found" outcome; these variants
/// are the "matching failed" outcomes.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to load inventories: {0}")]
    Inventory(#[from] InventoryError),

    /// The run finished but its matches could not be stored; it is handed
    /// back so the caller can retry persistence without recomputing.
    #[error("Failed to persist {} matches: {source}", .run.matches.len())]
    Persistence {
        #[source]
        source: StoreError,
        run: MatchRun,
    },
}

/// Outcome of one discovery run
#[derive(Debug, Default)]
pub struct MatchRun {
    pub matches: Vec<TradeMatch>,
    pub candidates_evaluated: usize,
    pub counterparties_skipped: usize,
    pub timed_out: bool,
}

impl From<MatchResult> for MatchRun {
    fn from(result: MatchResult) -> Self {
        Self {
            matches: result.matches,
            candidates_evaluated: result.total_candidates,
            counterparties_skipped: result.counterparties_skipped,
            timed_out: result.timed_out,
        }
    }
}

/// Discovery entry point: load, match, persist
///
/// Runs for the same user are serialised so their delete and insert never
/// interleave; runs for different users proceed in parallel.
pub struct MatchEngine {
    inventory: Arc<dyn InventoryProvider>,
    store: Arc<dyn MatchStore>,
    matcher: Matcher,
    defaults: MatchThresholds,
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl MatchEngine {
    pub fn new(
        inventory: Arc<dyn InventoryProvider>,
        store: Arc<dyn MatchStore>,
        matcher: Matcher,
        defaults: MatchThresholds,
    ) -> Self {
        Self {
            inventory,
            store,
            matcher,
            defaults,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn MatchStore> {
        &self.store
    }

    async fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().await;
        // Drop locks no run is holding or waiting on
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Discover, rank and store trade matches for `user_id`
    ///
    /// The user's previous pending matches are replaced by the new set, even
    /// when it is empty. Inventory failures abort before the store is touched.
    pub async fn generate_matches(&self, user_id: &str, options: &MatchOptions) -> Result<MatchRun, EngineError> {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        let thresholds = self.defaults.with_options(options);

        let me = self.inventory.user_inventory(user_id).await?;
        let run = if me.is_tradeable() {
            let counterparties = self.inventory.other_users_with_cards(user_id).await?;
            tracing::debug!("Loaded {} counterparties for {}", counterparties.len(), user_id);

            MatchRun::from(self.matcher.find_matches(&me, &counterparties, &thresholds).await)
        } else {
            tracing::debug!("User {} has nothing to trade or nothing wanted", user_id);
            MatchRun::default()
        };

        let records: Vec<MatchRecord> = run.matches.iter().map(TradeMatch::to_record).collect();
        if let Err(source) = self.store.replace_pending_matches(user_id, &records).await {
            tracing::error!(
                "Failed to store {} matches for {} in {}: {}",
                records.len(),
                user_id,
                self.store.store_name(),
                source
            );
            return Err(EngineError::Persistence { source, run });
        }

        tracing::info!(
            "Generated {} matches for {} ({} candidates, {} counterparties skipped{})",
            run.matches.len(),
            user_id,
            run.candidates_evaluated,
            run.counterparties_skipped,
            if run.timed_out { ", timed out" } else { "" }
        );

        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PricingResolver;
    use crate::models::{Card, Condition, ListType, ScoringWeights, UserInventory};
    use crate::services::{DisabledPricing, InMemoryInventory, InMemoryMatchStore};
    use std::time::Duration;

    fn card(id: &str, owner: &str, name: &str, price: f64, list_type: ListType) -> Card {
        Card {
            id: id.to_string(),
            owner_id: owner.to_string(),
            name: name.to_string(),
            set_name: String::new(),
            card_number: None,
            rarity: None,
            condition: Condition::NearMint,
            quantity: 1,
            market_price: price,
            list_type,
        }
    }

    fn engine(users: Vec<UserInventory>, store: Arc<InMemoryMatchStore>) -> MatchEngine {
        let matcher = Matcher::new(
            ScoringWeights::default(),
            PricingResolver::new(Arc::new(DisabledPricing), Duration::from_secs(1)),
        );
        MatchEngine::new(
            Arc::new(InMemoryInventory::with_users(users)),
            store,
            matcher,
            MatchThresholds::default(),
        )
    }

    #[tokio::test]
    async fn test_user_without_wants_clears_stale_matches() {
        let store = Arc::new(InMemoryMatchStore::new());
        let alice = UserInventory {
            user_id: "alice".to_string(),
            profile: None,
            cards: vec![card("a1", "alice", "Pikachu", 20.0, ListType::Trade)],
        };
        let stale = MatchRecord {
            id: uuid::Uuid::new_v4(),
            user1_id: "alice".to_string(),
            user2_id: "bob".to_string(),
            user1_card_id: "a1".to_string(),
            user2_card_id: "b1".to_string(),
            match_score: 70.0,
            value_difference: 5.0,
            mutual_benefit_score: 80.0,
            confidence: crate::models::Confidence::High,
            price_source: crate::models::PriceSource::Estimated,
            status: crate::models::MatchStatus::Pending,
            created_at: chrono::Utc::now(),
        };
        store.insert_matches(&[stale]).await.unwrap();
        let engine = engine(vec![alice], store.clone());

        let run = engine.generate_matches("alice", &MatchOptions::default()).await.unwrap();

        assert!(run.matches.is_empty());
        assert!(store.pending_matches_for_user("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_user_locks_are_pruned() {
        let engine = engine(Vec::new(), Arc::new(InMemoryMatchStore::new()));

        engine.generate_matches("alice", &MatchOptions::default()).await.unwrap();
        engine.generate_matches("bob", &MatchOptions::default()).await.unwrap();

        // Only the lock of the latest caller survives between runs
        assert!(engine.user_locks.lock().await.len() <= 1);
    }
}
