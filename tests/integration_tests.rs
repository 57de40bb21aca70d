// Integration tests for the trade matcher

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use trade_matcher::core::{Matcher, PricingError, PricingOracle, PricingResolver};
use trade_matcher::engine::{EngineError, MatchEngine};
use trade_matcher::models::{
    Card, Condition, ListType, MatchOptions, MatchRecord, MatchStatus, MatchThresholds, PriceSource, ScoringWeights,
    UserInventory, UserProfile,
};
use trade_matcher::services::{
    DisabledPricing, FixedPriceOracle, InMemoryInventory, InMemoryMatchStore, InventoryError, InventoryProvider,
    MatchStore, StoreError,
};

fn create_card(id: &str, owner: &str, name: &str, price: f64, list_type: ListType) -> Card {
    Card {
        id: id.to_string(),
        owner_id: owner.to_string(),
        name: name.to_string(),
        set_name: "Base Set".to_string(),
        card_number: None,
        rarity: None,
        condition: Condition::NearMint,
        quantity: 1,
        market_price: price,
        list_type,
    }
}

fn create_user(user_id: &str, trade: (&str, f64), want: &str) -> UserInventory {
    UserInventory {
        user_id: user_id.to_string(),
        profile: Some(UserProfile::new(user_id)),
        cards: vec![
            create_card(&format!("{}_trade", user_id), user_id, trade.0, trade.1, ListType::Trade),
            create_card(&format!("{}_want", user_id), user_id, want, 0.0, ListType::Want),
        ],
    }
}

/// Alice trades Pikachu ($20) for Charizard; Bob trades Charizard ($25) for Pikachu
fn exact_match_users() -> Vec<UserInventory> {
    vec![
        create_user("alice", ("Pikachu", 20.0), "Charizard"),
        create_user("bob", ("Charizard", 25.0), "Pikachu"),
    ]
}

fn create_matcher(oracle: Arc<dyn PricingOracle>) -> Matcher {
    Matcher::new(ScoringWeights::default(), PricingResolver::new(oracle, Duration::from_secs(1)))
}

fn create_engine(users: Vec<UserInventory>, store: Arc<dyn MatchStore>) -> MatchEngine {
    MatchEngine::new(
        Arc::new(InMemoryInventory::with_users(users)),
        store,
        create_matcher(Arc::new(DisabledPricing)),
        MatchThresholds::default(),
    )
}

#[tokio::test]
async fn test_exact_mutual_match() {
    let store = Arc::new(InMemoryMatchStore::new());
    let engine = create_engine(exact_match_users(), store.clone());

    let run = engine.generate_matches("alice", &MatchOptions::default()).await.unwrap();

    assert_eq!(run.matches.len(), 1);
    let m = &run.matches[0];
    assert_eq!(m.user1_id, "alice");
    assert_eq!(m.user2_id, "bob");
    assert_eq!(m.user1_card_id, "alice_trade");
    assert_eq!(m.user2_card_id, "bob_trade");
    assert_eq!(m.value_difference, 5.0);
    assert!(m.match_score >= 50.0);
    assert_eq!(m.status, MatchStatus::Pending);
    assert_eq!(m.pricing.source, PriceSource::Estimated);

    let stored = store.pending_matches_for_user("alice").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, m.id);
}

#[tokio::test]
async fn test_one_sided_interest_yields_nothing() {
    let users = vec![
        create_user("alice", ("Pikachu", 20.0), "Charizard"),
        create_user("bob", ("Charizard", 25.0), "Squirtle"),
    ];
    let engine = create_engine(users, Arc::new(InMemoryMatchStore::new()));

    let run = engine.generate_matches("alice", &MatchOptions::default()).await.unwrap();

    assert!(run.matches.is_empty());
    assert_eq!(run.candidates_evaluated, 0);
}

#[tokio::test]
async fn test_unknown_prices_score_neutral_value() {
    let users = vec![
        create_user("alice", ("Pikachu", 0.0), "Charizard"),
        create_user("bob", ("Charizard", 0.0), "Pikachu"),
    ];
    let engine = create_engine(users, Arc::new(InMemoryMatchStore::new()));

    let run = engine.generate_matches("alice", &MatchOptions::default()).await.unwrap();

    assert_eq!(run.matches.len(), 1);
    let m = &run.matches[0];
    assert_eq!(m.score.value, 50.0);
    assert_eq!(m.value_difference, 0.0);
    assert!(m.match_score >= MatchThresholds::DEFAULT_MIN_MATCH_SCORE);
}

#[tokio::test]
async fn test_max_value_difference_filter() {
    let engine = create_engine(exact_match_users(), Arc::new(InMemoryMatchStore::new()));
    let options = MatchOptions {
        max_value_difference: Some(1.0),
        ..Default::default()
    };

    let run = engine.generate_matches("alice", &options).await.unwrap();

    assert!(run.matches.is_empty());
}

#[tokio::test]
async fn test_min_match_score_filter() {
    let engine = create_engine(exact_match_users(), Arc::new(InMemoryMatchStore::new()));
    let options = MatchOptions {
        min_match_score: Some(100.0),
        ..Default::default()
    };

    let run = engine.generate_matches("alice", &options).await.unwrap();

    assert!(run.matches.is_empty());
}

#[tokio::test]
async fn test_live_prices_are_used_when_both_known() {
    let oracle = FixedPriceOracle::new()
        .with_price("Pikachu", 300.0)
        .with_price("Charizard", 310.0);
    let engine = MatchEngine::new(
        Arc::new(InMemoryInventory::with_users(exact_match_users())),
        Arc::new(InMemoryMatchStore::new()),
        create_matcher(Arc::new(oracle)),
        MatchThresholds::default(),
    );

    let run = engine.generate_matches("alice", &MatchOptions::default()).await.unwrap();

    assert_eq!(run.matches.len(), 1);
    assert_eq!(run.matches[0].pricing.source, PriceSource::Live);
    assert_eq!(run.matches[0].value_difference, 10.0);
}

#[tokio::test]
async fn test_discovery_is_idempotent() {
    let mut users = exact_match_users();
    users.push(create_user("carol", ("Charizard", 60.0), "Pikachu"));
    users.push(create_user("dave", ("Charizard EX", 22.0), "Pikachu"));
    let store = Arc::new(InMemoryMatchStore::new());
    let engine = create_engine(users, store.clone());

    let first = engine.generate_matches("alice", &MatchOptions::default()).await.unwrap();
    let second = engine.generate_matches("alice", &MatchOptions::default()).await.unwrap();

    let summary = |run: &trade_matcher::engine::MatchRun| {
        run.matches
            .iter()
            .map(|m| (m.user2_id.clone(), m.user1_card_id.clone(), m.user2_card_id.clone(), m.match_score))
            .collect::<Vec<_>>()
    };
    assert_eq!(first.matches.len(), 3);
    assert_eq!(summary(&first), summary(&second));

    // The second run superseded the first one's rows
    assert_eq!(store.all().await.len(), 3);
}

#[tokio::test]
async fn test_rerun_leaves_other_users_matches() {
    let store = Arc::new(InMemoryMatchStore::new());
    let engine = create_engine(exact_match_users(), store.clone());

    engine.generate_matches("bob", &MatchOptions::default()).await.unwrap();
    let alice_run = engine.generate_matches("alice", &MatchOptions::default()).await.unwrap();
    let accepted = alice_run.matches[0].id;
    store.update_status(accepted, MatchStatus::Accepted).await.unwrap();
    engine.generate_matches("alice", &MatchOptions::default()).await.unwrap();

    assert_eq!(store.pending_matches_for_user("bob").await.unwrap().len(), 1);
    assert_eq!(store.pending_matches_for_user("alice").await.unwrap().len(), 1);
    assert!(store.all().await.iter().any(|r| r.id == accepted && r.status == MatchStatus::Accepted));
}

struct FailingStore;

#[async_trait]
impl MatchStore for FailingStore {
    async fn delete_pending_matches_for_user(&self, _user_id: &str) -> Result<u64, StoreError> {
        Err(StoreError::Unavailable("database is down".to_string()))
    }

    async fn insert_matches(&self, _matches: &[MatchRecord]) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database is down".to_string()))
    }

    async fn pending_matches_for_user(&self, _user_id: &str) -> Result<Vec<MatchRecord>, StoreError> {
        Err(StoreError::Unavailable("database is down".to_string()))
    }

    async fn update_status(&self, match_id: Uuid, _status: MatchStatus) -> Result<MatchRecord, StoreError> {
        Err(StoreError::NotFound(match_id))
    }

    fn store_name(&self) -> &'static str {
        "failing"
    }
}

#[tokio::test]
async fn test_persistence_failure_returns_matches() {
    let engine = create_engine(exact_match_users(), Arc::new(FailingStore));

    let err = engine.generate_matches("alice", &MatchOptions::default()).await.unwrap_err();

    match err {
        EngineError::Persistence { source, run } => {
            assert!(matches!(source, StoreError::Unavailable(_)));
            assert_eq!(run.matches.len(), 1);
            assert_eq!(run.matches[0].value_difference, 5.0);
            assert_eq!(run.candidates_evaluated, 1);
            assert!(!run.timed_out);
        }
        other => panic!("expected a persistence error, got {}", other),
    }
}

struct UnreachableInventory;

#[async_trait]
impl InventoryProvider for UnreachableInventory {
    async fn user_profile(&self, _user_id: &str) -> Result<Option<UserProfile>, InventoryError> {
        Ok(None)
    }

    async fn user_cards(&self, user_id: &str) -> Result<Vec<Card>, InventoryError> {
        Ok(create_user(user_id, ("Pikachu", 20.0), "Charizard").cards)
    }

    async fn other_users_with_cards(&self, _excluding_user_id: &str) -> Result<Vec<UserInventory>, InventoryError> {
        Err(InventoryError::Unavailable("connection refused".to_string()))
    }
}

#[tokio::test]
async fn test_inventory_failure_leaves_store_untouched() {
    let store = Arc::new(InMemoryMatchStore::new());
    create_engine(exact_match_users(), store.clone())
        .generate_matches("alice", &MatchOptions::default())
        .await
        .unwrap();

    let engine = MatchEngine::new(
        Arc::new(UnreachableInventory),
        store.clone(),
        create_matcher(Arc::new(DisabledPricing)),
        MatchThresholds::default(),
    );
    let err = engine.generate_matches("alice", &MatchOptions::default()).await.unwrap_err();

    assert!(matches!(err, EngineError::Inventory(_)));
    assert_eq!(store.pending_matches_for_user("alice").await.unwrap().len(), 1);
}

struct SlowOracle;

#[async_trait]
impl PricingOracle for SlowOracle {
    async fn live_price(&self, _card: &Card) -> Result<Option<f64>, PricingError> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(Some(10.0))
    }

    fn oracle_name(&self) -> &'static str {
        "slow"
    }
}

#[tokio::test]
async fn test_run_timeout_reports_partial_results() {
    let matcher = create_matcher(Arc::new(SlowOracle)).with_run_timeout(Duration::from_millis(50));
    let engine = MatchEngine::new(
        Arc::new(InMemoryInventory::with_users(exact_match_users())),
        Arc::new(InMemoryMatchStore::new()),
        matcher,
        MatchThresholds::default(),
    );

    let run = engine.generate_matches("alice", &MatchOptions::default()).await.unwrap();

    assert!(run.timed_out);
    assert!(run.matches.is_empty());
}

#[tokio::test]
async fn test_lookup_timeout_falls_back_to_estimates() {
    let matcher = Matcher::new(
        ScoringWeights::default(),
        PricingResolver::new(Arc::new(SlowOracle), Duration::from_millis(20)),
    );
    let engine = MatchEngine::new(
        Arc::new(InMemoryInventory::with_users(exact_match_users())),
        Arc::new(InMemoryMatchStore::new()),
        matcher,
        MatchThresholds::default(),
    );

    let run = engine.generate_matches("alice", &MatchOptions::default()).await.unwrap();

    assert!(!run.timed_out);
    assert_eq!(run.matches.len(), 1);
    assert_eq!(run.matches[0].pricing.source, PriceSource::Estimated);
    assert_eq!(run.matches[0].value_difference, 5.0);
}

/// Store using the two-step replace, recording how many replaces overlap
#[derive(Default)]
struct OverlapTrackingStore {
    inner: InMemoryMatchStore,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[async_trait]
impl MatchStore for OverlapTrackingStore {
    async fn delete_pending_matches_for_user(&self, user_id: &str) -> Result<u64, StoreError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.inner.delete_pending_matches_for_user(user_id).await
    }

    async fn insert_matches(&self, matches: &[MatchRecord]) -> Result<(), StoreError> {
        let result = self.inner.insert_matches(matches).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn pending_matches_for_user(&self, user_id: &str) -> Result<Vec<MatchRecord>, StoreError> {
        self.inner.pending_matches_for_user(user_id).await
    }

    async fn update_status(&self, match_id: Uuid, status: MatchStatus) -> Result<MatchRecord, StoreError> {
        self.inner.update_status(match_id, status).await
    }

    fn store_name(&self) -> &'static str {
        "tracking"
    }
}

#[tokio::test]
async fn test_concurrent_runs_for_one_user_are_serialized() {
    let store = Arc::new(OverlapTrackingStore::default());
    let engine = create_engine(exact_match_users(), store.clone());
    let options = MatchOptions::default();

    let (first, second) = tokio::join!(
        engine.generate_matches("alice", &options),
        engine.generate_matches("alice", &options)
    );
    first.unwrap();
    second.unwrap();

    assert_eq!(store.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(store.pending_matches_for_user("alice").await.unwrap().len(), 1);
}

#[test]
fn test_generate_from_blocking_caller() {
    let engine = create_engine(exact_match_users(), Arc::new(InMemoryMatchStore::new()));

    let run = tokio_test::block_on(engine.generate_matches("bob", &MatchOptions::default())).unwrap();

    assert_eq!(run.matches.len(), 1);
    assert_eq!(run.matches[0].user2_id, "alice");
}
