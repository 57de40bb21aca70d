use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use std::time::Duration;
use uuid::Uuid;

use crate::core::{
    filters::{mutual_candidate_pairs, passes_thresholds, validate_inventory},
    pricing::PricingResolver,
    scoring::{calculate_trade_score, confidence_tier, MutualInterest, PairContext},
};
use crate::models::{
    Card, MatchStatus, MatchThresholds, ScoringWeights, TradeMatch, UserInventory,
};

/// Live price lookups in flight at once during a run
pub const DEFAULT_LOOKUP_CONCURRENCY: usize = 8;

/// Each candidate pair prices both of its cards concurrently
const LOOKUPS_PER_PAIR: usize = 2;

/// Upper bound on the scoring phase of a run
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of the matching process
#[derive(Debug, Default)]
pub struct MatchResult {
    pub matches: Vec<TradeMatch>,
    /// Candidate pairs that passed the mutual-interest pre-filter
    pub total_candidates: usize,
    pub counterparties_scanned: usize,
    pub counterparties_skipped: usize,
    /// The run deadline expired and `matches` holds only the pairs scored before it
    pub timed_out: bool,
}

/// A trade card of mine against a trade card of theirs, wanted both ways
#[derive(Debug, Clone, Copy)]
struct CandidatePair<'a> {
    my_card: &'a Card,
    their_card: &'a Card,
    counterparty: &'a UserInventory,
}

/// Main discovery orchestrator
///
/// # Pipeline Stages
/// 1. Counterparty validation (malformed records are logged and skipped)
/// 2. Mutual-interest pre-filter on fuzzy card names
/// 3. Price resolution and factor scoring, with bounded lookup concurrency
/// 4. Threshold filtering, ranking and truncation
#[derive(Debug, Clone)]
pub struct Matcher {
    weights: ScoringWeights,
    pricing: PricingResolver,
    lookup_concurrency: usize,
    run_timeout: Duration,
}

impl Matcher {
    pub fn new(weights: ScoringWeights, pricing: PricingResolver) -> Self {
        Self {
            weights,
            pricing,
            lookup_concurrency: DEFAULT_LOOKUP_CONCURRENCY,
            run_timeout: DEFAULT_RUN_TIMEOUT,
        }
    }

    /// Cap on live lookups in flight; raised to two so one pair can still be priced
    pub fn with_lookup_concurrency(mut self, lookup_concurrency: usize) -> Self {
        self.lookup_concurrency = lookup_concurrency.max(LOOKUPS_PER_PAIR);
        self
    }

    pub fn with_run_timeout(mut self, run_timeout: Duration) -> Self {
        self.run_timeout = run_timeout;
        self
    }

    /// Find ranked trade matches for `me` among `counterparties`
    ///
    /// Empty own lists or no usable counterparties give an empty result, not
    /// an error. Output order is deterministic for identical inputs: score
    /// descending, then mutual benefit descending, then discovery order.
    pub async fn find_matches(
        &self,
        me: &UserInventory,
        counterparties: &[UserInventory],
        thresholds: &MatchThresholds,
    ) -> MatchResult {
        let mut result = MatchResult::default();

        if !me.is_tradeable() {
            tracing::debug!("User {} has no trade or no want cards, nothing to match", me.user_id);
            return result;
        }

        // Stages 1 & 2: validate counterparties and collect mutual pairs
        let mut pairs: Vec<CandidatePair<'_>> = Vec::new();
        for counterparty in counterparties {
            if counterparty.user_id == me.user_id || !counterparty.is_tradeable() {
                continue;
            }
            result.counterparties_scanned += 1;

            if let Err(e) = validate_inventory(counterparty) {
                tracing::warn!("Skipping counterparty {}: {}", counterparty.user_id, e);
                result.counterparties_skipped += 1;
                continue;
            }

            pairs.extend(
                mutual_candidate_pairs(me, counterparty, thresholds.similarity_threshold)
                    .into_iter()
                    .map(|(my_card, their_card)| CandidatePair {
                        my_card,
                        their_card,
                        counterparty,
                    }),
            );
        }

        result.total_candidates = pairs.len();
        if pairs.is_empty() {
            return result;
        }

        tracing::debug!(
            "Scoring {} candidate pairs for {} across {} counterparties",
            pairs.len(),
            me.user_id,
            result.counterparties_scanned
        );

        // Stage 3: resolve prices and score, order preserved
        let created_at = Utc::now();
        let evaluations = stream::iter(pairs)
            .map(|pair| self.evaluate_pair(pair, me, thresholds, created_at))
            .buffered(self.lookup_concurrency / LOOKUPS_PER_PAIR);
        let mut evaluations = std::pin::pin!(evaluations);

        let deadline = tokio::time::Instant::now() + self.run_timeout;
        loop {
            match tokio::time::timeout_at(deadline, evaluations.next()).await {
                Ok(Some(Some(trade_match))) => result.matches.push(trade_match),
                Ok(Some(None)) => {}
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(
                        "Discovery for {} hit the {:?} run timeout, keeping {} scored matches",
                        me.user_id,
                        self.run_timeout,
                        result.matches.len()
                    );
                    result.timed_out = true;
                    break;
                }
            }
        }

        // Stage 4: rank by score, then mutual benefit
        result.matches.sort_by(|a, b| {
            b.match_score
                .partial_cmp(&a.match_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    b.mutual_benefit_score
                        .partial_cmp(&a.mutual_benefit_score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });
        result.matches.truncate(thresholds.max_results);

        result
    }

    /// Price and score one pair; `None` when it fails a threshold
    async fn evaluate_pair(
        &self,
        pair: CandidatePair<'_>,
        me: &UserInventory,
        thresholds: &MatchThresholds,
        created_at: DateTime<Utc>,
    ) -> Option<TradeMatch> {
        let prices = self.pricing.resolve(pair.my_card, pair.their_card).await;
        let counterparty = pair.counterparty.profile.as_ref();

        let ctx = PairContext {
            my_card: pair.my_card,
            their_card: pair.their_card,
            counterparty,
            prices: &prices,
            interest: MutualInterest::MUTUAL,
            value_tolerance: thresholds.value_tolerance,
            my_tolerance: me
                .profile
                .as_ref()
                .map_or(thresholds.value_tolerance, |p| p.min_trade_value),
            their_tolerance: counterparty.map_or(thresholds.value_tolerance, |p| p.min_trade_value),
        };

        let score = calculate_trade_score(&ctx, &self.weights);
        let value_difference = prices.value_difference();

        if !passes_thresholds(score.overall, value_difference, thresholds) {
            tracing::trace!(
                "Dropped pair {} <-> {} (score {}, difference {:.2})",
                pair.my_card.id,
                pair.their_card.id,
                score.overall,
                value_difference
            );
            return None;
        }

        Some(TradeMatch {
            id: Uuid::new_v4(),
            user1_id: me.user_id.clone(),
            user2_id: pair.counterparty.user_id.clone(),
            user1_card_id: pair.my_card.id.clone(),
            user2_card_id: pair.their_card.id.clone(),
            user1_card_name: pair.my_card.name.clone(),
            user2_card_name: pair.their_card.name.clone(),
            counterparty_name: counterparty.map(|p| p.display_name.clone()),
            match_score: score.overall,
            value_difference,
            mutual_benefit_score: score.mutual_benefit,
            confidence: confidence_tier(score.overall, score.mutual_benefit),
            status: MatchStatus::Pending,
            score,
            pricing: prices,
            created_at,
        })
    }
}
