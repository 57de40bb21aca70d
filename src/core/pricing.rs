use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::models::{Card, PriceSource, ResolvedPrices};

/// Default upper bound on a single live price lookup
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);

/// Errors a pricing oracle may report
///
/// None of these escape [`PricingResolver`]; they only decide whether the
/// stored estimate is used.
#[derive(Debug, Error)]
pub enum PricingError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Pricing API returned error: {0}")]
    ApiError(String),

    #[error("Rate limited by pricing API")]
    RateLimited,

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// External source of current market prices
#[async_trait]
pub trait PricingOracle: Send + Sync {
    /// Current market price for a card, `Ok(None)` when the oracle has no price
    async fn live_price(&self, card: &Card) -> Result<Option<f64>, PricingError>;

    /// Name for logging
    fn oracle_name(&self) -> &'static str;
}

/// Resolves the prices used to score a candidate pair
///
/// Live prices are used only when both lookups return a positive value;
/// otherwise both sides fall back to the stored `market_price`.
#[derive(Clone)]
pub struct PricingResolver {
    oracle: Arc<dyn PricingOracle>,
    lookup_timeout: Duration,
}

impl PricingResolver {
    pub fn new(oracle: Arc<dyn PricingOracle>, lookup_timeout: Duration) -> Self {
        Self { oracle, lookup_timeout }
    }

    pub async fn resolve(&self, my_card: &Card, their_card: &Card) -> ResolvedPrices {
        let (mine, theirs) = tokio::join!(self.lookup(my_card), self.lookup(their_card));

        match (mine, theirs) {
            (Some(my_price), Some(their_price)) => ResolvedPrices {
                my_price,
                their_price,
                source: PriceSource::Live,
            },
            _ => ResolvedPrices {
                my_price: stored_price(my_card),
                their_price: stored_price(their_card),
                source: PriceSource::Estimated,
            },
        }
    }

    /// A positive live price, or `None` on miss, failure or timeout
    async fn lookup(&self, card: &Card) -> Option<f64> {
        match tokio::time::timeout(self.lookup_timeout, self.oracle.live_price(card)).await {
            Ok(Ok(Some(price))) if price.is_finite() && price > 0.0 => Some(price),
            Ok(Ok(_)) => {
                tracing::trace!("No live price for card {} ({})", card.id, card.name);
                None
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    "Live price lookup via {} failed for card {}: {}",
                    self.oracle.oracle_name(),
                    card.id,
                    e
                );
                None
            }
            Err(_) => {
                tracing::warn!(
                    "Live price lookup via {} timed out after {:?} for card {}",
                    self.oracle.oracle_name(),
                    self.lookup_timeout,
                    card.id
                );
                None
            }
        }
    }
}

impl std::fmt::Debug for PricingResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PricingResolver")
            .field("oracle", &self.oracle.oracle_name())
            .field("lookup_timeout", &self.lookup_timeout)
            .finish()
    }
}

#[inline]
fn stored_price(card: &Card) -> f64 {
    if card.market_price.is_finite() && card.market_price > 0.0 {
        card.market_price
    } else {
        0.0
    }
}
