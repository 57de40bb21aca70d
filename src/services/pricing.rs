use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use crate::core::pricing::{PricingError, PricingOracle};
use crate::core::similarity::normalize_name;
use crate::models::Card;
use crate::services::cache::{CacheKey, CacheManager};

/// Price variants in the order they are preferred
const TCGPLAYER_VARIANTS: &[&str] = &[
    "holofoil",
    "normal",
    "reverseHolofoil",
    "1stEditionHolofoil",
    "1stEditionNormal",
    "unlimitedHolofoil",
];

#[derive(Debug, Deserialize)]
struct CardSearchResponse {
    #[serde(default)]
    data: Vec<PricedCard>,
}

#[derive(Debug, Deserialize)]
struct PricedCard {
    #[serde(default)]
    tcgplayer: Option<TcgPlayerListing>,
    #[serde(default)]
    cardmarket: Option<CardMarketListing>,
}

#[derive(Debug, Deserialize)]
struct TcgPlayerListing {
    /// Sorted so unlisted variants are tried in a stable order
    #[serde(default)]
    prices: BTreeMap<String, TcgPlayerPrice>,
}

#[derive(Debug, Deserialize)]
struct TcgPlayerPrice {
    #[serde(default)]
    market: Option<f64>,
    #[serde(default)]
    mid: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CardMarketListing {
    #[serde(default)]
    prices: Option<CardMarketPrices>,
}

#[derive(Debug, Deserialize)]
struct CardMarketPrices {
    #[serde(rename = "trendPrice", default)]
    trend_price: Option<f64>,
    #[serde(rename = "averageSellPrice", default)]
    average_sell_price: Option<f64>,
}

impl PricedCard {
    /// tcgplayer market price by variant preference, then cardmarket trend/average
    fn best_price(&self) -> Option<f64> {
        let positive = |p: Option<f64>| p.filter(|v| v.is_finite() && *v > 0.0);

        if let Some(tcg) = &self.tcgplayer {
            let preferred = TCGPLAYER_VARIANTS
                .iter()
                .filter_map(|variant| tcg.prices.get(*variant))
                .chain(tcg.prices.values())
                .find_map(|price| positive(price.market).or_else(|| positive(price.mid)));
            if preferred.is_some() {
                return preferred;
            }
        }

        self.cardmarket
            .as_ref()
            .and_then(|cm| cm.prices.as_ref())
            .and_then(|p| positive(p.trend_price).or_else(|| positive(p.average_sell_price)))
    }
}

/// Pokémon TCG API price lookup
///
/// Searches by name, set and collector number and reads the market price of
/// the first hit.
pub struct PokemonTcgClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl PokemonTcgClient {
    /// Create a new pricing client
    pub fn new(base_url: String, api_key: Option<String>, timeout: Duration) -> Result<Self, PricingError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            client,
        })
    }

    /// Build the search query for a card
    fn search_query(card: &Card) -> String {
        let clean = |s: &str| s.replace('"', "").trim().to_string();

        let mut query = format!("name:\"{}\"", clean(&card.name));
        if !card.set_name.trim().is_empty() {
            query.push_str(&format!(" set.name:\"{}\"", clean(&card.set_name)));
        }
        if let Some(number) = card.card_number.as_deref() {
            // "4/102" is stored as collector number 4
            let number = number.split('/').next().unwrap_or("").trim();
            if !number.is_empty() {
                query.push_str(&format!(" number:{}", clean(number)));
            }
        }
        query
    }
}

#[async_trait]
impl PricingOracle for PokemonTcgClient {
    async fn live_price(&self, card: &Card) -> Result<Option<f64>, PricingError> {
        let url = format!("{}/cards", self.base_url.trim_end_matches('/'));
        let query = Self::search_query(card);

        tracing::debug!("Looking up live price: {}", query);

        let mut request = self
            .client
            .get(&url)
            .query(&[("q", query.as_str()), ("pageSize", "1")]);
        if let Some(key) = &self.api_key {
            request = request.header("X-Api-Key", key);
        }

        let response = request.send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            StatusCode::TOO_MANY_REQUESTS => return Err(PricingError::RateLimited),
            status if !status.is_success() => {
                return Err(PricingError::ApiError(format!("Price lookup failed: {}", status)));
            }
            _ => {}
        }

        let body: CardSearchResponse = response
            .json()
            .await
            .map_err(|e| PricingError::InvalidResponse(e.to_string()))?;

        Ok(body.data.first().and_then(PricedCard::best_price))
    }

    fn oracle_name(&self) -> &'static str {
        "pokemontcg"
    }
}

/// Wraps an oracle with the two-tier cache
///
/// Answers (including "no price") are cached; failures are not, so the next
/// run retries them.
pub struct CachedPricingOracle {
    inner: Arc<dyn PricingOracle>,
    cache: Arc<CacheManager>,
}

impl CachedPricingOracle {
    pub fn new(inner: Arc<dyn PricingOracle>, cache: Arc<CacheManager>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl PricingOracle for CachedPricingOracle {
    async fn live_price(&self, card: &Card) -> Result<Option<f64>, PricingError> {
        let key = CacheKey::price(card);

        if let Ok(cached) = self.cache.get::<Option<f64>>(&key).await {
            return Ok(cached);
        }

        let price = self.inner.live_price(card).await?;
        if let Err(e) = self.cache.set(&key, &price).await {
            tracing::warn!("Failed to cache price for {}: {}", key, e);
        }

        Ok(price)
    }

    fn oracle_name(&self) -> &'static str {
        self.inner.oracle_name()
    }
}

/// Oracle answering from a fixed table of card names
#[derive(Debug, Default, Clone)]
pub struct FixedPriceOracle {
    prices: HashMap<String, f64>,
}

impl FixedPriceOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, card_name: &str, price: f64) -> Self {
        self.prices.insert(normalize_name(card_name), price);
        self
    }
}

#[async_trait]
impl PricingOracle for FixedPriceOracle {
    async fn live_price(&self, card: &Card) -> Result<Option<f64>, PricingError> {
        Ok(self.prices.get(&normalize_name(&card.name)).copied())
    }

    fn oracle_name(&self) -> &'static str {
        "fixed"
    }
}

/// Oracle that never has a price, used when live pricing is switched off
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledPricing;

#[async_trait]
impl PricingOracle for DisabledPricing {
    async fn live_price(&self, _card: &Card) -> Result<Option<f64>, PricingError> {
        Ok(None)
    }

    fn oracle_name(&self) -> &'static str {
        "disabled"
    }
}
