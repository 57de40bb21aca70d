use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Physical condition of a listed card, ordered from worst to best
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Condition {
    Damaged,
    HeavilyPlayed,
    ModeratelyPlayed,
    LightlyPlayed,
    #[default]
    NearMint,
    Mint,
}

impl Condition {
    pub const ALL: [Condition; 6] = [
        Condition::Mint,
        Condition::NearMint,
        Condition::LightlyPlayed,
        Condition::ModeratelyPlayed,
        Condition::HeavilyPlayed,
        Condition::Damaged,
    ];

    /// Rank from 1 (Damaged) to 6 (Mint)
    pub fn rank(self) -> u8 {
        match self {
            Condition::Damaged => 1,
            Condition::HeavilyPlayed => 2,
            Condition::ModeratelyPlayed => 3,
            Condition::LightlyPlayed => 4,
            Condition::NearMint => 5,
            Condition::Mint => 6,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Condition::Mint => "Mint",
            Condition::NearMint => "Near Mint",
            Condition::LightlyPlayed => "Lightly Played",
            Condition::ModeratelyPlayed => "Moderately Played",
            Condition::HeavilyPlayed => "Heavily Played",
            Condition::Damaged => "Damaged",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Condition {
    type Err = String;

    /// Accepts full names in any case plus the usual grading shorthands (NM, LP, ...)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();

        match normalized.as_str() {
            "mint" | "m" => Ok(Condition::Mint),
            "nearmint" | "nm" => Ok(Condition::NearMint),
            "lightlyplayed" | "lp" => Ok(Condition::LightlyPlayed),
            "moderatelyplayed" | "mp" => Ok(Condition::ModeratelyPlayed),
            "heavilyplayed" | "hp" => Ok(Condition::HeavilyPlayed),
            "damaged" | "dmg" | "d" => Ok(Condition::Damaged),
            _ => Err(format!("unknown card condition: {}", s)),
        }
    }
}

impl TryFrom<String> for Condition {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Condition> for String {
    fn from(value: Condition) -> Self {
        value.as_str().to_string()
    }
}

/// Whether a listing is offered or sought
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListType {
    Trade,
    Want,
}

/// A single card listing owned by one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    #[serde(alias = "$id")]
    pub id: String,
    #[serde(rename = "ownerId", alias = "userId")]
    pub owner_id: String,
    pub name: String,
    #[serde(rename = "setName", default, deserialize_with = "null_as_default")]
    pub set_name: String,
    #[serde(rename = "cardNumber", default)]
    pub card_number: Option<String>,
    #[serde(default)]
    pub rarity: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub condition: Condition,
    #[serde(default = "default_quantity", deserialize_with = "quantity_or_default")]
    pub quantity: u32,
    /// Zero when the lister gave no price
    #[serde(rename = "marketPrice", default, deserialize_with = "null_as_default")]
    pub market_price: f64,
    #[serde(rename = "listType")]
    pub list_type: ListType,
}

impl Card {
    pub fn is_trade(&self) -> bool {
        self.list_type == ListType::Trade
    }

    pub fn is_want(&self) -> bool {
        self.list_type == ListType::Want
    }
}

fn default_quantity() -> u32 { 1 }

fn default_min_trade_value() -> f64 { 80.0 }

// Appwrite sends `null` for every optional attribute left unset

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn quantity_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    Ok(Option::<u32>::deserialize(deserializer)?.unwrap_or_else(default_quantity))
}

fn min_trade_value_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or_else(default_min_trade_value))
}

/// The slice of a user profile the matching engine reads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "displayName", default, deserialize_with = "null_as_default")]
    pub display_name: String,
    #[serde(rename = "totalTrades", default, deserialize_with = "null_as_default")]
    pub total_trades: u32,
    /// Historical match success rate in percent (0-100)
    #[serde(rename = "successRate", default, deserialize_with = "null_as_default")]
    pub success_rate: f64,
    /// Reputation on a 0-5 scale
    #[serde(rename = "reputationScore", default, deserialize_with = "null_as_default")]
    pub reputation_score: f64,
    /// Smallest value, as a percentage of what they give, this user accepts in return
    #[serde(
        rename = "minTradeValue",
        default = "default_min_trade_value",
        deserialize_with = "min_trade_value_or_default"
    )]
    pub min_trade_value: f64,
}

impl UserProfile {
    pub fn new(user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        Self {
            display_name: user_id.clone(),
            user_id,
            total_trades: 0,
            success_rate: 0.0,
            reputation_score: 0.0,
            min_trade_value: default_min_trade_value(),
        }
    }
}

/// A user's profile together with every card they listed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInventory {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(default)]
    pub profile: Option<UserProfile>,
    #[serde(default)]
    pub cards: Vec<Card>,
}

impl UserInventory {
    pub fn trade_cards(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter().filter(|c| c.is_trade())
    }

    pub fn want_cards(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter().filter(|c| c.is_want())
    }

    /// At least one card on each list
    pub fn is_tradeable(&self) -> bool {
        self.trade_cards().next().is_some() && self.want_cards().next().is_some()
    }
}

/// Where the prices used for scoring came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    Live,
    Estimated,
}

impl PriceSource {
    pub fn as_str(self) -> &'static str {
        match self {
            PriceSource::Live => "live",
            PriceSource::Estimated => "estimated",
        }
    }
}

/// Prices for both sides of a candidate pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedPrices {
    #[serde(rename = "myPrice")]
    pub my_price: f64,
    #[serde(rename = "theirPrice")]
    pub their_price: f64,
    pub source: PriceSource,
}

impl ResolvedPrices {
    pub fn value_difference(&self) -> f64 {
        (self.my_price - self.their_price).abs()
    }

    /// Either price is zero or missing
    pub fn has_unknown(&self) -> bool {
        self.my_price <= 0.0 || self.their_price <= 0.0
    }
}

/// Coarse display bucket for a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

impl FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "high" => Ok(Confidence::High),
            "medium" => Ok(Confidence::Medium),
            "low" => Ok(Confidence::Low),
            other => Err(format!("unknown confidence tier: {}", other)),
        }
    }
}

/// Lifecycle of a persisted match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Pending,
    Accepted,
    Declined,
    Completed,
}

impl MatchStatus {
    /// pending -> accepted | declined, accepted -> completed
    pub fn can_advance_to(self, next: MatchStatus) -> bool {
        matches!(
            (self, next),
            (MatchStatus::Pending, MatchStatus::Accepted)
                | (MatchStatus::Pending, MatchStatus::Declined)
                | (MatchStatus::Accepted, MatchStatus::Completed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Pending => "pending",
            MatchStatus::Accepted => "accepted",
            MatchStatus::Declined => "declined",
            MatchStatus::Completed => "completed",
        }
    }
}

impl FromStr for MatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(MatchStatus::Pending),
            "accepted" => Ok(MatchStatus::Accepted),
            "declined" => Ok(MatchStatus::Declined),
            "completed" => Ok(MatchStatus::Completed),
            other => Err(format!("unknown match status: {}", other)),
        }
    }
}

/// Per-factor breakdown of a match score, every value in [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeScore {
    pub value: f64,
    pub condition: f64,
    pub rarity: f64,
    pub reputation: f64,
    #[serde(rename = "mutualBenefit")]
    pub mutual_benefit: f64,
    pub overall: f64,
}

/// A ranked trade opportunity produced by discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeMatch {
    pub id: Uuid,
    #[serde(rename = "user1Id")]
    pub user1_id: String,
    #[serde(rename = "user2Id")]
    pub user2_id: String,
    #[serde(rename = "user1CardId")]
    pub user1_card_id: String,
    #[serde(rename = "user2CardId")]
    pub user2_card_id: String,
    #[serde(rename = "user1CardName")]
    pub user1_card_name: String,
    #[serde(rename = "user2CardName")]
    pub user2_card_name: String,
    #[serde(rename = "counterpartyName")]
    pub counterparty_name: Option<String>,
    #[serde(rename = "matchScore")]
    pub match_score: f64,
    #[serde(rename = "valueDifference")]
    pub value_difference: f64,
    #[serde(rename = "mutualBenefitScore")]
    pub mutual_benefit_score: f64,
    pub confidence: Confidence,
    pub status: MatchStatus,
    pub score: TradeScore,
    pub pricing: ResolvedPrices,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl TradeMatch {
    pub fn to_record(&self) -> MatchRecord {
        MatchRecord {
            id: self.id,
            user1_id: self.user1_id.clone(),
            user2_id: self.user2_id.clone(),
            user1_card_id: self.user1_card_id.clone(),
            user2_card_id: self.user2_card_id.clone(),
            match_score: self.match_score,
            value_difference: self.value_difference,
            mutual_benefit_score: self.mutual_benefit_score,
            confidence: self.confidence,
            price_source: self.pricing.source,
            status: self.status,
            created_at: self.created_at,
        }
    }
}

/// The persisted shape of a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: Uuid,
    #[serde(rename = "user1Id")]
    pub user1_id: String,
    #[serde(rename = "user2Id")]
    pub user2_id: String,
    #[serde(rename = "user1CardId")]
    pub user1_card_id: String,
    #[serde(rename = "user2CardId")]
    pub user2_card_id: String,
    #[serde(rename = "matchScore")]
    pub match_score: f64,
    #[serde(rename = "valueDifference")]
    pub value_difference: f64,
    #[serde(rename = "mutualBenefitScore")]
    pub mutual_benefit_score: f64,
    pub confidence: Confidence,
    #[serde(rename = "priceSource")]
    pub price_source: PriceSource,
    pub status: MatchStatus,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Caller-supplied tuning for one discovery run; unset fields use configured defaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchOptions {
    #[serde(rename = "maxValueDifference", default)]
    pub max_value_difference: Option<f64>,
    #[serde(rename = "minMatchScore", default)]
    pub min_match_score: Option<f64>,
    #[serde(rename = "valueTolerance", default)]
    pub value_tolerance: Option<f64>,
}

/// Fully resolved thresholds for a discovery run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchThresholds {
    pub max_value_difference: Option<f64>,
    pub min_match_score: f64,
    pub value_tolerance: f64,
    pub max_results: usize,
    pub similarity_threshold: f64,
}

impl MatchThresholds {
    pub const DEFAULT_MIN_MATCH_SCORE: f64 = 40.0;
    pub const DEFAULT_VALUE_TOLERANCE: f64 = 80.0;
    pub const DEFAULT_MAX_RESULTS: usize = 50;

    /// Overlay per-run options on top of these defaults
    pub fn with_options(&self, options: &MatchOptions) -> Self {
        Self {
            max_value_difference: options.max_value_difference.or(self.max_value_difference),
            min_match_score: options.min_match_score.unwrap_or(self.min_match_score),
            value_tolerance: options.value_tolerance.unwrap_or(self.value_tolerance),
            ..*self
        }
    }
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            max_value_difference: None,
            min_match_score: Self::DEFAULT_MIN_MATCH_SCORE,
            value_tolerance: Self::DEFAULT_VALUE_TOLERANCE,
            max_results: Self::DEFAULT_MAX_RESULTS,
            similarity_threshold: crate::core::similarity::DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

/// Scoring weights
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub value: f64,
    pub mutual_benefit: f64,
    pub condition: f64,
    pub rarity: f64,
    pub reputation: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            value: 0.25,
            mutual_benefit: 0.30,
            condition: 0.15,
            rarity: 0.15,
            reputation: 0.15,
        }
    }
}
