use crate::models::{Card, Condition, Confidence, ResolvedPrices, ScoringWeights, TradeScore, UserProfile};

/// Characters whose cards have historically traded at a premium
pub const HIGH_DEMAND_NAMES: &[&str] = &[
    "charizard", "pikachu", "mewtwo", "mew", "lugia", "rayquaza", "umbreon",
    "gengar", "blastoise", "venusaur", "eevee", "gyarados", "dragonite", "greninja",
];

/// Sets whose cards have historically held value
pub const VALUABLE_SETS: &[&str] = &[
    "base set", "jungle", "fossil", "team rocket", "neo genesis", "gym heroes",
    "skyridge", "hidden fates", "shining fates", "evolving skies", "celebrations",
    "crown zenith",
];

/// Special-variant markers, matched as whole words
pub const VARIANT_MARKERS: &[&str] = &["ex", "gx", "v", "vmax"];

/// Premium finish markers, matched as whole words
pub const FINISH_MARKERS: &[&str] = &["holo", "shiny", "secret", "rainbow"];

/// Score given to a pair whose price is unknown on either side
pub const NEUTRAL_VALUE_SCORE: f64 = 50.0;

/// Reputation score for a counterparty with no profile
pub const DEFAULT_REPUTATION_SCORE: f64 = 70.0;

/// Value-parity floor below the tolerance band
const VALUE_SCORE_FLOOR: f64 = 30.0;

/// Width of the linear band under the tolerance, in ratio percentage points
const TOLERANCE_BAND: f64 = 30.0;

/// Which way interest runs between the two parties
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutualInterest {
    pub they_want_mine: bool,
    pub i_want_theirs: bool,
}

impl MutualInterest {
    pub const MUTUAL: MutualInterest = MutualInterest {
        they_want_mine: true,
        i_want_theirs: true,
    };
}

/// Value parity (0-100)
///
/// `ratio = min/max * 100`. At or above `tolerance` the score is 100; in the
/// 30-point band below it the score runs linearly from 70 to 100; further
/// down it falls linearly towards a floor of 30. Unknown prices score 50.
pub fn value_score(price_a: f64, price_b: f64, tolerance: f64) -> f64 {
    if !(price_a > 0.0 && price_b > 0.0) {
        return NEUTRAL_VALUE_SCORE;
    }

    let ratio = price_a.min(price_b) / price_a.max(price_b) * 100.0;
    if ratio >= tolerance {
        return 100.0;
    }

    let band_start = tolerance - TOLERANCE_BAND;
    if ratio >= band_start {
        return 70.0 + (ratio - band_start) / TOLERANCE_BAND * 30.0;
    }

    // band_start > ratio >= 0 here, so band_start is positive
    let score = VALUE_SCORE_FLOOR + (ratio / band_start) * (70.0 - VALUE_SCORE_FLOOR);
    score.clamp(VALUE_SCORE_FLOOR, 70.0)
}

/// Condition compatibility (0-100), symmetric
pub fn condition_score(a: Condition, b: Condition) -> f64 {
    let diff = (a.rank() as i32 - b.rank() as i32).unsigned_abs();
    match diff {
        0 => 100.0,
        1 => 85.0,
        2 => 70.0,
        _ => (70.0 - (diff as f64 - 2.0) * 15.0).max(50.0),
    }
}

/// True when `marker` appears as a whole word in `text`
fn has_token(text: &str, markers: &[&str]) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .any(|token| markers.contains(&token))
}

/// Rarity and demand for a single card (0-100)
pub fn card_rarity_score(card: &Card, price: f64) -> f64 {
    let name = card.name.to_lowercase();
    let set_name = card.set_name.trim().to_lowercase();
    let mut score: f64 = 60.0;

    if HIGH_DEMAND_NAMES.iter().any(|n| name.contains(n)) {
        score += 25.0;
    }
    if !set_name.is_empty() && VALUABLE_SETS.iter().any(|s| set_name.contains(s)) {
        score += 15.0;
    }
    if has_token(&name, VARIANT_MARKERS) {
        score += 20.0;
    }
    if has_token(&name, FINISH_MARKERS) {
        score += 10.0;
    }

    score += if price > 200.0 {
        15.0
    } else if price > 100.0 {
        10.0
    } else if price > 50.0 {
        5.0
    } else {
        0.0
    };

    score.min(100.0)
}

/// Rarity for a pair: the mean of both cards' scores
pub fn rarity_score(my_card: &Card, their_card: &Card, prices: &ResolvedPrices) -> f64 {
    (card_rarity_score(my_card, prices.my_price) + card_rarity_score(their_card, prices.their_price)) / 2.0
}

/// Counterparty reputation (0-100)
pub fn reputation_score(profile: Option<&UserProfile>) -> f64 {
    let Some(profile) = profile else {
        return DEFAULT_REPUTATION_SCORE;
    };

    let mut score: f64 = 70.0;

    score += match profile.total_trades {
        t if t > 50 => 20.0,
        t if t > 20 => 15.0,
        t if t > 10 => 10.0,
        t if t > 5 => 5.0,
        _ => 0.0,
    };

    let rate = profile.success_rate;
    score += if rate > 95.0 {
        15.0
    } else if rate > 90.0 {
        12.0
    } else if rate > 80.0 {
        8.0
    } else if rate > 70.0 {
        5.0
    } else {
        0.0
    };

    let reputation = profile.reputation_score;
    score += if reputation > 4.8 {
        10.0
    } else if reputation > 4.5 {
        8.0
    } else if reputation > 4.0 {
        5.0
    } else {
        0.0
    };

    score.min(100.0)
}

/// Mutual benefit (0-100)
///
/// Each party's tolerance is the smallest value, as a percentage of what they
/// give, they accept in return. Unknown prices satisfy neither side.
pub fn mutual_benefit_score(
    interest: MutualInterest,
    prices: &ResolvedPrices,
    my_tolerance: f64,
    their_tolerance: f64,
) -> f64 {
    match (interest.they_want_mine, interest.i_want_theirs) {
        (false, false) => 0.0,
        (true, false) | (false, true) => 40.0,
        (true, true) => {
            let (mine_ok, theirs_ok) = if prices.has_unknown() {
                (false, false)
            } else {
                (
                    prices.their_price / prices.my_price * 100.0 >= my_tolerance,
                    prices.my_price / prices.their_price * 100.0 >= their_tolerance,
                )
            };

            let bonus = match (mine_ok, theirs_ok) {
                (true, true) => 20.0,
                (true, false) | (false, true) => 10.0,
                (false, false) => 0.0,
            };

            (80.0_f64 + bonus).min(100.0)
        }
    }
}

/// Weighted combination, rounded and clamped to [0, 100]
pub fn overall_score(
    value: f64,
    mutual_benefit: f64,
    condition: f64,
    rarity: f64,
    reputation: f64,
    weights: &ScoringWeights,
) -> f64 {
    let total = value * weights.value
        + mutual_benefit * weights.mutual_benefit
        + condition * weights.condition
        + rarity * weights.rarity
        + reputation * weights.reputation;

    total.round().clamp(0.0, 100.0)
}

/// Display tier for an overall and mutual-benefit score
pub fn confidence_tier(overall: f64, mutual_benefit: f64) -> Confidence {
    if overall >= 70.0 && mutual_benefit >= 60.0 {
        Confidence::High
    } else if overall >= 50.0 && mutual_benefit >= 40.0 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

/// Inputs for scoring one candidate pair
#[derive(Debug, Clone, Copy)]
pub struct PairContext<'a> {
    pub my_card: &'a Card,
    pub their_card: &'a Card,
    pub counterparty: Option<&'a UserProfile>,
    pub prices: &'a ResolvedPrices,
    pub interest: MutualInterest,
    pub value_tolerance: f64,
    pub my_tolerance: f64,
    pub their_tolerance: f64,
}

/// Calculate the full score breakdown for a candidate pair
pub fn calculate_trade_score(ctx: &PairContext<'_>, weights: &ScoringWeights) -> TradeScore {
    let value = value_score(ctx.prices.my_price, ctx.prices.their_price, ctx.value_tolerance);
    let condition = condition_score(ctx.my_card.condition, ctx.their_card.condition);
    let rarity = rarity_score(ctx.my_card, ctx.their_card, ctx.prices);
    let reputation = reputation_score(ctx.counterparty);
    let mutual_benefit =
        mutual_benefit_score(ctx.interest, ctx.prices, ctx.my_tolerance, ctx.their_tolerance);

    TradeScore {
        value,
        condition,
        rarity,
        reputation,
        mutual_benefit,
        overall: overall_score(value, mutual_benefit, condition, rarity, reputation, weights),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ListType, PriceSource};

    fn card(name: &str, set_name: &str) -> Card {
        Card {
            id: "c".to_string(),
            owner_id: "o".to_string(),
            name: name.to_string(),
            set_name: set_name.to_string(),
            card_number: None,
            rarity: None,
            condition: Condition::NearMint,
            quantity: 1,
            market_price: 0.0,
            list_type: ListType::Trade,
        }
    }

    fn prices(mine: f64, theirs: f64) -> ResolvedPrices {
        ResolvedPrices {
            my_price: mine,
            their_price: theirs,
            source: PriceSource::Estimated,
        }
    }

    #[test]
    fn test_value_score_bands() {
        assert_eq!(value_score(100.0, 100.0, 80.0), 100.0);
        assert_eq!(value_score(80.0, 100.0, 80.0), 100.0);
        // ratio 65: halfway through the band 50..80
        assert_eq!(value_score(65.0, 100.0, 80.0), 85.0);
        assert_eq!(value_score(50.0, 100.0, 80.0), 70.0);
        // ratio 25: halfway between 0 and the band start
        assert_eq!(value_score(25.0, 100.0, 80.0), 50.0);
        assert!(value_score(0.01, 100.0, 80.0) >= 30.0);
    }

    #[test]
    fn test_value_score_unknown_price_is_neutral() {
        assert_eq!(value_score(0.0, 0.0, 80.0), 50.0);
        assert_eq!(value_score(0.0, 25.0, 80.0), 50.0);
    }

    #[test]
    fn test_value_score_low_tolerance() {
        // the whole range sits inside the band when tolerance <= 30
        let score = value_score(1.0, 100.0, 20.0);
        assert!(score >= 30.0 && score <= 100.0);
        assert_eq!(value_score(20.0, 100.0, 20.0), 100.0);
    }

    #[test]
    fn test_condition_score_table() {
        assert_eq!(condition_score(Condition::Mint, Condition::Mint), 100.0);
        assert_eq!(condition_score(Condition::Mint, Condition::NearMint), 85.0);
        assert_eq!(condition_score(Condition::Mint, Condition::LightlyPlayed), 70.0);
        assert_eq!(condition_score(Condition::Mint, Condition::ModeratelyPlayed), 55.0);
        assert_eq!(condition_score(Condition::Mint, Condition::HeavilyPlayed), 50.0);
        assert_eq!(condition_score(Condition::Mint, Condition::Damaged), 50.0);
    }

    #[test]
    fn test_rarity_bonuses() {
        assert_eq!(card_rarity_score(&card("Bulbasaur", "Unknown Set"), 1.0), 60.0);
        assert_eq!(card_rarity_score(&card("Pikachu", ""), 1.0), 85.0);
        assert_eq!(card_rarity_score(&card("Bulbasaur", "Base Set"), 1.0), 75.0);
        assert_eq!(card_rarity_score(&card("Zoroark GX", ""), 1.0), 80.0);
        assert_eq!(card_rarity_score(&card("Zoroark Holo", ""), 60.0), 75.0);
        assert_eq!(card_rarity_score(&card("Charizard VMAX Rainbow", "Base Set"), 500.0), 100.0);
    }

    #[test]
    fn test_variant_markers_match_whole_words_only() {
        // "v" inside "Vulpix" or "ex" inside "Exeggcute" is not a marker
        assert_eq!(card_rarity_score(&card("Vulpix", ""), 1.0), 60.0);
        assert_eq!(card_rarity_score(&card("Exeggcute", ""), 1.0), 60.0);
        assert_eq!(card_rarity_score(&card("Zacian V", ""), 1.0), 80.0);
    }

    #[test]
    fn test_reputation_tiers() {
        assert_eq!(reputation_score(None), 70.0);

        let mut profile = UserProfile::new("u");
        assert_eq!(reputation_score(Some(&profile)), 70.0);

        profile.total_trades = 21;
        profile.success_rate = 91.0;
        profile.reputation_score = 4.6;
        assert_eq!(reputation_score(Some(&profile)), 100.0);

        profile.total_trades = 6;
        profile.success_rate = 71.0;
        profile.reputation_score = 4.0;
        assert_eq!(reputation_score(Some(&profile)), 80.0);
    }

    #[test]
    fn test_mutual_benefit() {
        let even = prices(20.0, 25.0);
        assert_eq!(
            mutual_benefit_score(MutualInterest { they_want_mine: false, i_want_theirs: false }, &even, 80.0, 80.0),
            0.0
        );
        assert_eq!(
            mutual_benefit_score(MutualInterest { they_want_mine: true, i_want_theirs: false }, &even, 80.0, 80.0),
            40.0
        );
        // 25/20 = 125% for me, 20/25 = 80% for them
        assert_eq!(mutual_benefit_score(MutualInterest::MUTUAL, &even, 80.0, 80.0), 100.0);
        assert_eq!(mutual_benefit_score(MutualInterest::MUTUAL, &even, 80.0, 90.0), 90.0);
        assert_eq!(mutual_benefit_score(MutualInterest::MUTUAL, &prices(0.0, 0.0), 80.0, 80.0), 80.0);
    }

    #[test]
    fn test_overall_and_confidence() {
        let weights = ScoringWeights::default();
        assert_eq!(overall_score(100.0, 100.0, 100.0, 85.0, 70.0, &weights), 93.0);
        assert_eq!(overall_score(0.0, 0.0, 0.0, 0.0, 0.0, &weights), 0.0);
        assert_eq!(overall_score(100.0, 100.0, 100.0, 100.0, 100.0, &weights), 100.0);

        assert_eq!(confidence_tier(70.0, 60.0), Confidence::High);
        assert_eq!(confidence_tier(69.0, 100.0), Confidence::Medium);
        assert_eq!(confidence_tier(70.0, 59.0), Confidence::Medium);
        assert_eq!(confidence_tier(50.0, 40.0), Confidence::Medium);
        assert_eq!(confidence_tier(49.0, 40.0), Confidence::Low);
        assert_eq!(confidence_tier(50.0, 39.0), Confidence::Low);
    }
}
