use thiserror::Error;

use crate::core::similarity::names_match_with_threshold;
use crate::models::{Card, MatchThresholds, UserInventory};

/// A counterparty record that cannot be matched against
#[derive(Debug, Error, PartialEq)]
pub enum MatchError {
    #[error("card {card_id} is listed under {owner_id} but belongs to inventory of {user_id}")]
    OwnerMismatch {
        card_id: String,
        owner_id: String,
        user_id: String,
    },

    #[error("card {card_id} has invalid market price {price}")]
    InvalidPrice { card_id: String, price: f64 },

    #[error("card {0} has no identifier")]
    MissingCardId(String),
}

/// Check that every card in an inventory is well formed and owned by that user
pub fn validate_inventory(inventory: &UserInventory) -> Result<(), MatchError> {
    for card in &inventory.cards {
        if card.id.trim().is_empty() {
            return Err(MatchError::MissingCardId(card.name.clone()));
        }
        if card.owner_id != inventory.user_id {
            return Err(MatchError::OwnerMismatch {
                card_id: card.id.clone(),
                owner_id: card.owner_id.clone(),
                user_id: inventory.user_id.clone(),
            });
        }
        if !card.market_price.is_finite() || card.market_price < 0.0 {
            return Err(MatchError::InvalidPrice {
                card_id: card.id.clone(),
                price: card.market_price,
            });
        }
    }

    Ok(())
}

/// Whether any card on a want list names the same card as `card`
#[inline]
pub fn is_wanted<'a, I>(wants: I, card: &Card, threshold: f64) -> bool
where
    I: IntoIterator<Item = &'a Card>,
{
    wants
        .into_iter()
        .any(|want| names_match_with_threshold(&want.name, &card.name, threshold))
}

/// Pairs `(mine, theirs)` where each side wants the other's trade card
///
/// A pair only survives when interest runs both ways; one-sided interest is
/// dropped here rather than penalised later.
pub fn mutual_candidate_pairs<'a>(
    me: &'a UserInventory,
    them: &'a UserInventory,
    threshold: f64,
) -> Vec<(&'a Card, &'a Card)> {
    let my_wants: Vec<&Card> = me.want_cards().collect();
    let their_wants: Vec<&Card> = them.want_cards().collect();
    let mut pairs = Vec::new();

    for mine in me.trade_cards() {
        if !is_wanted(their_wants.iter().copied(), mine, threshold) {
            continue;
        }

        for theirs in them.trade_cards() {
            if is_wanted(my_wants.iter().copied(), theirs, threshold) {
                pairs.push((mine, theirs));
            }
        }
    }

    pairs
}

/// Apply the minimum score and maximum value difference filters
#[inline]
pub fn passes_thresholds(overall: f64, value_difference: f64, thresholds: &MatchThresholds) -> bool {
    if overall < thresholds.min_match_score {
        return false;
    }

    match thresholds.max_value_difference {
        Some(max) => value_difference <= max,
        None => true,
    }
}
