// Core algorithm exports
pub mod filters;
pub mod matcher;
pub mod pricing;
pub mod scoring;
pub mod similarity;

pub use filters::{mutual_candidate_pairs, passes_thresholds, validate_inventory, MatchError};
pub use matcher::{MatchResult, Matcher};
pub use pricing::{PricingError, PricingOracle, PricingResolver};
pub use scoring::{calculate_trade_score, confidence_tier, overall_score};
pub use similarity::{name_similarity, names_match};
