//! Trade Matcher - trade discovery for a collectible card marketplace
//!
//! Given one user's trade and want lists and every other user's lists, the
//! engine finds two-party trades both sides want, scores and ranks them, and
//! replaces the user's stored pending matches with the new set.

pub mod config;
pub mod core;
pub mod engine;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{similarity::names_match, Matcher, PricingOracle, PricingResolver};
pub use crate::engine::{EngineError, MatchEngine, MatchRun};
pub use crate::models::{Card, MatchOptions, MatchThresholds, ScoringWeights, TradeMatch, UserInventory, UserProfile};
