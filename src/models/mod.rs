// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    Card, Condition, Confidence, ListType, MatchOptions, MatchRecord, MatchStatus, MatchThresholds,
    PriceSource, ResolvedPrices, ScoringWeights, TradeMatch, TradeScore, UserInventory, UserProfile,
};
pub use requests::{GenerateMatchesRequest, UpdateStatusRequest};
pub use responses::{
    ErrorResponse, GenerateMatchesResponse, HealthResponse, MatchListResponse, UpdateStatusResponse,
};
