use serde::{Deserialize, Serialize};
use crate::models::domain::{MatchRecord, TradeMatch};

/// Response for the generate matches endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateMatchesResponse {
    pub matches: Vec<TradeMatch>,
    pub total_results: usize,
    pub candidates_evaluated: usize,
    pub counterparties_skipped: usize,
    pub timed_out: bool,
    pub persisted: bool,
}

/// Stored pending matches for a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchListResponse {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub matches: Vec<MatchRecord>,
    pub count: usize,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

/// Status update response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusResponse {
    pub success: bool,
    pub match_id: uuid::Uuid,
    pub status: String,
}
