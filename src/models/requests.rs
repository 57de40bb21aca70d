use serde::{Deserialize, Serialize};
use validator::Validate;
use crate::models::domain::MatchOptions;

/// Request to generate (and persist) matches for a user
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GenerateMatchesRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: String,
    #[validate(range(min = 0.0))]
    #[serde(alias = "max_value_difference", rename = "maxValueDifference", default)]
    pub max_value_difference: Option<f64>,
    #[validate(range(min = 0.0, max = 100.0))]
    #[serde(alias = "min_match_score", rename = "minMatchScore", default)]
    pub min_match_score: Option<f64>,
    #[validate(range(min = 0.0, max = 100.0))]
    #[serde(alias = "value_tolerance", rename = "valueTolerance", default)]
    pub value_tolerance: Option<f64>,
}

impl GenerateMatchesRequest {
    pub fn options(&self) -> MatchOptions {
        MatchOptions {
            max_value_difference: self.max_value_difference,
            min_match_score: self.min_match_score,
            value_tolerance: self.value_tolerance,
        }
    }
}

/// Request to advance a stored match through its lifecycle
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    #[serde(alias = "match_id", rename = "matchId")]
    pub match_id: uuid::Uuid,
    #[validate(length(min = 1))]
    pub status: String,
}
