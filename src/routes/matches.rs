use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;
use validator::Validate;

use crate::engine::{EngineError, MatchEngine};
use crate::models::{
    ErrorResponse, GenerateMatchesRequest, GenerateMatchesResponse, HealthResponse, MatchListResponse, MatchStatus,
    UpdateStatusRequest, UpdateStatusResponse,
};
use crate::services::StoreError;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MatchEngine>,
}

/// Configure all match-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/matches/generate", web::post().to(generate_matches))
        .route("/matches", web::get().to(list_pending_matches))
        .route("/matches/status", web::post().to(update_status));
}

fn error_response(status: actix_web::http::StatusCode, error: &str, message: String) -> HttpResponse {
    HttpResponse::build(status).json(ErrorResponse {
        error: error.to_string(),
        message,
        status_code: status.as_u16(),
    })
}

/// Health check endpoint
///
/// Reports `degraded` while the match store is unreachable.
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let store = state.engine.store();
    let store_healthy = match store.health_check().await {
        Ok(healthy) => healthy,
        Err(e) => {
            tracing::warn!("Health check of {} store failed: {}", store.store_name(), e);
            false
        }
    };

    let status = if store_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Generate matches endpoint
///
/// POST /api/v1/matches/generate
///
/// Request body:
/// ```json
/// {
///   "userId": "string",
///   "maxValueDifference": 25.0,
///   "minMatchScore": 50.0,
///   "valueTolerance": 80.0
/// }
/// ```
///
/// A run whose matches could not be stored still answers 200, with
/// `persisted: false`.
async fn generate_matches(state: web::Data<AppState>, req: web::Json<GenerateMatchesRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for generate request: {:?}", errors);
        return error_response(
            actix_web::http::StatusCode::BAD_REQUEST,
            "Validation failed",
            errors.to_string(),
        );
    }

    tracing::info!("Generating matches for user: {}", req.user_id);

    let (run, persisted) = match state.engine.generate_matches(&req.user_id, &req.options()).await {
        Ok(run) => (run, true),
        Err(EngineError::Persistence { source, run }) => {
            tracing::warn!("Returning {} unsaved matches for {}: {}", run.matches.len(), req.user_id, source);
            (run, false)
        }
        Err(e @ EngineError::Inventory(_)) => {
            tracing::error!("Match generation failed for {}: {}", req.user_id, e);
            return error_response(
                actix_web::http::StatusCode::BAD_GATEWAY,
                "Failed to load inventories",
                e.to_string(),
            );
        }
    };

    HttpResponse::Ok().json(GenerateMatchesResponse {
        total_results: run.matches.len(),
        matches: run.matches,
        candidates_evaluated: run.candidates_evaluated,
        counterparties_skipped: run.counterparties_skipped,
        timed_out: run.timed_out,
        persisted,
    })
}

/// Stored pending matches for a user
///
/// GET /api/v1/matches?userId={userId}
async fn list_pending_matches(
    state: web::Data<AppState>,
    query: web::Query<std::collections::HashMap<String, String>>,
) -> impl Responder {
    let user_id = match query.get("userId").filter(|id| !id.trim().is_empty()) {
        Some(id) => id,
        None => {
            return error_response(
                actix_web::http::StatusCode::BAD_REQUEST,
                "Missing userId parameter",
                "userId query parameter is required".to_string(),
            );
        }
    };

    match state.engine.store().pending_matches_for_user(user_id).await {
        Ok(matches) => HttpResponse::Ok().json(MatchListResponse {
            user_id: user_id.clone(),
            count: matches.len(),
            matches,
        }),
        Err(e) => {
            tracing::error!("Failed to fetch pending matches for {}: {}", user_id, e);
            error_response(
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch matches",
                e.to_string(),
            )
        }
    }
}

/// Advance a match through its lifecycle
///
/// POST /api/v1/matches/status
async fn update_status(state: web::Data<AppState>, req: web::Json<UpdateStatusRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        return error_response(
            actix_web::http::StatusCode::BAD_REQUEST,
            "Validation failed",
            errors.to_string(),
        );
    }

    let status: MatchStatus = match req.status.parse() {
        Ok(status) => status,
        Err(message) => {
            return error_response(actix_web::http::StatusCode::BAD_REQUEST, "Invalid status", message);
        }
    };

    match state.engine.store().update_status(req.match_id, status).await {
        Ok(record) => HttpResponse::Ok().json(UpdateStatusResponse {
            success: true,
            match_id: record.id,
            status: record.status.as_str().to_string(),
        }),
        Err(e @ StoreError::NotFound(_)) => {
            error_response(actix_web::http::StatusCode::NOT_FOUND, "Match not found", e.to_string())
        }
        Err(e @ StoreError::InvalidTransition { .. }) => {
            error_response(actix_web::http::StatusCode::CONFLICT, "Invalid status transition", e.to_string())
        }
        Err(e) => {
            tracing::error!("Failed to update match {}: {}", req.match_id, e);
            error_response(
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update match",
                e.to_string(),
            )
        }
    }
}
