use actix_cors::Cors;
use actix_web::{error, http::StatusCode, middleware, web, App, HttpResponse, HttpServer};
use std::sync::Arc;
use tracing::{error, info, warn};

use trade_matcher::config::Settings;
use trade_matcher::core::{Matcher, PricingOracle, PricingResolver};
use trade_matcher::engine::MatchEngine;
use trade_matcher::models::ScoringWeights;
use trade_matcher::routes::{self, matches::AppState};
use trade_matcher::services::{
    AppwriteClient, AppwriteCollections, CacheManager, CachedPricingOracle, DisabledPricing, InMemoryMatchStore,
    MatchStore, PokemonTcgClient, PostgresClient,
};

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST)).json(self)
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    JsonError {
        error: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
    }
    .into()
}

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    error!("{}: {}", context, err);
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = Settings::load();
    settings
        .as_ref()
        .map(|s| s.logging.clone())
        .unwrap_or_default()
        .init();

    info!("Starting trade matching service...");

    let settings = settings.map_err(|e| startup_error("Failed to load configuration", e))?;

    info!("Configuration loaded successfully");

    // Inventory comes from Appwrite
    let appwrite = AppwriteClient::new(
        settings.appwrite.endpoint.clone(),
        settings.appwrite.api_key.clone(),
        settings.appwrite.project_id.clone(),
        settings.appwrite.database_id.clone(),
        AppwriteCollections {
            user_profiles: settings.collection.user_profiles.clone(),
            cards: settings.collection.cards.clone(),
        },
    )
    .map_err(|e| startup_error("Failed to build Appwrite client", e))?;

    info!("Appwrite client initialized");

    // Price cache; redis is optional
    let cache_ttl = settings.cache.ttl_secs.unwrap_or(3600);
    let l1_cache_size = settings.cache.l1_cache_size.unwrap_or(10_000);
    let cache = match settings.cache.redis_url.as_deref() {
        Some(url) => match CacheManager::new(url, l1_cache_size, cache_ttl).await {
            Ok(c) => c,
            Err(e) => {
                warn!("Failed to connect to Redis ({}), using in-process price cache only", e);
                CacheManager::in_memory(l1_cache_size, cache_ttl)
            }
        },
        None => CacheManager::in_memory(l1_cache_size, cache_ttl),
    };
    info!(
        "Cache manager initialized (L1: {} entries, TTL: {}s, redis: {})",
        l1_cache_size,
        cache_ttl,
        cache.has_redis()
    );

    let oracle: Arc<dyn PricingOracle> = if settings.pricing.enabled {
        let client = PokemonTcgClient::new(
            settings.pricing.base_url.clone(),
            settings.pricing.api_key.clone(),
            settings.pricing.lookup_timeout(),
        )
        .map_err(|e| startup_error("Failed to build pricing client", e))?;
        Arc::new(CachedPricingOracle::new(Arc::new(client), Arc::new(cache)))
    } else {
        info!("Live pricing disabled, scoring on listed prices");
        Arc::new(DisabledPricing)
    };

    // Match store: PostgreSQL when configured, otherwise process memory
    let store: Arc<dyn MatchStore> = match settings.database.url.as_deref() {
        Some(url) => Arc::new(
            PostgresClient::from_settings(
                url,
                settings.database.max_connections,
                settings.database.min_connections,
                settings.database.acquire_timeout_secs,
                settings.database.idle_timeout_secs,
            )
            .await
            .map_err(|e| startup_error("Failed to connect to PostgreSQL", e))?,
        ),
        None => {
            warn!("No database configured, matches are kept in memory only");
            Arc::new(InMemoryMatchStore::new())
        }
    };

    info!("Match store initialized ({})", store.store_name());

    let weights = ScoringWeights::from(&settings.scoring.weights);
    let matcher = Matcher::new(weights, PricingResolver::new(oracle, settings.pricing.lookup_timeout()))
        .with_lookup_concurrency(settings.pricing.lookup_concurrency)
        .with_run_timeout(settings.matching.run_timeout());

    info!("Matcher initialized with weights: {:?}", weights);

    let engine = MatchEngine::new(Arc::new(appwrite), store, matcher, settings.matching.thresholds());
    let app_state = AppState {
        engine: Arc::new(engine),
    };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
