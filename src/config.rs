use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

use crate::models::{MatchThresholds, ScoringWeights};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub appwrite: AppwriteSettings,
    pub collection: CollectionSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub pricing: PricingSettings,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppwriteSettings {
    pub endpoint: String,
    pub api_key: String,
    pub project_id: String,
    pub database_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionSettings {
    pub user_profiles: String,
    pub cards: String,
}

/// Match store database; matches are kept in memory when `url` is unset
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheSettings {
    pub redis_url: Option<String>,
    pub ttl_secs: Option<u64>,
    pub l1_cache_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricingSettings {
    #[serde(default = "default_pricing_enabled")]
    pub enabled: bool,
    #[serde(default = "default_pricing_base_url")]
    pub base_url: String,
    pub api_key: Option<String>,
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,
    #[serde(default = "default_lookup_concurrency")]
    pub lookup_concurrency: usize,
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            enabled: default_pricing_enabled(),
            base_url: default_pricing_base_url(),
            api_key: None,
            lookup_timeout_ms: default_lookup_timeout_ms(),
            lookup_concurrency: default_lookup_concurrency(),
        }
    }
}

impl PricingSettings {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }
}

fn default_pricing_enabled() -> bool { true }
fn default_pricing_base_url() -> String { "https://api.pokemontcg.io/v2".to_string() }
fn default_lookup_timeout_ms() -> u64 { 3000 }
fn default_lookup_concurrency() -> usize { 8 }

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingSettings {
    #[serde(default = "default_min_match_score")]
    pub min_match_score: f64,
    #[serde(default = "default_value_tolerance")]
    pub value_tolerance: f64,
    pub max_value_difference: Option<f64>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            min_match_score: default_min_match_score(),
            value_tolerance: default_value_tolerance(),
            max_value_difference: None,
            max_results: default_max_results(),
            similarity_threshold: default_similarity_threshold(),
            run_timeout_secs: default_run_timeout_secs(),
        }
    }
}

impl MatchingSettings {
    /// Thresholds used when a request does not override them
    pub fn thresholds(&self) -> MatchThresholds {
        MatchThresholds {
            max_value_difference: self.max_value_difference,
            min_match_score: self.min_match_score,
            value_tolerance: self.value_tolerance,
            max_results: self.max_results,
            similarity_threshold: self.similarity_threshold,
        }
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }
}

fn default_min_match_score() -> f64 { MatchThresholds::DEFAULT_MIN_MATCH_SCORE }
fn default_value_tolerance() -> f64 { MatchThresholds::DEFAULT_VALUE_TOLERANCE }
fn default_max_results() -> usize { MatchThresholds::DEFAULT_MAX_RESULTS }
fn default_similarity_threshold() -> f64 { crate::core::similarity::DEFAULT_SIMILARITY_THRESHOLD }
fn default_run_timeout_secs() -> u64 { 30 }

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoringSettings {
    #[serde(default)]
    pub weights: WeightsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_value_weight")]
    pub value: f64,
    #[serde(default = "default_mutual_benefit_weight")]
    pub mutual_benefit: f64,
    #[serde(default = "default_condition_weight")]
    pub condition: f64,
    #[serde(default = "default_rarity_weight")]
    pub rarity: f64,
    #[serde(default = "default_reputation_weight")]
    pub reputation: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            value: default_value_weight(),
            mutual_benefit: default_mutual_benefit_weight(),
            condition: default_condition_weight(),
            rarity: default_rarity_weight(),
            reputation: default_reputation_weight(),
        }
    }
}

impl From<&WeightsConfig> for ScoringWeights {
    fn from(config: &WeightsConfig) -> Self {
        ScoringWeights {
            value: config.value,
            mutual_benefit: config.mutual_benefit,
            condition: config.condition,
            rarity: config.rarity,
            reputation: config.reputation,
        }
    }
}

fn default_value_weight() -> f64 { 0.25 }
fn default_mutual_benefit_weight() -> f64 { 0.30 }
fn default_condition_weight() -> f64 { 0.15 }
fn default_rarity_weight() -> f64 { 0.15 }
fn default_reputation_weight() -> f64 { 0.15 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingSettings {
    /// Install the global tracing subscriber
    ///
    /// `RUST_LOG` wins over `LOG_LEVEL`, which wins over the configured level;
    /// `LOG_FORMAT` likewise overrides the configured format.
    pub fn init(&self) {
        let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| self.level.clone());
        let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| self.format.clone());

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));
        let subscriber = fmt().with_env_filter(filter).with_target(false).with_level(true);

        if format == "pretty" {
            subscriber.pretty().init();
        } else {
            subscriber.json().init();
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Environment variables (prefixed with TRADEMATCH__)
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            // Local development overrides
            .add_source(File::with_name("config/local").required(false))
            // e.g., TRADEMATCH__SERVER__PORT -> server.port
            .add_source(environment())
            .build()?;

        substitute_env_vars(settings)?.try_deserialize()
    }
}

fn environment() -> Environment {
    Environment::with_prefix("TRADEMATCH")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Apply the conventional unprefixed variables on top of loaded settings
///
/// `DATABASE_URL`, `APPWRITE_*` and `POKEMONTCG_API_KEY` win over files.
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let overrides = [
        ("DATABASE_URL", "database.url"),
        ("REDIS_URL", "cache.redis_url"),
        ("APPWRITE_ENDPOINT", "appwrite.endpoint"),
        ("APPWRITE_API_KEY", "appwrite.api_key"),
        ("APPWRITE_PROJECT_ID", "appwrite.project_id"),
        ("APPWRITE_DATABASE_ID", "appwrite.database_id"),
        ("POKEMONTCG_API_KEY", "pricing.api_key"),
    ];

    let mut builder = Config::builder().add_source(settings);
    for (var, key) in overrides {
        if let Some(value) = env::var(var).ok().filter(|v| !v.trim().is_empty()) {
            builder = builder.set_override(key, value)?;
        }
    }

    builder.build()
}
