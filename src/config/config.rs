use config::{Config, ConfigError, File};
use serde::Deserialize;

/// Goszakup upstream API configuration.
///
/// Covers both the paginated REST v2 endpoints and the GraphQL v3 endpoint.
/// The bearer token is mandatory; everything else has sane defaults matching
/// the public API limits.
#[derive(Debug, Deserialize, Clone)]
pub struct GoszakupSettings {
    pub token: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_graphql_url")]
    pub graphql_url: String,
    /// Outbound requests per second (token bucket capacity).
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Response cache TTL. 0 disables caching entirely.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Consecutive failures before the circuit breaker opens.
    #[serde(default = "default_breaker_threshold")]
    pub breaker_threshold: u32,
    /// Cooldown before an open circuit is probed again.
    #[serde(default = "default_breaker_cooldown_secs")]
    pub breaker_cooldown_secs: u64,
    /// Base unit for exponential backoff (2^attempt * base).
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

fn default_base_url() -> String {
    "https://ows.goszakup.gov.kz/v2".to_string()
}

fn default_graphql_url() -> String {
    "https://ows.goszakup.gov.kz/v3/graphql".to_string()
}

fn default_rate_limit() -> u32 {
    5
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_breaker_threshold() -> u32 {
    5
}

fn default_breaker_cooldown_secs() -> u64 {
    60
}

fn default_backoff_base_ms() -> u64 {
    1000
}

/// PostgreSQL database connection configuration.
///
/// Used for storing:
/// - Normalized procurement entities (trd_buy, lots, contracts, participants)
/// - Raw API response archive
/// - Sync checkpoints
#[derive(Debug, Deserialize, Clone)]
pub struct PostgresSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_pool_size() -> usize {
    16
}

/// Synchronization behaviour and schedule configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct SyncSettings {
    /// Upsert batch size for trd_buy / lots / contracts.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Participants arrive denser, so they use a smaller batch.
    #[serde(default = "default_participant_batch_size")]
    pub participant_batch_size: usize,
    /// Years covered by a full sync. Empty means current + previous year.
    #[serde(default)]
    pub years: Vec<i32>,
    #[serde(default = "default_full_sync_interval_secs")]
    pub full_sync_interval_secs: u64,
    #[serde(default = "default_delta_sync_interval_secs")]
    pub delta_sync_interval_secs: u64,
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
    /// Raw response archive retention for the cleanup job.
    #[serde(default = "default_raw_retention_days")]
    pub raw_retention_days: i64,
}

fn default_batch_size() -> usize {
    1000
}

fn default_participant_batch_size() -> usize {
    500
}

fn default_full_sync_interval_secs() -> u64 {
    1800 // 30 minutes
}

fn default_delta_sync_interval_secs() -> u64 {
    300 // 5 minutes
}

fn default_cleanup_interval_secs() -> u64 {
    86400 // daily
}

fn default_raw_retention_days() -> i64 {
    90
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            participant_batch_size: default_participant_batch_size(),
            years: Vec::new(),
            full_sync_interval_secs: default_full_sync_interval_secs(),
            delta_sync_interval_secs: default_delta_sync_interval_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            raw_retention_days: default_raw_retention_days(),
        }
    }
}

/// Root application configuration.
///
/// Loaded from `config.yaml` at startup.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub goszakup: GoszakupSettings,
    pub postgres: PostgresSettings,
    #[serde(default)]
    pub sync: SyncSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("config"))
            .build()?;

        let settings: Settings = s.try_deserialize()?;

        Ok(settings)
    }
}
