//! Configuration management for ranked-mirror
//!
//! This module handles loading, parsing, and validating application configuration
//! from YAML files and environment variables.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::models::LeagueBracket;
use crate::store::HistoryPolicy;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Remote API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Quota configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Ladder synchronization configuration
    #[serde(default)]
    pub sync: SyncConfig,

    /// Retry configuration for page fetches
    #[serde(default)]
    pub retry: RetryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(yaml);
        serde_yaml::from_str(&expanded)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML: {}", e)))
    }

    /// Load configuration from environment variables with prefix RANKED_MIRROR_
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Ok(key) = std::env::var("RANKED_MIRROR_API_KEY") {
            config.api.api_key = Some(key);
        }
        if let Ok(base_url) = std::env::var("RANKED_MIRROR_API_BASE_URL") {
            config.api.base_url = base_url;
        }
        if let Ok(tier) = std::env::var("RANKED_MIRROR_ACCOUNT_TIER") {
            config.rate_limit.account_tier = tier.parse()?;
        }
        if let Ok(path) = std::env::var("RANKED_MIRROR_STORE_PATH") {
            config.sync.store_path = path;
        }
        if let Ok(shards) = std::env::var("RANKED_MIRROR_SHARDS") {
            config.sync.shards = split_list(&shards);
        }
        if let Ok(level) = std::env::var("RANKED_MIRROR_LOG_LEVEL") {
            config.logging.level = level;
        }

        Ok(config)
    }

    /// Check cross-field constraints that serde defaults cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingRequired("api.api_key".to_string()));
        }
        if !(0.0..1.0).contains(&self.rate_limit.margin) {
            return Err(ConfigError::InvalidValue(format!(
                "rate_limit.margin must be in [0, 1), got {}",
                self.rate_limit.margin
            )));
        }
        if self.sync.shards.is_empty() {
            return Err(ConfigError::MissingRequired("sync.shards".to_string()));
        }
        if self.sync.queue_types.is_empty() {
            return Err(ConfigError::MissingRequired("sync.queue_types".to_string()));
        }
        if self.sync.max_shards == Some(0) {
            return Err(ConfigError::InvalidValue(
                "sync.max_shards must be at least 1".to_string(),
            ));
        }
        self.rate_limit.route_limits()?;
        Ok(())
    }
}

/// Remote API configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    /// API key sent with every request
    #[serde(default)]
    pub api_key: Option<String>,

    /// Header that carries the API key
    #[serde(default = "default_key_header")]
    pub key_header: String,

    /// Base URL template; `{platform}` is replaced by the shard id
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            key_header: default_key_header(),
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_key_header() -> String {
    "X-Riot-Token".to_string()
}

fn default_base_url() -> String {
    "https://{platform}.api.riotgames.com".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Account tier selecting the static route quota table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountTier {
    /// Personal / development key
    #[default]
    Development,
    /// Production key
    Production,
}

impl std::str::FromStr for AccountTier {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(AccountTier::Development),
            "production" | "prod" => Ok(AccountTier::Production),
            _ => Err(ConfigError::InvalidValue(format!(
                "Unknown account tier: {}",
                s
            ))),
        }
    }
}

impl std::fmt::Display for AccountTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountTier::Development => write!(f, "development"),
            AccountTier::Production => write!(f, "production"),
        }
    }
}

/// One `(threshold, period)` rule
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WindowConfig {
    /// Calls allowed per period
    pub threshold: u32,
    /// Period length in seconds
    pub period_secs: u64,
}

impl WindowConfig {
    /// Shorthand constructor
    pub const fn new(threshold: u32, period_secs: u64) -> Self {
        Self {
            threshold,
            period_secs,
        }
    }
}

/// Quota configuration for the request dispatcher
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitConfig {
    /// Tier whose route table applies
    #[serde(default)]
    pub account_tier: AccountTier,

    /// Route-scope limits per account tier
    #[serde(default = "default_tier_limits")]
    pub tiers: BTreeMap<AccountTier, Vec<WindowConfig>>,

    /// Headroom fraction subtracted from every threshold
    #[serde(default = "default_margin")]
    pub margin: f64,

    /// Minimum wait after a quota-exceeded response (milliseconds)
    #[serde(default = "default_fallback_wait")]
    pub fallback_wait_ms: u64,

    /// Upper bound on total quota wait for a single request (seconds)
    #[serde(default)]
    pub max_wait_secs: Option<u64>,

    /// Header names and status code of the quota protocol
    #[serde(default)]
    pub protocol: QuotaProtocolConfig,
}

impl RateLimitConfig {
    /// Route windows for the configured account tier
    pub fn route_limits(&self) -> Result<Vec<WindowConfig>, ConfigError> {
        match self.tiers.get(&self.account_tier) {
            Some(windows) if !windows.is_empty() => Ok(windows.clone()),
            _ => Err(ConfigError::MissingRequired(format!(
                "rate_limit.tiers.{}",
                self.account_tier
            ))),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            account_tier: AccountTier::default(),
            tiers: default_tier_limits(),
            margin: default_margin(),
            fallback_wait_ms: default_fallback_wait(),
            max_wait_secs: None,
            protocol: QuotaProtocolConfig::default(),
        }
    }
}

fn default_tier_limits() -> BTreeMap<AccountTier, Vec<WindowConfig>> {
    BTreeMap::from([
        (
            AccountTier::Development,
            vec![WindowConfig::new(20, 1), WindowConfig::new(100, 120)],
        ),
        (
            AccountTier::Production,
            vec![WindowConfig::new(500, 10), WindowConfig::new(30000, 600)],
        ),
    ])
}

fn default_margin() -> f64 {
    0.05
}

fn default_fallback_wait() -> u64 {
    1000
}

/// Names used by the remote service to advertise quota state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuotaProtocolConfig {
    /// Application-scope limit definition header
    #[serde(default = "default_app_limit_header")]
    pub app_limit_header: String,

    /// Application-scope usage header
    #[serde(default = "default_app_count_header")]
    pub app_count_header: String,

    /// Method-scope limit definition header
    #[serde(default = "default_method_limit_header")]
    pub method_limit_header: String,

    /// Method-scope usage header
    #[serde(default = "default_method_count_header")]
    pub method_count_header: String,

    /// Optional server hint in seconds
    #[serde(default = "default_retry_after_header")]
    pub retry_after_header: String,

    /// Status code that signals an exceeded quota
    #[serde(default = "default_quota_exceeded_status")]
    pub quota_exceeded_status: u16,
}

impl Default for QuotaProtocolConfig {
    fn default() -> Self {
        Self {
            app_limit_header: default_app_limit_header(),
            app_count_header: default_app_count_header(),
            method_limit_header: default_method_limit_header(),
            method_count_header: default_method_count_header(),
            retry_after_header: default_retry_after_header(),
            quota_exceeded_status: default_quota_exceeded_status(),
        }
    }
}

fn default_app_limit_header() -> String {
    "X-App-Rate-Limit".to_string()
}

fn default_app_count_header() -> String {
    "X-App-Rate-Limit-Count".to_string()
}

fn default_method_limit_header() -> String {
    "X-Method-Rate-Limit".to_string()
}

fn default_method_count_header() -> String {
    "X-Method-Rate-Limit-Count".to_string()
}

fn default_retry_after_header() -> String {
    "Retry-After".to_string()
}

fn default_quota_exceeded_status() -> u16 {
    429
}

/// Ladder synchronization configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncConfig {
    /// Server shards (platform ids) to iterate
    #[serde(default = "default_shards")]
    pub shards: Vec<String>,

    /// Ranked queue types to iterate
    #[serde(default = "default_queue_types")]
    pub queue_types: Vec<String>,

    /// League bracket fetched per shard and queue
    #[serde(default)]
    pub bracket: LeagueBracket,

    /// Debug option: only iterate the first N shards
    #[serde(default)]
    pub max_shards: Option<usize>,

    /// Path of the CSV mirror file
    #[serde(default = "default_store_path")]
    pub store_path: String,

    /// History de-duplication policy
    #[serde(default)]
    pub history_policy: HistoryPolicy,

    /// Interval between full runs in seconds
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Delay before the first run in seconds
    #[serde(default)]
    pub initial_delay_secs: u64,

    /// Random jitter added to each interval in seconds
    #[serde(default = "default_jitter_secs")]
    pub jitter_secs: u64,

    /// Timeout for a single full run in seconds
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            shards: default_shards(),
            queue_types: default_queue_types(),
            bracket: LeagueBracket::default(),
            max_shards: None,
            store_path: default_store_path(),
            history_policy: HistoryPolicy::default(),
            interval_secs: default_interval(),
            initial_delay_secs: 0,
            jitter_secs: default_jitter_secs(),
            run_timeout_secs: default_run_timeout(),
        }
    }
}

fn default_shards() -> Vec<String> {
    [
        "br1", "eun1", "euw1", "jp1", "kr", "la1", "la2", "na1", "oc1", "tr1", "ru", "ph2", "sg2",
        "th2", "tw2", "vn2",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_queue_types() -> Vec<String> {
    vec!["RANKED_SOLO_5x5".to_string(), "RANKED_FLEX_SR".to_string()]
}

fn default_store_path() -> String {
    "data/players.csv".to_string()
}

fn default_interval() -> u64 {
    3600 // 1 hour
}

fn default_jitter_secs() -> u64 {
    60
}

fn default_run_timeout() -> u64 {
    6 * 3600
}

/// Retry configuration for page fetches
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff duration in seconds
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_secs: u64,

    /// Maximum backoff duration in seconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,

    /// Backoff multiplier
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Whether to add jitter to backoff
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_secs: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: default_jitter(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    5
}

fn default_max_backoff() -> u64 {
    300
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> bool {
    true
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (`json` or `pretty`)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Configuration error types
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read configuration file: {0}")]
    FileRead(String),

    /// Error parsing configuration
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

/// Expand environment variables in a string
///
/// Supports `${VAR_NAME}` syntax
fn expand_env_vars(input: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .expect("Invalid regex pattern for environment variable expansion");

    re.replace_all(input, |caps: &regex_lite::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
