//! Configuration management for crm-sync
//!
//! This module handles loading, parsing, and validating application configuration
//! from YAML files and environment variables.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Remote CRM API configuration
    #[serde(default)]
    pub crm: CrmConfig,

    /// Pagination and classification settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Retry configuration for search calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Event batching configuration
    #[serde(default)]
    pub batch: BatchConfig,

    /// Tenant store and sink database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

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

    /// Load configuration from environment variables with prefix CRM_SYNC_
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Ok(base) = std::env::var("CRM_SYNC_API_BASE_URL") {
            config.crm.api_base_url = base;
        }
        if let Ok(url) = std::env::var("CRM_SYNC_TOKEN_URL") {
            config.crm.token_url = url;
        }
        if let Ok(client_id) = std::env::var("CRM_SYNC_CLIENT_ID") {
            config.crm.client_id = Some(client_id);
        }
        if let Ok(client_secret) = std::env::var("CRM_SYNC_CLIENT_SECRET") {
            config.crm.client_secret = Some(client_secret);
        }

        if let Ok(path) = std::env::var("CRM_SYNC_DATABASE_PATH") {
            config.database.path = path;
        }
        if let Ok(tenant) = std::env::var("CRM_SYNC_TENANT_ID") {
            config.database.tenant_id = Some(tenant);
        }
        if let Ok(dry_run) = std::env::var("CRM_SYNC_DRY_RUN") {
            config.database.dry_run = dry_run
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid CRM_SYNC_DRY_RUN value".to_string()))?;
        }

        if let Ok(level) = std::env::var("CRM_SYNC_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("CRM_SYNC_LOG_FORMAT") {
            config.logging.format = format;
        }

        Ok(config)
    }

    /// Check values that serde defaults cannot guard
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.sync.page_size == 0 || self.sync.page_size > 100 {
            return Err(ConfigError::InvalidValue(
                "sync.page_size must be between 1 and 100".to_string(),
            ));
        }
        if self.batch.flush_threshold == 0 {
            return Err(ConfigError::InvalidValue(
                "batch.flush_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Remote CRM API configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrmConfig {
    /// Base URL of the CRM REST API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// OAuth token endpoint
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// OAuth client identifier
    pub client_id: Option<String>,

    /// OAuth client secret
    pub client_secret: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            token_url: default_token_url(),
            client_id: None,
            client_secret: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.hubapi.com".to_string()
}

fn default_token_url() -> String {
    "https://api.hubapi.com/oauth/v1/token".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

/// Pagination and classification settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncConfig {
    /// Records requested per search page
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Deepest paging offset the search API accepts before re-windowing
    #[serde(default = "default_max_offset")]
    pub max_offset: u64,

    /// Offset subtracted from company-created event instants (milliseconds)
    #[serde(default = "default_company_created_offset")]
    pub company_created_offset_ms: i64,

    /// Watermark assumed for meetings that were never synced
    #[serde(default = "default_meeting_watermark")]
    pub meeting_default_watermark: DateTime<Utc>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_offset: default_max_offset(),
            company_created_offset_ms: default_company_created_offset(),
            meeting_default_watermark: default_meeting_watermark(),
        }
    }
}

fn default_page_size() -> u32 {
    100
}

fn default_max_offset() -> u64 {
    9900
}

fn default_company_created_offset() -> i64 {
    2000
}

fn default_meeting_watermark() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Retry configuration for search calls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Total attempts per page (initial call included)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff base in milliseconds
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Backoff multiplier
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff() -> u64 {
    5000
}

fn default_backoff_multiplier() -> u32 {
    2
}

/// Event batching configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchConfig {
    /// Buffer size that triggers an overflow flush
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            flush_threshold: default_flush_threshold(),
        }
    }
}

fn default_flush_threshold() -> usize {
    2000
}

/// Tenant store and sink database configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Tenant to process (first stored tenant if unset)
    pub tenant_id: Option<String>,

    /// Skip tenant persistence and log events instead of writing them
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            tenant_id: None,
            dry_run: false,
        }
    }
}

fn default_database_path() -> String {
    "/data/db/crm-sync.db".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format
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
}

/// Expand environment variables in a string
///
/// Supports `${VAR_NAME}` syntax; unknown variables are left untouched.
fn expand_env_vars(input: &str) -> String {
    let Ok(re) = regex_lite::Regex::new(r"\$\{([^}]+)\}") else {
        return input.to_string();
    };

    re.replace_all(input, |caps: &regex_lite::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
