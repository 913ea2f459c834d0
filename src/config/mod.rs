//! Configuration module for the video upload service
//!
//! Configuration comes either from a YAML file (with environment variable
//! expansion) or directly from the process environment. Both paths end in
//! [`Config::validate`].

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in a string.
///
/// Supports two syntaxes:
/// - `${VAR_NAME}` - Simple expansion, keeps placeholder if var not found
/// - `${VAR_NAME:-default}` - Expansion with default value
///
/// # Examples
///
/// ```ignore
/// std::env::set_var("MY_VAR", "value");
/// let result = expand_env_vars("prefix-${MY_VAR}-suffix");
/// assert_eq!(result, "prefix-value-suffix");
///
/// let result = expand_env_vars("${MISSING:-default}");
/// assert_eq!(result, "default");
/// ```
pub(crate) fn expand_env_vars(s: &str) -> String {
    let re = match regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}") {
        Ok(re) => re,
        Err(_) => return s.to_string(),
    };
    let mut last_match = 0;
    let mut result = String::with_capacity(s.len());

    for cap in re.captures_iter(s) {
        let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };

        result.push_str(&s[last_match..full_match.start()]);

        let value = match std::env::var(var_name.as_str()) {
            Ok(val) => val,
            Err(_) => match cap.get(2) {
                Some(default) => default.as_str().to_string(),
                // No env var and no default. Keep the original placeholder.
                None => full_match.as_str().to_string(),
            },
        };
        result.push_str(&value);

        last_match = full_match.end();
    }

    result.push_str(&s[last_match..]);
    result
}

// ============================================================================
// Validation Helpers
// ============================================================================

fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub fault_injection: FaultInjectionConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        ConfigLoader::from_env()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.bucket.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Storage bucket must not be empty".into(),
            ));
        }

        if self.storage.endpoint.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Storage endpoint must not be empty".into(),
            ));
        }

        // The endpoint is host[:port]; the scheme comes from `use_ssl`
        if is_valid_http_url(&self.storage.endpoint) {
            return Err(ConfigError::ValidationError(format!(
                "Storage endpoint '{}' must not include a scheme, use `use_ssl` instead",
                self.storage.endpoint
            )));
        }

        if self.database.host.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Database host must not be empty".into(),
            ));
        }

        if self.database.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Database name must not be empty".into(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "Database max_connections must be greater than 0".into(),
            ));
        }

        if self.upload.max_file_size == 0 {
            return Err(ConfigError::ValidationError(
                "Upload max_file_size must be greater than 0".into(),
            ));
        }

        if self.logging.service_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Logging service_name must not be empty".into(),
            ));
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
        }
    }
}

fn default_address() -> String {
    format!("0.0.0.0:{}", DEFAULT_PORT)
}

/// Port used when neither the file nor `PORT` sets one
pub const DEFAULT_PORT: u16 = 8080;

/// S3-compatible object storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `host[:port]` of the object store, without scheme
    pub endpoint: String,
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub use_ssl: bool,
    /// Lifetime of generated download links
    #[serde(default = "default_presign_expiry")]
    pub presign_expiry_secs: u64,
}

impl StorageConfig {
    /// Full endpoint URL including the scheme selected by `use_ssl`
    pub fn endpoint_url(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!("{}://{}", scheme, self.endpoint)
    }

    pub fn presign_expiry(&self) -> Duration {
        Duration::from_secs(self.presign_expiry_secs)
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_presign_expiry() -> u64 {
    3600
}

/// PostgreSQL configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub name: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_secs: u64,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

fn default_db_port() -> u16 {
    5432
}

fn default_max_connections() -> u32 {
    90
}

fn default_idle_timeout() -> u64 {
    60
}

fn default_max_lifetime() -> u64 {
    300 // 5 minutes
}

fn default_acquire_timeout() -> u64 {
    10
}

/// Output format for the process logger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON under Kubernetes, console otherwise
    #[default]
    Auto,
    Json,
    Pretty,
}

impl LogFormat {
    /// Parse a format name, falling back to `Auto`
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" | "console" | "text" => LogFormat::Pretty,
            _ => LogFormat::Auto,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            service_name: default_service_name(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "video-upload-service".to_string()
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Largest accepted `video` part in bytes
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Parts larger than this are buffered in a temporary file
    #[serde(default = "default_spool_threshold")]
    pub spool_threshold: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            spool_threshold: default_spool_threshold(),
        }
    }
}

fn default_spool_threshold() -> usize {
    crate::storage::DEFAULT_SPOOL_THRESHOLD
}

fn default_max_file_size() -> u64 {
    1024 * 1024 * 1024 // 1GB
}

/// Self-test fault injection (`GET /crash`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultInjectionConfig {
    #[serde(default = "default_crash_delay")]
    pub crash_delay_millis: u64,
}

impl Default for FaultInjectionConfig {
    fn default() -> Self {
        Self {
            crash_delay_millis: default_crash_delay(),
        }
    }
}

impl FaultInjectionConfig {
    pub fn crash_delay(&self) -> Duration {
        Duration::from_millis(self.crash_delay_millis)
    }
}

fn default_crash_delay() -> u64 {
    2000
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn test_config() -> Config {
        Config {
            server: ServerConfig::default(),
            storage: StorageConfig {
                endpoint: "localhost:9000".into(),
                bucket: "videos".into(),
                region: default_region(),
                access_key: Some("minioadmin".into()),
                secret_key: Some("minioadmin".into()),
                use_ssl: false,
                presign_expiry_secs: default_presign_expiry(),
            },
            database: DatabaseConfig {
                host: "localhost".into(),
                port: default_db_port(),
                user: "postgres".into(),
                password: "postgres".into(),
                name: "videos".into(),
                max_connections: default_max_connections(),
                idle_timeout_secs: default_idle_timeout(),
                max_lifetime_secs: default_max_lifetime(),
                acquire_timeout_secs: default_acquire_timeout(),
            },
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
            upload: UploadConfig::default(),
            fault_injection: FaultInjectionConfig::default(),
        }
    }

    #[test]
    fn test_default_server_address() {
        assert_eq!(ServerConfig::default().address, "0.0.0.0:8080");
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_config_validation_empty_bucket() {
        let mut config = test_config();
        config.storage.bucket = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_endpoint_with_scheme() {
        let mut config = test_config();
        config.storage.endpoint = "http://localhost:9000".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_pool() {
        let mut config = test_config();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_endpoint_url_follows_ssl_flag() {
        let mut config = test_config();
        assert_eq!(config.storage.endpoint_url(), "http://localhost:9000");
        config.storage.use_ssl = true;
        assert_eq!(config.storage.endpoint_url(), "https://localhost:9000");
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("console"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("whatever"), LogFormat::Auto);
    }

    #[test]
    fn test_expand_env_vars_with_default() {
        let result = expand_env_vars("bucket: ${VIDEO_CFG_TEST_UNSET_VAR:-videos}");
        assert_eq!(result, "bucket: videos");
    }

    #[test]
    fn test_expand_env_vars_keeps_unknown_placeholder() {
        let result = expand_env_vars("key: ${VIDEO_CFG_TEST_OTHER_UNSET}");
        assert_eq!(result, "key: ${VIDEO_CFG_TEST_OTHER_UNSET}");
    }
}
