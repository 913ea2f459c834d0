//! Configuration loader with environment variable expansion

use super::{
    expand_env_vars, Config, ConfigError, DatabaseConfig, FaultInjectionConfig, LogFormat,
    LoggingConfig, MetricsConfig, ServerConfig, StorageConfig, UploadConfig, DEFAULT_PORT,
};
use std::path::Path;
use std::str::FromStr;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text, expanding `${VAR}` placeholders first
    pub fn from_yaml(content: &str) -> Result<Config, ConfigError> {
        let expanded = expand_env_vars(content);
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from the process environment
    ///
    /// Recognized variables:
    /// - `MINIO_ENDPOINT`, `MINIO_ACCESS_KEY`, `MINIO_SECRET_KEY`, `MINIO_USE_SSL`,
    ///   `MINIO_BUCKET`, `MINIO_REGION`
    /// - `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASSWORD`, `DB_NAME`
    /// - `LOG_LEVEL`, `LOG_FORMAT`, `PORT`, `MAX_UPLOAD_BYTES`, `UPLOAD_SPOOL_THRESHOLD`
    pub fn from_env() -> Result<Config, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let storage = StorageConfig {
            endpoint: var("MINIO_ENDPOINT").unwrap_or_default(),
            bucket: var("MINIO_BUCKET").unwrap_or_default(),
            region: var("MINIO_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            access_key: var("MINIO_ACCESS_KEY"),
            secret_key: var("MINIO_SECRET_KEY"),
            use_ssl: var("MINIO_USE_SSL").as_deref() == Some("true"),
            presign_expiry_secs: 3600,
        };

        let database = DatabaseConfig {
            host: var("DB_HOST").unwrap_or_default(),
            port: parse_var(&var, "DB_PORT")?.unwrap_or(5432),
            user: var("DB_USER").unwrap_or_default(),
            password: var("DB_PASSWORD").unwrap_or_default(),
            name: var("DB_NAME").unwrap_or_default(),
            max_connections: 90,
            idle_timeout_secs: 60,
            max_lifetime_secs: 300,
            acquire_timeout_secs: 10,
        };

        let port: u16 = parse_var(&var, "PORT")?.unwrap_or(DEFAULT_PORT);

        let mut logging = LoggingConfig::default();
        if let Some(level) = var("LOG_LEVEL") {
            logging.level = level.to_lowercase();
        }
        if let Some(format) = var("LOG_FORMAT") {
            logging.format = LogFormat::parse(&format);
        }

        let mut upload = UploadConfig::default();
        if let Some(max) = parse_var(&var, "MAX_UPLOAD_BYTES")? {
            upload.max_file_size = max;
        }
        if let Some(threshold) = parse_var(&var, "UPLOAD_SPOOL_THRESHOLD")? {
            upload.spool_threshold = threshold;
        }

        let config = Config {
            server: ServerConfig {
                address: format!("0.0.0.0:{}", port),
            },
            storage,
            database,
            logging,
            metrics: MetricsConfig::default(),
            upload,
            fault_injection: FaultInjectionConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T, F>(var: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { name, value }),
        None => Ok(None),
    }
}
