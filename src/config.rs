use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::core::query::SchemaName;
use crate::core::retry::RetryPolicy;

/// Application configuration
///
/// Built once at start-up and handed by reference to every component.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub address: ServiceSettings,
    pub inference: ServiceSettings,
    pub bucket: BucketSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub export: ExportSettings,
    #[serde(default)]
    pub prediction: PredictionSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    /// Environment name, used as the schema qualifier for every table
    #[serde(default = "default_schema")]
    pub schema: String,
    pub connect_timeout_secs: Option<u64>,
    /// Upper bound for a single statement; the session is dropped when it is hit
    pub query_timeout_secs: Option<u64>,
}

impl DatabaseSettings {
    pub fn schema_name(&self) -> Result<SchemaName, ConfigError> {
        SchemaName::parse(&self.schema).map_err(|e| ConfigError::Message(e.to_string()))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.unwrap_or(5))
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs.unwrap_or(30))
    }
}

fn default_schema() -> String { "public".to_string() }

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// Redis URL; without it predictions are cached in process only
    pub redis_url: Option<String>,
    pub ttl_secs: Option<u64>,
    pub l1_cache_size: Option<u64>,
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs.unwrap_or(300))
    }
}

/// External HTTP service endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSettings {
    pub base_url: String,
    pub timeout_secs: Option<u64>,
}

impl ServiceSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(30))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BucketSettings {
    pub endpoint: String,
    #[serde(default = "default_region")]
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub name: String,
    #[serde(default = "default_url_expiry")]
    pub url_expires_in_secs: u32,
    /// Create the bucket at start-up (local S3 emulators)
    #[serde(default)]
    pub verify_on_startup: bool,
}

fn default_region() -> String { "us-east-1".to_string() }
fn default_url_expiry() -> u32 { 3600 }

#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.backoff_ms))
    }
}

fn default_max_attempts() -> u32 { 5 }
fn default_backoff_ms() -> u64 { 2000 }

#[derive(Debug, Clone, Deserialize)]
pub struct ExportSettings {
    #[serde(default = "default_export_page_size")]
    pub page_size: u32,
    #[serde(default = "default_export_prefix")]
    pub prefix: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            page_size: default_export_page_size(),
            prefix: default_export_prefix(),
        }
    }
}

fn default_export_page_size() -> u32 { 100 }
fn default_export_prefix() -> String { "models".to_string() }

#[derive(Debug, Clone, Deserialize)]
pub struct PredictionSettings {
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

impl Default for PredictionSettings {
    fn default() -> Self {
        Self {
            deadline_secs: default_deadline_secs(),
        }
    }
}

impl PredictionSettings {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

fn default_deadline_secs() -> u64 { 30 }

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

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Environment variables (prefixed with PROPERTY_)
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., PROPERTY__DATABASE__SCHEMA -> database.schema
            .add_source(
                Environment::with_prefix("PROPERTY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings = substitute_env_vars(settings)?;

        let settings: Settings = settings.try_deserialize()?;
        settings.database.schema_name()?;
        Ok(settings)
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("PROPERTY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = settings.try_deserialize()?;
        settings.database.schema_name()?;
        Ok(settings)
    }
}

/// Apply well-known unprefixed variables on top of the loaded sources
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let mut builder = Config::builder().add_source(settings);

    if let Ok(database_url) = env::var("DATABASE_URL") {
        builder = builder.set_override("database.url", database_url)?;
    }
    if let Ok(environment) = env::var("ENVIRONMENT") {
        builder = builder.set_override("database.schema", environment)?;
    }

    builder.build()
}
