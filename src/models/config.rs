//! Application configuration structures.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::{FixedOffset, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::utils::retry::RetryPolicy;

/// Deployment environment that scopes every archive path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Ci,
    Prod,
}

impl Environment {
    pub const ALL: [Environment; 3] = [Environment::Dev, Environment::Ci, Environment::Prod];

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Ci => "ci",
            Environment::Prod => "prod",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        Environment::ALL
            .into_iter()
            .find(|env| env.as_str() == s)
            .ok_or_else(|| AppError::config(format!("Invalid environment: {s}")))
    }
}

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Archive namespace settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Retry policy for network transfers
    #[serde(default)]
    pub retry: RetryConfig,

    /// Wall-clock settings for snapshot timestamps
    #[serde(default)]
    pub clock: ClockConfig,

    /// Raw report source settings
    #[serde(default)]
    pub source: SourceConfig,

    /// Reference data locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Apply overrides from process environment variables.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(env) = lookup("ENVIRONMENT") {
            self.store.environment = Some(env.parse()?);
        }
        if let Some(bucket) = lookup("S3_BUCKET").or_else(|| lookup("GCS_BUCKET")) {
            self.store.bucket = Some(bucket);
        }
        if let Some(root) = lookup("STORE_ROOT") {
            self.store.root = Some(PathBuf::from(root));
        }
        if let Some(url) = lookup("REPORT_SOURCE_URL") {
            self.source.url = Some(url);
        }
        if let Some(file) = lookup("REPORT_SOURCE_FILE") {
            self.source.file = Some(PathBuf::from(file));
        }
        Ok(())
    }

    /// Resolved deployment environment.
    pub fn environment(&self) -> Result<Environment> {
        self.store
            .environment
            .ok_or_else(|| AppError::config("ENVIRONMENT is not set"))
    }

    /// Resolved archive bucket name.
    pub fn bucket(&self) -> Result<&str> {
        match self.store.bucket.as_deref().map(str::trim) {
            Some(bucket) if !bucket.is_empty() => Ok(bucket),
            _ => Err(AppError::config("S3_BUCKET is not set")),
        }
    }

    /// Current wall-clock time in the configured offset, truncated to seconds.
    pub fn now(&self) -> Result<NaiveDateTime> {
        let offset = self.clock.offset()?;
        let local = Utc::now().with_timezone(&offset).naive_local();
        Ok(crate::report::truncate_to_second(local))
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        self.environment()?;
        self.bucket()?;
        self.clock.offset()?;
        if self.retry.max_attempts == 0 {
            return Err(AppError::config("retry.max_attempts must be > 0"));
        }
        if self.retry.multiplier < 1.0 {
            return Err(AppError::config("retry.multiplier must be >= 1"));
        }
        if self.retry.max_delay_secs < self.retry.initial_delay_secs {
            return Err(AppError::config(
                "retry.max_delay_secs must be >= retry.initial_delay_secs",
            ));
        }
        if let Some(url) = &self.source.url {
            url::Url::parse(url)?;
        }
        if self.source.timeout_secs == 0 {
            return Err(AppError::config("source.timeout_secs must be > 0"));
        }
        Ok(())
    }
}

/// Which object-store backend holds the archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Directory tree on the local filesystem
    #[default]
    Local,
    /// AWS S3 bucket
    S3,
}

/// Archive namespace settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Deployment environment (`dev`, `ci`, `prod`)
    #[serde(default)]
    pub environment: Option<Environment>,

    /// Bucket (namespace root) name
    #[serde(default)]
    pub bucket: Option<String>,

    /// Backend implementation
    #[serde(default)]
    pub backend: Backend,

    /// Parent directory for the local backend; the bucket is a subdirectory
    #[serde(default)]
    pub root: Option<PathBuf>,
}

impl StoreConfig {
    /// Directory holding the local backend's namespace.
    pub fn local_root(&self, bucket: &str) -> PathBuf {
        self.root
            .clone()
            .unwrap_or_else(defaults::store_root)
            .join(bucket)
    }
}

/// Retry policy settings. Delays are in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "defaults::initial_delay")]
    pub initial_delay_secs: u64,

    #[serde(default = "defaults::max_delay")]
    pub max_delay_secs: u64,

    #[serde(default = "defaults::multiplier")]
    pub multiplier: f64,
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_secs(self.initial_delay_secs),
            max_delay: Duration::from_secs(self.max_delay_secs),
            multiplier: self.multiplier,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            initial_delay_secs: defaults::initial_delay(),
            max_delay_secs: defaults::max_delay(),
            multiplier: defaults::multiplier(),
        }
    }
}

/// Clock settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Offset from UTC, in hours, of the retrieval wall clock
    #[serde(default = "defaults::utc_offset_hours")]
    pub utc_offset_hours: i32,
}

impl ClockConfig {
    pub fn offset(&self) -> Result<FixedOffset> {
        self.utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                AppError::config(format!(
                    "clock.utc_offset_hours out of range: {}",
                    self.utc_offset_hours
                ))
            })
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: defaults::utc_offset_hours(),
        }
    }
}

/// Raw report source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Pre-exported raw CSV to pick up
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Export URL serving the raw CSV
    #[serde(default)]
    pub url: Option<String>,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            file: None,
            url: None,
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Reference data locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "defaults::facilities")]
    pub facilities: PathBuf,

    #[serde(default = "defaults::distances")]
    pub distances: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            facilities: defaults::facilities(),
            distances: defaults::distances(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Retry defaults
    pub fn max_attempts() -> u32 {
        5
    }
    pub fn initial_delay() -> u64 {
        4
    }
    pub fn max_delay() -> u64 {
        15
    }
    pub fn multiplier() -> f64 {
        2.0
    }

    // Clock defaults (US Eastern standard time)
    pub fn utc_offset_hours() -> i32 {
        -5
    }

    // Source defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; waitlist-tracker/0.1)".into()
    }
    pub fn timeout() -> u64 {
        60
    }

    // Path defaults
    pub fn store_root() -> PathBuf {
        PathBuf::from("data/archive")
    }
    pub fn facilities() -> PathBuf {
        PathBuf::from("data/centers_geocoded.jsonl")
    }
    pub fn distances() -> PathBuf {
        PathBuf::from("data/centers_distance.txt")
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
