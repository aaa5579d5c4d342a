//! TOML configuration for the pipeline, cache, retrieval and provider.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. `validate()` rejects values that would make the pipeline
//! misbehave rather than fail loudly (zero TTL, zero attempts, levels outside
//! (0, 1)).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use hoopstat_core::data::{RapidApiSettings, RetryPolicy};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("missing API key: environment variable {0} is not set")]
    MissingApiKey(String),
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HoopstatConfig {
    pub cache: CacheConfig,
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub pipeline: PipelineConfig,
    pub reference: ReferenceConfig,
    pub provider: ProviderConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    /// On-disk cache directory; in-memory when absent.
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 1000,
            max_backoff_ms: 30_000,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub cooldown_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_secs: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Deadline for a whole multi-player fetch; none when absent.
    pub request_timeout_secs: Option<u64>,
    pub max_concurrency: usize,
    pub outlier_z_threshold: f64,
    pub significance_alpha: f64,
    pub confidence_level: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: Some(30),
            max_concurrency: 8,
            outlier_z_threshold: 3.0,
            significance_alpha: 0.05,
            confidence_level: 0.95,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReferenceConfig {
    /// CSV or TOML reference population.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    pub base_url: String,
    pub host: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://basketball-head.p.rapidapi.com".into(),
            host: "basketball-head.p.rapidapi.com".into(),
            api_key_env: "RAPIDAPI_KEY".into(),
            timeout_secs: 15,
        }
    }
}

impl ProviderConfig {
    /// Provider settings with the key read from `api_key_env`.
    pub fn rapidapi_settings(&self) -> Result<RapidApiSettings, ConfigError> {
        let api_key = std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingApiKey(self.api_key_env.clone()))?;
        Ok(RapidApiSettings {
            base_url: self.base_url.clone(),
            host: self.host.clone(),
            api_key,
            timeout: Duration::from_secs(self.timeout_secs),
        })
    }
}

impl HoopstatConfig {
    /// Load and validate a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.ttl_secs == 0 {
            return Err(invalid("cache.ttl_secs", "must be greater than 0"));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", "must be at least 1"));
        }
        if self.retry.base_backoff_ms > self.retry.max_backoff_ms {
            return Err(invalid(
                "retry.base_backoff_ms",
                "must not exceed retry.max_backoff_ms",
            ));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(invalid("circuit_breaker.failure_threshold", "must be at least 1"));
        }
        if self.pipeline.max_concurrency == 0 {
            return Err(invalid("pipeline.max_concurrency", "must be at least 1"));
        }
        if self.pipeline.request_timeout_secs == Some(0) {
            return Err(invalid(
                "pipeline.request_timeout_secs",
                "must be greater than 0 (omit for no deadline)",
            ));
        }
        let z = self.pipeline.outlier_z_threshold;
        if !(z.is_finite() && z > 0.0) {
            return Err(invalid("pipeline.outlier_z_threshold", format!("{z} is not positive")));
        }
        for (field, v) in [
            ("pipeline.significance_alpha", self.pipeline.significance_alpha),
            ("pipeline.confidence_level", self.pipeline.confidence_level),
        ] {
            if !(v > 0.0 && v < 1.0) {
                return Err(invalid(field, format!("{v} is outside (0, 1)")));
            }
        }
        if self.provider.timeout_secs == 0 {
            return Err(invalid("provider.timeout_secs", "must be greater than 0"));
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.pipeline.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn breaker_cooldown(&self) -> Duration {
        Duration::from_secs(self.circuit_breaker.cooldown_secs)
    }
}
