use crate::config::error::{ConfigError, Result};
use crate::config::policy::RetryPolicy;
use crate::reporter::ErrorReporter;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CadenceConfig {
    /// Retry engine defaults
    #[serde(default)]
    pub retry: RetrySettings,
}

/// Serializable form of [`RetryPolicy`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Retries after the first attempt
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Overall retry budget in milliseconds
    #[serde(default = "default_max_retry_timeout_ms")]
    pub max_retry_timeout_ms: u64,

    /// Wait before the first retry in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound for a single wait in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Growth factor between waits
    #[serde(default = "default_exponent_factor")]
    pub exponent_factor: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_max_retry_timeout_ms() -> u64 {
    30_000
}

fn default_initial_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_exponent_factor() -> f64 {
    2.0
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            max_retry_timeout_ms: default_max_retry_timeout_ms(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            exponent_factor: default_exponent_factor(),
        }
    }
}

impl RetrySettings {
    /// Validated policy using the default (tracing) error reporter.
    pub fn into_policy(self) -> Result<RetryPolicy> {
        self.into_policy_with(ErrorReporter::default())
    }

    pub fn into_policy_with(self, on_error: ErrorReporter) -> Result<RetryPolicy> {
        let policy = RetryPolicy {
            max_attempts: self.max_attempts,
            max_retry_timeout: Duration::from_millis(self.max_retry_timeout_ms),
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            exponent_factor: self.exponent_factor,
            on_error,
        };
        policy.validate()?;
        Ok(policy)
    }
}

/// Configuration loader with layered merging support
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration with layered merging:
    /// 1. Start with defaults (from Default implementations)
    /// 2. Merge config file if provided
    /// 3. Override with environment variables (CADENCE_ prefix)
    pub fn load(&self) -> Result<CadenceConfig> {
        let mut builder = Config::builder();

        // Layer 1: Defaults (serialize defaults to JSON and load as base)
        let defaults_json = serde_json::to_string(&CadenceConfig::default())?;
        builder = builder.add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        // Layer 2: Config file (if provided)
        if let Some(ref path) = self.config_path {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            builder = builder.add_source(File::from(path.as_ref()));
        }

        // Layer 3: Environment variables, double underscore for nesting
        // Example: CADENCE_RETRY__MAX_ATTEMPTS=5
        builder = builder.add_source(
            Environment::with_prefix("CADENCE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let loaded: CadenceConfig = config.try_deserialize()?;
        loaded.retry.clone().into_policy_with(ErrorReporter::silent())?;
        Ok(loaded)
    }
}
