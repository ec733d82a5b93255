//! Configuration management.
//!
//! Hierarchical configuration using figment: programmatic defaults,
//! an optional project YAML file, and `GASTOWN_`-prefixed environment
//! variable overrides (highest priority), validated after extraction.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::models::{Strategy, VerificationStrictness};
use crate::services::RetentionPolicy;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid max_parallel_tasks: {0}. Must be between 1 and 64")]
    InvalidMaxParallel(usize),

    #[error("Invalid default_max_attempts: {0}. Cannot be 0")]
    InvalidMaxAttempts(u32),

    #[error("Invalid session_timeout_ms: {0}. Must be positive")]
    InvalidSessionTimeout(u64),

    #[error("Invalid capture interval_secs: {0}. Must be positive")]
    InvalidCaptureInterval(u64),

    #[error("Retention max_entries cannot be 0")]
    InvalidRetention,

    #[error("Town id cannot be empty")]
    EmptyTownId,

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),
}

/// Fleet manager settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Spawn a polecat when a ready bead has no idle match
    pub auto_spawn: bool,
    /// Retry budget handed to beads that do not specify one
    pub default_max_attempts: u32,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            auto_spawn: true,
            default_max_attempts: 3,
        }
    }
}

/// Ledger retention settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Drop ledger entries older than this many hours (0 disables)
    pub max_age_hours: u64,
    /// Trim the ledger to this many entries (0 disables)
    pub max_entries: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_age_hours: 24 * 7,
            max_entries: 100_000,
        }
    }
}

/// Metric auto-capture settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
        }
    }
}

/// Initial scheduling strategy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub max_parallel_tasks: usize,
    pub session_timeout_ms: u64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            max_parallel_tasks: 4,
            session_timeout_ms: 30 * 60 * 1000,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace | debug | info | warn | error
    pub level: String,
    /// json | pretty
    pub format: String,
    /// Directory for rolling log files; stdout-only when unset
    pub log_dir: Option<String>,
    pub enable_stdout: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
            log_dir: None,
            enable_stdout: true,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GastownConfig {
    /// Identifier of the orchestrated environment; stamped on every
    /// ledger entry
    pub town_id: TownId,
    pub fleet: FleetConfig,
    pub retention: RetentionConfig,
    pub capture: CaptureConfig,
    pub strategy: StrategyConfig,
    pub logging: LoggingConfig,
}

/// Newtype default so an unconfigured town still has a stable name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TownId(pub String);

impl Default for TownId {
    fn default() -> Self {
        Self("gastown".into())
    }
}

impl std::fmt::Display for TownId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl GastownConfig {
    /// The strategy a fresh optimizer is seeded with.
    pub fn initial_strategy(&self) -> Strategy {
        Strategy {
            name: "configured".into(),
            max_parallel_tasks: self.strategy.max_parallel_tasks,
            verification_strictness: VerificationStrictness::Normal,
            max_attempts: self.fleet.default_max_attempts,
            session_timeout_ms: self.strategy.session_timeout_ms,
            role_weights: std::collections::HashMap::new(),
        }
    }

    /// The retention policy applied to the ledger, with zero values
    /// meaning "no limit".
    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            max_age: (self.retention.max_age_hours > 0)
                .then(|| chrono::Duration::hours(self.retention.max_age_hours as i64)),
            max_entries: (self.retention.max_entries > 0).then_some(self.retention.max_entries),
        }
    }
}

/// Configuration loader with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults
    /// 2. `.gastown/config.yaml` (project config)
    /// 3. Environment variables (`GASTOWN_*` prefix, `__` separators)
    pub fn load() -> Result<GastownConfig> {
        let config: GastownConfig = Figment::new()
            .merge(Serialized::defaults(GastownConfig::default()))
            .merge(Yaml::file(".gastown/config.yaml"))
            .merge(Env::prefixed("GASTOWN_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<GastownConfig> {
        let config: GastownConfig = Figment::new()
            .merge(Serialized::defaults(GastownConfig::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading.
    pub fn validate(config: &GastownConfig) -> Result<(), ConfigError> {
        if config.town_id.0.is_empty() {
            return Err(ConfigError::EmptyTownId);
        }

        let parallel = config.strategy.max_parallel_tasks;
        if parallel == 0 || parallel > 64 {
            return Err(ConfigError::InvalidMaxParallel(parallel));
        }
        if config.strategy.session_timeout_ms == 0 {
            return Err(ConfigError::InvalidSessionTimeout(
                config.strategy.session_timeout_ms,
            ));
        }

        if config.fleet.default_max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts(
                config.fleet.default_max_attempts,
            ));
        }

        if config.capture.enabled && config.capture.interval_secs == 0 {
            return Err(ConfigError::InvalidCaptureInterval(
                config.capture.interval_secs,
            ));
        }

        if config.retention.max_entries == 0 && config.retention.max_age_hours == 0 {
            return Err(ConfigError::InvalidRetention);
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        Ok(())
    }
}
