//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (STRATA_*)
//! 2. TOML config file (if STRATA_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Development-mode storage behavior, decided once at startup.
///
/// `RandomlyClear` wipes persisted state for a fraction of sessions so
/// developers periodically experience the cold-start path; `ForceClear`
/// wipes it every session. The rehydration path itself never branches on
/// the environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DevelopmentBehavior {
    #[default]
    Normal,
    RandomlyClear,
    ForceClear,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (STRATA_*)
/// 2. TOML config file (if STRATA_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite storage database.
    ///
    /// Set via STRATA_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Throttle window for persistence flushes, in milliseconds.
    ///
    /// Set via STRATA_FLUSH_INTERVAL_MS environment variable.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Maximum age of a persisted record before it is ignored, in days.
    ///
    /// Set via STRATA_MAX_STATE_AGE_DAYS environment variable.
    #[serde(default = "default_max_state_age_days")]
    pub max_state_age_days: i64,

    /// Whether state persistence is enabled for this session.
    ///
    /// Disabled for impersonation/support sessions: rehydration then
    /// always falls back to defaults and nothing is written back.
    #[serde(default = "default_true")]
    pub persistence_enabled: bool,

    /// Development-mode storage behavior.
    ///
    /// Set via STRATA_DEVELOPMENT_BEHAVIOR environment variable.
    #[serde(default)]
    pub development_behavior: DevelopmentBehavior,

    /// API version baked into request cache keys.
    ///
    /// Set via STRATA_API_VERSION environment variable.
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./strata-state.sqlite")
}

fn default_flush_interval_ms() -> u64 {
    5_000
}

fn default_max_state_age_days() -> i64 {
    7
}

fn default_true() -> bool {
    true
}

fn default_api_version() -> String {
    "1.1".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            flush_interval_ms: default_flush_interval_ms(),
            max_state_age_days: default_max_state_age_days(),
            persistence_enabled: true,
            development_behavior: DevelopmentBehavior::Normal,
            api_version: default_api_version(),
        }
    }
}

impl AppConfig {
    /// Throttle window as a Duration for use with tokio timers.
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// Maximum record age as a chrono Duration for freshness checks.
    pub fn max_state_age(&self) -> chrono::Duration {
        chrono::Duration::days(self.max_state_age_days)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `STRATA_`
    /// 2. TOML file from `STRATA_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("STRATA_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("STRATA_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
