//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `flush_interval_ms` is below 100ms or above 5 minutes
    /// - `max_state_age_days` is outside [1, 365]
    /// - `api_version` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flush_interval_ms < 100 {
            return Err(ConfigError::Invalid {
                field: "flush_interval_ms".into(),
                reason: "must be at least 100ms".into(),
            });
        }
        if self.flush_interval_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "flush_interval_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.max_state_age_days < 1 {
            return Err(ConfigError::Invalid {
                field: "max_state_age_days".into(),
                reason: "must be at least 1 day".into(),
            });
        }
        if self.max_state_age_days > 365 {
            return Err(ConfigError::Invalid {
                field: "max_state_age_days".into(),
                reason: "must not exceed 365 days".into(),
            });
        }

        if self.api_version.is_empty() {
            return Err(ConfigError::Invalid { field: "api_version".into(), reason: "must not be empty".into() });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_flush_interval_too_small() {
        let config = AppConfig { flush_interval_ms: 50, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "flush_interval_ms"));
    }

    #[test]
    fn test_validate_flush_interval_exceeds_limit() {
        let config = AppConfig { flush_interval_ms: 301_000, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "flush_interval_ms"));
    }

    #[test]
    fn test_validate_max_age_zero() {
        let config = AppConfig { max_state_age_days: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_state_age_days"));
    }

    #[test]
    fn test_validate_max_age_exceeds_limit() {
        let config = AppConfig { max_state_age_days: 366, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_state_age_days"));
    }

    #[test]
    fn test_validate_empty_api_version() {
        let config = AppConfig { api_version: String::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "api_version"));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig { flush_interval_ms: 100, max_state_age_days: 1, ..Default::default() };
        assert!(config.validate().is_ok());

        let config = AppConfig { flush_interval_ms: 300_000, max_state_age_days: 365, ..Default::default() };
        assert!(config.validate().is_ok());
    }
}
