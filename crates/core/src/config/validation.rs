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
    /// - `cache_name` or `static_pattern` is empty
    /// - `origin` is not an http(s) URL
    /// - a `bypass_methods` entry is not an upper-case method token
    /// - a `manifest` entry does not resolve against `origin`
    /// - `max_bytes` is 0 or exceeds 100MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_name.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "cache_name".into(), reason: "must not be empty".into() });
        }

        if self.static_pattern.is_empty() {
            return Err(ConfigError::Invalid { field: "static_pattern".into(), reason: "must not be empty".into() });
        }

        let origin = self.origin_url()?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                field: "origin".into(),
                reason: format!("unsupported scheme: {}", origin.scheme()),
            });
        }

        if let Some(method) = self
            .bypass_methods
            .iter()
            .find(|m| m.is_empty() || !m.chars().all(|c| c.is_ascii_uppercase()))
        {
            return Err(ConfigError::Invalid {
                field: "bypass_methods".into(),
                reason: format!("not an upper-case method token: {method:?}"),
            });
        }

        self.manifest_urls()?;

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 100 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 100MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.always_live_patterns.iter().any(|p| p == &self.static_pattern) {
            tracing::warn!(
                static_pattern = %self.static_pattern,
                "static_pattern is also an always-live pattern; \
                 every static asset will bypass the cache"
            );
        }

        Ok(())
    }
}
