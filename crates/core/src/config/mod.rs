//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (WARDEN_*)
//! 2. TOML config file (if WARDEN_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::policy::StaticMatch;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (WARDEN_*)
/// 2. TOML config file (if WARDEN_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Name of the cache store used by the engine.
    ///
    /// Changing it starts a new, empty generation; the old one is left in place.
    #[serde(default = "default_cache_name")]
    pub cache_name: String,

    /// Path to SQLite cache database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Base URL that relative request and manifest URLs are resolved against.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Marker identifying static asset URLs.
    #[serde(default = "default_static_pattern")]
    pub static_pattern: String,

    /// How `static_pattern` is tested against a URL.
    #[serde(default)]
    pub static_match: StaticMatch,

    /// URL substrings that always bypass the cache.
    #[serde(default = "default_always_live_patterns")]
    pub always_live_patterns: Vec<String>,

    /// Methods that always bypass the cache.
    #[serde(default = "default_bypass_methods")]
    pub bypass_methods: Vec<String>,

    /// URLs fetched and stored at installation.
    #[serde(default)]
    pub manifest: Vec<String>,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_cache_name() -> String {
    "warden-resources".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./warden-cache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_static_pattern() -> String {
    "static".into()
}

fn default_always_live_patterns() -> Vec<String> {
    vec!["statsig-prod-web-sdk.min.js".into()]
}

fn default_bypass_methods() -> Vec<String> {
    ["POST", "PUT", "PATCH", "DELETE"].into_iter().map(String::from).collect()
}

fn default_user_agent() -> String {
    "warden/0.1".into()
}

fn default_max_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_name: default_cache_name(),
            db_path: default_db_path(),
            origin: default_origin(),
            static_pattern: default_static_pattern(),
            static_match: StaticMatch::default(),
            always_live_patterns: default_always_live_patterns(),
            bypass_methods: default_bypass_methods(),
            manifest: Vec::new(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The parsed origin URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.origin).map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })
    }

    /// Resolve a possibly relative URL against the origin.
    pub fn resolve(&self, input: &str) -> Result<Url, ConfigError> {
        self.origin_url()?
            .join(input.trim())
            .map_err(|e| ConfigError::Invalid { field: "url".into(), reason: format!("{input}: {e}") })
    }

    /// Manifest entries resolved against the origin, in order.
    pub fn manifest_urls(&self) -> Result<Vec<Url>, ConfigError> {
        self.manifest.iter().map(|entry| self.resolve(entry)).collect()
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `WARDEN_`
    /// 2. TOML file from `WARDEN_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("WARDEN_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("WARDEN_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.cache_name, "warden-resources");
        assert_eq!(config.db_path, PathBuf::from("./warden-cache.sqlite"));
        assert_eq!(config.static_pattern, "static");
        assert_eq!(config.static_match, StaticMatch::Substring);
        assert_eq!(config.always_live_patterns, vec!["statsig-prod-web-sdk.min.js".to_string()]);
        assert_eq!(config.bypass_methods, vec!["POST", "PUT", "PATCH", "DELETE"]);
        assert!(config.manifest.is_empty());
        assert_eq!(config.timeout_ms, 20_000);
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_resolve_relative() {
        let config = AppConfig::default();
        let url = config.resolve("/static/app.wasm").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/static/app.wasm");
    }

    #[test]
    fn test_resolve_absolute_wins() {
        let config = AppConfig::default();
        let url = config.resolve("https://cdn.example.com/lib.js").unwrap();
        assert_eq!(url.host_str(), Some("cdn.example.com"));
    }

    #[test]
    fn test_manifest_urls_keep_order() {
        let config = AppConfig { manifest: vec!["/index.html".into(), "/static/app.wasm".into()], ..Default::default() };
        let urls = config.manifest_urls().unwrap();
        assert_eq!(urls[0].path(), "/index.html");
        assert_eq!(urls[1].path(), "/static/app.wasm");
    }

    #[test]
    fn test_load_layers_env_over_toml() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "warden.toml",
                r#"
                cache_name = "from-file"
                static_pattern = "assets"
                manifest = ["/index.html"]
                "#,
            )?;
            jail.set_env("WARDEN_CONFIG_FILE", "warden.toml");
            jail.set_env("WARDEN_CACHE_NAME", "from-env");

            let config = AppConfig::load().expect("config should load");
            assert_eq!(config.cache_name, "from-env");
            assert_eq!(config.static_pattern, "assets");
            assert_eq!(config.manifest, vec!["/index.html".to_string()]);
            Ok(())
        });
    }
}
