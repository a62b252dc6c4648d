//! Request classification.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::AppConfig;
use crate::http::RequestDescriptor;

/// Name of the byte-range request header.
pub const RANGE_HEADER: &str = "range";

/// The strategy class of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Straight to the network; the cache is never touched.
    Bypass,
    /// Network first, cache on network failure.
    Dynamic,
    /// Static asset requested with a byte range; rebuilt without it, then cache first.
    StaticRanged,
    /// Cache first, network on miss.
    Static,
}

impl RequestClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestClass::Bypass => "bypass",
            RequestClass::Dynamic => "dynamic",
            RequestClass::StaticRanged => "static-ranged",
            RequestClass::Static => "static",
        }
    }
}

/// How the static-asset pattern is tested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaticMatch {
    /// Pattern appears anywhere in the full URL.
    #[default]
    Substring,
    /// Pattern equals one of the URL's path segments.
    PathSegment,
}

/// Distinguishes static asset URLs from dynamic ones.
#[derive(Debug, Clone)]
pub struct StaticMatcher {
    pattern: String,
    mode: StaticMatch,
}

impl StaticMatcher {
    pub fn new(pattern: impl Into<String>, mode: StaticMatch) -> Self {
        Self { pattern: pattern.into(), mode }
    }

    pub fn matches(&self, url: &Url) -> bool {
        match self.mode {
            StaticMatch::Substring => url.as_str().contains(&self.pattern),
            StaticMatch::PathSegment => url
                .path_segments()
                .is_some_and(|mut segments| segments.any(|segment| segment == self.pattern)),
        }
    }
}

/// Ordered classification rules; the first match wins.
#[derive(Debug, Clone)]
pub struct Classifier {
    bypass_methods: Vec<String>,
    always_live: Vec<String>,
    static_assets: StaticMatcher,
}

impl Classifier {
    pub fn new(bypass_methods: Vec<String>, always_live: Vec<String>, static_assets: StaticMatcher) -> Self {
        let bypass_methods = bypass_methods.into_iter().map(|m| m.to_ascii_uppercase()).collect();
        Self { bypass_methods, always_live, static_assets }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.bypass_methods.clone(),
            config.always_live_patterns.clone(),
            StaticMatcher::new(config.static_pattern.clone(), config.static_match),
        )
    }

    /// Write methods and always-live URLs never touch the cache.
    pub fn is_bypass(&self, request: &RequestDescriptor) -> bool {
        self.bypass_methods.iter().any(|m| m == request.method())
            || self
                .always_live
                .iter()
                .any(|pattern| request.url().as_str().contains(pattern.as_str()))
    }

    pub fn is_static(&self, request: &RequestDescriptor) -> bool {
        self.static_assets.matches(request.url())
    }

    pub fn classify(&self, request: &RequestDescriptor) -> RequestClass {
        if self.is_bypass(request) {
            RequestClass::Bypass
        } else if !self.is_static(request) {
            RequestClass::Dynamic
        } else if request.headers().contains(RANGE_HEADER) {
            RequestClass::StaticRanged
        } else {
            RequestClass::Static
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}
