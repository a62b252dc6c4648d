//! cache_get tool implementation.
//!
//! Looks up a stored response by request identity and returns its metadata.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use warden_client::canonicalize;
use warden_core::cache::hash::{compute_cache_key, key_url};
use warden_core::{AppConfig, CacheDb, Error};

use crate::tools::proxy_fetch::HeaderParam;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Request URL, absolute or relative to the origin.
    pub url: String,

    /// Request method (default: GET).
    #[serde(default)]
    pub method: Option<String>,

    /// Store to look in (default: the configured cache name).
    #[serde(default)]
    pub store: Option<String>,
}

/// Metadata of a stored response; the body itself is not returned.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub key: String,
    pub store: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<HeaderParam>,
    /// Header names the entry varies on.
    pub vary: Vec<String>,
    pub body_len: usize,
    pub response_url: Option<String>,
    pub stored_at: String,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(cache: &CacheDb, config: &AppConfig, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let url = canonicalize(&params.url, Some(&origin)).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let method = params.method.as_deref().unwrap_or("GET").trim().to_ascii_uppercase();
    let store = params.store.unwrap_or_else(|| config.cache_name.clone());

    let key = compute_cache_key(&store, &method, &key_url(&url));
    let entry = cache
        .get_entry(&key)
        .await?
        .ok_or_else(|| Error::CacheMiss(format!("{method} {url} in {store}")))?;

    let output = CacheGetOutput {
        key,
        store: entry.store_name,
        method: entry.method,
        url: entry.url,
        status: entry.status,
        status_text: entry.status_text,
        headers: entry
            .headers
            .iter()
            .map(|(name, value)| HeaderParam { name: name.to_string(), value: value.to_string() })
            .collect(),
        vary: entry.vary.into_iter().map(|(name, _)| name).collect(),
        body_len: entry.body.len(),
        response_url: entry.response_url,
        stored_at: entry.stored_at,
    };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize entry: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
