//! cache_purge tool implementation.
//!
//! Evicts entries by URL substring, by whole store, or by count.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use warden_core::{CacheDb, Error};

use crate::error::ToolError;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Purge entries whose URL contains this exact, case-sensitive substring, in every store.
    pub url_pattern: Option<String>,

    /// Delete this store and all of its entries.
    pub store: Option<String>,

    /// Keep only the newest N entries (LRU purge).
    pub max_entries: Option<usize>,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Number of entries deleted.
    pub deleted: u64,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(cache: &CacheDb, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    if params.url_pattern.is_none() && params.store.is_none() && params.max_entries.is_none() {
        return Err(
            ToolError::MissingSelector("At least one of url_pattern, store, or max_entries must be specified".into())
                .into(),
        );
    }

    let mut deleted_total = 0u64;

    if let Some(store) = params.store {
        deleted_total += cache.delete_store(&store).await?;
    }

    if let Some(pattern) = params.url_pattern {
        deleted_total += cache.purge_entries_by_url(&pattern).await?;
    }

    if let Some(max_entries) = params.max_entries {
        deleted_total += cache.purge_lru_entries(max_entries).await?;
    }

    tracing::info!(deleted = deleted_total, "cache purged");

    let output = CachePurgeOutput { deleted: deleted_total };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
