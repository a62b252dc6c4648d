//! proxy_install tool implementation.
//!
//! Re-runs pre-population of the engine's store.

use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use warden_client::canonicalize;
use warden_core::{AppConfig, CacheStorage, Error, Network, PolicyEngine};

/// Input parameters for proxy_install tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ProxyInstallParams {
    /// URLs to fetch and store; the configured manifest when omitted.
    #[serde(default)]
    pub manifest: Option<Vec<String>>,
}

/// Output structure for proxy_install tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProxyInstallOutput {
    /// Store that was populated.
    pub cache_name: String,
    /// Number of entries written.
    pub stored: usize,
}

/// Implementation of the proxy_install tool.
pub async fn install_impl<N: Network, S: CacheStorage>(
    engine: &PolicyEngine<N, S>, config: &AppConfig, params: ProxyInstallParams,
) -> Result<CallToolResult, McpError> {
    let stored = match params.manifest {
        Some(entries) => {
            let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
            let urls = entries
                .iter()
                .map(|entry| canonicalize(entry, Some(&origin)))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| Error::InvalidUrl(e.to_string()))?;
            engine.install_manifest(&urls).await?
        }
        None => engine.install().await?,
    };

    let output = ProxyInstallOutput { cache_name: engine.cache_name().to_string(), stored };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
