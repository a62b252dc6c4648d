//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::cache::{CacheGetParams, CachePurgeParams, get_impl, purge_impl};
use crate::tools::proxy_fetch::{ProxyFetchParams, fetch_impl};
use crate::tools::proxy_install::{ProxyInstallParams, install_impl};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use warden_client::FetchClient;
use warden_core::{AppConfig, CacheDb, Lifecycle, PolicyEngine};

/// The engine as deployed: real network, SQLite store.
pub type Engine = PolicyEngine<Arc<FetchClient>, CacheDb>;

/// The main MCP server handler for warden.
#[derive(Clone)]
pub struct WardenServer {
    tool_router: ToolRouter<Self>,
    lifecycle: Arc<Lifecycle>,
    engine: Arc<Engine>,
    network: Arc<FetchClient>,
    cache: CacheDb,
    config: Arc<AppConfig>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl WardenServer {
    /// Create a new server handler around an installed lifecycle.
    pub fn new(
        lifecycle: Arc<Lifecycle>, engine: Arc<Engine>, network: Arc<FetchClient>, cache: CacheDb, config: AppConfig,
    ) -> Self {
        Self { tool_router: Self::tool_router(), lifecycle, engine, network, cache, config: Arc::new(config) }
    }

    /// Issue a request through the interception policy.
    #[tool(
        description = "Fetch a URL through the caching proxy. Static assets are served cache-first, other GETs network-first with cache fallback, writes go straight to the network. Returns status, headers, body and whether it came from network or cache."
    )]
    async fn proxy_fetch(&self, params: Parameters<ProxyFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.lifecycle, self.network.as_ref(), self.engine.classifier(), &self.config, params.0).await
    }

    /// Re-populate the store from a manifest.
    #[tool(
        description = "Fetch and store every manifest URL, all-or-nothing. Uses the configured manifest unless one is given."
    )]
    async fn proxy_install(&self, params: Parameters<ProxyInstallParams>) -> Result<CallToolResult, McpError> {
        install_impl(self.engine.as_ref(), &self.config, params.0).await
    }

    /// Inspect a stored response.
    #[tool(description = "Return metadata of the stored response for a URL and method, or CACHE_MISS.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.cache, &self.config, params.0).await
    }

    /// Evict stored responses.
    #[tool(description = "Purge stored responses by URL substring, by store name, or keep only the newest N entries.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(&self.cache, params.0).await
    }
}

impl ServerHandler for WardenServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "warden".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
