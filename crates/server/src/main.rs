//! warden server entry point.
//!
//! Boots the caching proxy, pre-populates its store and serves MCP on stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;
use warden_client::{FetchClient, FetchConfig};
use warden_core::{AppConfig, CacheDb, Lifecycle, PolicyEngine};

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    tracing::info!(cache = %config.cache_name, db = %config.db_path.display(), origin = %config.origin, "starting warden");

    let cache = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache database {}", config.db_path.display()))?;
    let network = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let engine = Arc::new(PolicyEngine::from_config(&config, Arc::clone(&network), cache.clone())?);

    let mut lifecycle = Lifecycle::new();
    PolicyEngine::register(Arc::clone(&engine), &mut lifecycle);
    lifecycle.install().await.context("installation failed")?;

    let handler = handler::WardenServer::new(Arc::new(lifecycle), engine, network, cache, config);
    let server = serve_server(handler, stdio()).await?;

    server.waiting().await?;

    Ok(())
}
