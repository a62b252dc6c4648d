//! HTTP network capability for the policy engine.
//!
//! ### Request handling
//! - Method, headers and body are forwarded as described by the request.
//! - `credentials: omit` drops `Cookie` and `Authorization` headers.
//! - Redirects follow the request's policy: `follow` (up to 20 hops),
//!   `error` (any 3xx is a network error) or `manual` (3xx returned as-is).
//!
//! ### Failure model
//! - Connection, DNS and timeout failures are `Error::Network`.
//! - HTTP error statuses are ordinary responses.
//! - Bodies over `max_bytes` are `Error::FetchTooLarge`.

pub mod url;

use async_trait::async_trait;
use reqwest::{Client, header};
use std::time::{Duration, Instant};

pub use self::url::{UrlError, canonicalize};

use warden_core::http::{Credentials, Headers, RedirectMode, RequestDescriptor, Response};
use warden_core::{AppConfig, Error, Network};

/// Headers never sent for `credentials: omit` requests.
const CREDENTIAL_HEADERS: &[&str] = &["cookie", "authorization"];

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "warden/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 20MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 20)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "warden/0.1".to_string(),
            max_bytes: 20 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 20,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// HTTP client implementing [`Network`].
pub struct FetchClient {
    follow: Client,
    no_follow: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let follow = Self::build(&config, reqwest::redirect::Policy::limited(config.max_redirects))?;
        let no_follow = Self::build(&config, reqwest::redirect::Policy::none())?;
        Ok(Self { follow, no_follow, config })
    }

    fn build(config: &FetchConfig, redirect: reqwest::redirect::Policy) -> Result<Client, Error> {
        Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(redirect)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn outgoing_headers(request: &RequestDescriptor) -> impl Iterator<Item = (&str, &str)> {
        let omit = request.credentials() == Credentials::Omit;
        request
            .headers()
            .iter()
            .filter(move |(name, _)| !(omit && CREDENTIAL_HEADERS.contains(name)))
    }
}

fn network_error(err: reqwest::Error) -> Error {
    if err.is_builder() {
        Error::InvalidInput(format!("invalid request: {}", err))
    } else if err.is_timeout() {
        Error::Network(format!("timeout: {}", err))
    } else {
        Error::Network(err.to_string())
    }
}

fn collect_headers(map: &header::HeaderMap) -> Headers {
    map.iter()
        .map(|(name, value)| (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
        .collect()
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &RequestDescriptor) -> Result<Response, Error> {
        let start = Instant::now();
        let method = reqwest::Method::from_bytes(request.method().as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid method {}: {}", request.method(), e)))?;

        let client = match request.redirect() {
            RedirectMode::Follow => &self.follow,
            RedirectMode::Error | RedirectMode::Manual => &self.no_follow,
        };

        let mut builder = client.request(method, request.url().clone());
        for (name, value) in Self::outgoing_headers(request) {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body() {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(network_error)?;
        let status = response.status();

        if request.redirect() == RedirectMode::Error && status.is_redirection() {
            return Err(Error::Network(format!("redirect ({}) not allowed for {}", status.as_u16(), request.url())));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let final_url = response.url().clone();
        let headers = collect_headers(response.headers());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {}", e)))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        tracing::debug!(
            "fetched {} {} -> {} {} in {}ms ({} bytes)",
            request.method(),
            request.url(),
            final_url,
            status.as_u16(),
            start.elapsed().as_millis(),
            bytes.len()
        );

        Ok(Response::new(status.as_u16(), headers, bytes)
            .with_status_text(status.canonical_reason().unwrap_or_default())
            .with_url(final_url))
    }
}
