//! proxy_fetch tool implementation.
//!
//! Dispatches a request through the registered intercept handlers, exactly
//! as a page-initiated fetch would be.

use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use warden_client::canonicalize;
use warden_core::http::{Credentials, Headers, RedirectMode, RequestMode};
use warden_core::{AppConfig, Classifier, Error, Lifecycle, Network, RequestDescriptor, ResponseSource};

use crate::error::ToolError;

/// A single header line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HeaderParam {
    pub name: String,
    pub value: String,
}

/// Input parameters for proxy_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProxyFetchParams {
    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Absolute URL, or a path resolved against the configured origin.
    pub url: String,

    /// Request headers, in order.
    #[serde(default)]
    pub headers: Vec<HeaderParam>,

    /// Optional request body.
    #[serde(default)]
    pub body: Option<String>,

    #[serde(default)]
    pub mode: RequestMode,

    #[serde(default)]
    pub credentials: Credentials,

    #[serde(default)]
    pub redirect: RedirectMode,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for proxy_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProxyFetchOutput {
    /// The canonical request URL.
    pub url: String,
    /// Final response URL after redirects, if known.
    pub response_url: Option<String>,
    /// Strategy class the request fell into.
    pub class: String,
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<HeaderParam>,
    /// Body decoded as UTF-8, lossily.
    pub body: String,
    /// Whether the answer came from the network or the cache.
    pub source: ResponseSource,
}

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}

fn to_headers(params: &[HeaderParam]) -> Result<Headers, ToolError> {
    let mut headers = Headers::new();
    for header in params {
        if !is_token(&header.name) {
            return Err(ToolError::InvalidHeader { name: header.name.clone(), reason: "not a token".into() });
        }
        if header.value.contains(['\r', '\n']) {
            return Err(ToolError::InvalidHeader { name: header.name.clone(), reason: "line break in value".into() });
        }
        headers.append(&header.name, &header.value);
    }
    Ok(headers)
}

/// Build the request descriptor from tool arguments.
pub fn build_request(config: &AppConfig, params: ProxyFetchParams) -> Result<RequestDescriptor, McpError> {
    let method = params.method.trim();
    if !is_token(method) {
        return Err(ToolError::InvalidMethod(params.method.clone()).into());
    }

    let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let url = canonicalize(&params.url, Some(&origin)).map_err(|e| Error::InvalidUrl(e.to_string()))?;

    let mut request = RequestDescriptor::new(method, url)
        .with_headers(to_headers(&params.headers)?)
        .with_mode(params.mode)
        .with_credentials(params.credentials)
        .with_redirect(params.redirect);
    if let Some(body) = params.body {
        request = request.with_body(body);
    }
    Ok(request)
}

/// Implementation of the proxy_fetch tool.
pub async fn fetch_impl(
    lifecycle: &Lifecycle, network: &dyn Network, classifier: &Classifier, config: &AppConfig,
    params: ProxyFetchParams,
) -> Result<CallToolResult, McpError> {
    let request = build_request(config, params)?;
    let class = classifier.classify(&request);
    let url = request.url().to_string();

    let response = lifecycle.dispatch_fetch(request, network).await?;

    let output = ProxyFetchOutput {
        url,
        response_url: response.url().map(|u| u.to_string()),
        class: class.as_str().to_string(),
        status: response.status(),
        status_text: response.status_text().to_string(),
        headers: response
            .headers()
            .iter()
            .map(|(name, value)| HeaderParam { name: name.to_string(), value: value.to_string() })
            .collect(),
        source: response.source(),
        body: String::from_utf8_lossy(&response.into_body()).into_owned(),
    };

    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
