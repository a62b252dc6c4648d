//! Responses returned by the network capability and the cache store.

use bytes::Bytes;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use super::Headers;

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Network,
    Cache,
}

/// A response with an owned body.
///
/// The body is consumed by [`Response::into_body`]. Cloning yields an
/// independent snapshot, which is what gets stored whenever the same response
/// is also returned to the caller.
#[derive(Debug, Clone)]
pub struct Response {
    pub(crate) url: Option<Url>,
    pub(crate) status: u16,
    pub(crate) status_text: String,
    pub(crate) headers: Headers,
    pub(crate) body: Bytes,
    pub(crate) source: ResponseSource,
}

impl Response {
    pub fn new(status: u16, headers: Headers, body: impl Into<Bytes>) -> Self {
        Self {
            url: None,
            status,
            status_text: String::new(),
            headers,
            body: body.into(),
            source: ResponseSource::Network,
        }
    }

    pub fn with_url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    pub fn with_status_text(mut self, status_text: impl Into<String>) -> Self {
        self.status_text = status_text.into();
        self
    }

    pub(crate) fn served_from_cache(mut self) -> Self {
        self.source = ResponseSource::Cache;
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// True for 2xx statuses.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// True for 206 Partial Content.
    pub fn is_partial(&self) -> bool {
        self.status == 206
    }

    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn source(&self) -> ResponseSource {
        self.source
    }

    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// Header names listed in `Vary`, lower-cased.
    pub fn vary(&self) -> Vec<String> {
        self.headers
            .get("vary")
            .map(|v| {
                v.split(',')
                    .map(|name| name.trim().to_ascii_lowercase())
                    .filter(|name| !name.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Consume the response, yielding its body.
    pub fn into_body(self) -> Bytes {
        self.body
    }
}
