//! Request descriptors and header sanitization.

use bytes::Bytes;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use super::Headers;

/// Request mode, carried through rebuilds unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    SameOrigin,
    NoCors,
    #[default]
    Cors,
    Navigate,
}

/// Credentials policy, carried through rebuilds unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Credentials {
    Omit,
    #[default]
    SameOrigin,
    Include,
}

/// Redirect handling policy for the network capability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RedirectMode {
    /// Follow redirects transparently.
    #[default]
    Follow,
    /// Treat any redirect as a network error.
    Error,
    /// Return the redirect response itself.
    Manual,
}

/// An intercepted request.
///
/// Built once through the `with_*` methods and not mutated afterwards; use
/// [`strip_header`] to derive a sanitized copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    method: String,
    url: Url,
    headers: Headers,
    mode: RequestMode,
    credentials: Credentials,
    redirect: RedirectMode,
    body: Option<Bytes>,
}

impl RequestDescriptor {
    /// Create a request. The method is normalized to upper case.
    pub fn new(method: &str, url: Url) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            url,
            headers: Headers::new(),
            mode: RequestMode::default(),
            credentials: Credentials::default(),
            redirect: RedirectMode::default(),
            body: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_redirect(mut self, redirect: RedirectMode) -> Self {
        self.redirect = redirect;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn mode(&self) -> RequestMode {
        self.mode
    }

    pub fn credentials(&self) -> Credentials {
        self.credentials
    }

    pub fn redirect(&self) -> RedirectMode {
        self.redirect
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }
}

/// Derive a copy of `request` with every `name` header removed.
///
/// Method, URL, mode, credentials, redirect policy and body are preserved.
pub fn strip_header(request: &RequestDescriptor, name: &str) -> RequestDescriptor {
    RequestDescriptor {
        method: request.method.clone(),
        url: request.url.clone(),
        headers: request.headers.without(name),
        mode: request.mode,
        credentials: request.credentials,
        redirect: request.redirect,
        body: request.body.clone(),
    }
}
