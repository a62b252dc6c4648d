//! URL canonicalization for intercepted requests.

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("relative URL without an origin: {0}")]
    MissingOrigin(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Canonicalize a request URL.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Resolve anything without a scheme against `origin`, as a browser resolves a page-relative URL
/// 3. Without an origin, default the scheme to https://
/// 4. Lowercase the host
/// 5. Remove fragment (#...)
/// 6. Keep query string intact (do not reorder)
pub fn canonicalize(input: &str, origin: Option<&url::Url>) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = if trimmed.contains("://") {
        url::Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?
    } else if let Some(origin) = origin {
        origin.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?
    } else if trimmed.starts_with('/') {
        return Err(UrlError::MissingOrigin(trimmed.to_string()));
    } else {
        url::Url::parse(&format!("https://{trimmed}")).map_err(|e| UrlError::InvalidUrl(e.to_string()))?
    };

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str() {
        let host = host.to_lowercase();
        parsed
            .set_host(Some(&host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}
