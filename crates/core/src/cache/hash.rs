//! Cache key generation.

use sha2::{Digest, Sha256};
use url::Url;

/// URL as used for keying: the fragment is never part of the key.
pub fn key_url(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.into()
}

/// Compute the cache key for a request within a named store.
pub fn compute_cache_key(store: &str, method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(store.as_bytes());
    hasher.update(b"\n");
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
