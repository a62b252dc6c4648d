//! Cache store capability.
//!
//! [`CacheStorage::open`] hands out a [`CacheStore`] bound to one name. The
//! SQLite implementation is [`NamedCache`], opened from a [`CacheDb`].

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::SecondsFormat;
use futures_util::future::try_join_all;
use url::Url;

use super::connection::CacheDb;
use super::entries::{CacheEntry, VaryRecord};
use super::hash::{compute_cache_key, key_url};
use crate::Error;
use crate::http::{RequestDescriptor, Response};
use crate::policy::Network;

/// Storage holding any number of named stores.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    type Store: CacheStore;

    /// Open (creating lazily) the store called `name`.
    async fn open(&self, name: &str) -> Result<Self::Store, Error>;
}

/// One named store mapping requests to responses.
#[async_trait]
pub trait CacheStore: Send + Sync {
    fn name(&self) -> &str;

    /// Look up a stored response. `None` is a cache miss, not an error.
    async fn match_request(&self, request: &RequestDescriptor) -> Result<Option<Response>, Error>;

    /// Store `response` for `request`, replacing any previous entry.
    async fn put(&self, request: &RequestDescriptor, response: Response) -> Result<(), Error>;

    /// Store several responses; either all are written or none.
    async fn put_all(&self, entries: Vec<(RequestDescriptor, Response)>) -> Result<(), Error>;

    /// Fetch every URL and store the results, all-or-nothing.
    ///
    /// URLs that differ only by fragment are fetched once. Any rejected
    /// fetch or non-OK status fails the whole call before anything is
    /// written. Returns the number of stored entries.
    async fn add_all(&self, network: &dyn Network, urls: &[Url]) -> Result<usize, Error> {
        let mut seen = HashSet::new();
        let requests: Vec<RequestDescriptor> = urls
            .iter()
            .filter(|url| seen.insert(key_url(url)))
            .cloned()
            .map(RequestDescriptor::get)
            .collect();

        let responses = try_join_all(requests.iter().map(|request| async move {
            let response = network.fetch(request).await.map_err(|e| Error::BulkPopulate {
                url: request.url().to_string(),
                reason: e.to_string(),
            })?;
            if !response.ok() {
                return Err(Error::BulkPopulate {
                    url: request.url().to_string(),
                    reason: format!("status {}", response.status()),
                });
            }
            Ok(response)
        }))
        .await?;

        let count = responses.len();
        self.put_all(requests.into_iter().zip(responses).collect()).await?;
        Ok(count)
    }
}

/// A named store backed by the SQLite cache database.
#[derive(Clone, Debug)]
pub struct NamedCache {
    db: CacheDb,
    name: String,
}

impl NamedCache {
    fn key_for(&self, request: &RequestDescriptor) -> String {
        compute_cache_key(&self.name, request.method(), &key_url(request.url()))
    }

    /// Validate a response for storage and turn it into a row.
    fn entry_for(&self, request: &RequestDescriptor, response: Response) -> Result<CacheEntry, Error> {
        if response.is_partial() {
            return Err(Error::CacheStore(format!("partial response (206) cannot be stored: {}", request.url())));
        }

        let vary_names = response.vary();
        if vary_names.iter().any(|name| name == "*") {
            return Err(Error::CacheStore(format!("response with Vary: * cannot be stored: {}", request.url())));
        }
        let vary: VaryRecord = vary_names
            .into_iter()
            .map(|name| {
                let value = request.headers().get(&name);
                (name, value)
            })
            .collect();

        Ok(CacheEntry {
            key_hash: self.key_for(request),
            store_name: self.name.clone(),
            method: request.method().to_string(),
            url: key_url(request.url()),
            vary,
            status: response.status,
            status_text: response.status_text,
            headers: response.headers,
            body: response.body.to_vec(),
            response_url: response.url.map(String::from),
            stored_at: chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        })
    }
}

fn vary_matches(vary: &VaryRecord, request: &RequestDescriptor) -> bool {
    vary.iter()
        .all(|(name, stored)| request.headers().get(name).as_deref() == stored.as_deref())
}

fn into_response(entry: CacheEntry) -> Response {
    let mut response = Response::new(entry.status, entry.headers, entry.body).with_status_text(entry.status_text);
    if let Some(url) = entry.response_url.as_deref().and_then(|u| Url::parse(u).ok()) {
        response = response.with_url(url);
    }
    response.served_from_cache()
}

#[async_trait]
impl CacheStorage for CacheDb {
    type Store = NamedCache;

    async fn open(&self, name: &str) -> Result<NamedCache, Error> {
        self.register_store(name).await?;
        Ok(NamedCache { db: self.clone(), name: name.to_string() })
    }
}

#[async_trait]
impl CacheStore for NamedCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn match_request(&self, request: &RequestDescriptor) -> Result<Option<Response>, Error> {
        let Some(entry) = self.db.get_entry(&self.key_for(request)).await? else {
            tracing::debug!(store = %self.name, url = %request.url(), "cache miss");
            return Ok(None);
        };

        if !vary_matches(&entry.vary, request) {
            tracing::debug!(store = %self.name, url = %request.url(), "cache miss (vary mismatch)");
            return Ok(None);
        }

        tracing::debug!(store = %self.name, url = %request.url(), "cache hit");
        Ok(Some(into_response(entry)))
    }

    async fn put(&self, request: &RequestDescriptor, response: Response) -> Result<(), Error> {
        let entry = self.entry_for(request, response)?;
        self.db.upsert_entry(&entry).await
    }

    async fn put_all(&self, entries: Vec<(RequestDescriptor, Response)>) -> Result<(), Error> {
        let rows = entries
            .into_iter()
            .map(|(request, response)| self.entry_for(&request, response))
            .collect::<Result<Vec<_>, _>>()?;
        self.db.upsert_entries(rows).await
    }
}
