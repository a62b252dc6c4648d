//! The fetch interception policy engine.

use std::sync::Arc;

use url::Url;

use super::classify::{Classifier, RANGE_HEADER, RequestClass};
use super::lifecycle::Lifecycle;
use super::network::Network;
use crate::Error;
use crate::cache::{CacheStorage, CacheStore};
use crate::config::AppConfig;
use crate::http::{RequestDescriptor, Response, strip_header};

/// Classifies intercepted requests and serves them from network or cache.
///
/// The cache name is fixed at construction. Handling never holds a lock
/// across suspension points, so concurrent requests for the same key may
/// both miss and both write; the last write wins.
pub struct PolicyEngine<N, S> {
    network: N,
    storage: S,
    cache_name: String,
    classifier: Classifier,
    manifest: Vec<Url>,
}

impl<N: Network, S: CacheStorage> PolicyEngine<N, S> {
    pub fn new(network: N, storage: S, cache_name: impl Into<String>, classifier: Classifier) -> Self {
        Self { network, storage, cache_name: cache_name.into(), classifier, manifest: Vec::new() }
    }

    /// Build an engine from configuration; manifest entries are resolved against the origin.
    pub fn from_config(config: &AppConfig, network: N, storage: S) -> Result<Self, Error> {
        let manifest = config.manifest_urls().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self::new(network, storage, config.cache_name.clone(), Classifier::from_config(config))
            .with_manifest(manifest))
    }

    pub fn with_manifest(mut self, manifest: Vec<Url>) -> Self {
        self.manifest = manifest;
        self
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn manifest(&self) -> &[Url] {
        &self.manifest
    }

    /// Open the store and pre-populate it from the configured manifest.
    pub async fn install(&self) -> Result<usize, Error> {
        self.install_manifest(&self.manifest).await
    }

    /// Open the store and pre-populate it from `urls`, all-or-nothing.
    pub async fn install_manifest(&self, urls: &[Url]) -> Result<usize, Error> {
        let store = self.storage.open(&self.cache_name).await?;
        tracing::info!(cache = %self.cache_name, entries = urls.len(), "opened cache");

        let stored = store.add_all(&self.network, urls).await?;
        tracing::info!(cache = %self.cache_name, stored, "cache populated from manifest");
        Ok(stored)
    }

    /// Produce the authoritative response for an intercepted request.
    pub async fn handle(&self, request: RequestDescriptor) -> Result<Response, Error> {
        let class = self.classifier.classify(&request);
        tracing::debug!(method = request.method(), url = %request.url(), class = class.as_str(), "intercepted");

        match class {
            RequestClass::Bypass => self.network.fetch(&request).await,
            RequestClass::Dynamic => self.network_first(&request).await,
            RequestClass::StaticRanged => self.cache_first(&strip_header(&request, RANGE_HEADER)).await,
            RequestClass::Static => self.cache_first(&request).await,
        }
    }

    async fn network_first(&self, request: &RequestDescriptor) -> Result<Response, Error> {
        match self.network.fetch(request).await {
            Ok(response) => {
                tracing::debug!(url = %request.url(), status = response.status(), "fetched fresh");
                let store = self.storage.open(&self.cache_name).await?;
                store.put(request, response.clone()).await?;
                Ok(response)
            }
            Err(err) => {
                tracing::warn!(url = %request.url(), error = %err, "network failed, trying cache");
                let store = self.storage.open(&self.cache_name).await?;
                match store.match_request(request).await? {
                    Some(cached) => {
                        tracing::debug!(url = %request.url(), "falling back to cache");
                        Ok(cached)
                    }
                    None => Err(err),
                }
            }
        }
    }

    async fn cache_first(&self, request: &RequestDescriptor) -> Result<Response, Error> {
        let store = self.storage.open(&self.cache_name).await?;
        if let Some(cached) = store.match_request(request).await? {
            return Ok(cached);
        }

        let response = self.network.fetch(request).await?;
        store.put(request, response.clone()).await?;
        Ok(response)
    }
}

impl<N, S> PolicyEngine<N, S>
where
    N: Network + 'static,
    S: CacheStorage + 'static,
{
    /// Register the engine's install and intercept handlers on `lifecycle`.
    pub fn register(engine: Arc<Self>, lifecycle: &mut Lifecycle) {
        let installer = Arc::clone(&engine);
        lifecycle.on_install(move |event| {
            let engine = Arc::clone(&installer);
            event.wait_until(async move { engine.install().await.map(|_| ()) });
        });

        lifecycle.on_intercept(move |event| {
            let engine = Arc::clone(&engine);
            let request = event.request().clone();
            if let Err(err) = event.respond_with(async move { engine.handle(request).await }) {
                tracing::warn!(error = %err, "another handler already responded");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheDb;
    use crate::http::{Headers, ResponseSource};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Scripted network: serves `body` for every request unless offline.
    #[derive(Default)]
    struct FakeNetwork {
        offline: AtomicBool,
        body: Mutex<String>,
        status: Mutex<Option<u16>>,
        calls: AtomicUsize,
        seen: Mutex<Vec<RequestDescriptor>>,
    }

    impl FakeNetwork {
        fn serving(body: &str) -> Arc<Self> {
            let network = Self::default();
            *network.body.lock().unwrap() = body.to_string();
            Arc::new(network)
        }

        fn answering(&self, status: u16) {
            *self.status.lock().unwrap() = Some(status);
        }

        fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn last_request(&self) -> RequestDescriptor {
            self.seen.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl Network for FakeNetwork {
        async fn fetch(&self, request: &RequestDescriptor) -> Result<Response, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(request.clone());
            if self.offline.load(Ordering::SeqCst) {
                return Err(Error::Network("offline".into()));
            }
            let partial = if request.headers().contains(RANGE_HEADER) { 206 } else { 200 };
            let status = self.status.lock().unwrap().unwrap_or(partial);
            let body = self.body.lock().unwrap().clone();
            Ok(Response::new(status, Headers::new(), body).with_url(request.url().clone()))
        }
    }

    type TestEngine = PolicyEngine<Arc<FakeNetwork>, CacheDb>;

    async fn engine(network: &Arc<FakeNetwork>) -> (TestEngine, CacheDb) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let engine = PolicyEngine::new(Arc::clone(network), db.clone(), "resources", Classifier::default());
        (engine, db)
    }

    fn url(path: &str) -> Url {
        Url::parse("http://localhost:8080").unwrap().join(path).unwrap()
    }

    async fn cached(db: &CacheDb, request: &RequestDescriptor) -> Option<Response> {
        db.open("resources").await.unwrap().match_request(request).await.unwrap()
    }

    #[tokio::test]
    async fn test_post_never_touches_cache() {
        let network = FakeNetwork::serving("saved");
        let (engine, db) = engine(&network).await;
        let request = RequestDescriptor::new("POST", url("/api/save")).with_body("{}");

        let response = engine.handle(request.clone()).await.unwrap();
        assert_eq!(response.into_body(), Bytes::from("saved"));
        assert_eq!(network.calls(), 1);
        assert!(!db.has_store("resources").await.unwrap());
    }

    #[tokio::test]
    async fn test_post_failure_is_returned_as_is() {
        let network = FakeNetwork::serving("saved");
        network.set_offline(true);
        let (engine, db) = engine(&network).await;

        let result = engine.handle(RequestDescriptor::new("POST", url("/api/save"))).await;
        assert!(matches!(result, Err(Error::Network(_))));
        assert!(!db.has_store("resources").await.unwrap());
    }

    #[tokio::test]
    async fn test_always_live_never_cached() {
        let network = FakeNetwork::serving("sdk");
        let (engine, db) = engine(&network).await;
        let request = RequestDescriptor::get(url("/static/js/statsig-prod-web-sdk.min.js"));

        engine.handle(request.clone()).await.unwrap();
        engine.handle(request).await.unwrap();
        assert_eq!(network.calls(), 2);
        assert!(!db.has_store("resources").await.unwrap());
    }

    #[tokio::test]
    async fn test_dynamic_prefers_network_and_updates_cache() {
        let network = FakeNetwork::serving("index-v2");
        let (engine, db) = engine(&network).await;
        let request = RequestDescriptor::get(url("/index.js"));
        let store = db.open("resources").await.unwrap();
        store.put(&request, Response::new(200, Headers::new(), "index-v1")).await.unwrap();

        let response = engine.handle(request.clone()).await.unwrap();
        assert_eq!(response.source(), ResponseSource::Network);
        assert_eq!(response.into_body(), Bytes::from("index-v2"));

        let stored = cached(&db, &request).await.unwrap();
        assert_eq!(stored.into_body(), Bytes::from("index-v2"));
    }

    #[tokio::test]
    async fn test_dynamic_falls_back_to_stale_cache() {
        let network = FakeNetwork::serving("index-v2");
        network.set_offline(true);
        let (engine, db) = engine(&network).await;
        let request = RequestDescriptor::get(url("/index.js"));
        let store = db.open("resources").await.unwrap();
        store.put(&request, Response::new(200, Headers::new(), "index-v1")).await.unwrap();

        let response = engine.handle(request).await.unwrap();
        assert_eq!(response.source(), ResponseSource::Cache);
        assert_eq!(response.into_body(), Bytes::from("index-v1"));
    }

    #[tokio::test]
    async fn test_dynamic_offline_without_cache_surfaces_failure() {
        let network = FakeNetwork::serving("index");
        network.set_offline(true);
        let (engine, _db) = engine(&network).await;

        let result = engine.handle(RequestDescriptor::get(url("/index.html"))).await;
        assert!(matches!(result, Err(Error::Network(msg)) if msg == "offline"));
    }

    #[tokio::test]
    async fn test_dynamic_error_status_is_stored() {
        let network = FakeNetwork::serving("gone");
        network.answering(404);
        let (engine, db) = engine(&network).await;
        let request = RequestDescriptor::get(url("/api/state"));

        let response = engine.handle(request.clone()).await.unwrap();
        assert_eq!(response.status(), 404);
        assert_eq!(cached(&db, &request).await.unwrap().status(), 404);
    }

    #[tokio::test]
    async fn test_static_miss_fetches_and_stores() {
        let network = FakeNetwork::serving("png");
        let (engine, db) = engine(&network).await;
        let request = RequestDescriptor::get(url("/static/img/logo.png"));

        let response = engine.handle(request.clone()).await.unwrap();
        assert_eq!(response.source(), ResponseSource::Network);
        assert_eq!(response.into_body(), Bytes::from("png"));
        assert_eq!(network.calls(), 1);
        assert!(cached(&db, &request).await.is_some());
    }

    #[tokio::test]
    async fn test_static_hit_skips_network() {
        let network = FakeNetwork::serving("png");
        let (engine, _db) = engine(&network).await;
        let request = RequestDescriptor::get(url("/static/img/logo.png"));

        engine.handle(request.clone()).await.unwrap();
        for _ in 0..3 {
            let response = engine.handle(request.clone()).await.unwrap();
            assert_eq!(response.source(), ResponseSource::Cache);
            assert_eq!(response.into_body(), Bytes::from("png"));
        }
        assert_eq!(network.calls(), 1);
    }

    #[tokio::test]
    async fn test_static_hit_served_offline() {
        let network = FakeNetwork::serving("png");
        let (engine, _db) = engine(&network).await;
        let request = RequestDescriptor::get(url("/static/img/logo.png"));

        engine.handle(request.clone()).await.unwrap();
        network.set_offline(true);
        assert!(engine.handle(request).await.is_ok());
    }

    #[tokio::test]
    async fn test_static_miss_offline_propagates() {
        let network = FakeNetwork::serving("png");
        network.set_offline(true);
        let (engine, _db) = engine(&network).await;

        let result = engine.handle(RequestDescriptor::get(url("/static/img/logo.png"))).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_range_request_is_rebuilt_and_cached_whole() {
        let network = FakeNetwork::serving("full-wasm");
        let (engine, db) = engine(&network).await;
        let request = RequestDescriptor::get(url("/static/app.wasm")).with_header("Range", "bytes=0-99");

        let response = engine.handle(request).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.into_body(), Bytes::from("full-wasm"));
        assert!(!network.last_request().headers().contains("range"));

        let plain = RequestDescriptor::get(url("/static/app.wasm"));
        assert!(cached(&db, &plain).await.is_some());
    }

    #[tokio::test]
    async fn test_range_key_independent_of_range_value() {
        let network = FakeNetwork::serving("song");
        let (engine, _db) = engine(&network).await;

        let first = RequestDescriptor::get(url("/static/sound/song.mp3")).with_header("Range", "bytes=0-");
        let second = RequestDescriptor::get(url("/static/sound/song.mp3")).with_header("Range", "bytes=4096-8191");
        engine.handle(first).await.unwrap();
        let response = engine.handle(second).await.unwrap();

        assert_eq!(response.source(), ResponseSource::Cache);
        assert_eq!(network.calls(), 1);
    }

    #[tokio::test]
    async fn test_range_rebuild_preserves_other_headers() {
        let network = FakeNetwork::serving("song");
        let (engine, _db) = engine(&network).await;
        let request = RequestDescriptor::get(url("/static/sound/song.mp3"))
            .with_header("Range", "bytes=0-")
            .with_header("Accept", "audio/*");

        engine.handle(request).await.unwrap();
        let sent = network.last_request();
        assert_eq!(sent.headers().get("accept").as_deref(), Some("audio/*"));
        assert_eq!(sent.method(), "GET");
    }

    #[tokio::test]
    async fn test_dynamic_range_partial_fails_on_store() {
        let network = FakeNetwork::serving("clip");
        let (engine, _db) = engine(&network).await;
        let request = RequestDescriptor::get(url("/media/clip.mp4")).with_header("Range", "bytes=0-99");

        let result = engine.handle(request).await;
        assert!(matches!(result, Err(Error::CacheStore(_))));
    }

    #[tokio::test]
    async fn test_install_populates_manifest() {
        let network = FakeNetwork::serving("asset");
        let (engine, db) = engine(&network).await;
        let engine = engine.with_manifest(vec![url("/index.html"), url("/static/app.wasm")]);

        assert_eq!(engine.install().await.unwrap(), 2);
        assert_eq!(db.count_entries("resources").await.unwrap(), 2);

        let response = engine.handle(RequestDescriptor::get(url("/static/app.wasm"))).await.unwrap();
        assert_eq!(response.source(), ResponseSource::Cache);
        assert_eq!(network.calls(), 2);
    }

    #[tokio::test]
    async fn test_install_empty_manifest_opens_store() {
        let network = FakeNetwork::serving("asset");
        let (engine, db) = engine(&network).await;

        assert_eq!(engine.install().await.unwrap(), 0);
        assert!(db.has_store("resources").await.unwrap());
        assert_eq!(network.calls(), 0);
    }

    #[tokio::test]
    async fn test_install_fails_as_a_whole() {
        let network = FakeNetwork::serving("asset");
        network.set_offline(true);
        let (engine, db) = engine(&network).await;
        let engine = engine.with_manifest(vec![url("/index.html")]);

        let result = engine.install().await;
        assert!(matches!(result, Err(Error::BulkPopulate { .. })));
        assert_eq!(db.count_entries("resources").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_from_config_resolves_manifest() {
        let config = AppConfig {
            cache_name: "from-config".into(),
            manifest: vec!["/index.html".into()],
            ..Default::default()
        };
        let network = FakeNetwork::serving("asset");
        let db = CacheDb::open_in_memory().await.unwrap();

        let engine = PolicyEngine::from_config(&config, Arc::clone(&network), db).unwrap();
        assert_eq!(engine.cache_name(), "from-config");
        assert_eq!(engine.manifest()[0].as_str(), "http://localhost:8080/index.html");
    }

    #[tokio::test]
    async fn test_concurrent_misses_last_write_wins() {
        let network = FakeNetwork::serving("png");
        let (engine, db) = engine(&network).await;
        let request = RequestDescriptor::get(url("/static/img/logo.png"));

        let (a, b) = tokio::join!(engine.handle(request.clone()), engine.handle(request.clone()));
        assert!(a.is_ok() && b.is_ok());
        assert!((1..=2).contains(&network.calls()));
        assert_eq!(db.count_entries("resources").await.unwrap(), 1);
    }
}
