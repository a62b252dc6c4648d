//! Network fetch capability consumed by the engine and the store.

use std::sync::Arc;

use async_trait::async_trait;

use crate::Error;
use crate::http::{RequestDescriptor, Response};

/// Performs a request over the network.
///
/// An HTTP error status is a successful fetch; only a rejected fetch
/// (offline, DNS failure, timeout) is an `Err`.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &RequestDescriptor) -> Result<Response, Error>;
}

#[async_trait]
impl<T: Network + ?Sized> Network for Arc<T> {
    async fn fetch(&self, request: &RequestDescriptor) -> Result<Response, Error> {
        (**self).fetch(request).await
    }
}
