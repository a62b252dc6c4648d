//! Explicit handler registration for installation and fetch interception.
//!
//! The host owns a [`Lifecycle`], triggers [`Lifecycle::install`] once per
//! activation and hands every request to [`Lifecycle::dispatch_fetch`].
//! Handlers receive an event object and defer completion by passing it a
//! future (`wait_until` / `respond_with`). Dropping the dispatch future
//! cancels whatever the handler started.

use std::future::Future;

use futures_util::future::{BoxFuture, try_join_all};

use super::network::Network;
use crate::Error;
use crate::http::{RequestDescriptor, Response};

type InstallHandler = Box<dyn Fn(&mut InstallEvent) + Send + Sync>;
type InterceptHandler = Box<dyn Fn(&mut FetchEvent) + Send + Sync>;

/// Passed to install handlers.
#[derive(Default)]
pub struct InstallEvent {
    pending: Vec<BoxFuture<'static, Result<(), Error>>>,
}

impl InstallEvent {
    /// Installation completes only once `work` resolves; an error fails it.
    pub fn wait_until<F>(&mut self, work: F)
    where
        F: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.pending.push(Box::pin(work));
    }
}

/// Passed to intercept handlers.
pub struct FetchEvent {
    request: RequestDescriptor,
    response: Option<BoxFuture<'static, Result<Response, Error>>>,
}

impl FetchEvent {
    fn new(request: RequestDescriptor) -> Self {
        Self { request, response: None }
    }

    pub fn request(&self) -> &RequestDescriptor {
        &self.request
    }

    pub fn has_responded(&self) -> bool {
        self.response.is_some()
    }

    /// Supply the authoritative answer for this request.
    ///
    /// Fails if a response was already supplied.
    pub fn respond_with<F>(&mut self, response: F) -> Result<(), Error>
    where
        F: Future<Output = Result<Response, Error>> + Send + 'static,
    {
        if self.response.is_some() {
            return Err(Error::InvalidInput(format!("respond_with called twice for {}", self.request.url())));
        }
        self.response = Some(Box::pin(response));
        Ok(())
    }
}

/// Registered install and intercept handlers.
#[derive(Default)]
pub struct Lifecycle {
    install_handlers: Vec<InstallHandler>,
    intercept_handlers: Vec<InterceptHandler>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_install(&mut self, handler: impl Fn(&mut InstallEvent) + Send + Sync + 'static) {
        self.install_handlers.push(Box::new(handler));
    }

    pub fn on_intercept(&mut self, handler: impl Fn(&mut FetchEvent) + Send + Sync + 'static) {
        self.intercept_handlers.push(Box::new(handler));
    }

    /// Run every install handler and wait for all deferred work.
    ///
    /// The first failure fails the installation.
    pub async fn install(&self) -> Result<(), Error> {
        let mut event = InstallEvent::default();
        for handler in &self.install_handlers {
            handler(&mut event);
        }

        match try_join_all(event.pending).await {
            Ok(_) => {
                tracing::info!(handlers = self.install_handlers.len(), "installation complete");
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, "installation failed");
                Err(err)
            }
        }
    }

    /// Offer `request` to the intercept handlers in registration order.
    ///
    /// The first handler to respond decides the answer; if none does, the
    /// request goes to `network` unchanged.
    pub async fn dispatch_fetch(&self, request: RequestDescriptor, network: &dyn Network) -> Result<Response, Error> {
        let mut event = FetchEvent::new(request);
        for handler in &self.intercept_handlers {
            handler(&mut event);
            if event.has_responded() {
                break;
            }
        }

        match event.response {
            Some(response) => response.await,
            None => network.fetch(&event.request).await,
        }
    }
}
