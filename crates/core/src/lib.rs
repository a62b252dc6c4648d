//! Core types and shared functionality for warden.
//!
//! This crate provides:
//! - Request/response model and header sanitization
//! - Cache storage with SQLite backend
//! - The fetch interception policy engine and its lifecycle hooks
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod policy;

pub use cache::{CacheDb, CacheStorage, CacheStore, NamedCache};
pub use config::AppConfig;
pub use error::Error;
pub use http::{Headers, RequestDescriptor, Response, ResponseSource, strip_header};
pub use policy::{Classifier, Lifecycle, Network, PolicyEngine, RequestClass};
