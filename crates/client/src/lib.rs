//! Network capability for warden.
//!
//! This crate provides the reqwest-backed [`Network`](warden_core::Network)
//! implementation and URL canonicalization used by the server.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, UrlError, canonicalize};
