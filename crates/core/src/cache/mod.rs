//! SQLite-backed cache storage for intercepted responses.
//!
//! This module provides a persistent store using SQLite with async access
//! via tokio-rusqlite. It supports:
//!
//! - Named stores, each a separate cache generation
//! - Keys derived from store name, method and fragment-less URL (SHA-256)
//! - Vary-aware matching and refusal of partial responses
//! - Automatic schema migrations and WAL mode
//! - External eviction by URL pattern, store, or LRU

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod store;
pub mod stores;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::CacheEntry;
pub use store::{CacheStorage, CacheStore, NamedCache};
