//! Fetch interception policy.
//!
//! Every intercepted request is classified once, then served by one strategy:
//!
//! | class          | primary  | fallback |
//! |----------------|----------|----------|
//! | bypass         | network  | none     |
//! | dynamic        | network  | cache    |
//! | static (range) | cache    | network  |
//! | static         | cache    | network  |
//!
//! Range requests for static assets are rebuilt without the `Range` header
//! first, because the store refuses partial responses.

pub mod classify;
pub mod engine;
pub mod lifecycle;
pub mod network;

pub use classify::{Classifier, RANGE_HEADER, RequestClass, StaticMatch, StaticMatcher};
pub use engine::PolicyEngine;
pub use lifecycle::{FetchEvent, InstallEvent, Lifecycle};
pub use network::Network;
