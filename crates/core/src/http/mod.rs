//! Request and response model shared by the engine, the store and the network.
//!
//! - [`Headers`]: ordered header list with case-insensitive names
//! - [`RequestDescriptor`]: immutable description of an intercepted request
//! - [`Response`]: status, headers and an owned body
//! - [`strip_header`]: derive a copy of a request without one header

pub mod headers;
pub mod request;
pub mod response;

pub use headers::Headers;
pub use request::{Credentials, RedirectMode, RequestDescriptor, RequestMode, strip_header};
pub use response::{Response, ResponseSource};
