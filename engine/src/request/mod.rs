//! Resilient request client module
//!
//! This module provides:
//! - `Transport` trait for abstracting a single request attempt
//! - `ReqwestTransport` for talking HTTP to the overlay store
//! - `RequestClient` adding timeouts, retry/backoff, cancellation and caching

mod cache;
mod client;
mod transport;
mod types;

pub use cache::{ResponseCache, ResponseCacheConfig};
pub use client::{RequestClient, backoff_delay};
pub use transport::{OutboundRequest, ReqwestTransport, Transport, TransportResponse};
pub use types::{ErrorClass, Method, RequestError, RequestKey, RequestOptions};
