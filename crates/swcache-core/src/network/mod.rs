//! Network access for cache misses and install-time asset fetches.
//!
//! The worker only sees the `Network` trait; `HttpNetwork` is the real
//! implementation, tests substitute scripted fakes.

pub mod client;

pub use client::HttpNetwork;

use futures::future::BoxFuture;

use crate::error::Result;
use crate::models::{Request, Response};

/// Performs a request. Taking the request by value means its body can only
/// be sent once; clone first to keep a copy.
///
/// Transport failures (offline, DNS, refused connections) are reported as
/// `WorkerError::NetworkUnavailable`. HTTP error statuses are not failures.
pub trait Network: Send + Sync {
    fn fetch(&self, request: Request) -> BoxFuture<'_, Result<Response>>;
}
