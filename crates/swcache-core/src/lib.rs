//! swcache-core: an offline-first request cache worker.
//!
//! The worker intercepts an application's requests and answers them from
//! versioned cache namespaces, falling back to the network and keeping the
//! cache warm. Storage, network and the surrounding host are traits so the
//! same worker runs in tests, in the `swcache` CLI, or anywhere else.

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
mod fs;
pub mod host;
pub mod models;
pub mod network;
pub mod sync;
pub mod worker;

pub use cache::{CacheStorage, DiskStorage, MemoryStorage};
pub use config::{Config, SyncBackend, Variant, WorkerConfig};
pub use error::{Result, WorkerError};
pub use host::{Host, WindowClient};
pub use network::{HttpNetwork, Network};
pub use worker::{Dispatched, EventKind, EventOutcome, FetchOutcome, Worker, WorkerEvent};
