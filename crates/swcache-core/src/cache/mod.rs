//! Cache namespaces for request/response pairs.
//!
//! This module provides the `CacheStorage` trait and two backends:
//! - `MemoryStorage`: in-process, used by tests and short-lived hosts
//! - `DiskStorage`: a JSON index plus body files per namespace under the variant's cache directory
//!
//! Entries carry the time they were written but never expire; a namespace
//! is replaced wholesale when the worker version changes.

pub mod disk;
pub mod entry;
pub mod memory;
pub mod storage;

pub use disk::DiskStorage;
pub use entry::{CachedData, Namespace};
pub use memory::MemoryStorage;
pub use storage::CacheStorage;
