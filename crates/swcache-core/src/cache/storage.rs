//! Cache storage trait.

use crate::error::Result;
use crate::models::{RequestKey, Response};

use super::entry::CachedData;

/// A set of named cache namespaces, each mapping request keys to responses.
///
/// Implementations are internally synchronized; every method is safe to call
/// from concurrently running event handlers.
pub trait CacheStorage: Send + Sync {
    /// Create the namespace if it does not exist yet.
    fn open(&self, name: &str) -> Result<()>;

    fn has(&self, name: &str) -> Result<bool>;

    /// Names of every existing namespace.
    fn keys(&self) -> Result<Vec<String>>;

    /// Remove a namespace and all its entries. Returns whether it existed.
    fn delete(&self, name: &str) -> Result<bool>;

    /// Look up a key in one namespace.
    fn match_in(&self, name: &str, key: &RequestKey) -> Result<Option<Response>>;

    /// Store one entry, creating the namespace if needed.
    fn put(&self, name: &str, key: RequestKey, response: Response) -> Result<()>;

    /// Store every entry or none of them.
    fn put_all(&self, name: &str, entries: Vec<(RequestKey, Response)>) -> Result<()>;

    /// Entries of a namespace, for inspection.
    fn entries(&self, name: &str) -> Result<Vec<(RequestKey, CachedData<Response>)>>;

    /// Look up a key across all namespaces, first match wins.
    fn match_any(&self, key: &RequestKey) -> Result<Option<Response>> {
        for name in self.keys()? {
            if let Some(response) = self.match_in(&name, key)? {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }
}
