use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::{Result, WorkerError};
use crate::models::{RequestKey, Response};

use super::entry::{CachedData, Namespace};
use super::storage::CacheStorage;

/// In-process cache storage. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    namespaces: Mutex<BTreeMap<String, Namespace>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, Namespace>>> {
        self.namespaces
            .lock()
            .map_err(|_| WorkerError::CacheStorage("memory cache lock poisoned".to_string()))
    }
}

impl CacheStorage for MemoryStorage {
    fn open(&self, name: &str) -> Result<()> {
        self.lock()?.entry(name.to_string()).or_default();
        Ok(())
    }

    fn has(&self, name: &str) -> Result<bool> {
        Ok(self.lock()?.contains_key(name))
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    fn delete(&self, name: &str) -> Result<bool> {
        Ok(self.lock()?.remove(name).is_some())
    }

    fn match_in(&self, name: &str, key: &RequestKey) -> Result<Option<Response>> {
        Ok(self
            .lock()?
            .get(name)
            .and_then(|ns| ns.get(key))
            .cloned())
    }

    fn put(&self, name: &str, key: RequestKey, response: Response) -> Result<()> {
        self.lock()?
            .entry(name.to_string())
            .or_default()
            .insert(key, response);
        Ok(())
    }

    fn put_all(&self, name: &str, entries: Vec<(RequestKey, Response)>) -> Result<()> {
        // Single lock acquisition: readers never observe a partial batch
        let mut namespaces = self.lock()?;
        let ns = namespaces.entry(name.to_string()).or_default();
        for (key, response) in entries {
            ns.insert(key, response);
        }
        Ok(())
    }

    fn entries(&self, name: &str) -> Result<Vec<(RequestKey, CachedData<Response>)>> {
        Ok(self
            .lock()?
            .get(name)
            .map(|ns| {
                ns.entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn key(path: &str) -> RequestKey {
        RequestKey::get(&Url::parse("https://app.example").unwrap().join(path).unwrap())
    }

    #[test]
    fn test_open_creates_empty_namespace() {
        let storage = MemoryStorage::new();
        storage.open("static-v1").unwrap();
        assert!(storage.has("static-v1").unwrap());
        assert!(storage.entries("static-v1").unwrap().is_empty());
    }

    #[test]
    fn test_put_and_match() {
        let storage = MemoryStorage::new();
        storage.put("static-v1", key("/a.js"), Response::ok("a")).unwrap();
        let hit = storage.match_in("static-v1", &key("/a.js")).unwrap();
        assert_eq!(hit.map(|r| r.text()).as_deref(), Some("a"));
        assert!(storage.match_in("static-v1", &key("/b.js")).unwrap().is_none());
        assert!(storage.match_in("other", &key("/a.js")).unwrap().is_none());
    }

    #[test]
    fn test_match_any_searches_all_namespaces() {
        let storage = MemoryStorage::new();
        storage.put("a", key("/one"), Response::ok("1")).unwrap();
        storage.put("b", key("/two"), Response::ok("2")).unwrap();
        assert!(storage.match_any(&key("/one")).unwrap().is_some());
        assert!(storage.match_any(&key("/two")).unwrap().is_some());
        assert!(storage.match_any(&key("/three")).unwrap().is_none());
    }

    #[test]
    fn test_delete() {
        let storage = MemoryStorage::new();
        storage.open("old").unwrap();
        assert!(storage.delete("old").unwrap());
        assert!(!storage.delete("old").unwrap());
        assert!(storage.keys().unwrap().is_empty());
    }

    #[test]
    fn test_put_all() {
        let storage = MemoryStorage::new();
        storage
            .put_all("v2", vec![(key("/"), Response::ok("root")), (key("/x"), Response::ok("x"))])
            .unwrap();
        assert_eq!(storage.entries("v2").unwrap().len(), 2);
    }
}
