//! File-backed cache storage.
//!
//! A namespace is an index file `<name>.json` holding keys and response
//! metadata, next to a `<name>.bodies/` directory of response bodies named
//! by the SHA-256 of their content. Lookups parse only the small index and
//! read the one body they return.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{Result, WorkerError};
use crate::fs::{write_atomic, DirLock};
use crate::models::{Headers, RequestKey, Response, ResponseType};

use super::entry::CachedData;
use super::storage::CacheStorage;

/// Extension of namespace index files
const INDEX_EXT: &str = "json";

/// Extension of per-namespace body directories
const BODIES_EXT: &str = "bodies";

#[derive(Debug, Serialize, Deserialize)]
struct NamespaceIndex {
    name: String,
    created_at: DateTime<Utc>,
    entries: Vec<IndexEntry>,
}

impl NamespaceIndex {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            created_at: Utc::now(),
            entries: Vec::new(),
        }
    }

    fn upsert(&mut self, entry: IndexEntry) {
        match self.entries.iter_mut().find(|e| e.key == entry.key) {
            Some(slot) => *slot = entry,
            None => self.entries.push(entry),
        }
    }
}

/// A response without its body, plus the body's file name.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    key: RequestKey,
    cached_at: DateTime<Utc>,
    status: u16,
    #[serde(default)]
    status_text: String,
    #[serde(default, rename = "type")]
    response_type: ResponseType,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    headers: Headers,
    body: String,
}

impl IndexEntry {
    fn new(key: RequestKey, cached_at: DateTime<Utc>, response: Response, body: String) -> Self {
        Self {
            key,
            cached_at,
            status: response.status,
            status_text: response.status_text,
            response_type: response.response_type,
            url: response.url,
            headers: response.headers,
            body,
        }
    }

    fn into_response(self, body: Vec<u8>) -> Response {
        Response {
            status: self.status,
            status_text: self.status_text,
            response_type: self.response_type,
            url: self.url,
            headers: self.headers,
            body,
        }
    }
}

pub struct DiskStorage {
    cache_dir: PathBuf,
}

impl DiskStorage {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self { cache_dir })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Held for every access that reads or rewrites namespace files
    fn lock(&self) -> Result<DirLock> {
        Ok(DirLock::acquire(&self.cache_dir)?)
    }

    fn index_path(&self, name: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}.{}", encode_name(name), INDEX_EXT))
    }

    fn bodies_dir(&self, name: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}.{}", encode_name(name), BODIES_EXT))
    }

    fn load(&self, name: &str) -> Result<Option<NamespaceIndex>> {
        let path = self.index_path(name);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path).map_err(|e| {
            WorkerError::CacheStorage(format!("Failed to read cache file {}: {}", name, e))
        })?;
        let index = serde_json::from_str(&contents).map_err(|e| {
            WorkerError::CacheStorage(format!("Failed to parse cache file {}: {}", name, e))
        })?;
        Ok(Some(index))
    }

    fn read_body(&self, name: &str, entry: &IndexEntry) -> Result<Vec<u8>> {
        let path = self.bodies_dir(name).join(&entry.body);
        std::fs::read(&path).map_err(|e| {
            WorkerError::CacheStorage(format!(
                "Missing body for {} in cache {}: {}",
                entry.key, name, e
            ))
        })
    }

    /// Write the index in one rename, then drop bodies no entry refers to.
    fn save(&self, name: &str, index: &NamespaceIndex) -> Result<()> {
        let contents = serde_json::to_vec(index).map_err(WorkerError::storage)?;
        write_atomic(&self.index_path(name), &contents)?;

        let bodies = self.bodies_dir(name);
        if bodies.exists() {
            let live: HashSet<&str> = index.entries.iter().map(|e| e.body.as_str()).collect();
            for file in std::fs::read_dir(&bodies)? {
                let path = file?.path();
                let stale = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| !live.contains(n));
                if stale {
                    std::fs::remove_file(&path)?;
                }
            }
        }

        debug!(cache = name, entries = index.entries.len(), "Cache namespace written");
        Ok(())
    }

    /// Add or replace entries. Bodies are written first; the entries only
    /// become visible when the index is replaced, so a failure part way
    /// leaves the namespace as it was.
    fn store(&self, name: &str, entries: Vec<(RequestKey, Response)>) -> Result<()> {
        let _lock = self.lock()?;
        let mut index = self
            .load(name)?
            .unwrap_or_else(|| NamespaceIndex::new(name));

        let bodies = self.bodies_dir(name);
        std::fs::create_dir_all(&bodies)?;

        let cached_at = Utc::now();
        for (key, response) in entries {
            let digest = hex::encode(Sha256::digest(&response.body));
            let path = bodies.join(&digest);
            if !path.exists() {
                write_atomic(&path, &response.body)?;
            }
            index.upsert(IndexEntry::new(key, cached_at, response, digest));
        }
        index.entries.sort_by(|a, b| a.key.cmp(&b.key));

        self.save(name, &index)
    }
}

impl CacheStorage for DiskStorage {
    fn open(&self, name: &str) -> Result<()> {
        let _lock = self.lock()?;
        if self.index_path(name).exists() {
            return Ok(());
        }
        self.save(name, &NamespaceIndex::new(name))
    }

    fn has(&self, name: &str) -> Result<bool> {
        Ok(self.index_path(name).exists())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.cache_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(INDEX_EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match decode_name(stem) {
                Some(name) => names.push(name),
                None => warn!(file = %path.display(), "Ignoring unrecognized cache file"),
            }
        }
        names.sort();
        Ok(names)
    }

    fn delete(&self, name: &str) -> Result<bool> {
        let _lock = self.lock()?;
        let path = self.index_path(name);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(path)?;

        let bodies = self.bodies_dir(name);
        if bodies.exists() {
            std::fs::remove_dir_all(bodies)?;
        }
        Ok(true)
    }

    fn match_in(&self, name: &str, key: &RequestKey) -> Result<Option<Response>> {
        let _lock = self.lock()?;
        let Some(index) = self.load(name)? else {
            return Ok(None);
        };
        let Some(entry) = index.entries.into_iter().find(|e| &e.key == key) else {
            return Ok(None);
        };
        let body = self.read_body(name, &entry)?;
        Ok(Some(entry.into_response(body)))
    }

    fn put(&self, name: &str, key: RequestKey, response: Response) -> Result<()> {
        self.store(name, vec![(key, response)])
    }

    fn put_all(&self, name: &str, entries: Vec<(RequestKey, Response)>) -> Result<()> {
        self.store(name, entries)
    }

    fn entries(&self, name: &str) -> Result<Vec<(RequestKey, CachedData<Response>)>> {
        let _lock = self.lock()?;
        let Some(index) = self.load(name)? else {
            return Ok(Vec::new());
        };
        index
            .entries
            .into_iter()
            .map(|entry| -> Result<(RequestKey, CachedData<Response>)> {
                let body = self.read_body(name, &entry)?;
                let key = entry.key.clone();
                let cached_at = entry.cached_at;
                Ok((
                    key,
                    CachedData {
                        data: entry.into_response(body),
                        cached_at,
                    },
                ))
            })
            .collect()
    }
}

/// Percent-encode everything but `[A-Za-z0-9._-]` so any namespace name is a safe file name.
fn encode_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'-') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

/// Inverse of `encode_name`. Stems `encode_name` would never produce are
/// rejected, so every reported name maps back to the file it came from.
fn decode_name(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    let name = String::from_utf8(out).ok()?;
    (encode_name(&name) == encoded).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn key(path: &str) -> RequestKey {
        RequestKey::get(&Url::parse("https://app.example").unwrap().join(path).unwrap())
    }

    fn body_files(dir: &Path, name: &str) -> usize {
        std::fs::read_dir(dir.join(format!("{}.bodies", name)))
            .map(|files| files.count())
            .unwrap_or(0)
    }

    #[test]
    fn test_name_encoding_round_trips_odd_names() {
        for name in ["safesource-customer-static-v2", "cache v1/static", "ünïcode:1"] {
            let encoded = encode_name(name);
            assert!(!encoded.contains('/'));
            assert_eq!(decode_name(&encoded).as_deref(), Some(name));
        }
    }

    #[test]
    fn test_decode_rejects_truncated_escape() {
        assert!(decode_name("abc%2").is_none());
    }

    #[test]
    fn test_decode_rejects_non_canonical_names() {
        assert!(decode_name("Foo Bar").is_none());
        assert!(decode_name("%+F").is_none());
        assert!(decode_name("cache%2fv1").is_none());
        assert!(decode_name("%61bc").is_none());
    }

    #[test]
    fn test_foreign_files_are_not_reported_as_namespaces() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path().to_path_buf()).unwrap();
        storage.open("static-v2").unwrap();
        std::fs::write(
            dir.path().join("Foo Bar.json"),
            r#"{"name":"Foo Bar","created_at":"2024-01-01T00:00:00Z","entries":[]}"#,
        )
        .unwrap();

        assert_eq!(storage.keys().unwrap(), vec!["static-v2"]);
    }

    #[test]
    fn test_entries_persist_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let storage = DiskStorage::new(dir.path().to_path_buf()).unwrap();
            storage
                .put("static-v2", key("/index.html"), Response::ok("<html>"))
                .unwrap();
        }
        let storage = DiskStorage::new(dir.path().to_path_buf()).unwrap();
        let hit = storage.match_in("static-v2", &key("/index.html")).unwrap();
        assert_eq!(hit.map(|r| r.text()).as_deref(), Some("<html>"));
    }

    #[test]
    fn test_bodies_are_stored_outside_the_index() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path().to_path_buf()).unwrap();
        let image: Vec<u8> = (0..=255).collect();
        let response = Response::ok(image.clone()).with_header("content-type", "image/png");
        storage.put("v2", key("/icon.png"), response).unwrap();

        let index = std::fs::read_to_string(dir.path().join("v2.json")).unwrap();
        assert!(!index.contains("[0,1,2,3"));
        assert!(index.contains("image/png"));
        assert_eq!(body_files(dir.path(), "v2"), 1);

        let hit = storage.match_in("v2", &key("/icon.png")).unwrap().unwrap();
        assert_eq!(hit.body, image);
        assert_eq!(hit.header("content-type"), Some("image/png"));
    }

    #[test]
    fn test_replaced_body_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path().to_path_buf()).unwrap();
        storage.put("v2", key("/"), Response::ok("old")).unwrap();
        storage.put("v2", key("/"), Response::ok("new")).unwrap();

        assert_eq!(body_files(dir.path(), "v2"), 1);
        let hit = storage.match_in("v2", &key("/")).unwrap();
        assert_eq!(hit.map(|r| r.text()).as_deref(), Some("new"));
    }

    #[test]
    fn test_keys_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path().to_path_buf()).unwrap();
        storage.open("static-v1").unwrap();
        storage.put("static-v2", key("/"), Response::ok("root")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        assert_eq!(storage.keys().unwrap(), vec!["static-v1", "static-v2"]);
        assert!(storage.delete("static-v1").unwrap());
        assert!(!storage.delete("static-v1").unwrap());
        assert!(storage.delete("static-v2").unwrap());
        assert!(!dir.path().join("static-v2.bodies").exists());
        assert!(storage.keys().unwrap().is_empty());
    }

    #[test]
    fn test_open_keeps_existing_entries() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path().to_path_buf()).unwrap();
        storage.put("v2", key("/"), Response::ok("root")).unwrap();
        storage.open("v2").unwrap();
        assert_eq!(storage.entries("v2").unwrap().len(), 1);
    }

    #[test]
    fn test_put_all_writes_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path().to_path_buf()).unwrap();
        storage
            .put_all(
                "v2",
                vec![
                    (key("/"), Response::ok("root")),
                    (key("/manifest.json"), Response::ok("{}")),
                ],
            )
            .unwrap();

        let entries = storage.entries("v2").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].1.data.text(), "root");

        // Only the index, the bodies dir and the lock file remain
        let mut files: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|f| f.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        files.sort();
        assert_eq!(files, vec![".lock", "v2.bodies", "v2.json"]);
    }

    #[test]
    fn test_concurrent_writers_keep_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let path = dir.path().to_path_buf();
                std::thread::spawn(move || {
                    let storage = DiskStorage::new(path).unwrap();
                    for i in 0..5 {
                        let path = format!("/t{}/{}", t, i);
                        storage.put("v2", key(&path), Response::ok(path.clone())).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let storage = DiskStorage::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(storage.entries("v2").unwrap().len(), 40);
        let hit = storage.match_in("v2", &key("/t3/4")).unwrap();
        assert_eq!(hit.map(|r| r.text()).as_deref(), Some("/t3/4"));
    }

    #[test]
    fn test_corrupt_file_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path().to_path_buf()).unwrap();
        std::fs::write(dir.path().join("broken.json"), "{").unwrap();
        let err = storage.match_in("broken", &key("/")).unwrap_err();
        assert!(matches!(err, WorkerError::CacheStorage(_)));
    }
}
