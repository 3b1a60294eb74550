//! Records queued on disk, one JSON array per record kind.
//!
//! The queue directory is shared by every process of a variant: the
//! application enqueues while `swcache sync` drains. All access goes
//! through a directory lock.

use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use tracing::debug;

use crate::fs::{write_atomic, DirLock};
use crate::models::{PendingRecord, RecordKind};

use super::transmit::HttpTransmitter;
use super::{SyncError, SyncSource};

pub struct QueueStore {
    queue_dir: PathBuf,
}

impl QueueStore {
    pub fn new(queue_dir: PathBuf) -> Result<Self, SyncError> {
        std::fs::create_dir_all(&queue_dir).map_err(storage_error)?;
        Ok(Self { queue_dir })
    }

    pub fn queue_dir(&self) -> &Path {
        &self.queue_dir
    }

    fn guard(&self) -> Result<DirLock, SyncError> {
        DirLock::acquire(&self.queue_dir).map_err(storage_error)
    }

    fn queue_path(&self, kind: RecordKind) -> PathBuf {
        self.queue_dir.join(format!("{}.json", kind.collection()))
    }

    fn load(&self, kind: RecordKind) -> Result<Vec<PendingRecord>, SyncError> {
        let path = self.queue_path(kind);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&path).map_err(storage_error)?;
        serde_json::from_str(&contents)
            .map_err(|e| SyncError::Fatal(format!("Failed to parse {} queue: {}", kind, e)))
    }

    fn save(&self, kind: RecordKind, records: &[PendingRecord]) -> Result<(), SyncError> {
        let path = self.queue_path(kind);
        let contents = serde_json::to_string_pretty(records)
            .map_err(|e| SyncError::Fatal(e.to_string()))?;
        write_atomic(&path, contents.as_bytes()).map_err(storage_error)
    }

    /// Queue a record for the next sync pass
    pub fn enqueue(
        &self,
        kind: RecordKind,
        payload: serde_json::Value,
    ) -> Result<PendingRecord, SyncError> {
        let _guard = self.guard()?;
        let record = PendingRecord::new(kind, payload);
        let mut records = self.load(kind)?;
        records.push(record.clone());
        self.save(kind, &records)?;
        debug!(id = %record.id, kind = %kind, "Record queued");
        Ok(record)
    }

    /// Every queued record, verifications first, each kind in queue order
    pub fn pending(&self) -> Result<Vec<PendingRecord>, SyncError> {
        let _guard = self.guard()?;
        let mut all = Vec::new();
        for kind in RecordKind::ALL {
            all.extend(self.load(kind)?);
        }
        Ok(all)
    }

    /// Drop a record from its queue. Returns whether it was found.
    pub fn remove(&self, id: &str) -> Result<bool, SyncError> {
        self.modify(id, |records, index| {
            records.remove(index);
        })
    }

    /// Count a failed delivery attempt.
    pub fn bump_attempts(&self, id: &str) -> Result<bool, SyncError> {
        self.modify(id, |records, index| {
            records[index].attempts += 1;
        })
    }

    fn modify(
        &self,
        id: &str,
        apply: impl FnOnce(&mut Vec<PendingRecord>, usize),
    ) -> Result<bool, SyncError> {
        let _guard = self.guard()?;
        for kind in RecordKind::ALL {
            let mut records = self.load(kind)?;
            if let Some(index) = records.iter().position(|r| r.id == id) {
                apply(&mut records, index);
                self.save(kind, &records)?;
                return Ok(true);
            }
        }
        Ok(false)
    }
}

fn storage_error(err: std::io::Error) -> SyncError {
    SyncError::Fatal(format!("Queue storage failure: {}", err))
}

/// Disk queue drained through the HTTP sync endpoint.
pub struct QueueSource {
    store: QueueStore,
    transmitter: HttpTransmitter,
}

impl QueueSource {
    pub fn new(store: QueueStore, transmitter: HttpTransmitter) -> Self {
        Self { store, transmitter }
    }

    pub fn store(&self) -> &QueueStore {
        &self.store
    }
}

impl SyncSource for QueueSource {
    fn fetch_pending(&self) -> BoxFuture<'_, Result<Vec<PendingRecord>, SyncError>> {
        Box::pin(async move { self.store.pending() })
    }

    fn transmit<'a>(&'a self, record: &'a PendingRecord) -> BoxFuture<'a, Result<(), SyncError>> {
        Box::pin(self.transmitter.send(record))
    }

    fn mark_synced<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), SyncError>> {
        Box::pin(async move {
            self.store.remove(id)?;
            Ok(())
        })
    }

    fn mark_deferred<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), SyncError>> {
        Box::pin(async move {
            self.store.bump_attempts(id)?;
            Ok(())
        })
    }
}
