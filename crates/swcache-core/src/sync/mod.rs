//! Background synchronization of records queued while offline.
//!
//! A `SyncSource` supplies pending records, transmits them and marks them
//! done. `run_sync` drives one pass: recoverable transmission errors leave
//! the record queued for the next trigger, the first unrecoverable error
//! ends the pass. Retry scheduling belongs to whoever fires the trigger.

pub mod noop;
pub mod queue;
pub mod transmit;

pub use noop::NoopSource;
pub use queue::{QueueSource, QueueStore};
pub use transmit::HttpTransmitter;

use futures::future::BoxFuture;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::PendingRecord;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Worth retrying later: offline, throttled, server trouble.
    #[error("{0} (will retry)")]
    Recoverable(String),

    #[error("{0}")]
    Fatal(String),
}

impl SyncError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SyncError::Recoverable(_))
    }

    /// Map an HTTP error status returned by the sync endpoint
    pub fn from_status(status: u16, body: &str) -> Self {
        let body = crate::error::WorkerError::truncate_body(body);
        match status {
            429 => SyncError::Recoverable(format!("Status {}", status)),
            500..=599 => SyncError::Recoverable(format!("Server error {}: {}", status, body)),
            401 => SyncError::Fatal("Unauthorized - sync token may be expired".to_string()),
            _ => SyncError::Fatal(format!("Status {}: {}", status, body)),
        }
    }
}

/// Where pending records come from and go to.
pub trait SyncSource: Send + Sync {
    fn fetch_pending(&self) -> BoxFuture<'_, Result<Vec<PendingRecord>, SyncError>>;

    fn transmit<'a>(&'a self, record: &'a PendingRecord) -> BoxFuture<'a, Result<(), SyncError>>;

    fn mark_synced<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), SyncError>>;

    /// Called when a record stays queued after a recoverable failure.
    fn mark_deferred<'a>(&'a self, _id: &'a str) -> BoxFuture<'a, Result<(), SyncError>> {
        Box::pin(async { Ok(()) })
    }
}

/// Outcome of one sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub synced: usize,
    pub deferred: usize,
}

/// Transmit every pending record once.
pub async fn run_sync(source: &dyn SyncSource) -> Result<SyncReport, SyncError> {
    let pending = source.fetch_pending().await?;
    debug!(count = pending.len(), "Pending records fetched");

    let mut report = SyncReport::default();
    for record in &pending {
        match source.transmit(record).await {
            Ok(()) => {
                source.mark_synced(&record.id).await?;
                report.synced += 1;
            }
            Err(e) if e.is_recoverable() => {
                warn!(id = %record.id, kind = %record.kind, error = %e, "Record deferred");
                source.mark_deferred(&record.id).await?;
                report.deferred += 1;
            }
            Err(e) => {
                warn!(id = %record.id, kind = %record.kind, error = %e, "Sync stopped");
                return Err(e);
            }
        }
    }

    info!(synced = report.synced, deferred = report.deferred, "Sync pass complete");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordKind;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Source whose transmit outcome is scripted per record id
    struct ScriptedSource {
        pending: Vec<PendingRecord>,
        outcomes: HashMap<String, SyncError>,
        synced: Mutex<Vec<String>>,
        deferred: Mutex<Vec<String>>,
        attempted: Mutex<Vec<String>>,
    }

    impl ScriptedSource {
        fn new(count: usize) -> Self {
            Self {
                pending: (0..count)
                    .map(|i| {
                        let mut r = PendingRecord::new(RecordKind::Verification, json!({ "n": i }));
                        r.id = format!("r{}", i);
                        r
                    })
                    .collect(),
                outcomes: HashMap::new(),
                synced: Mutex::new(Vec::new()),
                deferred: Mutex::new(Vec::new()),
                attempted: Mutex::new(Vec::new()),
            }
        }

        fn fail(mut self, id: &str, err: SyncError) -> Self {
            self.outcomes.insert(id.to_string(), err);
            self
        }
    }

    impl SyncSource for ScriptedSource {
        fn fetch_pending(&self) -> BoxFuture<'_, Result<Vec<PendingRecord>, SyncError>> {
            Box::pin(async move { Ok(self.pending.clone()) })
        }

        fn transmit<'a>(&'a self, record: &'a PendingRecord) -> BoxFuture<'a, Result<(), SyncError>> {
            Box::pin(async move {
                self.attempted.lock().unwrap().push(record.id.clone());
                match self.outcomes.get(&record.id) {
                    Some(err) => Err(err.clone()),
                    None => Ok(()),
                }
            })
        }

        fn mark_synced<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), SyncError>> {
            Box::pin(async move {
                self.synced.lock().unwrap().push(id.to_string());
                Ok(())
            })
        }

        fn mark_deferred<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), SyncError>> {
            Box::pin(async move {
                self.deferred.lock().unwrap().push(id.to_string());
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn test_empty_pending_is_noop() {
        let report = run_sync(&NoopSource).await.unwrap();
        assert_eq!(report, SyncReport::default());
    }

    #[tokio::test]
    async fn test_all_records_synced() {
        let source = ScriptedSource::new(3);
        let report = run_sync(&source).await.unwrap();
        assert_eq!(report.synced, 3);
        assert_eq!(*source.synced.lock().unwrap(), vec!["r0", "r1", "r2"]);
    }

    #[tokio::test]
    async fn test_recoverable_error_continues() {
        let source = ScriptedSource::new(3).fail("r1", SyncError::Recoverable("offline".into()));
        let report = run_sync(&source).await.unwrap();
        assert_eq!(report, SyncReport { synced: 2, deferred: 1 });
        assert_eq!(*source.synced.lock().unwrap(), vec!["r0", "r2"]);
        assert_eq!(*source.deferred.lock().unwrap(), vec!["r1"]);
    }

    #[tokio::test]
    async fn test_fatal_error_stops() {
        let source = ScriptedSource::new(3).fail("r1", SyncError::Fatal("bad payload".into()));
        let err = run_sync(&source).await.unwrap_err();
        assert!(!err.is_recoverable());
        assert_eq!(*source.synced.lock().unwrap(), vec!["r0"]);
        assert_eq!(*source.attempted.lock().unwrap(), vec!["r0", "r1"]);
    }

    #[test]
    fn test_from_status() {
        assert!(SyncError::from_status(429, "").is_recoverable());
        assert!(SyncError::from_status(503, "down").is_recoverable());
        assert!(!SyncError::from_status(400, "bad").is_recoverable());
        assert!(!SyncError::from_status(401, "").is_recoverable());
        assert!(!SyncError::from_status(404, "").is_recoverable());
        assert!(!SyncError::from_status(408, "").is_recoverable());
    }
}
