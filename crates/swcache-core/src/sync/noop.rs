use futures::future::BoxFuture;

use crate::models::PendingRecord;

use super::{SyncError, SyncSource};

/// A source with nothing ever queued. Used by deployments that register a
/// sync trigger but keep no local records.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSource;

impl SyncSource for NoopSource {
    fn fetch_pending(&self) -> BoxFuture<'_, Result<Vec<PendingRecord>, SyncError>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn transmit<'a>(&'a self, _record: &'a PendingRecord) -> BoxFuture<'a, Result<(), SyncError>> {
        Box::pin(async { Ok(()) })
    }

    fn mark_synced<'a>(&'a self, _id: &'a str) -> BoxFuture<'a, Result<(), SyncError>> {
        Box::pin(async { Ok(()) })
    }
}
