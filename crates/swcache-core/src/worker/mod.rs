//! The cache worker.
//!
//! A `Worker` reacts to host events through a dispatch table mapping each
//! `EventKind` to a handler. Handlers return an `EventOutcome`; any work
//! that outlives the outcome (such as storing a freshly fetched response)
//! is parked in the event's `ExtendableEvent`, which the host settles.
//!
//! Behavior per event:
//! - install: fetch every static asset, store all or none, then skip waiting
//! - activate: delete every namespace but the current one, then claim pages
//! - fetch: cache-first for GET, opportunistic caching of same-origin 200s,
//!   cached root document for offline navigations
//! - sync: drain the sync source when the tag matches
//! - push / notificationclick: show notifications, focus or open windows

pub mod event;
mod handlers;

pub use event::{
    ClickOutcome, EventKind, EventOutcome, ExtendableEvent, FetchOutcome, SyncStatus, WorkerEvent,
};

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::debug;

use crate::cache::CacheStorage;
use crate::config::WorkerConfig;
use crate::error::Result;
use crate::host::Host;
use crate::network::Network;
use crate::sync::{NoopSource, SyncSource};

/// An event handler. Extended work goes into the `ExtendableEvent`.
pub type Handler =
    for<'a> fn(&'a Worker, WorkerEvent, &'a mut ExtendableEvent) -> BoxFuture<'a, Result<EventOutcome>>;

/// Handlers every worker starts with
const DEFAULT_HANDLERS: [(EventKind, Handler); 6] = [
    (EventKind::Install, handlers::install),
    (EventKind::Activate, handlers::activate),
    (EventKind::Fetch, handlers::fetch),
    (EventKind::Sync, handlers::sync),
    (EventKind::Push, handlers::push),
    (EventKind::NotificationClick, handlers::notification_click),
];

/// Result of dispatching an event: the handler's outcome plus the work the
/// host still has to wait for.
#[derive(Debug)]
pub struct Dispatched {
    pub outcome: EventOutcome,
    pub lifetime: ExtendableEvent,
}

pub struct Worker {
    config: Arc<WorkerConfig>,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    host: Arc<dyn Host>,
    sync: Arc<dyn SyncSource>,
    handlers: HashMap<EventKind, Handler>,
}

impl Worker {
    pub fn new(
        config: WorkerConfig,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
        host: Arc<dyn Host>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            storage,
            network,
            host,
            sync: Arc::new(NoopSource),
            handlers: DEFAULT_HANDLERS.into_iter().collect(),
        })
    }

    /// Use `source` for background sync instead of the empty default
    pub fn with_sync_source(mut self, source: Arc<dyn SyncSource>) -> Self {
        self.sync = source;
        self
    }

    /// Stop reacting to a kind of event; such events resolve as `Unhandled`.
    pub fn unregister(&mut self, kind: EventKind) {
        self.handlers.remove(&kind);
    }

    pub fn handles(&self, kind: EventKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    /// Run the handler for `event` and hand back its extended work unsettled.
    pub async fn dispatch(&self, event: WorkerEvent) -> Result<Dispatched> {
        let kind = event.kind();
        let mut lifetime = ExtendableEvent::new(kind);

        let Some(handler) = self.handlers.get(&kind).copied() else {
            debug!(event = %kind, "No handler registered");
            return Ok(Dispatched {
                outcome: EventOutcome::Unhandled(kind),
                lifetime,
            });
        };

        let outcome = handler(self, event, &mut lifetime).await?;
        Ok(Dispatched { outcome, lifetime })
    }

    /// Dispatch and wait for every piece of extended work.
    pub async fn handle(&self, event: WorkerEvent) -> Result<EventOutcome> {
        let Dispatched { outcome, lifetime } = self.dispatch(event).await?;
        lifetime.settle().await?;
        Ok(outcome)
    }
}
