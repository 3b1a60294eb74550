use std::fmt;
use std::future::Future;

use futures::future::{try_join_all, BoxFuture};
use url::Url;

use crate::error::Result;
use crate::models::{Notification, Request, Response};
use crate::sync::SyncReport;

/// Lifecycle and functional events delivered by the host.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(Request),
    Sync { tag: String },
    /// Push message data, `None` when the message carried no payload.
    Push(Option<Vec<u8>>),
    NotificationClick {
        /// The action button pressed, `None` for a click on the notification body.
        action: Option<String>,
        notification: Notification,
    },
}

impl WorkerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            WorkerEvent::Install => EventKind::Install,
            WorkerEvent::Activate => EventKind::Activate,
            WorkerEvent::Fetch(_) => EventKind::Fetch,
            WorkerEvent::Sync { .. } => EventKind::Sync,
            WorkerEvent::Push(_) => EventKind::Push,
            WorkerEvent::NotificationClick { .. } => EventKind::NotificationClick,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Install,
    Activate,
    Fetch,
    Sync,
    Push,
    NotificationClick,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Install => "install",
            EventKind::Activate => "activate",
            EventKind::Fetch => "fetch",
            EventKind::Sync => "sync",
            EventKind::Push => "push",
            EventKind::NotificationClick => "notificationclick",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Work an event handler leaves running after it returns.
///
/// The host must `settle` it before treating the event as finished;
/// dropping it unsettled abandons that work, the way a host tearing down
/// an idle worker would.
#[must_use = "extended work only runs when the event is settled"]
pub struct ExtendableEvent {
    kind: EventKind,
    pending: Vec<BoxFuture<'static, Result<()>>>,
}

impl ExtendableEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            pending: Vec::new(),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Keep the event alive until `work` completes.
    pub fn wait_until<F>(&mut self, work: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.pending.push(Box::pin(work));
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Drive all extended work to completion. Reports the first failure.
    pub async fn settle(self) -> Result<()> {
        try_join_all(self.pending).await.map(|_| ())
    }
}

impl fmt::Debug for ExtendableEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendableEvent")
            .field("kind", &self.kind)
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// How a fetch was answered.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Not intercepted; the request goes to the network untouched.
    Passthrough,
    Cache(Response),
    Network(Response),
    /// Offline navigation answered with the cached root document.
    Fallback(Response),
    /// The network failed and nothing could stand in for it.
    NoResponse,
}

impl FetchOutcome {
    pub fn response(&self) -> Option<&Response> {
        match self {
            FetchOutcome::Cache(r) | FetchOutcome::Network(r) | FetchOutcome::Fallback(r) => Some(r),
            FetchOutcome::Passthrough | FetchOutcome::NoResponse => None,
        }
    }

    pub fn into_response(self) -> Option<Response> {
        match self {
            FetchOutcome::Cache(r) | FetchOutcome::Network(r) | FetchOutcome::Fallback(r) => Some(r),
            FetchOutcome::Passthrough | FetchOutcome::NoResponse => None,
        }
    }

    pub fn source(&self) -> &'static str {
        match self {
            FetchOutcome::Passthrough => "passthrough",
            FetchOutcome::Cache(_) => "cache",
            FetchOutcome::Network(_) => "network",
            FetchOutcome::Fallback(_) => "fallback",
            FetchOutcome::NoResponse => "none",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    /// The tag belongs to some other trigger.
    Skipped,
    Completed(SyncReport),
    /// Logged and swallowed; the trigger's owner decides about retrying.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Notification closed, nothing else to do.
    Closed,
    Focused(String),
    Opened(Url),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    Installed { cached: usize },
    Activated { deleted: Vec<String> },
    Fetch(FetchOutcome),
    Sync(SyncStatus),
    /// The notification shown, `None` for a push without payload.
    Push(Option<Notification>),
    NotificationClick(ClickOutcome),
    /// No handler is registered for this kind of event.
    Unhandled(EventKind),
}
