//! Event handlers. Each takes the event it is registered for; the dispatch
//! table in `worker::mod` guarantees the pairing.

use std::sync::Arc;

use futures::future::{try_join_all, BoxFuture};
use tracing::{debug, error, info, warn};

use crate::error::{Result, WorkerError};
use crate::models::{same_origin, Notification, PushPayload, Request, RequestKey};
use crate::sync::run_sync;

use super::event::{
    ClickOutcome, EventKind, EventOutcome, ExtendableEvent, FetchOutcome, SyncStatus, WorkerEvent,
};
use super::Worker;

/// Notification action that brings the application to the foreground
const VIEW_ACTION: &str = "view";

fn mismatched<'a>(expected: EventKind, event: &WorkerEvent) -> BoxFuture<'a, Result<EventOutcome>> {
    let msg = format!("{} handler received a {} event", expected, event.kind());
    Box::pin(async move { Err(WorkerError::Host(msg)) })
}

pub(super) fn install<'a>(
    worker: &'a Worker,
    event: WorkerEvent,
    _ext: &'a mut ExtendableEvent,
) -> BoxFuture<'a, Result<EventOutcome>> {
    if !matches!(event, WorkerEvent::Install) {
        return mismatched(EventKind::Install, &event);
    }
    Box::pin(handle_install(worker))
}

async fn handle_install(worker: &Worker) -> Result<EventOutcome> {
    let config = worker.config();
    info!(variant = %config.variant, cache = %config.static_cache, "Worker installing");

    worker.storage.open(&config.static_cache)?;

    let urls = config
        .static_assets
        .iter()
        .map(|path| config.resolve(path))
        .collect::<Result<Vec<_>>>()?;

    // Everything is fetched before anything is stored: one failure aborts the batch
    let fetches = urls.into_iter().map(|url| {
        let network = Arc::clone(&worker.network);
        async move {
            let request = Request::get(url.clone());
            let key = request.key();
            let response = network.fetch(request).await.map_err(|e| WorkerError::AssetFetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
            if !response.is_success() {
                return Err(WorkerError::AssetFetch {
                    url: url.to_string(),
                    reason: format!("status {}", response.status),
                });
            }
            Ok((key, response))
        }
    });

    let entries = match try_join_all(fetches).await {
        Ok(entries) => entries,
        Err(e) => {
            error!(error = %e, "Install failed, no assets cached");
            return Err(e);
        }
    };

    let cached = entries.len();
    worker.storage.put_all(&config.static_cache, entries)?;
    info!(cache = %config.static_cache, cached, "Static assets cached");

    worker.host.skip_waiting().await?;
    Ok(EventOutcome::Installed { cached })
}

pub(super) fn activate<'a>(
    worker: &'a Worker,
    event: WorkerEvent,
    _ext: &'a mut ExtendableEvent,
) -> BoxFuture<'a, Result<EventOutcome>> {
    if !matches!(event, WorkerEvent::Activate) {
        return mismatched(EventKind::Activate, &event);
    }
    Box::pin(handle_activate(worker))
}

async fn handle_activate(worker: &Worker) -> Result<EventOutcome> {
    let config = worker.config();
    info!(variant = %config.variant, "Worker activating");

    let mut deleted = Vec::new();
    for name in worker.storage.keys()? {
        if name != config.static_cache {
            info!(cache = %name, "Deleting old cache");
            if worker.storage.delete(&name)? {
                deleted.push(name);
            }
        }
    }

    worker.host.claim_clients().await?;
    info!(cache = %config.static_cache, purged = deleted.len(), "Worker activated");
    Ok(EventOutcome::Activated { deleted })
}

pub(super) fn fetch<'a>(
    worker: &'a Worker,
    event: WorkerEvent,
    ext: &'a mut ExtendableEvent,
) -> BoxFuture<'a, Result<EventOutcome>> {
    match event {
        WorkerEvent::Fetch(request) => Box::pin(async move {
            handle_fetch(worker, request, ext)
                .await
                .map(EventOutcome::Fetch)
        }),
        other => mismatched(EventKind::Fetch, &other),
    }
}

async fn handle_fetch(
    worker: &Worker,
    request: Request,
    ext: &mut ExtendableEvent,
) -> Result<FetchOutcome> {
    if !request.is_get() {
        return Ok(FetchOutcome::Passthrough);
    }

    let key = request.key();
    if let Some(cached) = worker.storage.match_any(&key)? {
        debug!(key = %key, "Cache hit");
        return Ok(FetchOutcome::Cache(cached));
    }
    debug!(key = %key, "Cache miss");

    match worker.network.fetch(request.clone()).await {
        Ok(response) => {
            if !response.is_cacheable() {
                return Ok(FetchOutcome::Network(response));
            }

            let config = worker.config();
            if same_origin(&config.origin, request.url()) {
                let storage = Arc::clone(&worker.storage);
                let cache = config.static_cache.clone();
                let copy = response.clone();
                ext.wait_until(async move { storage.put(&cache, key, copy) });
            } else {
                debug!(key = %key, "Cross-origin response not cached");
            }
            Ok(FetchOutcome::Network(response))
        }
        Err(e) => {
            debug!(key = %key, error = %e, "Network fetch failed");
            if !request.is_navigation() {
                return Ok(FetchOutcome::NoResponse);
            }
            let root = RequestKey::get(&worker.config().root_url());
            match worker.storage.match_any(&root)? {
                Some(document) => Ok(FetchOutcome::Fallback(document)),
                None => {
                    warn!(key = %key, "Offline navigation with no cached root document");
                    Ok(FetchOutcome::NoResponse)
                }
            }
        }
    }
}

pub(super) fn sync<'a>(
    worker: &'a Worker,
    event: WorkerEvent,
    _ext: &'a mut ExtendableEvent,
) -> BoxFuture<'a, Result<EventOutcome>> {
    match event {
        WorkerEvent::Sync { tag } => Box::pin(async move {
            Ok(EventOutcome::Sync(handle_sync(worker, &tag).await))
        }),
        other => mismatched(EventKind::Sync, &other),
    }
}

async fn handle_sync(worker: &Worker, tag: &str) -> SyncStatus {
    info!(tag, "Background sync");
    if tag != worker.config().sync_tag {
        debug!(tag, "Sync tag not handled by this worker");
        return SyncStatus::Skipped;
    }

    match run_sync(worker.sync.as_ref()).await {
        Ok(report) => SyncStatus::Completed(report),
        Err(e) => {
            error!(tag, error = %e, "Background sync failed");
            SyncStatus::Failed(e.to_string())
        }
    }
}

pub(super) fn push<'a>(
    worker: &'a Worker,
    event: WorkerEvent,
    _ext: &'a mut ExtendableEvent,
) -> BoxFuture<'a, Result<EventOutcome>> {
    match event {
        WorkerEvent::Push(data) => Box::pin(async move {
            handle_push(worker, data).await.map(EventOutcome::Push)
        }),
        other => mismatched(EventKind::Push, &other),
    }
}

async fn handle_push(worker: &Worker, data: Option<Vec<u8>>) -> Result<Option<Notification>> {
    info!("Push message received");
    let Some(data) = data.filter(|d| !d.is_empty()) else {
        return Ok(None);
    };

    let payload = PushPayload::parse(&data);
    let notification = Notification::from_payload(&worker.config().notification, payload);
    worker.host.show_notification(notification.clone()).await?;
    Ok(Some(notification))
}

pub(super) fn notification_click<'a>(
    worker: &'a Worker,
    event: WorkerEvent,
    _ext: &'a mut ExtendableEvent,
) -> BoxFuture<'a, Result<EventOutcome>> {
    match event {
        WorkerEvent::NotificationClick {
            action,
            notification,
        } => Box::pin(async move {
            handle_click(worker, action.as_deref(), &notification)
                .await
                .map(EventOutcome::NotificationClick)
        }),
        other => mismatched(EventKind::NotificationClick, &other),
    }
}

async fn handle_click(
    worker: &Worker,
    action: Option<&str>,
    notification: &Notification,
) -> Result<ClickOutcome> {
    info!(action = action.unwrap_or(""), "Notification clicked");
    worker.host.close_notification(notification).await?;

    if action != Some(VIEW_ACTION) {
        return Ok(ClickOutcome::Closed);
    }

    let origin = &worker.config().origin;
    let windows = worker.host.window_clients().await?;
    if let Some(window) = windows.iter().find(|w| same_origin(origin, &w.url)) {
        worker.host.focus(&window.id).await?;
        return Ok(ClickOutcome::Focused(window.id.clone()));
    }

    let root = worker.config().root_url();
    worker.host.open_window(root.clone()).await?;
    Ok(ClickOutcome::Opened(root))
}
