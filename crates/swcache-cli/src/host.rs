//! Host implementation for the command line: pages and notifications are
//! reported on stdout instead of being shown.

use std::sync::Mutex;

use futures::future::BoxFuture;
use swcache_core::models::Notification;
use swcache_core::{Host, WindowClient, WorkerError};
use tracing::info;
use url::Url;

#[derive(Default)]
pub struct ConsoleHost {
    windows: Mutex<Vec<WindowClient>>,
}

impl ConsoleHost {
    pub fn new(windows: Vec<WindowClient>) -> Self {
        Self {
            windows: Mutex::new(windows),
        }
    }
}

type HostResult<T> = swcache_core::Result<T>;

impl Host for ConsoleHost {
    fn skip_waiting(&self) -> BoxFuture<'_, HostResult<()>> {
        Box::pin(async {
            info!("Skipping waiting phase");
            Ok(())
        })
    }

    fn claim_clients(&self) -> BoxFuture<'_, HostResult<()>> {
        Box::pin(async {
            info!("Claiming open pages");
            Ok(())
        })
    }

    fn show_notification(&self, notification: Notification) -> BoxFuture<'_, HostResult<()>> {
        Box::pin(async move {
            let rendered = serde_json::to_string_pretty(&notification)
                .map_err(|e| WorkerError::Host(e.to_string()))?;
            println!("{}", rendered);
            Ok(())
        })
    }

    fn close_notification(&self, notification: &Notification) -> BoxFuture<'_, HostResult<()>> {
        let title = notification.title.clone();
        Box::pin(async move {
            info!(title = %title, "Notification closed");
            Ok(())
        })
    }

    fn window_clients(&self) -> BoxFuture<'_, HostResult<Vec<WindowClient>>> {
        Box::pin(async move {
            self.windows
                .lock()
                .map(|w| w.clone())
                .map_err(|_| WorkerError::Host("window list lock poisoned".to_string()))
        })
    }

    fn focus(&self, client_id: &str) -> BoxFuture<'_, HostResult<()>> {
        let id = client_id.to_string();
        Box::pin(async move {
            let mut windows = self
                .windows
                .lock()
                .map_err(|_| WorkerError::Host("window list lock poisoned".to_string()))?;
            for window in windows.iter_mut() {
                window.focused = window.id == id;
            }
            println!("Focused window {}", id);
            Ok(())
        })
    }

    fn open_window(&self, url: Url) -> BoxFuture<'_, HostResult<()>> {
        Box::pin(async move {
            let mut windows = self
                .windows
                .lock()
                .map_err(|_| WorkerError::Host("window list lock poisoned".to_string()))?;
            let id = format!("window-{}", windows.len() + 1);
            println!("Opened window {} at {}", id, url);
            windows.push(WindowClient {
                id,
                url,
                focused: true,
            });
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_then_focus() {
        let host = ConsoleHost::default();
        host.open_window(Url::parse("https://app.example/").unwrap())
            .await
            .unwrap();
        let windows = host.window_clients().await.unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].id, "window-1");

        host.focus("window-1").await.unwrap();
        assert!(host.window_clients().await.unwrap()[0].focused);
    }
}
