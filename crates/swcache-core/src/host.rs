//! The environment the worker runs inside.
//!
//! A `Host` owns the pages the worker controls and the notification tray.
//! The worker asks it to activate immediately, claim pages, show or close
//! notifications and focus or open windows; it never touches those things
//! directly.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Result;
use crate::models::Notification;

/// An open application window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowClient {
    pub id: String,
    pub url: Url,
    #[serde(default)]
    pub focused: bool,
}

pub trait Host: Send + Sync {
    /// Replace any previously active worker without waiting for its pages to close.
    fn skip_waiting(&self) -> BoxFuture<'_, Result<()>>;

    /// Take control of every open page now.
    fn claim_clients(&self) -> BoxFuture<'_, Result<()>>;

    fn show_notification(&self, notification: Notification) -> BoxFuture<'_, Result<()>>;

    fn close_notification(&self, notification: &Notification) -> BoxFuture<'_, Result<()>>;

    /// Open windows, in the order the host reports them.
    fn window_clients(&self) -> BoxFuture<'_, Result<Vec<WindowClient>>>;

    fn focus(&self, client_id: &str) -> BoxFuture<'_, Result<()>>;

    fn open_window(&self, url: Url) -> BoxFuture<'_, Result<()>>;
}
