//! Worker configuration.
//!
//! `WorkerConfig` is the fully resolved configuration handed to a `Worker`;
//! nothing about a deployment lives in globals, so several independently
//! configured workers can run in one process. `Config` is the optional
//! on-disk override file, stored at `~/.config/swcache/config.json`.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::WorkerError;
use crate::models::{NotificationAction, RequestKey};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "swcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Origin used when neither the config file nor the environment names one
const DEFAULT_ORIGIN: &str = "http://localhost:3000";

/// Path under the origin that receives synced records
const DEFAULT_SYNC_PATH: &str = "api/sync/";

/// Environment overrides
const ENV_ORIGIN: &str = "SWCACHE_ORIGIN";
const ENV_SYNC_ENDPOINT: &str = "SWCACHE_SYNC_ENDPOINT";

/// Deployment variant. Both run the same worker with different settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    #[default]
    Customer,
    Consumer,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Customer => "customer",
            Variant::Consumer => "consumer",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(Variant::Customer),
            "consumer" => Ok(Variant::Consumer),
            other => Err(format!("unknown variant: {}", other)),
        }
    }
}

/// Static parts of every notification shown for a push message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub default_title: String,
    pub default_body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub actions: Vec<NotificationAction>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            default_title: "SafeSource".to_string(),
            default_body: "SafeSource Verification Alert".to_string(),
            icon: "/icons/customer-icon-192x192.png".to_string(),
            badge: "/icons/badge-72x72.png".to_string(),
            vibrate: vec![100, 50, 100],
            actions: vec![
                NotificationAction::new("view", "View Details"),
                NotificationAction::new("dismiss", "Dismiss"),
            ],
        }
    }
}

/// Where background sync gets its records from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncBackend {
    /// Nothing is ever queued; sync runs and finds no work.
    #[default]
    None,
    /// JSON queue files under the variant's cache directory.
    Queue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    pub variant: Variant,
    /// Origin the worker serves; only responses for this origin are cached.
    pub origin: Url,
    /// Name of the one live cache namespace. Every other name is purged on activate.
    pub static_cache: String,
    /// Paths fetched and stored verbatim at install time.
    pub static_assets: Vec<String>,
    /// Background sync trigger handled by this worker.
    pub sync_tag: String,
    pub sync: SyncBackend,
    pub sync_endpoint: Option<Url>,
    pub notification: NotificationConfig,
}

impl WorkerConfig {
    pub fn preset(variant: Variant, origin: Url) -> Self {
        match variant {
            Variant::Customer => Self::customer(origin),
            Variant::Consumer => Self::consumer(origin),
        }
    }

    pub fn customer(origin: Url) -> Self {
        Self {
            variant: Variant::Customer,
            origin,
            static_cache: "safesource-customer-static-v2".to_string(),
            static_assets: to_strings(&[
                "/",
                "/index.html",
                "/manifest.json",
                "/icons/customer-icon-72x72.png",
                "/icons/customer-icon-192x192.png",
                "/icons/customer-icon-512x512.png",
                "/screenshots/customer-scan.png",
                "/screenshots/customer-results.png",
            ]),
            sync_tag: "background-sync-verification".to_string(),
            sync: SyncBackend::None,
            sync_endpoint: None,
            notification: NotificationConfig::default(),
        }
    }

    pub fn consumer(origin: Url) -> Self {
        Self {
            variant: Variant::Consumer,
            origin,
            static_cache: "safesource-consumer-static-v2".to_string(),
            static_assets: to_strings(&[
                "/",
                "/index.html",
                "/manifest.json",
                "/icons/consumer-icon-72x72.png",
                "/icons/consumer-icon-192x192.png",
                "/icons/consumer-icon-512x512.png",
            ]),
            sync_tag: "background-sync-network".to_string(),
            sync: SyncBackend::Queue,
            sync_endpoint: None,
            notification: NotificationConfig {
                default_body: "SafeSource Safety Alert".to_string(),
                icon: "/icons/consumer-icon-192x192.png".to_string(),
                ..NotificationConfig::default()
            },
        }
    }

    /// Resolve a path (or absolute URL) against the worker origin
    pub fn resolve(&self, path: &str) -> crate::error::Result<Url> {
        self.origin
            .join(path)
            .map_err(|e| WorkerError::Config(format!("Invalid path {}: {}", path, e)))
    }

    /// URL of the root document served as the offline navigation fallback
    pub fn root_url(&self) -> Url {
        let mut url = self.origin.clone();
        url.set_path("/");
        url.set_query(None);
        url.set_fragment(None);
        url
    }

    /// Base URL records are posted under
    pub fn sync_endpoint(&self) -> crate::error::Result<Url> {
        match self.sync_endpoint {
            Some(ref url) => Ok(url.clone()),
            None => self.resolve(DEFAULT_SYNC_PATH),
        }
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if !matches!(self.origin.scheme(), "http" | "https") {
            return Err(WorkerError::Config(format!(
                "Origin must be http or https: {}",
                self.origin
            )));
        }
        if self.static_cache.trim().is_empty() {
            return Err(WorkerError::Config("Cache name must not be empty".to_string()));
        }
        if self.sync_tag.trim().is_empty() {
            return Err(WorkerError::Config("Sync tag must not be empty".to_string()));
        }
        // Duplicates would make the install batch ambiguous
        let mut seen = HashSet::new();
        for asset in &self.static_assets {
            let url = self.resolve(asset)?;
            if !seen.insert(RequestKey::get(&url)) {
                return Err(WorkerError::Config(format!("Duplicate static asset: {}", asset)));
            }
        }
        Ok(())
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Optional overrides read from the config file. Missing fields fall back
/// to the selected variant's preset.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<Variant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_cache: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_assets: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_backend: Option<SyncBackend>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationConfig>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Per-variant directory holding cache namespaces and the sync queue
    pub fn cache_dir(variant: Variant) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME).join(variant.as_str()))
    }

    /// Apply `SWCACHE_*` environment variables on top of the file values
    pub fn apply_env(&mut self) {
        if let Ok(origin) = std::env::var(ENV_ORIGIN) {
            self.origin = Some(origin);
        }
        if let Ok(endpoint) = std::env::var(ENV_SYNC_ENDPOINT) {
            self.sync_endpoint = Some(endpoint);
        }
    }

    /// Build the worker configuration. An explicit `variant` wins over the file.
    pub fn worker_config(&self, variant: Option<Variant>) -> Result<WorkerConfig> {
        let variant = variant.or(self.variant).unwrap_or_default();
        let origin = self.origin.as_deref().unwrap_or(DEFAULT_ORIGIN);
        let origin = Url::parse(origin).with_context(|| format!("Invalid origin: {}", origin))?;

        let mut config = WorkerConfig::preset(variant, origin);
        if let Some(ref name) = self.static_cache {
            config.static_cache = name.clone();
        }
        if let Some(ref assets) = self.static_assets {
            config.static_assets = assets.clone();
        }
        if let Some(ref tag) = self.sync_tag {
            config.sync_tag = tag.clone();
        }
        if let Some(backend) = self.sync_backend {
            config.sync = backend;
        }
        if let Some(ref endpoint) = self.sync_endpoint {
            let url = Url::parse(endpoint)
                .with_context(|| format!("Invalid sync endpoint: {}", endpoint))?;
            config.sync_endpoint = Some(url);
        }
        if let Some(ref notification) = self.notification {
            config.notification = notification.clone();
        }

        config.validate()?;
        Ok(config)
    }
}
