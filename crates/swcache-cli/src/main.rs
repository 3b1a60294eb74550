//! swcache - drive the offline cache worker from the command line.
//!
//! Each subcommand delivers one event to a worker backed by the on-disk
//! cache of the selected deployment variant, so `install`, `activate` and
//! `fetch` behave exactly as they would inside the application host.

mod host;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use swcache_core::auth::TokenStore;
use swcache_core::models::{Notification, RecordKind, Request, RequestMode};
use swcache_core::sync::{HttpTransmitter, QueueSource, QueueStore};
use swcache_core::worker::{ClickOutcome, SyncStatus};
use swcache_core::{
    CacheStorage, Config, DiskStorage, EventOutcome, FetchOutcome, HttpNetwork, SyncBackend,
    Variant, WindowClient, Worker, WorkerConfig, WorkerEvent,
};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use url::Url;

use host::ConsoleHost;

/// Subdirectory of the variant cache dir holding namespaces
const CACHES_DIR: &str = "caches";

/// Subdirectory of the variant cache dir holding the sync queue
const QUEUE_DIR: &str = "queue";

#[derive(Parser)]
#[command(name = "swcache", version, about = "Offline-first request cache worker")]
struct Cli {
    /// Deployment variant (overrides the config file)
    #[arg(long, env = "SWCACHE_VARIANT")]
    variant: Option<Variant>,

    /// Config file (default: ~/.config/swcache/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Cache directory (default: ~/.cache/swcache/<variant>)
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch and cache every static asset
    Install,
    /// Purge cache namespaces from older versions
    Activate,
    /// Resolve a request through the worker
    Fetch {
        /// URL or path relative to the origin
        target: String,
        #[arg(long, default_value = "GET")]
        method: String,
        /// Treat the request as a page navigation
        #[arg(long)]
        navigate: bool,
        /// Print the response body
        #[arg(long)]
        body: bool,
    },
    /// Fire a background sync trigger
    Sync {
        /// Sync tag (default: the variant's tag)
        #[arg(long)]
        tag: Option<String>,
    },
    /// Deliver a push message
    Push {
        /// Message data, usually JSON like {"title": "...", "body": "..."}
        data: Option<String>,
    },
    /// Click a notification action
    Click {
        /// Action name, e.g. "view" or "dismiss"
        action: Option<String>,
        /// Open windows as ID=URL
        #[arg(long = "window", value_parser = parse_window)]
        windows: Vec<WindowClient>,
    },
    /// Queue a record for background sync
    Enqueue {
        /// verification or report
        kind: RecordKind,
        /// Record payload as JSON
        payload: String,
    },
    /// List cache namespaces and their entries
    Ls,
    /// Store the sync endpoint token in the OS keychain
    Login { token: String },
    /// Remove the stored sync token
    Logout,
}

fn parse_window(s: &str) -> Result<WindowClient, String> {
    let (id, url) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ID=URL, got {}", s))?;
    let url = Url::parse(url).map_err(|e| format!("invalid window URL {}: {}", url, e))?;
    Ok(WindowClient {
        id: id.to_string(),
        url,
        focused: false,
    })
}

/// Initialize the tracing subscriber for logging
fn init_tracing(verbose: u8) -> WorkerGuard {
    // RUST_LOG wins over -v flags
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let (writer, guard) = tracing_appender::non_blocking(io::stderr());
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = init_tracing(cli.verbose);

    let mut file_config = match cli.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    file_config.apply_env();
    let config = file_config.worker_config(cli.variant)?;
    debug!(variant = %config.variant, origin = %config.origin, "Config loaded");

    let cache_dir = match cli.cache_dir {
        Some(ref dir) => dir.clone(),
        None => Config::cache_dir(config.variant)?,
    };

    match cli.command {
        Command::Login { ref token } => {
            TokenStore::store(config.variant, token)?;
            println!("Sync token stored for {}", config.variant);
            return Ok(());
        }
        Command::Logout => {
            TokenStore::delete(config.variant)?;
            println!("Sync token removed for {}", config.variant);
            return Ok(());
        }
        Command::Enqueue { kind, ref payload } => {
            let payload: serde_json::Value =
                serde_json::from_str(payload).context("Payload must be valid JSON")?;
            let store = QueueStore::new(cache_dir.join(QUEUE_DIR))?;
            let record = store.enqueue(kind, payload)?;
            println!("Queued {} {}", record.kind, record.id);
            return Ok(());
        }
        _ => {}
    }

    let storage = Arc::new(DiskStorage::new(cache_dir.join(CACHES_DIR))?);
    if let Command::Ls = cli.command {
        return list_caches(storage.as_ref(), &config);
    }

    let windows = match cli.command {
        Command::Click { ref windows, .. } => windows.clone(),
        _ => Vec::new(),
    };
    let worker = build_worker(config, storage, &cache_dir, windows)?;
    info!(variant = %worker.config().variant, "Worker ready");

    let event = match cli.command {
        Command::Install => WorkerEvent::Install,
        Command::Activate => WorkerEvent::Activate,
        Command::Fetch {
            ref target,
            ref method,
            navigate,
            ..
        } => {
            let url = worker.config().resolve(target)?;
            let method = method
                .to_ascii_uppercase()
                .parse()
                .with_context(|| format!("Invalid method: {}", method))?;
            let request = Request::new(method, url);
            WorkerEvent::Fetch(if navigate {
                request.with_mode(RequestMode::Navigate)
            } else {
                request
            })
        }
        Command::Sync { ref tag } => WorkerEvent::Sync {
            tag: tag.clone().unwrap_or_else(|| worker.config().sync_tag.clone()),
        },
        Command::Push { ref data } => WorkerEvent::Push(data.clone().map(String::into_bytes)),
        Command::Click { ref action, .. } => WorkerEvent::NotificationClick {
            action: action.clone(),
            notification: Notification::from_payload(
                &worker.config().notification,
                Default::default(),
            ),
        },
        Command::Login { .. } | Command::Logout | Command::Enqueue { .. } | Command::Ls => {
            return Ok(())
        }
    };

    let outcome = worker.handle(event).await?;
    let show_body = matches!(cli.command, Command::Fetch { body: true, .. });
    report(outcome, show_body);
    Ok(())
}

fn build_worker(
    config: WorkerConfig,
    storage: Arc<DiskStorage>,
    cache_dir: &Path,
    windows: Vec<WindowClient>,
) -> Result<Worker> {
    let network = Arc::new(HttpNetwork::new(config.origin.clone())?);
    let host = Arc::new(ConsoleHost::new(windows));
    let backend = config.sync;
    let endpoint = config.sync_endpoint()?;
    let variant = config.variant;

    let worker = Worker::new(config, storage, network, host)?;
    Ok(match backend {
        SyncBackend::None => worker,
        SyncBackend::Queue => {
            let token = TokenStore::get(variant).unwrap_or_else(|e| {
                debug!(error = %e, "No sync token available");
                None
            });
            let store = QueueStore::new(cache_dir.join(QUEUE_DIR))?;
            let transmitter = HttpTransmitter::new(endpoint)?.with_token(token);
            worker.with_sync_source(Arc::new(QueueSource::new(store, transmitter)))
        }
    })
}

fn report(outcome: EventOutcome, show_body: bool) {
    match outcome {
        EventOutcome::Installed { cached } => println!("Installed: {} assets cached", cached),
        EventOutcome::Activated { deleted } => {
            if deleted.is_empty() {
                println!("Activated: no old caches");
            } else {
                println!("Activated: deleted {}", deleted.join(", "));
            }
        }
        EventOutcome::Fetch(fetch) => {
            let source = fetch.source();
            match fetch {
                FetchOutcome::Passthrough => println!("passthrough (not intercepted)"),
                FetchOutcome::NoResponse => println!("none (network failed, no fallback)"),
                FetchOutcome::Cache(response)
                | FetchOutcome::Network(response)
                | FetchOutcome::Fallback(response) => {
                    println!(
                        "{} {} {}",
                        source,
                        response.status,
                        response.url.as_deref().unwrap_or("")
                    );
                    if show_body {
                        println!("{}", response.text());
                    }
                }
            }
        }
        EventOutcome::Sync(SyncStatus::Skipped) => println!("Sync skipped: tag not handled"),
        EventOutcome::Sync(SyncStatus::Completed(r)) => {
            println!("Sync complete: {} synced, {} deferred", r.synced, r.deferred)
        }
        EventOutcome::Sync(SyncStatus::Failed(e)) => println!("Sync failed: {}", e),
        EventOutcome::Push(None) => println!("Push without payload ignored"),
        EventOutcome::Push(Some(_)) => {}
        EventOutcome::NotificationClick(ClickOutcome::Closed) => println!("Notification closed"),
        EventOutcome::NotificationClick(_) => {}
        EventOutcome::Unhandled(kind) => println!("No handler for {}", kind),
    }
}

fn list_caches(storage: &dyn CacheStorage, config: &WorkerConfig) -> Result<()> {
    let names = storage.keys()?;
    if names.is_empty() {
        println!("No caches");
        return Ok(());
    }
    for name in names {
        let marker = if name == config.static_cache { "*" } else { " " };
        let entries = storage.entries(&name)?;
        println!("{} {} ({} entries)", marker, name, entries.len());
        for (key, cached) in entries {
            println!(
                "    {:<60} {:>4} {:>8}  {}",
                key.url,
                cached.data.status,
                cached.age_display(),
                cached.cached_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
            );
        }
    }
    Ok(())
}
