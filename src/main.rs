//! Catalog server (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ net::listener ──▶ http::server ──▶ handlers ──▶ store (SQLite pool)
//!                                        │                  └──▶ media (uploads dir)
//!                                        │
//!     SIGINT/SIGTERM ──▶ LifecycleContext ──▶ GracefulServer (drain, deadline)
//! ```

use std::path::PathBuf;

use clap::Parser;

use catalog_server::config::load_config;
use catalog_server::http::{AppState, HttpServer};
use catalog_server::lifecycle::{spawn_signal_watcher, GracefulServer, LifecycleContext};
use catalog_server::media::MediaStore;
use catalog_server::observability::{init_logging, metrics};
use catalog_server::store::Store;

#[derive(Parser, Debug)]
#[command(name = "catalog-server", version, about = "Product catalog REST server")]
struct Args {
    /// Path to a TOML config file. Environment variables override its values.
    #[arg(short, long, env = "CATALOG_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    init_logging(&config.observability);
    tracing::info!("catalog-server v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        shutdown_timeout_secs = config.timeouts.shutdown_secs,
        database = %config.database.path.display(),
        uploads = %config.uploads.dir.display(),
        "Configuration loaded"
    );

    let store = Store::open(&config.database).await?;
    let media = MediaStore::new(&config.uploads.dir);
    media.ensure_dir().await?;

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let state = AppState {
        store: store.clone(),
        media,
    };
    let listener = HttpServer::bind(&config, state).await?;

    let ctx = LifecycleContext::new();
    let signals = spawn_signal_watcher(ctx.clone());

    let mut server = GracefulServer::new(listener, config.timeouts.shutdown());
    server.start(&ctx)?;

    ctx.done().await;
    if let Some(cause) = ctx.cause() {
        tracing::info!(cause = %cause, "Shutdown requested");
    }

    server.stop().await?;
    signals.abort();
    store.close();

    tracing::info!(state = %server.state(), "Shutdown complete");
    Ok(())
}
