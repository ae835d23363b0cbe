//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use catalog_server::config::ServerConfig;
use catalog_server::http::{AppState, HttpServer};
use catalog_server::lifecycle::{GracefulServer, LifecycleContext, ShutdownCause};
use catalog_server::media::MediaStore;
use catalog_server::store::Store;
use serde_json::{json, Value};
use tempfile::TempDir;

/// A full catalog server on an ephemeral port, backed by a temp dir.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    pub ctx: LifecycleContext,
    pub server: GracefulServer<HttpServer>,
    pub store: Store,
    pub dir: TempDir,
}

pub fn test_config(dir: &Path) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.timeouts.shutdown_secs = 5;
    config.database.path = dir.join("catalog.db");
    config.database.pool_size = 2;
    config.uploads.dir = dir.join("uploads");
    config
}

pub async fn spawn_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let store = Store::open(&config.database).await.unwrap();
    let media = MediaStore::new(&config.uploads.dir);
    media.ensure_dir().await.unwrap();

    let state = AppState {
        store: store.clone(),
        media,
    };
    let listener = HttpServer::bind(&config, state).await.unwrap();

    let ctx = LifecycleContext::new();
    let mut server = GracefulServer::new(listener, config.timeouts.shutdown())
        .with_fatal_handler(|reason| eprintln!("fatal: {reason}"));
    server.start(&ctx).unwrap();
    let addr = server.local_addr().unwrap();

    TestApp {
        addr,
        client: client(),
        ctx,
        server,
        store,
        dir,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn uploads_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("uploads")
    }

    pub async fn create_category(&self, name: &str) -> Value {
        let response = self
            .client
            .post(self.url("/api/categories"))
            .json(&json!({ "name": name, "description": format!("{name} things") }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
        response.json().await.unwrap()
    }

    pub async fn create_subcategory(&self, name: &str, category_id: i64) -> Value {
        let response = self
            .client
            .post(self.url("/api/subcategories"))
            .json(&json!({ "name": name, "category_id": category_id }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
        response.json().await.unwrap()
    }

    pub async fn shutdown(mut self) {
        self.ctx.cancel(ShutdownCause::Requested);
        self.server.stop().await.unwrap();
        self.store.close();
    }
}
