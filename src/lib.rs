//! Catalog REST server library.
//!
//! Categories, subcategories and products backed by SQLite, with product
//! images stored on local disk. The HTTP listener is run by a graceful
//! shutdown coordinator that drains in-flight requests within a bounded
//! grace period.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod media;
pub mod net;
pub mod observability;
pub mod store;

pub use config::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::{GracefulServer, LifecycleContext};
pub use store::Store;
