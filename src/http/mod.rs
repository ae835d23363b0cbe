//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID, extractors, in-flight tracking)
//!     → handlers/ (one module per resource, calls into the store)
//!     → response.rs (errors rendered as JSON)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::ApiError;
pub use server::{build_router, catalog_routes, with_middleware, AppState, HttpServer};
