//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router with every catalog route
//! - Wire up middleware (request ID, tracing, timeout, body limit, metrics)
//! - Serve on a bound TCP listener until the coordinator says stop

use std::io;
use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::Request,
    middleware,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer, services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::http::handlers::{categories, health, products, subcategories};
use crate::http::request::{self, track_requests};
use crate::lifecycle::Listener;
use crate::media::MediaStore;
use crate::net::connection::InFlightTracker;
use crate::net::listener::{self, ListenerError};
use crate::store::Store;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub media: MediaStore,
}

/// Build the Axum router with all routes and middleware layers.
pub fn build_router(config: &ServerConfig, state: AppState, in_flight: InFlightTracker) -> Router {
    with_middleware(config, catalog_routes(state, in_flight))
}

/// Catalog routes with in-flight tracking, but without the outer middleware.
pub fn catalog_routes(state: AppState, in_flight: InFlightTracker) -> Router {
    let images = ServeDir::new(state.media.dir());

    Router::new()
        .route("/health", get(health::health))
        .route("/api/categories", get(categories::list).post(categories::create))
        .route(
            "/api/categories/{id}",
            get(categories::get).put(categories::update).delete(categories::delete),
        )
        .route("/api/categories/name/{name}", get(categories::get_by_name))
        .route("/api/categories/{id}/subcategories", get(categories::subcategories))
        .route("/api/subcategories", get(subcategories::list).post(subcategories::create))
        .route(
            "/api/subcategories/{id}",
            get(subcategories::get).put(subcategories::update).delete(subcategories::delete),
        )
        .route("/api/subcategories/name/{name}", get(subcategories::get_by_name))
        .route("/api/subcategories/{id}/products", get(subcategories::products))
        .route("/api/products", get(products::list).post(products::create))
        .route(
            "/api/products/{id}",
            get(products::get).put(products::update).delete(products::delete),
        )
        .route("/api/products/name/{name}", get(products::get_by_name))
        .route("/api/products/category/{id}", get(products::by_category))
        .route("/api/products/category/name/{name}", get(products::by_category_name))
        .nest_service("/api/images", images)
        .route_layer(middleware::from_fn_with_state(in_flight, track_requests))
        .with_state(state)
}

/// Wrap `router` in the request ID, trace, body limit and timeout layers.
///
/// `TimeoutLayer` needs a `Default` response body, so it stays inside
/// `RequestBodyLimitLayer`.
#[allow(deprecated)]
pub fn with_middleware(config: &ServerConfig, router: Router) -> Router {
    let max_body = config.uploads.max_bytes;

    router.layer(
        ServiceBuilder::new()
            .layer(request::set_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                tracing::info_span!(
                    "http_request",
                    method = %req.method(),
                    uri = %req.uri(),
                    request_id = %request::request_id(req),
                )
            }))
            .layer(request::propagate_request_id_layer())
            .layer(RequestBodyLimitLayer::new(max_body))
            .layer(TimeoutLayer::new(config.timeouts.request()))
            .layer(DefaultBodyLimit::max(max_body)),
    )
}

/// The catalog HTTP server, bound and ready to be started by a
/// [`GracefulServer`](crate::lifecycle::GracefulServer).
pub struct HttpServer {
    listener: TcpListener,
    router: Router,
    in_flight: InFlightTracker,
}

impl HttpServer {
    pub fn new(listener: TcpListener, router: Router, in_flight: InFlightTracker) -> Self {
        Self {
            listener,
            router,
            in_flight,
        }
    }

    /// Bind the configured address and build the catalog router.
    pub async fn bind(config: &ServerConfig, state: AppState) -> Result<Self, ListenerError> {
        let listener = listener::bind(&config.listener.bind_address).await?;
        let in_flight = InFlightTracker::new();
        let router = build_router(config, state, in_flight.clone());
        Ok(Self::new(listener, router, in_flight))
    }

    pub fn in_flight(&self) -> InFlightTracker {
        self.in_flight.clone()
    }
}

impl Listener for HttpServer {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    async fn serve(self, stop: CancellationToken) -> io::Result<()> {
        let addr = self.listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server accepting connections");

        let in_flight = self.in_flight;
        let shutdown = async move {
            stop.cancelled().await;
            tracing::info!(
                in_flight = in_flight.active_count(),
                "HTTP server stopped accepting, draining in-flight requests"
            );
        };

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!(address = %addr, "HTTP server drained");
        Ok(())
    }
}
