//! Request extraction and per-request middleware.
//!
//! # Responsibilities
//! - Assign a request ID (UUID v4) as early as possible and echo it back
//! - Turn extractor rejections into JSON [`ApiError`]s
//! - Count in-flight requests and record request metrics

use std::time::Instant;

use axum::{
    body::Body,
    extract::{FromRequest, FromRequestParts, MatchedPath, Request, State},
    http::HeaderName,
    middleware::Next,
    response::Response,
};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::http::response::ApiError;
use crate::net::connection::InFlightTracker;
use crate::observability::metrics;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// JSON body extractor that rejects with [`ApiError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Path extractor that rejects with [`ApiError`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid)
}

pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(X_REQUEST_ID)
}

/// Read the request ID set by [`set_request_id_layer`].
pub fn request_id(request: &Request<Body>) -> &str {
    request
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Holds an in-flight guard for the duration of the request and records
/// metrics once the response is ready.
pub async fn track_requests(
    State(tracker): State<InFlightTracker>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let guard = tracker.track();
    tracing::trace!(request = %guard.seq(), method = %method, route = %route, "Request started");

    let response = next.run(request).await;
    metrics::record_request(&method, &route, response.status().as_u16(), start);
    drop(guard);

    response
}
