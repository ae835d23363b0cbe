use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::http::response::ApiError;
use crate::http::server::AppState;

/// Liveness plus a round trip to the database.
pub async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state
        .store
        .ping()
        .await
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;
    Ok(Json(json!({ "status": "ok" })))
}
