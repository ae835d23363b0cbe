use axum::{extract::State, http::StatusCode, Json};

use super::require_name;
use crate::http::request::{ApiJson, ApiPath};
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::store::{NewSubcategory, Product, Subcategory};

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Subcategory>>, ApiError> {
    Ok(Json(state.store.list_subcategories().await?))
}

pub async fn get(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Subcategory>, ApiError> {
    Ok(Json(state.store.get_subcategory(id).await?))
}

pub async fn get_by_name(
    State(state): State<AppState>,
    ApiPath(name): ApiPath<String>,
) -> Result<Json<Subcategory>, ApiError> {
    Ok(Json(state.store.get_subcategory_by_name(name).await?))
}

pub async fn products(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Vec<Product>>, ApiError> {
    state.store.get_subcategory(id).await?;
    Ok(Json(state.store.list_products_by_subcategory(id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NewSubcategory>,
) -> Result<(StatusCode, Json<Subcategory>), ApiError> {
    let body = body.trimmed();
    require_name(&body.name)?;

    let subcategory = state.store.insert_subcategory(body).await?;
    tracing::info!(
        id = subcategory.id,
        name = %subcategory.name,
        category_id = subcategory.category_id,
        "Subcategory created"
    );
    Ok((StatusCode::CREATED, Json(subcategory)))
}

pub async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<NewSubcategory>,
) -> Result<Json<Subcategory>, ApiError> {
    let body = body.trimmed();
    require_name(&body.name)?;

    let subcategory = state.store.update_subcategory(id, body).await?;
    tracing::info!(id, "Subcategory updated");
    Ok(Json(subcategory))
}

pub async fn delete(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_subcategory(id).await?;
    tracing::info!(id, "Subcategory deleted");
    Ok(StatusCode::NO_CONTENT)
}
