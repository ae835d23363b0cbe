use axum::{extract::State, http::StatusCode, Json};

use super::require_name;
use crate::http::request::{ApiJson, ApiPath};
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::store::{Category, NewCategory, Subcategory};

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.store.list_categories().await?))
}

pub async fn get(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.store.get_category(id).await?))
}

pub async fn get_by_name(
    State(state): State<AppState>,
    ApiPath(name): ApiPath<String>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.store.get_category_by_name(name).await?))
}

pub async fn subcategories(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Vec<Subcategory>>, ApiError> {
    state.store.get_category(id).await?;
    Ok(Json(state.store.list_subcategories_by_category(id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NewCategory>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let body = body.trimmed();
    require_name(&body.name)?;

    let category = state.store.insert_category(body).await?;
    tracing::info!(id = category.id, name = %category.name, "Category created");
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<NewCategory>,
) -> Result<Json<Category>, ApiError> {
    let body = body.trimmed();
    require_name(&body.name)?;

    let category = state.store.update_category(id, body).await?;
    tracing::info!(id, "Category updated");
    Ok(Json(category))
}

pub async fn delete(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_category(id).await?;
    tracing::info!(id, "Category deleted");
    Ok(StatusCode::NO_CONTENT)
}
