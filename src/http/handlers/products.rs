use axum::{
    body::Bytes,
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};

use super::require_name;
use crate::http::request::{ApiJson, ApiPath};
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::store::{NewProduct, Product, ProductPatch, StoreError};

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.store.list_products().await?))
}

pub async fn get(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(state.store.get_product(id).await?))
}

pub async fn get_by_name(
    State(state): State<AppState>,
    ApiPath(name): ApiPath<String>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(state.store.get_product_by_name(name).await?))
}

pub async fn by_category(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Vec<Product>>, ApiError> {
    state.store.get_category(id).await?;
    Ok(Json(state.store.list_products_by_category(id).await?))
}

pub async fn by_category_name(
    State(state): State<AppState>,
    ApiPath(name): ApiPath<String>,
) -> Result<Json<Vec<Product>>, ApiError> {
    state.store.get_category_by_name(name.clone()).await?;
    Ok(Json(state.store.list_products_by_category_name(name).await?))
}

/// Create a product from a multipart form carrying the image file.
pub async fn create(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let mut form = ProductForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let file_name = field.file_name().map(str::to_string);
            let bytes = field.bytes().await?;
            form.image = Some(Upload { file_name, bytes });
        } else {
            let value = field.text().await?;
            form.set(&name, value);
        }
    }

    let valid = form.validate()?;
    let subcategory = state
        .store
        .get_subcategory_by_name(valid.subcategory.clone())
        .await
        .map_err(|e| match e {
            StoreError::NotFound { .. } => {
                ApiError::BadRequest(format!("subcategory '{}' does not exist", valid.subcategory))
            }
            other => other.into(),
        })?;

    let image_url = state
        .media
        .save(valid.image.file_name.as_deref(), &valid.image.bytes)
        .await?;

    let new = NewProduct {
        name: valid.name,
        description: valid.description,
        subcategory_id: subcategory.id,
        price: valid.price,
        current_inventory: valid.current_inventory,
        image_url: image_url.clone(),
        brand: valid.brand,
        sku: valid.sku,
    };

    match state.store.insert_product(new).await {
        Ok(product) => {
            tracing::info!(
                id = product.id,
                name = %product.name,
                subcategory_id = product.subcategory_id,
                image = %product.image_url,
                "Product created"
            );
            Ok((StatusCode::CREATED, Json(product)))
        }
        Err(err) => {
            if let Err(e) = state.media.remove(&image_url).await {
                tracing::warn!(image = %image_url, error = %e, "Failed to remove orphaned image");
            }
            Err(err.into())
        }
    }
}

pub async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(patch): ApiJson<ProductPatch>,
) -> Result<Json<Product>, ApiError> {
    let patch = patch.trimmed();
    if let Some(name) = &patch.name {
        require_name(name)?;
    }
    if let Some(price) = patch.price {
        check_price(price)?;
    }
    if let Some(inventory) = patch.current_inventory {
        check_inventory(inventory)?;
    }

    let product = state.store.update_product(id, patch).await?;
    tracing::info!(id, "Product updated");
    Ok(Json(product))
}

pub async fn delete(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    let product = state.store.delete_product(id).await?;
    if !product.image_url.is_empty() {
        if let Err(e) = state.media.remove(&product.image_url).await {
            tracing::warn!(id, image = %product.image_url, error = %e, "Failed to remove product image");
        }
    }

    tracing::info!(id, "Product deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug)]
struct Upload {
    file_name: Option<String>,
    bytes: Bytes,
}

/// Raw multipart fields as received.
#[derive(Debug, Default)]
struct ProductForm {
    name: String,
    description: String,
    subcategory: String,
    price: String,
    current_inventory: String,
    brand: String,
    sku: String,
    image: Option<Upload>,
}

#[derive(Debug)]
struct ValidProduct {
    name: String,
    description: String,
    subcategory: String,
    price: f64,
    current_inventory: i64,
    brand: String,
    sku: String,
    image: Upload,
}

impl ProductForm {
    fn set(&mut self, field: &str, value: String) {
        let value = value.trim().to_string();
        match field {
            "name" => self.name = value,
            "description" => self.description = value,
            "subcategory" => self.subcategory = value,
            "price" => self.price = value,
            "current_inventory" => self.current_inventory = value,
            "brand" => self.brand = value,
            "sku" => self.sku = value,
            other => tracing::debug!(field = %other, "Ignoring unknown form field"),
        }
    }

    fn validate(self) -> Result<ValidProduct, ApiError> {
        require_name(&self.name)?;
        if self.subcategory.is_empty() {
            return Err(ApiError::BadRequest("subcategory is required".into()));
        }

        let price: f64 = self
            .price
            .parse()
            .map_err(|_| ApiError::BadRequest(format!("invalid price '{}'", self.price)))?;
        check_price(price)?;

        let current_inventory: i64 = self.current_inventory.parse().map_err(|_| {
            ApiError::BadRequest(format!("invalid current_inventory '{}'", self.current_inventory))
        })?;
        check_inventory(current_inventory)?;

        let image = self
            .image
            .filter(|upload| !upload.bytes.is_empty())
            .ok_or_else(|| ApiError::BadRequest("image is required".into()))?;

        Ok(ValidProduct {
            name: self.name,
            description: self.description,
            subcategory: self.subcategory,
            price,
            current_inventory,
            brand: self.brand,
            sku: self.sku,
            image,
        })
    }
}

fn check_price(price: f64) -> Result<(), ApiError> {
    if !price.is_finite() || price < 0.0 {
        return Err(ApiError::BadRequest("price must be a non-negative number".into()));
    }
    Ok(())
}

fn check_inventory(inventory: i64) -> Result<(), ApiError> {
    if inventory < 0 {
        return Err(ApiError::BadRequest("current_inventory must not be negative".into()));
    }
    Ok(())
}
