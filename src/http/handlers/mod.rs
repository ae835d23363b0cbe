//! Route handlers, one module per resource.

pub mod categories;
pub mod health;
pub mod products;
pub mod subcategories;

use crate::http::response::ApiError;

fn require_name(name: &str) -> Result<(), ApiError> {
    if name.is_empty() {
        return Err(ApiError::BadRequest("name is required".into()));
    }
    Ok(())
}
