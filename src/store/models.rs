//! Catalog records and their write payloads.

use rusqlite::Row;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl Category {
    pub(crate) const COLUMNS: &'static str =
        "id, name, description, image_url, created_at, updated_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            image_url: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

/// Body for creating or replacing a category.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewCategory {
    pub name: String,
    pub description: String,
    pub image_url: String,
}

impl NewCategory {
    pub fn trimmed(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            description: self.description.trim().to_string(),
            image_url: self.image_url.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subcategory {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub category_id: i64,
    pub image_url: String,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl Subcategory {
    pub(crate) const COLUMNS: &'static str =
        "id, name, description, category_id, image_url, created_at, updated_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            category_id: row.get(3)?,
            image_url: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

/// Body for creating or replacing a subcategory.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewSubcategory {
    pub name: String,
    pub description: String,
    pub category_id: i64,
    pub image_url: String,
}

impl NewSubcategory {
    pub fn trimmed(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            description: self.description.trim().to_string(),
            category_id: self.category_id,
            image_url: self.image_url.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub subcategory_id: i64,
    pub price: f64,
    pub current_inventory: i64,
    pub image_url: String,
    pub brand: String,
    pub sku: String,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl Product {
    pub(crate) const COLUMNS: &'static str = "id, name, description, subcategory_id, price, \
         current_inventory, image_url, brand, sku, created_at, updated_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            subcategory_id: row.get(3)?,
            price: row.get(4)?,
            current_inventory: row.get(5)?,
            image_url: row.get(6)?,
            brand: row.get(7)?,
            sku: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}

/// A product ready to be inserted; the image is already stored.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub subcategory_id: i64,
    pub price: f64,
    pub current_inventory: i64,
    pub image_url: String,
    pub brand: String,
    pub sku: String,
}

/// Partial product update. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub subcategory_id: Option<i64>,
    pub price: Option<f64>,
    pub current_inventory: Option<i64>,
    pub brand: Option<String>,
    pub sku: Option<String>,
}

impl ProductPatch {
    pub fn trimmed(self) -> Self {
        let trim = |s: Option<String>| s.map(|s| s.trim().to_string());
        Self {
            name: trim(self.name),
            description: trim(self.description),
            brand: trim(self.brand),
            sku: trim(self.sku),
            ..self
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.subcategory_id.is_none()
            && self.price.is_none()
            && self.current_inventory.is_none()
            && self.brand.is_none()
            && self.sku.is_none()
    }
}
