use rusqlite::params;

use super::{
    is_foreign_key_violation, query_all, query_one, NewProduct, Product, ProductPatch, Store, StoreError, NOW,
};

const ENTITY: &str = "product";

impl Store {
    pub async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        self.pool
            .run(|conn| {
                let sql = format!("SELECT {} FROM product ORDER BY id", Product::COLUMNS);
                query_all(conn, &sql, [], Product::from_row)
            })
            .await
    }

    pub async fn get_product(&self, id: i64) -> Result<Product, StoreError> {
        self.pool
            .run(move |conn| {
                let sql = format!("SELECT {} FROM product WHERE id = ?1", Product::COLUMNS);
                query_one(conn, &sql, [id], Product::from_row)?
                    .ok_or_else(|| StoreError::not_found(ENTITY, id))
            })
            .await
    }

    pub async fn get_product_by_name(&self, name: String) -> Result<Product, StoreError> {
        self.pool
            .run(move |conn| {
                let sql = format!("SELECT {} FROM product WHERE name = ?1", Product::COLUMNS);
                query_one(conn, &sql, [&name], Product::from_row)?
                    .ok_or_else(|| StoreError::not_found(ENTITY, &name))
            })
            .await
    }

    pub async fn list_products_by_subcategory(&self, subcategory_id: i64) -> Result<Vec<Product>, StoreError> {
        self.pool
            .run(move |conn| {
                let sql = format!(
                    "SELECT {} FROM product WHERE subcategory_id = ?1 ORDER BY id",
                    Product::COLUMNS
                );
                query_all(conn, &sql, [subcategory_id], Product::from_row)
            })
            .await
    }

    /// Products in any subcategory of the given category.
    pub async fn list_products_by_category(&self, category_id: i64) -> Result<Vec<Product>, StoreError> {
        self.pool
            .run(move |conn| {
                let sql = format!(
                    "SELECT {} FROM product WHERE subcategory_id IN \
                     (SELECT id FROM subcategory WHERE category_id = ?1) ORDER BY id",
                    Product::COLUMNS
                );
                query_all(conn, &sql, [category_id], Product::from_row)
            })
            .await
    }

    pub async fn list_products_by_category_name(&self, category: String) -> Result<Vec<Product>, StoreError> {
        self.pool
            .run(move |conn| {
                let sql = format!(
                    "SELECT {} FROM product WHERE subcategory_id IN \
                     (SELECT s.id FROM subcategory s JOIN category c ON c.id = s.category_id WHERE c.name = ?1) \
                     ORDER BY id",
                    Product::COLUMNS
                );
                query_all(conn, &sql, [&category], Product::from_row)
            })
            .await
    }

    pub async fn insert_product(&self, new: NewProduct) -> Result<Product, StoreError> {
        self.pool
            .run(move |conn| {
                let sql = format!(
                    "INSERT INTO product (name, description, subcategory_id, price, current_inventory, \
                     image_url, brand, sku) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) RETURNING {}",
                    Product::COLUMNS
                );
                conn.query_row(
                    &sql,
                    params![
                        new.name,
                        new.description,
                        new.subcategory_id,
                        new.price,
                        new.current_inventory,
                        new.image_url,
                        new.brand,
                        new.sku,
                    ],
                    Product::from_row,
                )
                .map_err(|e| missing_subcategory(e, new.subcategory_id))
            })
            .await
    }

    /// Apply a partial update; fields absent from `patch` are left as stored.
    pub async fn update_product(&self, id: i64, patch: ProductPatch) -> Result<Product, StoreError> {
        if patch.is_empty() {
            return self.get_product(id).await;
        }

        self.pool
            .run(move |conn| {
                let sql = format!(
                    "UPDATE product SET \
                     name = COALESCE(?1, name), \
                     description = COALESCE(?2, description), \
                     subcategory_id = COALESCE(?3, subcategory_id), \
                     price = COALESCE(?4, price), \
                     current_inventory = COALESCE(?5, current_inventory), \
                     brand = COALESCE(?6, brand), \
                     sku = COALESCE(?7, sku), \
                     updated_at = {NOW} \
                     WHERE id = ?8 RETURNING {}",
                    Product::COLUMNS
                );
                let subcategory_id = patch.subcategory_id;
                query_one(
                    conn,
                    &sql,
                    params![
                        patch.name,
                        patch.description,
                        patch.subcategory_id,
                        patch.price,
                        patch.current_inventory,
                        patch.brand,
                        patch.sku,
                        id,
                    ],
                    Product::from_row,
                )
                .map_err(|e| match (e, subcategory_id) {
                    (StoreError::Sqlite(e), Some(subcategory_id)) => missing_subcategory(e, subcategory_id),
                    (other, _) => other,
                })?
                .ok_or_else(|| StoreError::not_found(ENTITY, id))
            })
            .await
    }

    /// Delete a product and return the removed row.
    pub async fn delete_product(&self, id: i64) -> Result<Product, StoreError> {
        self.pool
            .run(move |conn| {
                let sql = format!("DELETE FROM product WHERE id = ?1 RETURNING {}", Product::COLUMNS);
                query_one(conn, &sql, [id], Product::from_row)?
                    .ok_or_else(|| StoreError::not_found(ENTITY, id))
            })
            .await
    }
}

fn missing_subcategory(err: rusqlite::Error, subcategory_id: i64) -> StoreError {
    if is_foreign_key_violation(&err) {
        StoreError::InvalidReference {
            entity: "subcategory",
            id: subcategory_id,
        }
    } else {
        err.into()
    }
}
