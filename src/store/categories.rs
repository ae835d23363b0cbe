use rusqlite::params;

use super::{is_foreign_key_violation, query_all, query_one, Category, NewCategory, Store, StoreError, NOW};

const ENTITY: &str = "category";

impl Store {
    pub async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        self.pool
            .run(|conn| {
                let sql = format!("SELECT {} FROM category ORDER BY id", Category::COLUMNS);
                query_all(conn, &sql, [], Category::from_row)
            })
            .await
    }

    pub async fn get_category(&self, id: i64) -> Result<Category, StoreError> {
        self.pool
            .run(move |conn| {
                let sql = format!("SELECT {} FROM category WHERE id = ?1", Category::COLUMNS);
                query_one(conn, &sql, [id], Category::from_row)?
                    .ok_or_else(|| StoreError::not_found(ENTITY, id))
            })
            .await
    }

    pub async fn get_category_by_name(&self, name: String) -> Result<Category, StoreError> {
        self.pool
            .run(move |conn| {
                let sql = format!("SELECT {} FROM category WHERE name = ?1", Category::COLUMNS);
                query_one(conn, &sql, [&name], Category::from_row)?
                    .ok_or_else(|| StoreError::not_found(ENTITY, &name))
            })
            .await
    }

    pub async fn insert_category(&self, new: NewCategory) -> Result<Category, StoreError> {
        self.pool
            .run(move |conn| {
                let sql = format!(
                    "INSERT INTO category (name, description, image_url) VALUES (?1, ?2, ?3) RETURNING {}",
                    Category::COLUMNS
                );
                Ok(conn.query_row(
                    &sql,
                    params![new.name, new.description, new.image_url],
                    Category::from_row,
                )?)
            })
            .await
    }

    pub async fn update_category(&self, id: i64, new: NewCategory) -> Result<Category, StoreError> {
        self.pool
            .run(move |conn| {
                let sql = format!(
                    "UPDATE category SET name = ?1, description = ?2, image_url = ?3, updated_at = {NOW} \
                     WHERE id = ?4 RETURNING {}",
                    Category::COLUMNS
                );
                query_one(
                    conn,
                    &sql,
                    params![new.name, new.description, new.image_url, id],
                    Category::from_row,
                )?
                .ok_or_else(|| StoreError::not_found(ENTITY, id))
            })
            .await
    }

    pub async fn delete_category(&self, id: i64) -> Result<(), StoreError> {
        self.pool
            .run(move |conn| match conn.execute("DELETE FROM category WHERE id = ?1", [id]) {
                Ok(0) => Err(StoreError::not_found(ENTITY, id)),
                Ok(_) => Ok(()),
                Err(e) if is_foreign_key_violation(&e) => Err(StoreError::InUse { entity: ENTITY, id }),
                Err(e) => Err(e.into()),
            })
            .await
    }
}
