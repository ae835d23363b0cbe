use rusqlite::params;

use super::{
    is_foreign_key_violation, query_all, query_one, NewSubcategory, Store, StoreError, Subcategory, NOW,
};

const ENTITY: &str = "subcategory";

impl Store {
    pub async fn list_subcategories(&self) -> Result<Vec<Subcategory>, StoreError> {
        self.pool
            .run(|conn| {
                let sql = format!("SELECT {} FROM subcategory ORDER BY id", Subcategory::COLUMNS);
                query_all(conn, &sql, [], Subcategory::from_row)
            })
            .await
    }

    pub async fn get_subcategory(&self, id: i64) -> Result<Subcategory, StoreError> {
        self.pool
            .run(move |conn| {
                let sql = format!("SELECT {} FROM subcategory WHERE id = ?1", Subcategory::COLUMNS);
                query_one(conn, &sql, [id], Subcategory::from_row)?
                    .ok_or_else(|| StoreError::not_found(ENTITY, id))
            })
            .await
    }

    pub async fn get_subcategory_by_name(&self, name: String) -> Result<Subcategory, StoreError> {
        self.pool
            .run(move |conn| {
                let sql = format!("SELECT {} FROM subcategory WHERE name = ?1", Subcategory::COLUMNS);
                query_one(conn, &sql, [&name], Subcategory::from_row)?
                    .ok_or_else(|| StoreError::not_found(ENTITY, &name))
            })
            .await
    }

    /// Subcategories of one category. An unknown category yields an empty list.
    pub async fn list_subcategories_by_category(&self, category_id: i64) -> Result<Vec<Subcategory>, StoreError> {
        self.pool
            .run(move |conn| {
                let sql = format!(
                    "SELECT {} FROM subcategory WHERE category_id = ?1 ORDER BY id",
                    Subcategory::COLUMNS
                );
                query_all(conn, &sql, [category_id], Subcategory::from_row)
            })
            .await
    }

    pub async fn insert_subcategory(&self, new: NewSubcategory) -> Result<Subcategory, StoreError> {
        self.pool
            .run(move |conn| {
                let sql = format!(
                    "INSERT INTO subcategory (name, description, category_id, image_url) \
                     VALUES (?1, ?2, ?3, ?4) RETURNING {}",
                    Subcategory::COLUMNS
                );
                conn.query_row(
                    &sql,
                    params![new.name, new.description, new.category_id, new.image_url],
                    Subcategory::from_row,
                )
                .map_err(|e| missing_category(e, new.category_id))
            })
            .await
    }

    pub async fn update_subcategory(&self, id: i64, new: NewSubcategory) -> Result<Subcategory, StoreError> {
        self.pool
            .run(move |conn| {
                let sql = format!(
                    "UPDATE subcategory SET name = ?1, description = ?2, category_id = ?3, image_url = ?4, \
                     updated_at = {NOW} WHERE id = ?5 RETURNING {}",
                    Subcategory::COLUMNS
                );
                query_one(
                    conn,
                    &sql,
                    params![new.name, new.description, new.category_id, new.image_url, id],
                    Subcategory::from_row,
                )
                .map_err(|e| match e {
                    StoreError::Sqlite(e) => missing_category(e, new.category_id),
                    other => other,
                })?
                .ok_or_else(|| StoreError::not_found(ENTITY, id))
            })
            .await
    }

    pub async fn delete_subcategory(&self, id: i64) -> Result<(), StoreError> {
        self.pool
            .run(move |conn| match conn.execute("DELETE FROM subcategory WHERE id = ?1", [id]) {
                Ok(0) => Err(StoreError::not_found(ENTITY, id)),
                Ok(_) => Ok(()),
                Err(e) if is_foreign_key_violation(&e) => Err(StoreError::InUse { entity: ENTITY, id }),
                Err(e) => Err(e.into()),
            })
            .await
    }
}

fn missing_category(err: rusqlite::Error, category_id: i64) -> StoreError {
    if is_foreign_key_violation(&err) {
        StoreError::InvalidReference {
            entity: "category",
            id: category_id,
        }
    } else {
        err.into()
    }
}
