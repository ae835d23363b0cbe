//! Catalog storage subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP handler
//!     → Store (cheap clone, shared via axum State)
//!     → pool.rs (checkout, spawn_blocking)
//!     → categories.rs / subcategories.rs / products.rs (parameterized SQL)
//!     → models.rs (row mapping)
//! ```
//!
//! # Design Decisions
//! - One long-lived pool per process; no per-request connections
//! - Schema is embedded and migrated at startup
//! - Parent rows cannot be deleted while children reference them

mod categories;
pub mod migrations;
pub mod models;
pub mod pool;
mod products;
mod subcategories;

use std::os::raw::c_int;
use std::sync::Arc;
use std::time::Duration;

use rusqlite::{ffi, Connection, OptionalExtension, Params, Row};

use crate::config::DatabaseConfig;
use self::migrations::{migrate, MIGRATIONS};
use self::pool::ConnectionPool;

pub use models::{
    Category, NewCategory, NewProduct, NewSubcategory, Product, ProductPatch, Subcategory,
};

/// SQL expression for the current UTC time, RFC 3339 with milliseconds.
const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

/// Errors produced by the catalog store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} '{key}' not found")]
    NotFound { entity: &'static str, key: String },

    /// A unique column already holds this value.
    #[error("{0}")]
    Conflict(String),

    /// A CHECK constraint rejected the row.
    #[error("{0}")]
    Invalid(String),

    /// The row points at a parent that does not exist.
    #[error("{entity} {id} does not exist")]
    InvalidReference { entity: &'static str, id: i64 },

    /// The row is still referenced by children and cannot be deleted.
    #[error("{entity} {id} is still referenced")]
    InUse { entity: &'static str, id: i64 },

    #[error("database error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("migration {version} failed: {source}")]
    Migration {
        version: u32,
        #[source]
        source: rusqlite::Error,
    },

    #[error("connection pool closed")]
    PoolClosed,

    #[error("database task failed: {0}")]
    Task(String),
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}

fn constraint_code(err: &rusqlite::Error) -> Option<c_int> {
    match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
            Some(e.extended_code)
        }
        _ => None,
    }
}

/// True for a missing parent on insert/update, and for a parent delete
/// blocked by `ON DELETE RESTRICT` (reported as a trigger constraint).
pub(crate) fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    match constraint_code(err) {
        Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => true,
        Some(ffi::SQLITE_CONSTRAINT_TRIGGER) => matches!(
            err,
            rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("FOREIGN KEY")
        ),
        _ => false,
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        let detail = match &err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => msg.clone(),
            other => other.to_string(),
        };
        match constraint_code(&err) {
            Some(ffi::SQLITE_CONSTRAINT_UNIQUE) => {
                // "UNIQUE constraint failed: category.name"
                let column = detail.rsplit(": ").next().unwrap_or("value");
                StoreError::Conflict(format!("{} already exists", column))
            }
            Some(ffi::SQLITE_CONSTRAINT_CHECK) => StoreError::Invalid(detail),
            _ => StoreError::Sqlite(err),
        }
    }
}

/// Handle to the catalog database.
#[derive(Clone)]
pub struct Store {
    pool: Arc<ConnectionPool>,
}

impl Store {
    /// Open the pool and bring the schema up to date.
    pub async fn open(config: &DatabaseConfig) -> Result<Self, StoreError> {
        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Task(format!("create {}: {}", parent.display(), e)))?;
        }

        let path = config.path.clone();
        let size = config.pool_size;
        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        let pool = tokio::task::spawn_blocking(move || ConnectionPool::open(&path, size, busy_timeout))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))??;

        let store = Self {
            pool: Arc::new(pool),
        };

        let applied = store.pool.run(|conn| migrate(conn, MIGRATIONS)).await?;
        tracing::info!(
            path = %config.path.display(),
            pool_size = size,
            migrations_applied = applied,
            "Catalog store ready"
        );

        Ok(store)
    }

    /// Cheap liveness probe.
    pub async fn ping(&self) -> Result<(), StoreError> {
        self.pool
            .run(|conn| {
                conn.query_row("SELECT 1", [], |_| Ok(()))?;
                Ok(())
            })
            .await
    }

    /// Stop handing out connections.
    pub fn close(&self) {
        self.pool.close();
    }
}

fn query_all<T, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, map)?.collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn query_one<T, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Option<T>, StoreError> {
    Ok(conn.query_row(sql, params, map).optional()?)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A store backed by a fresh database in a temp dir.
    pub async fn temp_store() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            path: dir.path().join("catalog.db"),
            pool_size: 2,
            busy_timeout_ms: 1_000,
        };
        let store = Store::open(&config).await.unwrap();
        (store, dir)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::temp_store;
    use super::*;

    #[tokio::test]
    async fn open_is_idempotent() {
        let (store, dir) = temp_store().await;
        store.ping().await.unwrap();
        drop(store);

        let config = DatabaseConfig {
            path: dir.path().join("catalog.db"),
            pool_size: 1,
            busy_timeout_ms: 1_000,
        };
        let reopened = Store::open(&config).await.unwrap();
        reopened.ping().await.unwrap();
    }

    #[tokio::test]
    async fn creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            path: dir.path().join("nested/data/catalog.db"),
            pool_size: 1,
            busy_timeout_ms: 1_000,
        };
        Store::open(&config).await.unwrap().ping().await.unwrap();
        assert!(config.path.exists());
    }

    #[test]
    fn restrict_delete_is_foreign_key_violation() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE parent (id INTEGER PRIMARY KEY);
             CREATE TABLE child (parent_id INTEGER REFERENCES parent (id) ON DELETE RESTRICT);
             CREATE TABLE loose (parent_id INTEGER REFERENCES parent (id));
             INSERT INTO parent VALUES (1), (2);
             INSERT INTO child VALUES (1);
             INSERT INTO loose VALUES (2);",
        )
        .unwrap();

        let restricted = conn.execute("DELETE FROM parent WHERE id = 1", []).unwrap_err();
        assert!(is_foreign_key_violation(&restricted));

        let no_action = conn.execute("DELETE FROM parent WHERE id = 2", []).unwrap_err();
        assert!(is_foreign_key_violation(&no_action));

        let missing = conn.execute("INSERT INTO child VALUES (9)", []).unwrap_err();
        assert!(is_foreign_key_violation(&missing));

        conn.execute_batch("CREATE TABLE t (name TEXT UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();
        let unique = conn.execute("INSERT INTO t VALUES ('a')", []).unwrap_err();
        assert!(!is_foreign_key_violation(&unique));
    }

    #[test]
    fn unique_violation_becomes_conflict() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (name TEXT UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err: StoreError = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .unwrap_err()
            .into();
        match err {
            StoreError::Conflict(msg) => assert_eq!(msg, "t.name already exists"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
