//! Embedded schema migrations.

use rusqlite::{params, Connection};

use super::StoreError;

/// A versioned schema change.
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

/// All migrations, in application order.
pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "catalog",
    sql: include_str!("../../migrations/0001_catalog.sql"),
}];

/// Apply every pending migration. Returns how many were applied.
///
/// Each migration runs in its own transaction together with its bookkeeping
/// row, so a failure leaves the schema at the previous version.
pub fn migrate(conn: &mut Connection, migrations: &[Migration]) -> Result<usize, StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            name       TEXT    NOT NULL,
            applied_at TEXT    NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )",
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    let mut applied = 0;
    for migration in migrations.iter().filter(|m| m.version > current) {
        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql)
            .map_err(|source| StoreError::Migration {
                version: migration.version,
                source,
            })?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            params![migration.version, migration.name],
        )?;
        tx.commit()?;

        tracing::info!(version = migration.version, name = migration.name, "Applied migration");
        applied += 1;
    }

    Ok(applied)
}
