//! Schema migrations for the cache database.
//!
//! Each migration runs in its own transaction together with the row that
//! records it, so a failed batch leaves the schema at the previous version.

use super::Error;
use tokio_rusqlite::{Connection, params, rusqlite};

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration { version: 1, name: "cache_stores", sql: include_str!("../../migrations/001_cache_stores.sql") },
    Migration { version: 2, name: "cache_entries", sql: include_str!("../../migrations/002_cache_entries.sql") },
];

fn schema_version(conn: &rusqlite::Connection) -> Result<i64, Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
    )?;
    let version = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", [], |row| row.get(0))?;
    Ok(version)
}

fn apply(conn: &mut rusqlite::Connection, migration: &Migration) -> Result<(), Error> {
    let tx = conn.transaction()?;
    tx.execute_batch(migration.sql)
        .map_err(|e| Error::MigrationFailed(format!("{} ({}): {}", migration.version, migration.name, e)))?;
    tx.execute(
        "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
        params![migration.version, migration.name, chrono::Utc::now().to_rfc3339()],
    )?;
    tx.commit()?;
    Ok(())
}

/// Bring the schema up to date. Returns how many migrations were applied.
pub async fn run(conn: &Connection) -> Result<usize, Error> {
    conn.call(|conn| -> Result<usize, Error> {
        let current = schema_version(conn)?;
        let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();
        for migration in &pending {
            tracing::debug!(version = migration.version, name = migration.name, "applying cache migration");
            apply(conn, migration)?;
        }
        Ok(pending.len())
    })
    .await
    .map_err(Error::from)
}
