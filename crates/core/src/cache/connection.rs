//! Database connection management with pragma configuration.

use super::migrations;
use crate::Error;
use std::path::Path;
use tokio_rusqlite::Connection;

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;
     PRAGMA foreign_keys=ON;";

/// Handle to the cache database holding every named store.
///
/// Cloning is cheap; clones share one background connection thread, so
/// concurrent requests serialize at the statement level only.
#[derive(Clone, Debug)]
pub struct CacheDb {
    pub(crate) conn: Connection,
}

impl CacheDb {
    /// Open a database at the specified path, creating it if needed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        tracing::debug!(path = %path.as_ref().display(), "opening cache database");
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::prepare(conn).await
    }

    /// Open an in-memory database for testing.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::prepare(conn).await
    }

    async fn prepare(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| {
            conn.execute_batch(PRAGMAS)?;
            Ok(())
        })
        .await
        .map_err(Error::Database)?;

        let applied = migrations::run(&conn).await?;
        if applied > 0 {
            tracing::info!(applied, "cache schema migrated");
        }

        Ok(Self { conn })
    }
}
