//! Cache entry CRUD operations.
//!
//! Row-level access to stored responses. Matching semantics (Vary, partial
//! content refusal) live in [`super::store`].

use super::connection::CacheDb;
use crate::Error;
use crate::http::Headers;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Request header values recorded for the names listed in the response's `Vary`.
pub type VaryRecord = Vec<(String, Option<String>)>;

/// A stored response row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key_hash: String,
    pub store_name: String,
    pub method: String,
    pub url: String,
    pub vary: VaryRecord,
    pub status: u16,
    pub status_text: String,
    pub headers: Headers,
    pub body: Vec<u8>,
    pub response_url: Option<String>,
    pub stored_at: String,
}

const SELECT_COLUMNS: &str = "SELECT
    key_hash, store_name, method, url, vary_json, status, status_text,
    headers_json, body, response_url, stored_at
FROM cache_entries";

fn insert(conn: &rusqlite::Connection, entry: &CacheEntry) -> Result<(), Error> {
    let vary_json = serde_json::to_string(&entry.vary)?;
    let headers_json = serde_json::to_string(&entry.headers)?;
    conn.execute(
        "INSERT INTO cache_entries (
            key_hash, store_name, method, url, vary_json, status, status_text,
            headers_json, body, response_url, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        ON CONFLICT(key_hash) DO UPDATE SET
            vary_json = excluded.vary_json,
            status = excluded.status,
            status_text = excluded.status_text,
            headers_json = excluded.headers_json,
            body = excluded.body,
            response_url = excluded.response_url,
            stored_at = excluded.stored_at",
        params![
            &entry.key_hash,
            &entry.store_name,
            &entry.method,
            &entry.url,
            vary_json,
            entry.status,
            &entry.status_text,
            headers_json,
            &entry.body,
            &entry.response_url,
            &entry.stored_at,
        ],
    )?;
    Ok(())
}

type RawRow = (String, String, String, String, String, u16, String, String, Vec<u8>, Option<String>, String);

fn decode(row: RawRow) -> Result<CacheEntry, Error> {
    let (key_hash, store_name, method, url, vary_json, status, status_text, headers_json, body, response_url, stored_at) =
        row;
    Ok(CacheEntry {
        key_hash,
        store_name,
        method,
        url,
        vary: serde_json::from_str(&vary_json)?,
        status,
        status_text,
        headers: serde_json::from_str(&headers_json)?,
        body,
        response_url,
        stored_at,
    })
}

impl CacheDb {
    /// Insert or replace a single entry (last write wins).
    pub async fn upsert_entry(&self, entry: &CacheEntry) -> Result<(), Error> {
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> { insert(conn, &entry) })
            .await
            .map_err(Error::from)
    }

    /// Insert or replace several entries in one transaction.
    ///
    /// Either every entry is written or none is.
    pub async fn upsert_entries(&self, entries: Vec<CacheEntry>) -> Result<(), Error> {
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                for entry in &entries {
                    insert(&tx, entry)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get an entry by key hash.
    pub async fn get_entry(&self, key_hash: &str) -> Result<Option<CacheEntry>, Error> {
        let key_hash = key_hash.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE key_hash = ?1"))?;
                let result = stmt.query_row(params![key_hash], |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                        row.get(7)?,
                        row.get(8)?,
                        row.get(9)?,
                        row.get(10)?,
                    ))
                });

                match result {
                    Ok(raw) => decode(raw).map(Some),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries held by a store.
    pub async fn count_entries(&self, store_name: &str) -> Result<u64, Error> {
        let store_name = store_name.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM cache_entries WHERE store_name = ?1",
                    params![store_name],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete entries whose URL contains `pattern` verbatim, across all stores.
    ///
    /// The match is case-sensitive and has no wildcards. Returns the number
    /// of deleted entries.
    pub async fn purge_entries_by_url(&self, pattern: &str) -> Result<u64, Error> {
        let pattern = pattern.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM cache_entries WHERE instr(url, ?1) > 0", params![pattern])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Purge oldest entries until count <= max_entries.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_lru_entries(&self, max_entries: usize) -> Result<u64, Error> {
        let max = i64::try_from(max_entries).unwrap_or(i64::MAX);
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))?;
                if count <= max {
                    return Ok(0);
                }

                let to_delete = count - max;
                let deleted = conn.execute(
                    "DELETE FROM cache_entries WHERE key_hash IN (
                    SELECT key_hash FROM cache_entries ORDER BY stored_at ASC LIMIT ?1
                )",
                    params![to_delete],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::hash::compute_cache_key;

    fn make_test_entry(store: &str, url: &str, stored_at: &str) -> CacheEntry {
        CacheEntry {
            key_hash: compute_cache_key(store, "GET", url),
            store_name: store.to_string(),
            method: "GET".to_string(),
            url: url.to_string(),
            vary: Vec::new(),
            status: 200,
            status_text: "OK".to_string(),
            headers: [("Content-Type", "application/javascript")].into_iter().collect(),
            body: b"console.log(1)".to_vec(),
            response_url: Some(url.to_string()),
            stored_at: stored_at.to_string(),
        }
    }

    async fn db_with_store(store: &str) -> CacheDb {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.register_store(store).await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let db = db_with_store("resources").await;
        let entry = make_test_entry("resources", "http://localhost/index.js", "2026-01-01T00:00:00Z");

        db.upsert_entry(&entry).await.unwrap();

        let retrieved = db.get_entry(&entry.key_hash).await.unwrap().unwrap();
        assert_eq!(retrieved.url, entry.url);
        assert_eq!(retrieved.body, entry.body);
        assert_eq!(retrieved.headers.get("content-type").as_deref(), Some("application/javascript"));
    }

    #[tokio::test]
    async fn test_upsert_replaces() {
        let db = db_with_store("resources").await;
        let mut entry = make_test_entry("resources", "http://localhost/index.js", "2026-01-01T00:00:00Z");
        db.upsert_entry(&entry).await.unwrap();

        entry.body = b"console.log(2)".to_vec();
        db.upsert_entry(&entry).await.unwrap();

        let retrieved = db.get_entry(&entry.key_hash).await.unwrap().unwrap();
        assert_eq!(retrieved.body, b"console.log(2)".to_vec());
        assert_eq!(db.count_entries("resources").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let result = db.get_entry("nonexistent").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_upsert_entries_is_atomic() {
        let db = db_with_store("resources").await;
        let good = make_test_entry("resources", "http://localhost/static/a.png", "2026-01-01T00:00:00Z");
        let orphan = make_test_entry("unregistered", "http://localhost/static/b.png", "2026-01-01T00:00:00Z");

        let result = db.upsert_entries(vec![good.clone(), orphan]).await;
        assert!(result.is_err());
        assert!(db.get_entry(&good.key_hash).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_by_url() {
        let db = db_with_store("resources").await;
        db.upsert_entry(&make_test_entry("resources", "http://localhost/static/a.png", "2026-01-01T00:00:00Z"))
            .await
            .unwrap();
        db.upsert_entry(&make_test_entry("resources", "http://localhost/index.js", "2026-01-01T00:00:00Z"))
            .await
            .unwrap();

        let deleted = db.purge_entries_by_url("/static/").await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(db.count_entries("resources").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_purge_lru() {
        let db = db_with_store("resources").await;
        let oldest = make_test_entry("resources", "http://localhost/a.js", "2026-01-01T00:00:00Z");
        let newest = make_test_entry("resources", "http://localhost/b.js", "2026-01-02T00:00:00Z");
        db.upsert_entry(&oldest).await.unwrap();
        db.upsert_entry(&newest).await.unwrap();

        assert_eq!(db.purge_lru_entries(5).await.unwrap(), 0);
        assert_eq!(db.purge_lru_entries(1).await.unwrap(), 1);
        assert!(db.get_entry(&oldest.key_hash).await.unwrap().is_none());
        assert!(db.get_entry(&newest.key_hash).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_purge_by_url_has_no_wildcards() {
        let db = db_with_store("resources").await;
        let lookalike = make_test_entry("resources", "http://localhost/static/appXv2.wasm", "2026-01-01T00:00:00Z");
        let exact = make_test_entry("resources", "http://localhost/static/app_v2.wasm", "2026-01-01T00:00:00Z");
        db.upsert_entry(&lookalike).await.unwrap();
        db.upsert_entry(&exact).await.unwrap();

        assert_eq!(db.purge_entries_by_url("app_v2").await.unwrap(), 1);
        assert!(db.get_entry(&lookalike.key_hash).await.unwrap().is_some());
        assert!(db.get_entry(&exact.key_hash).await.unwrap().is_none());

        assert_eq!(db.purge_entries_by_url("%").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_purge_by_url_is_case_sensitive() {
        let db = db_with_store("resources").await;
        let upper = make_test_entry("resources", "http://localhost/INDEX.js", "2026-01-01T00:00:00Z");
        db.upsert_entry(&upper).await.unwrap();

        assert_eq!(db.purge_entries_by_url("index.js").await.unwrap(), 0);
        assert!(db.get_entry(&upper.key_hash).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_purge_lru_huge_limit_keeps_everything() {
        let db = db_with_store("resources").await;
        db.upsert_entry(&make_test_entry("resources", "http://localhost/a.js", "2026-01-01T00:00:00Z"))
            .await
            .unwrap();
        db.upsert_entry(&make_test_entry("resources", "http://localhost/b.js", "2026-01-02T00:00:00Z"))
            .await
            .unwrap();

        assert_eq!(db.purge_lru_entries(usize::MAX).await.unwrap(), 0);
        assert_eq!(db.count_entries("resources").await.unwrap(), 2);
    }
}
