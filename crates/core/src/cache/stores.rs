//! Named store registry.
//!
//! Each cache name is a separate generation. Nothing here migrates entries
//! between names; an abandoned generation stays until [`CacheDb::delete_store`].

use super::connection::CacheDb;
use crate::Error;
use tokio_rusqlite::params;

impl CacheDb {
    /// Record a store name; a no-op if it already exists.
    pub async fn register_store(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO cache_stores (name, created_at) VALUES (?1, ?2)",
                    params![name, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    pub async fn has_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM cache_stores WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Store names in creation order.
    pub async fn list_stores(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM cache_stores ORDER BY created_at, name")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a store and all of its entries.
    ///
    /// Returns the number of deleted entries.
    pub async fn delete_store(&self, name: &str) -> Result<u64, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let tx = conn.transaction()?;
                let deleted = tx.execute("DELETE FROM cache_entries WHERE store_name = ?1", params![name])?;
                tx.execute("DELETE FROM cache_stores WHERE name = ?1", params![name])?;
                tx.commit()?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }
}
