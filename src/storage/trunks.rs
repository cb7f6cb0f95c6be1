//! Local copy of the upstream trunk directory.

use std::collections::BTreeMap;

use chrono::Utc;
use rusqlite::params;

use crate::core::models::Trunk;
use crate::error::Result;
use crate::storage::db::Database;

/// Cached number → description mapping.
#[derive(Debug, Clone)]
pub struct TrunkStore {
    db: Database,
}

impl TrunkStore {
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// Upsert every trunk, stamping each with the current time.
    ///
    /// # Errors
    /// Returns an error (after rolling back the batch) if any row fails.
    pub fn save(&self, trunks: &[Trunk]) -> Result<usize> {
        self.save_at(trunks, Utc::now().timestamp())
    }

    /// Upsert every trunk with an explicit refresh time.
    ///
    /// # Errors
    /// Returns an error (after rolling back the batch) if any row fails.
    pub fn save_at(&self, trunks: &[Trunk], updated_at: i64) -> Result<usize> {
        let mut conn = self.db.connection()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO trunks (number, description, trunk_data, updated_at) \
                 VALUES (?1, ?2, ?3, ?4) \
                 ON CONFLICT(number) DO UPDATE SET \
                    description = excluded.description, \
                    trunk_data = excluded.trunk_data, \
                    updated_at = excluded.updated_at",
            )?;
            for trunk in trunks {
                stmt.execute(params![
                    trunk.number,
                    trunk.description,
                    serde_json::to_string(&trunk.payload)?,
                    updated_at,
                ])?;
            }
        }
        tx.commit()?;

        tracing::debug!(count = trunks.len(), "saved trunk directory");
        Ok(trunks.len())
    }

    /// Trunks refreshed within the last `max_age_secs`, as of `now`.
    ///
    /// An empty map means the cache is stale or was never filled.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub fn fresh_at(&self, max_age_secs: i64, now: i64) -> Result<BTreeMap<String, String>> {
        let conn = self.db.connection()?;
        let mut stmt = conn.prepare_cached(
            "SELECT number, description FROM trunks WHERE updated_at > ?1",
        )?;
        let rows = stmt.query_map([now - max_age_secs], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            ))
        })?;

        let mut map = BTreeMap::new();
        for row in rows {
            let (number, description) = row?;
            map.insert(number, description);
        }
        Ok(map)
    }

    /// Trunks refreshed within the last `max_age_secs`.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub fn fresh(&self, max_age_secs: i64) -> Result<BTreeMap<String, String>> {
        self.fresh_at(max_age_secs, Utc::now().timestamp())
    }
}
