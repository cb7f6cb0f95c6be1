//! Period cache: which exact windows have already been fetched.
//!
//! A window is identified by a content hash of its two bounds, so the fact
//! survives restarts. Windows are opaque: a request is covered only when a
//! fact exists for exactly the same `(start, end)`; overlapping or enclosing
//! windows do not count. Callers that want cache hits must request aligned
//! windows, such as whole calendar days.

use rusqlite::{Connection, params};
use sha2::{Digest, Sha256};

use crate::core::models::Window;
use crate::error::Result;
use crate::storage::db::Database;

/// Stable identity of a window.
#[must_use]
pub fn interval_hash(window: Window) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}_{}", window.start, window.end).as_bytes());
    hex::encode(&hasher.finalize()[..16])
}

/// Record a window as covered using an existing connection or transaction.
///
/// Inserting the same window twice is a no-op.
///
/// # Errors
/// Returns an error if the insert fails.
pub fn mark_covered_with(conn: &Connection, window: Window) -> Result<()> {
    conn.execute(
        "INSERT INTO cache_requests (request_hash, start_stamp, end_stamp) \
         VALUES (?1, ?2, ?3) \
         ON CONFLICT(request_hash) DO NOTHING",
        params![interval_hash(window), window.start, window.end],
    )?;
    Ok(())
}

/// Exact-match window cache.
#[derive(Debug, Clone)]
pub struct PeriodCache {
    db: Database,
}

impl PeriodCache {
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// Whether this exact window has been fetched and persisted.
    ///
    /// # Errors
    /// Returns an error if the lookup fails.
    pub fn is_covered(&self, window: Window) -> Result<bool> {
        let conn = self.db.connection()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cache_requests WHERE request_hash = ?1",
            [interval_hash(window)],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Record a window as covered.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn mark_covered(&self, window: Window) -> Result<()> {
        let conn = self.db.connection()?;
        mark_covered_with(&conn, window)
    }

    /// Drop the fact for one window. Returns whether it existed.
    ///
    /// # Errors
    /// Returns an error if the delete fails.
    pub fn forget(&self, window: Window) -> Result<bool> {
        let conn = self.db.connection()?;
        let deleted = conn.execute(
            "DELETE FROM cache_requests WHERE request_hash = ?1",
            [interval_hash(window)],
        )?;
        Ok(deleted > 0)
    }

    /// Drop every window fact. Stored records are kept.
    ///
    /// # Errors
    /// Returns an error if the delete fails.
    pub fn clear(&self) -> Result<usize> {
        let conn = self.db.connection()?;
        Ok(conn.execute("DELETE FROM cache_requests", [])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cache() -> (PeriodCache, Database, TempDir) {
        let dir = TempDir::new().unwrap();
        let db = Database::open(&dir.path().join("cache.sqlite")).unwrap();
        (PeriodCache::new(db.clone()), db, dir)
    }

    #[test]
    fn hash_is_stable_and_order_sensitive() {
        let a = interval_hash(Window::new(100, 200));
        assert_eq!(a, interval_hash(Window::new(100, 200)));
        assert_ne!(a, interval_hash(Window::new(200, 100)));
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn only_exact_windows_are_covered() {
        let (cache, _db, _dir) = cache();
        cache.mark_covered(Window::new(100, 200)).unwrap();

        assert!(cache.is_covered(Window::new(100, 200)).unwrap());
        assert!(!cache.is_covered(Window::new(120, 180)).unwrap());
        assert!(!cache.is_covered(Window::new(100, 201)).unwrap());
    }

    #[test]
    fn mark_covered_is_idempotent() {
        let (cache, db, _dir) = cache();
        cache.mark_covered(Window::new(1, 2)).unwrap();
        cache.mark_covered(Window::new(1, 2)).unwrap();
        assert_eq!(db.count_rows("cache_requests").unwrap(), 1);
    }

    #[test]
    fn forget_and_clear_bust_the_cache() {
        let (cache, _db, _dir) = cache();
        cache.mark_covered(Window::new(1, 2)).unwrap();
        cache.mark_covered(Window::new(3, 4)).unwrap();

        assert!(cache.forget(Window::new(1, 2)).unwrap());
        assert!(!cache.forget(Window::new(1, 2)).unwrap());
        assert!(!cache.is_covered(Window::new(1, 2)).unwrap());

        assert_eq!(cache.clear().unwrap(), 1);
        assert!(!cache.is_covered(Window::new(3, 4)).unwrap());
    }
}
