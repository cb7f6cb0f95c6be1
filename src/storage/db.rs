//! Database handle and schema migrations.
//!
//! The handle only remembers where the database lives. Every logical
//! operation opens its own connection and drops it when done, so no
//! connection outlives a single batch or is held across an upstream call.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;

use crate::error::{PbxError, Result};

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: include_str!("../../migrations/001_calls.sql"),
    },
    Migration {
        version: 2,
        sql: include_str!("../../migrations/002_trunks.sql"),
    },
    Migration {
        version: 3,
        sql: include_str!("../../migrations/003_daily_stats.sql"),
    },
];

/// How long a connection waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Tables that [`Database::count_rows`] accepts.
const KNOWN_TABLES: &[&str] = &[
    "calls",
    "cache_requests",
    "trunks",
    "daily_stats",
    "schema_migrations",
];

/// Location of the embedded database, with the schema guaranteed current.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
}

impl Database {
    /// Create or open the database at `path` and bring its schema up to date.
    ///
    /// # Errors
    /// Returns an error if the parent directory cannot be created, the database
    /// cannot be opened, or a migration fails.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let db = Self {
            path: path.to_path_buf(),
        };
        let mut conn = db.connection()?;
        let version = run_migrations(&mut conn)?;
        tracing::debug!(path = %path.display(), version, "database ready");

        Ok(db)
    }

    /// Path of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a fresh connection for one logical operation.
    ///
    /// # Errors
    /// Returns [`PbxError::Storage`] if the file cannot be opened.
    pub fn connection(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)
            .map_err(|e| PbxError::Storage(format!("open {}: {e}", self.path.display())))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    /// Count rows in one of the known tables.
    ///
    /// # Errors
    /// Returns an error if the table name is unknown or the query fails.
    pub fn count_rows(&self, table: &str) -> Result<i64> {
        if !KNOWN_TABLES.contains(&table) {
            return Err(PbxError::Config(format!("Invalid table name: {table}")));
        }

        let conn = self.connection()?;
        let count = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get(0)
        })?;
        Ok(count)
    }
}

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: i32,
    sql: &'static str,
}

/// Apply every migration newer than the recorded schema version.
///
/// Returns the latest schema version applied.
///
/// # Errors
/// Returns an error if creating the migrations table, reading the schema
/// version, or applying any migration fails.
pub fn run_migrations(conn: &mut Connection) -> Result<i32> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (\
            version INTEGER PRIMARY KEY,\
            applied_at TEXT DEFAULT (datetime('now'))\
        );",
    )
    .map_err(|e| PbxError::Storage(format!("create schema_migrations: {e}")))?;

    let mut current: i32 = conn
        .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get::<_, Option<i32>>(0)
        })
        .map_err(|e| PbxError::Storage(format!("read schema version: {e}")))?
        .unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current {
            apply_migration(conn, migration)?;
            current = migration.version;
        }
    }

    Ok(current)
}

fn apply_migration(conn: &mut Connection, migration: &Migration) -> Result<()> {
    let tx = conn.transaction()?;

    tx.execute_batch(migration.sql).map_err(|e| {
        PbxError::Storage(format!("apply migration {}: {e}", migration.version))
    })?;
    tx.execute(
        "INSERT INTO schema_migrations (version) VALUES (?1)",
        [migration.version],
    )?;
    tx.commit()?;

    tracing::info!(version = migration.version, "applied migration");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_temp() -> (Database, TempDir) {
        let dir = TempDir::new().unwrap();
        let db = Database::open(&dir.path().join("nested/calls.sqlite")).unwrap();
        (db, dir)
    }

    #[test]
    fn open_creates_schema() {
        let (db, _dir) = open_temp();
        for table in ["calls", "cache_requests", "trunks", "daily_stats"] {
            assert_eq!(db.count_rows(table).unwrap(), 0, "{table}");
        }
        assert_eq!(db.count_rows("schema_migrations").unwrap(), 3);
    }

    #[test]
    fn migrations_are_idempotent() {
        let (db, _dir) = open_temp();
        let mut conn = db.connection().unwrap();
        assert_eq!(run_migrations(&mut conn).unwrap(), 3);
        drop(conn);

        let reopened = Database::open(db.path()).unwrap();
        assert_eq!(reopened.count_rows("schema_migrations").unwrap(), 3);
    }

    #[test]
    fn count_rows_rejects_unknown_tables() {
        let (db, _dir) = open_temp();
        let err = db.count_rows("calls; DROP TABLE calls").unwrap_err();
        assert!(matches!(err, PbxError::Config(_)));
    }
}
