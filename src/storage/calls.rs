//! Record store: idempotent persistence of call records.
//!
//! Records are keyed by their id and overwritten in place on re-ingest
//! (last write wins). Writes are transactional per batch: if any row fails
//! the whole batch is rolled back and the error propagates.

use rusqlite::types::Type;
use rusqlite::{Connection, Row, params};

use crate::core::models::{CallRecord, OUTBOUND, Window};
use crate::error::Result;
use crate::storage::db::Database;
use crate::storage::period_cache::mark_covered_with;
use crate::util::time::format_timestamp;

const UPSERT_SQL: &str = "INSERT INTO calls ( \
        id, start_stamp, end_stamp, caller_id_number, destination_number, \
        billsec, duration, accountcode, gateway, caller_id_name, description, call_data \
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12) \
    ON CONFLICT(id) DO UPDATE SET \
        start_stamp = excluded.start_stamp, \
        end_stamp = excluded.end_stamp, \
        caller_id_number = excluded.caller_id_number, \
        destination_number = excluded.destination_number, \
        billsec = excluded.billsec, \
        duration = excluded.duration, \
        accountcode = excluded.accountcode, \
        gateway = excluded.gateway, \
        caller_id_name = excluded.caller_id_name, \
        description = excluded.description, \
        call_data = excluded.call_data";

/// Call record persistence.
#[derive(Debug, Clone)]
pub struct RecordStore {
    db: Database,
}

impl RecordStore {
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert or overwrite every record in one transaction.
    ///
    /// # Errors
    /// Returns an error (after rolling back the whole batch) if any row fails.
    pub fn upsert_batch(&self, records: &[CallRecord]) -> Result<usize> {
        let mut conn = self.db.connection()?;
        let tx = conn.transaction()?;
        upsert_with(&tx, records)?;
        tx.commit()?;

        tracing::debug!(count = records.len(), "upserted call records");
        Ok(records.len())
    }

    /// Persist a fetched window: records first, then the window's cache fact,
    /// committed together. The window is never marked covered unless its
    /// records were written.
    ///
    /// # Errors
    /// Returns an error (after rolling back both writes) if any step fails.
    pub fn persist_window(&self, records: &[CallRecord], window: Window) -> Result<usize> {
        let mut conn = self.db.connection()?;
        let tx = conn.transaction()?;
        upsert_with(&tx, records)?;
        mark_covered_with(&tx, window)?;
        tx.commit()?;

        tracing::info!(
            count = records.len(),
            start = window.start,
            end = window.end,
            "persisted fetched window"
        );
        Ok(records.len())
    }

    /// Outbound records starting inside `window`, most recent first.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored payload is corrupt.
    pub fn query_range(&self, window: Window) -> Result<Vec<CallRecord>> {
        let conn = self.db.connection()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, start_stamp, end_stamp, caller_id_number, destination_number, \
                billsec, duration, accountcode, gateway, caller_id_name, description, call_data \
             FROM calls \
             WHERE start_stamp >= ?1 AND start_stamp <= ?2 AND accountcode = ?3 \
             ORDER BY start_stamp DESC, id ASC",
        )?;

        let rows = stmt.query_map(params![window.start, window.end, OUTBOUND], map_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }

        tracing::debug!(
            count = records.len(),
            start = window.start,
            end = window.end,
            "read call records"
        );
        Ok(records)
    }
}

fn upsert_with(conn: &Connection, records: &[CallRecord]) -> Result<()> {
    let mut stmt = conn.prepare_cached(UPSERT_SQL)?;
    for record in records {
        stmt.execute(params![
            record.id,
            record.start_stamp,
            record.end_stamp,
            record.originating_number,
            record.destination_number,
            record.billed_seconds,
            record.duration_seconds,
            record.account_class,
            record.gateway,
            record.caller_name,
            record.description,
            serde_json::to_string(&record.payload)?,
        ])?;
    }
    Ok(())
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<CallRecord> {
    let raw_payload: String = row.get(11)?;
    let payload = serde_json::from_str(&raw_payload)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(11, Type::Text, Box::new(e)))?;

    let start_stamp: i64 = row.get(1)?;

    Ok(CallRecord {
        id: row.get(0)?,
        start_stamp,
        end_stamp: row.get(2)?,
        originating_number: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        destination_number: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        billed_seconds: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
        duration_seconds: row.get::<_, Option<i64>>(6)?.unwrap_or(0),
        account_class: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        gateway: row.get(8)?,
        caller_name: row.get(9)?,
        description: row.get::<_, Option<String>>(10)?.unwrap_or_default(),
        formatted_start: format_timestamp(start_stamp),
        payload,
    })
}
