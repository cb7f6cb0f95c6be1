//! Daily aggregate store.
//!
//! One row per `(date, number)`. Rows for the current day are overwritten on
//! every write-through so they track the day in progress. Once a day is over
//! its rows are frozen: later write-throughs may add missing numbers but
//! never touch an existing row.

use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Row, params};

use crate::core::models::{CallerStat, DayCell, DayStats, MatrixRow, StatsDate, StatsMatrix, Window};
use crate::core::stats::sort_matrix_rows;
use crate::error::Result;
use crate::storage::db::Database;
use crate::util::time::today;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// What a write-through did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteThroughSummary {
    /// New rows created.
    pub inserted: usize,
    /// Existing rows for today overwritten.
    pub updated: usize,
    /// Existing rows for a past day left untouched.
    pub frozen: usize,
}

/// Per-day, per-number rollups.
#[derive(Debug, Clone)]
pub struct DailyAggregateStore {
    db: Database,
}

impl DailyAggregateStore {
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// Write stats for `date`, applying the freeze rule against the local date.
    ///
    /// # Errors
    /// Returns an error (after rolling back the batch) if any row fails.
    pub fn write_through(
        &self,
        stats: &[CallerStat],
        window: Window,
        date: NaiveDate,
    ) -> Result<WriteThroughSummary> {
        self.write_through_as_of(stats, window, date, today())
    }

    /// Write stats for `date` as if the current date were `today`.
    ///
    /// # Errors
    /// Returns an error (after rolling back the batch) if any row fails.
    pub fn write_through_as_of(
        &self,
        stats: &[CallerStat],
        window: Window,
        date: NaiveDate,
        today: NaiveDate,
    ) -> Result<WriteThroughSummary> {
        let mut summary = WriteThroughSummary::default();
        if stats.is_empty() {
            return Ok(summary);
        }

        let is_today = date == today;
        let date_key = date.format(DATE_FORMAT).to_string();
        let now = Utc::now().timestamp();

        let mut conn = self.db.connection()?;
        let tx = conn.transaction()?;
        {
            let mut exists = tx.prepare_cached(
                "SELECT COUNT(*) FROM daily_stats WHERE date = ?1 AND caller_number = ?2",
            )?;
            let mut update = tx.prepare_cached(
                "UPDATE daily_stats SET \
                    total_calls = ?1, calls_over_45s = ?2, percentage_over_45s = ?3, \
                    description = ?4, start_stamp = ?5, end_stamp = ?6, updated_at = ?7 \
                 WHERE date = ?8 AND caller_number = ?9",
            )?;
            let mut insert = tx.prepare_cached(
                "INSERT INTO daily_stats ( \
                    date, caller_number, start_stamp, end_stamp, description, \
                    total_calls, calls_over_45s, percentage_over_45s, created_at, updated_at \
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            )?;

            for stat in stats.iter().filter(|s| !s.number.is_empty()) {
                let existing: i64 =
                    exists.query_row(params![date_key, stat.number], |row| row.get(0))?;

                match (existing > 0, is_today) {
                    (true, false) => summary.frozen += 1,
                    (true, true) => {
                        update.execute(params![
                            stat.total_calls,
                            stat.calls_over_threshold,
                            stat.percentage_over_threshold,
                            stat.description,
                            window.start,
                            window.end,
                            now,
                            date_key,
                            stat.number,
                        ])?;
                        summary.updated += 1;
                    }
                    (false, _) => {
                        insert.execute(params![
                            date_key,
                            stat.number,
                            window.start,
                            window.end,
                            stat.description,
                            stat.total_calls,
                            stat.calls_over_threshold,
                            stat.percentage_over_threshold,
                            now,
                        ])?;
                        summary.inserted += 1;
                    }
                }
            }
        }
        tx.commit()?;

        tracing::info!(
            date = %date_key,
            inserted = summary.inserted,
            updated = summary.updated,
            frozen = summary.frozen,
            "daily stats written"
        );
        Ok(summary)
    }

    /// Stored stats for one day, busiest number first, with day totals.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub fn read_day(&self, date: NaiveDate) -> Result<DayStats> {
        let conn = self.db.connection()?;
        let mut stmt = conn.prepare_cached(
            "SELECT caller_number, description, total_calls, calls_over_45s, percentage_over_45s \
             FROM daily_stats WHERE date = ?1 \
             ORDER BY total_calls DESC, caller_number ASC",
        )?;
        let rows = stmt.query_map([date.format(DATE_FORMAT).to_string()], |row| {
            Ok(CallerStat {
                number: row.get(0)?,
                description: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                total_calls: row.get(2)?,
                calls_over_threshold: row.get(3)?,
                percentage_over_threshold: row.get(4)?,
            })
        })?;

        let mut stats = Vec::new();
        for row in rows {
            stats.push(row?);
        }

        Ok(DayStats {
            date,
            total_calls: stats.iter().map(|s| s.total_calls).sum(),
            total_calls_over_threshold: stats.iter().map(|s| s.calls_over_threshold).sum(),
            stats,
        })
    }

    /// Every stored date, newest first, with its window and summed call count.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored date is malformed.
    pub fn list_dates(&self) -> Result<Vec<StatsDate>> {
        let conn = self.db.connection()?;
        let mut stmt = conn.prepare_cached(
            "SELECT date, MIN(start_stamp), MAX(end_stamp), SUM(total_calls) \
             FROM daily_stats GROUP BY date ORDER BY date DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(StatsDate {
                date: date_column(row, 0)?,
                window: Window::new(row.get(1)?, row.get(2)?),
                total_calls: row.get(3)?,
            })
        })?;

        let mut dates = Vec::new();
        for row in rows {
            dates.push(row?);
        }
        Ok(dates)
    }

    /// Number × date overview.
    ///
    /// Rows are ordered by their call count on the second-newest date (the
    /// newest when only one date exists), highest first. Cells with no stored
    /// row are `None`, which is distinct from a stored zero.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored date is malformed.
    pub fn comprehensive_matrix(&self) -> Result<StatsMatrix> {
        let conn = self.db.connection()?;
        let mut stmt = conn.prepare_cached(
            "SELECT date, caller_number, description, total_calls, calls_over_45s, percentage_over_45s \
             FROM daily_stats ORDER BY date DESC, caller_number ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                date_column(row, 0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                DayCell {
                    total_calls: row.get(3)?,
                    calls_over_threshold: row.get(4)?,
                    percentage_over_threshold: row.get(5)?,
                },
            ))
        })?;

        let mut dates: Vec<NaiveDate> = Vec::new();
        // Rows arrive newest date first, so the first description seen is the latest.
        let mut descriptions: BTreeMap<String, String> = BTreeMap::new();
        let mut cells: HashMap<(NaiveDate, String), DayCell> = HashMap::new();

        for row in rows {
            let (date, number, description, cell) = row?;
            if dates.last() != Some(&date) {
                dates.push(date);
            }
            descriptions.entry(number.clone()).or_insert(description);
            cells.insert((date, number), cell);
        }

        let mut matrix_rows: Vec<MatrixRow> = descriptions
            .into_iter()
            .map(|(number, description)| {
                let row_cells = dates
                    .iter()
                    .map(|date| cells.remove(&(*date, number.clone())))
                    .collect();
                MatrixRow {
                    number,
                    description,
                    cells: row_cells,
                }
            })
            .collect();

        sort_matrix_rows(&mut matrix_rows, dates.len());

        Ok(StatsMatrix {
            rows: matrix_rows,
            dates,
        })
    }
}

fn date_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
