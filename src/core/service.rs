//! Call service: the cache-and-reconciliation entry point.
//!
//! For each requested window the service decides whether the window is
//! already materialized locally, fetches and persists it if not, writes
//! daily aggregates through when the query carries a date, and hands back a
//! plain [`CallsReport`]. Upstream and storage failures end up in the
//! report's `error` field instead of failing the call.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Local};

use super::credentials::CredentialStore;
use super::http::build_client;
use super::models::{CallQuery, CallRecord, CallsReport, DataSource, ReportError, Trunk, Window};
use super::pbx::{PbxClient, PbxEndpoints};
use super::stats::compute_from_records;
use crate::error::Result;
use crate::storage::{
    DailyAggregateStore, Database, PeriodCache, RecordStore, ResolvedConfig, TrunkStore,
};
use crate::util::time::format_period_label;

/// Orchestrates upstream fetches against the local stores.
///
/// Built once at startup and shared by reference. The only mutable state is
/// the credential inside the [`PbxClient`], which serializes its own renewals.
#[derive(Debug, Clone)]
pub struct CallService {
    pbx: PbxClient,
    periods: PeriodCache,
    records: RecordStore,
    aggregates: DailyAggregateStore,
    trunks: TrunkStore,
    trunks_max_age_secs: i64,
}

impl CallService {
    #[must_use]
    pub fn new(pbx: PbxClient, db: &Database, trunks_max_age_secs: i64) -> Self {
        Self {
            pbx,
            periods: PeriodCache::new(db.clone()),
            records: RecordStore::new(db.clone()),
            aggregates: DailyAggregateStore::new(db.clone()),
            trunks: TrunkStore::new(db.clone()),
            trunks_max_age_secs,
        }
    }

    /// Wire every collaborator from resolved configuration.
    ///
    /// # Errors
    /// Returns an error if no domain is configured, the HTTP client cannot be
    /// built, or the database cannot be opened.
    pub fn from_config(config: &ResolvedConfig) -> Result<Self> {
        let endpoints = PbxEndpoints::new(&config.api_base, config.require_domain()?);
        let client = build_client(config.timeout)?;
        let credentials = Arc::new(CredentialStore::new(
            client.clone(),
            endpoints.auth.clone(),
            config.auth_key.clone(),
            config.key_file.clone(),
            config.timeout,
        ));
        let pbx = PbxClient::new(client, endpoints, credentials, config.timeout);
        let db = Database::open(&config.db_file)?;

        Ok(Self::new(pbx, &db, config.trunks_max_age_secs))
    }

    /// Upstream client, for callers that need the raw fetch history.
    #[must_use]
    pub const fn pbx(&self) -> &PbxClient {
        &self.pbx
    }

    /// Aggregate store backing the stats views.
    #[must_use]
    pub const fn aggregates(&self) -> &DailyAggregateStore {
        &self.aggregates
    }

    /// Period cache, for manual cache-busting.
    #[must_use]
    pub const fn periods(&self) -> &PeriodCache {
        &self.periods
    }

    /// Records and per-number stats for `query`, resolved against the current time.
    pub async fn get_calls(&self, query: CallQuery) -> CallsReport {
        self.get_calls_at(query, Local::now()).await
    }

    /// Records and per-number stats for `query`, resolved against `now`.
    ///
    /// `now` also decides which day counts as "today" for the freeze rule.
    pub async fn get_calls_at(&self, query: CallQuery, now: DateTime<Local>) -> CallsReport {
        let window = query.resolve(now.timestamp());
        let mut report = CallsReport {
            window,
            label: format_period_label(window),
            source: None,
            records: Vec::new(),
            caller_stats: Vec::new(),
            error: None,
        };

        let descriptions = self.get_trunks().await;

        let (source, mut records) = match self.load_window(window, &descriptions).await {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::error!(start = window.start, end = window.end, error = %e, "call listing failed");
                report.error = Some(ReportError::from(&e));
                return report;
            }
        };

        attach_descriptions(&mut records, &descriptions);
        let caller_stats = compute_from_records(&records);

        if let Some(date) = query.aggregate_date() {
            if let Err(e) =
                self.aggregates
                    .write_through_as_of(&caller_stats, window, date, now.date_naive())
            {
                tracing::error!(%date, error = %e, "daily aggregate write-through failed");
                report.error = Some(ReportError::from(&e));
            }
        }

        report.source = Some(source);
        report.records = records;
        report.caller_stats = caller_stats;
        report
    }

    /// Cached records when the exact window is covered, else a fresh fetch
    /// persisted together with the window's cache fact.
    async fn load_window(
        &self,
        window: Window,
        descriptions: &BTreeMap<String, String>,
    ) -> Result<(DataSource, Vec<CallRecord>)> {
        if self.periods.is_covered(window)? {
            tracing::debug!(start = window.start, end = window.end, "window cached, reading locally");
            return Ok((DataSource::Cache, self.records.query_range(window)?));
        }

        tracing::debug!(start = window.start, end = window.end, "window not cached");
        let mut records = self.pbx.search_calls(window).await.into_result()?;
        attach_descriptions(&mut records, descriptions);
        self.records.persist_window(&records, window)?;

        Ok((DataSource::Upstream, records))
    }

    /// Number → description map. Never fails: an unreachable directory
    /// yields an empty map.
    pub async fn get_trunks(&self) -> BTreeMap<String, String> {
        match self.trunks.fresh(self.trunks_max_age_secs) {
            Ok(cached) if !cached.is_empty() => {
                tracing::debug!(count = cached.len(), "using cached trunk directory");
                return cached;
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "failed to read cached trunk directory"),
        }

        match self.refresh_trunks().await {
            Ok(trunks) => trunks
                .into_iter()
                .map(|t| (t.number, t.description))
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "trunk directory unavailable, descriptions left empty");
                BTreeMap::new()
            }
        }
    }

    /// Fetch the full trunk list from upstream and store it.
    ///
    /// # Errors
    /// Returns the upstream or storage error.
    pub async fn list_trunks(&self) -> Result<Vec<Trunk>> {
        self.refresh_trunks().await
    }

    async fn refresh_trunks(&self) -> Result<Vec<Trunk>> {
        let trunks = self.pbx.fetch_trunks().await.into_result()?;
        self.trunks.save(&trunks)?;
        Ok(trunks)
    }
}

/// Directory description wins; the stored one is kept when the directory
/// has no entry for the number.
fn attach_descriptions(records: &mut [CallRecord], descriptions: &BTreeMap<String, String>) {
    for record in records {
        if let Some(description) = descriptions.get(&record.originating_number) {
            record.description.clone_from(description);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn directory_descriptions_override_stored_ones() {
        let mut records = vec![
            CallRecord::from_payload(json!({"uuid": "a", "gateway": "74951"})).unwrap(),
            CallRecord::from_payload(json!({"uuid": "b", "gateway": "74952"})).unwrap(),
        ];
        records[1].description = "stored".to_string();

        let mut descriptions = BTreeMap::new();
        descriptions.insert("74951".to_string(), "Sales".to_string());
        attach_descriptions(&mut records, &descriptions);

        assert_eq!(records[0].description, "Sales");
        assert_eq!(records[1].description, "stored");
    }
}
