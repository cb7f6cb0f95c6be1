//! Upstream PBX API client.
//!
//! Wraps the search and trunk endpoints behind the auth-retry state machine
//! and normalizes what comes back. Nothing here touches local storage.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use super::credentials::{Credential, CredentialStore};
use super::fetch_plan::{FetchOutcome, run_with_auth_retry};
use super::http::post_form;
use super::models::{CallRecord, Trunk, Window, is_outbound_payload};
use crate::error::{PbxError, Result};

/// Endpoint URLs for one PBX domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PbxEndpoints {
    pub auth: String,
    pub search: String,
    pub trunks: String,
}

impl PbxEndpoints {
    /// Derive every endpoint from the API base and domain.
    #[must_use]
    pub fn new(api_base: &str, domain: &str) -> Self {
        let root = format!("{}/{}", api_base.trim_end_matches('/'), domain);
        Self {
            auth: format!("{root}/auth.json"),
            search: format!("{root}/mongo_history/search.json"),
            trunks: format!("{root}/trunks/get.json"),
        }
    }
}

/// Authenticated access to the upstream record and trunk APIs.
#[derive(Debug, Clone)]
pub struct PbxClient {
    client: Client,
    endpoints: PbxEndpoints,
    credentials: Arc<CredentialStore>,
    timeout: Duration,
}

impl PbxClient {
    #[must_use]
    pub const fn new(
        client: Client,
        endpoints: PbxEndpoints,
        credentials: Arc<CredentialStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            endpoints,
            credentials,
            timeout,
        }
    }

    /// Shared credential store.
    #[must_use]
    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Outbound records starting inside `window`, most recent first.
    pub async fn search_calls(&self, window: Window) -> FetchOutcome<Vec<CallRecord>> {
        tracing::info!(start = window.start, end = window.end, "fetching calls from upstream");
        run_with_auth_retry(&self.credentials, "search_calls", |credential| {
            self.search_once(window, credential)
        })
        .await
    }

    /// The full trunk list.
    pub async fn fetch_trunks(&self) -> FetchOutcome<Vec<Trunk>> {
        tracing::info!("fetching trunk directory from upstream");
        run_with_auth_retry(&self.credentials, "fetch_trunks", |credential| {
            self.trunks_once(credential)
        })
        .await
    }

    async fn search_once(&self, window: Window, credential: Credential) -> Result<Vec<CallRecord>> {
        let form = [
            ("start_stamp_from", window.start.to_string()),
            ("start_stamp_to", window.end.to_string()),
        ];
        let envelope = post_form(
            &self.client,
            &self.endpoints.search,
            Some(credential.expose()),
            &form,
            self.timeout,
        )
        .await?;

        let records = normalize_calls(envelope.data)?;
        tracing::info!(count = records.len(), "upstream returned outbound calls");
        Ok(records)
    }

    async fn trunks_once(&self, credential: Credential) -> Result<Vec<Trunk>> {
        let envelope = post_form(
            &self.client,
            &self.endpoints.trunks,
            Some(credential.expose()),
            &[] as &[(&str, &str)],
            self.timeout,
        )
        .await?;

        if !envelope.is_ok() {
            return Err(PbxError::UpstreamRejected {
                status: None,
                message: format!("trunk listing refused: {}", envelope.describe()),
            });
        }

        let trunks = match envelope.data {
            serde_json::Value::Array(items) => {
                items.into_iter().filter_map(Trunk::from_payload).collect()
            }
            _ => Vec::new(),
        };
        Ok(trunks)
    }
}

/// Keep outbound records only, normalized and sorted newest first.
///
/// A missing or non-array `data` means no records. Direction is checked on
/// the raw element, so other directions are dropped whatever their shape.
///
/// # Errors
/// Returns [`PbxError::ParseResponse`] if an outbound element cannot be
/// read as a call record.
pub fn normalize_calls(data: serde_json::Value) -> Result<Vec<CallRecord>> {
    let serde_json::Value::Array(items) = data else {
        return Ok(Vec::new());
    };

    let mut records = Vec::with_capacity(items.len());
    for item in items.into_iter().filter(is_outbound_payload) {
        records.push(CallRecord::from_payload(item)?);
    }
    records.sort_by(|a, b| b.start_stamp.cmp(&a.start_stamp));
    Ok(records)
}
