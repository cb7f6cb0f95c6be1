//! HTTP client utilities.
//!
//! One shared client for every upstream PBX endpoint, plus the envelope
//! handling all of them share.

use std::time::Duration;

use reqwest::{Client, ClientBuilder, StatusCode};
use serde::Deserialize;

use crate::error::{PbxError, Result};

/// Header carrying the current credential on authenticated calls.
pub const AUTH_HEADER: &str = "x-pbx-authentication";

/// Build a configured HTTP client.
///
/// # Errors
///
/// Returns error if client construction fails.
pub fn build_client(timeout: Duration) -> Result<Client> {
    ClientBuilder::new()
        .timeout(timeout)
        .user_agent(format!("pbxdash/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| PbxError::Other(anyhow::anyhow!("failed to build HTTP client: {e}")))
}

/// Response wrapper every PBX endpoint uses.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    /// `"1"` on success; some endpoints send a number instead.
    #[serde(default)]
    pub status: serde_json::Value,
    /// Set when the credential was not accepted.
    #[serde(default, rename = "isNotAuth")]
    pub is_not_auth: Option<bool>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Envelope {
    /// Whether `status` reports success.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        match &self.status {
            serde_json::Value::String(s) => s == "1",
            serde_json::Value::Number(n) => n.as_i64() == Some(1),
            serde_json::Value::Bool(b) => *b,
            _ => false,
        }
    }

    /// Upstream's explanation, or the raw status when there is none.
    #[must_use]
    pub fn describe(&self) -> String {
        self.comment
            .clone()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| format!("status {}", self.status))
    }
}

/// POST a form and decode the envelope.
///
/// With a credential, the auth header is attached and an `isNotAuth` flag or
/// HTTP 403 becomes [`PbxError::UpstreamAuthExpired`].
///
/// # Errors
///
/// - [`PbxError::UpstreamTimeout`] if the request timed out
/// - [`PbxError::UpstreamAuthExpired`] if the credential was rejected
/// - [`PbxError::UpstreamRejected`] for any other transport or HTTP failure
/// - [`PbxError::ParseResponse`] if the body is not a JSON envelope
pub async fn post_form<F: serde::Serialize + ?Sized>(
    client: &Client,
    url: &str,
    credential: Option<&str>,
    form: &F,
    timeout: Duration,
) -> Result<Envelope> {
    let mut request = client.post(url).form(form);
    if let Some(credential) = credential {
        request = request.header(AUTH_HEADER, credential);
    }

    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            PbxError::UpstreamTimeout {
                seconds: timeout.as_secs(),
            }
        } else {
            PbxError::UpstreamRejected {
                status: None,
                message: format!("request to {url} failed: {e}"),
            }
        }
    })?;

    let status = response.status();
    if status == StatusCode::FORBIDDEN && credential.is_some() {
        return Err(PbxError::UpstreamAuthExpired);
    }
    if !status.is_success() {
        return Err(PbxError::UpstreamRejected {
            status: Some(status.as_u16()),
            message: format!("HTTP {status} from {url}"),
        });
    }

    let body = response.text().await.map_err(|e| {
        if e.is_timeout() {
            PbxError::UpstreamTimeout {
                seconds: timeout.as_secs(),
            }
        } else {
            PbxError::ParseResponse(e.to_string())
        }
    })?;
    tracing::trace!(url, body = %body, "upstream response");

    let envelope: Envelope =
        serde_json::from_str(&body).map_err(|e| PbxError::ParseResponse(e.to_string()))?;

    if credential.is_some() && envelope.is_not_auth == Some(true) {
        return Err(PbxError::UpstreamAuthExpired);
    }

    Ok(envelope)
}
