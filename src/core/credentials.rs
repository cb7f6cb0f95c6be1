//! Credential store for the PBX API.
//!
//! The upstream hands out short-lived credentials in exchange for a long-lived
//! auth key. The current credential lives in memory and in a small JSON file
//! (`{"api_key": "<key_id>:<key>"}`) so it survives restarts. Renewal is
//! serialized behind one lock: concurrent callers wait for the renewal in
//! flight instead of starting their own.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::core::http::post_form;
use crate::error::{PbxError, Result};

/// Opaque bearer credential sent in the auth header.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    #[must_use]
    pub const fn new(value: String) -> Self {
        Self(value)
    }

    /// The raw header value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct KeyFile {
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct IssuedKey {
    key_id: serde_json::Value,
    key: serde_json::Value,
}

/// Holds and renews the current credential.
#[derive(Debug)]
pub struct CredentialStore {
    client: Client,
    auth_url: String,
    auth_key: Option<String>,
    key_file: PathBuf,
    timeout: Duration,
    current: Mutex<Option<Credential>>,
    renewals: AtomicU32,
}

impl CredentialStore {
    #[must_use]
    pub fn new(
        client: Client,
        auth_url: impl Into<String>,
        auth_key: Option<String>,
        key_file: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            auth_url: auth_url.into(),
            auth_key,
            key_file: key_file.into(),
            timeout,
            current: Mutex::new(None),
            renewals: AtomicU32::new(0),
        }
    }

    /// The credential in memory, else the one on disk, else a fresh one.
    ///
    /// # Errors
    /// Returns [`PbxError::AuthUnavailable`] if nothing is stored and renewal fails.
    pub async fn get_valid_credential(&self) -> Result<Credential> {
        let mut current = self.current.lock().await;
        if let Some(credential) = current.as_ref() {
            return Ok(credential.clone());
        }

        if let Some(credential) = read_key_file(&self.key_file) {
            tracing::debug!(path = %self.key_file.display(), "loaded credential from file");
            *current = Some(credential.clone());
            return Ok(credential);
        }

        tracing::info!("no stored credential, requesting a new one");
        let credential = self.renew().await?;
        *current = Some(credential.clone());
        Ok(credential)
    }

    /// Drop the current credential and request a new one.
    ///
    /// # Errors
    /// Returns [`PbxError::AuthUnavailable`] if the auth endpoint does not issue one.
    pub async fn invalidate_and_renew(&self) -> Result<Credential> {
        let mut current = self.current.lock().await;
        *current = None;

        let credential = self.renew().await?;
        *current = Some(credential.clone());
        Ok(credential)
    }

    /// How many renewals this store has performed.
    #[must_use]
    pub fn renewal_count(&self) -> u32 {
        self.renewals.load(Ordering::Relaxed)
    }

    async fn renew(&self) -> Result<Credential> {
        let auth_key = self.auth_key.as_deref().ok_or_else(|| PbxError::AuthUnavailable {
            reason: "no auth key configured".to_string(),
        })?;

        let form = [("auth_key", auth_key), ("new", "true")];
        let envelope = post_form(&self.client, &self.auth_url, None, &form, self.timeout)
            .await
            .map_err(|e| PbxError::AuthUnavailable {
                reason: e.to_string(),
            })?;

        if !envelope.is_ok() {
            return Err(PbxError::AuthUnavailable {
                reason: envelope.describe(),
            });
        }

        let issued: IssuedKey =
            serde_json::from_value(envelope.data).map_err(|e| PbxError::AuthUnavailable {
                reason: format!("malformed auth response: {e}"),
            })?;
        let credential = Credential::new(format!(
            "{}:{}",
            json_scalar(&issued.key_id),
            json_scalar(&issued.key)
        ));

        self.renewals.fetch_add(1, Ordering::Relaxed);
        tracing::info!("obtained new PBX credential");

        if let Err(e) = write_key_file(&self.key_file, &credential) {
            tracing::warn!(path = %self.key_file.display(), error = %e, "failed to persist credential");
        }

        Ok(credential)
    }
}

fn json_scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn read_key_file(path: &Path) -> Option<Credential> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read credential file");
            return None;
        }
    };

    match serde_json::from_str::<KeyFile>(&content) {
        Ok(file) if !file.api_key.is_empty() => Some(Credential::new(file.api_key)),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring malformed credential file");
            None
        }
    }
}

fn write_key_file(path: &Path, credential: &Credential) -> Result<()> {
    let content = serde_json::to_vec(&KeyFile {
        api_key: credential.expose().to_string(),
    })?;
    write_atomic(path, &content)?;
    Ok(())
}

/// Write via a sibling temp file and rename, so readers never see a partial file.
fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    std::fs::create_dir_all(parent)?;

    let temp_path = parent.join(format!(
        ".{}.tmp.{}",
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("credential"),
        std::process::id()
    ));

    {
        let mut file = std::fs::File::create(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
    }

    std::fs::rename(&temp_path, path)
}
