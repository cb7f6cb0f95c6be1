//! Auth-retry state machine for upstream fetches.
//!
//! Every authenticated PBX call runs through [`run_with_auth_retry`]:
//!
//! 1. `Acquire` a credential. Failure is terminal.
//! 2. `Request` with it. Success and non-auth failures are terminal.
//! 3. On [`PbxError::UpstreamAuthExpired`], `Renew` the credential and go
//!    back to 2, but only while attempts remain.
//!
//! At most [`MAX_ATTEMPTS`] requests and one renewal happen per fetch.

use std::future::Future;
use std::time::Instant;

use chrono::{DateTime, Utc};

use super::credentials::{Credential, CredentialStore};
use crate::error::{PbxError, Result};

/// Upstream requests per logical fetch, including the one after renewal.
pub const MAX_ATTEMPTS: u32 = 2;

// =============================================================================
// Fetch Attempt
// =============================================================================

/// How a single request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    /// Credential rejected; a renewal may follow.
    AuthExpired,
    Failed,
}

/// Record of a single upstream request.
#[derive(Debug, Clone)]
pub struct FetchAttempt {
    /// 1-based.
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcome: AttemptOutcome,
    pub error: Option<String>,
}

// =============================================================================
// Fetch Outcome
// =============================================================================

/// Result of one logical fetch with its request history.
#[derive(Debug)]
pub struct FetchOutcome<T> {
    pub operation: &'static str,
    pub result: Result<T>,
    pub attempts: Vec<FetchAttempt>,
    pub renewals: u32,
}

impl<T> FetchOutcome<T> {
    /// Whether the fetch produced a value.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Drop the history and keep the result.
    ///
    /// # Errors
    /// Returns the terminal error of the fetch.
    pub fn into_result(self) -> Result<T> {
        self.result
    }
}

enum State {
    Acquire,
    Request(Credential),
    Renew,
}

/// Run `request` with a valid credential, renewing once if it is rejected.
///
/// A rejection on the last attempt becomes [`PbxError::AuthUnavailable`]:
/// the renewed credential was refused too, so retrying further is pointless.
pub async fn run_with_auth_retry<T, F, Fut>(
    credentials: &CredentialStore,
    operation: &'static str,
    mut request: F,
) -> FetchOutcome<T>
where
    F: FnMut(Credential) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempts: Vec<FetchAttempt> = Vec::with_capacity(MAX_ATTEMPTS as usize);
    let mut attempt = 0;
    let mut renewals = 0;
    let mut state = State::Acquire;

    let result = loop {
        state = match state {
            State::Acquire => match credentials.get_valid_credential().await {
                Ok(credential) => State::Request(credential),
                Err(e) => break Err(e),
            },
            State::Renew => {
                renewals += 1;
                match credentials.invalidate_and_renew().await {
                    Ok(credential) => State::Request(credential),
                    Err(e) => break Err(e),
                }
            }
            State::Request(credential) => {
                attempt += 1;
                let started_at = Utc::now();
                let start = Instant::now();
                let result = request(credential).await;
                let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

                let outcome = match &result {
                    Ok(_) => AttemptOutcome::Success,
                    Err(e) if e.is_auth_expired() => AttemptOutcome::AuthExpired,
                    Err(_) => AttemptOutcome::Failed,
                };
                attempts.push(FetchAttempt {
                    attempt,
                    started_at,
                    duration_ms,
                    outcome,
                    error: result.as_ref().err().map(ToString::to_string),
                });

                match result {
                    Ok(value) => break Ok(value),
                    Err(e) if e.is_auth_expired() && attempt < MAX_ATTEMPTS => {
                        tracing::warn!(operation, attempt, "credential rejected, renewing");
                        State::Renew
                    }
                    Err(e) if e.is_auth_expired() => {
                        break Err(PbxError::AuthUnavailable {
                            reason: "credential rejected again after renewal".to_string(),
                        });
                    }
                    Err(e) => break Err(e),
                }
            }
        };
    };

    if let Err(e) = &result {
        tracing::error!(
            operation,
            attempts = attempts.len(),
            renewals,
            error = %e,
            "upstream fetch failed"
        );
    }

    FetchOutcome {
        operation,
        result,
        attempts,
        renewals,
    }
}
