//! Error types for pbxdash.
//!
//! Uses `thiserror` for structured error types that map to exit codes.
//!
//! ## Error Taxonomy
//!
//! Errors are categorized into five categories:
//! - **Authentication**: the PBX credential could not be obtained or renewed
//! - **Network**: upstream timeouts and rejected requests
//! - **Storage**: local database or credential-file failures
//! - **Configuration**: config file parsing, validation, or bad arguments
//! - **Internal**: unexpected errors, bugs, or unclassified issues
//!
//! Each error has a stable error code (e.g., `PBX-A001`) for programmatic handling.
//!
//! ## Recovery
//!
//! Only [`PbxError::UpstreamAuthExpired`] is ever recovered from, and only by
//! the auth-retry state machine in [`crate::core::fetch_plan`]. Every other
//! variant is surfaced to the caller as-is.

use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// High-level error categories for classification and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Credential could not be obtained or renewed.
    Authentication,
    /// Upstream timeout or rejection.
    Network,
    /// Local database or file failures.
    Storage,
    /// Configuration or argument issues.
    Configuration,
    /// Internal errors (bugs, unexpected state, unclassified).
    Internal,
}

impl ErrorCategory {
    /// Returns a human-readable description of the category.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Authentication => "Authentication error",
            Self::Network => "Network error",
            Self::Storage => "Storage error",
            Self::Configuration => "Configuration error",
            Self::Internal => "Internal error",
        }
    }

    /// Returns a short code prefix for this category.
    #[must_use]
    pub const fn code_prefix(&self) -> &'static str {
        match self {
            Self::Authentication => "A",
            Self::Network => "N",
            Self::Storage => "S",
            Self::Configuration => "C",
            Self::Internal => "X",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

// =============================================================================
// Exit Codes
// =============================================================================

/// Process exit codes for the `pbxdash` binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// Unexpected failure
    GeneralError = 1,
    /// Credential unavailable
    AuthError = 2,
    /// Parse/config/argument errors
    ParseError = 3,
    /// Timeout
    Timeout = 4,
    /// Local storage failure
    StorageError = 5,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as Self
    }
}

/// Main error type for pbxdash operations.
#[derive(Error, Debug)]
pub enum PbxError {
    // ==========================================================================
    // Authentication errors (Category: Authentication)
    // ==========================================================================
    /// The auth endpoint could not issue a credential.
    #[error("PBX credential unavailable: {reason}")]
    AuthUnavailable { reason: String },

    // ==========================================================================
    // Upstream errors (Category: Network)
    // ==========================================================================
    /// The upstream request did not complete within the client timeout.
    #[error("upstream request timed out after {seconds}s")]
    UpstreamTimeout { seconds: u64 },

    /// The upstream rejected the request for a reason other than credential expiry.
    #[error("upstream request failed: {message}")]
    UpstreamRejected {
        status: Option<u16>,
        message: String,
    },

    /// The upstream signalled that the credential is no longer accepted
    /// (`isNotAuth` flag or HTTP 403).
    #[error("upstream rejected the current credential")]
    UpstreamAuthExpired,

    /// The upstream answered with a body that could not be understood.
    #[error("failed to parse upstream response: {0}")]
    ParseResponse(String),

    // ==========================================================================
    // Storage errors (Category: Storage)
    // ==========================================================================
    /// Local database failure. The enclosing transaction has been rolled back.
    #[error("storage error: {0}")]
    Storage(String),

    // ==========================================================================
    // Configuration errors (Category: Configuration)
    // ==========================================================================
    /// Invalid configuration value or file.
    #[error("configuration error: {0}")]
    Config(String),

    /// A calendar date argument was malformed or out of range.
    #[error("invalid date: {0}")]
    InvalidDate(String),

    // ==========================================================================
    // I/O errors (Category: Storage / Internal)
    // ==========================================================================
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ==========================================================================
    // Generic wrapper (Category: Internal)
    // ==========================================================================
    /// Catch-all for other errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for PbxError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl PbxError {
    /// Map error to process exit code.
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self {
            Self::AuthUnavailable { .. } | Self::UpstreamAuthExpired => ExitCode::AuthError,
            Self::UpstreamTimeout { .. } => ExitCode::Timeout,
            Self::Config(_) | Self::InvalidDate(_) | Self::ParseResponse(_) => {
                ExitCode::ParseError
            }
            Self::Storage(_) | Self::Io(_) => ExitCode::StorageError,
            Self::UpstreamRejected { .. } | Self::Json(_) | Self::Other(_) => {
                ExitCode::GeneralError
            }
        }
    }

    /// Returns the error category for classification and routing.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::AuthUnavailable { .. } | Self::UpstreamAuthExpired => {
                ErrorCategory::Authentication
            }
            Self::UpstreamTimeout { .. }
            | Self::UpstreamRejected { .. }
            | Self::ParseResponse(_) => ErrorCategory::Network,
            Self::Storage(_) | Self::Io(_) => ErrorCategory::Storage,
            Self::Config(_) | Self::InvalidDate(_) => ErrorCategory::Configuration,
            Self::Json(_) | Self::Other(_) => ErrorCategory::Internal,
        }
    }

    /// Returns a stable error code for programmatic handling.
    ///
    /// Format: `PBX-{category}{number}`.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::AuthUnavailable { .. } => "PBX-A001",
            Self::UpstreamAuthExpired => "PBX-A002",
            Self::UpstreamTimeout { .. } => "PBX-N001",
            Self::UpstreamRejected { .. } => "PBX-N002",
            Self::ParseResponse(_) => "PBX-N003",
            Self::Storage(_) => "PBX-S001",
            Self::Io(_) => "PBX-S002",
            Self::Config(_) => "PBX-C001",
            Self::InvalidDate(_) => "PBX-C002",
            Self::Json(_) => "PBX-X001",
            Self::Other(_) => "PBX-X099",
        }
    }

    /// Whether the upstream rejected the credential (recoverable by renewal).
    #[must_use]
    pub const fn is_auth_expired(&self) -> bool {
        matches!(self, Self::UpstreamAuthExpired)
    }

    /// A one-line fix for errors the user can act on.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        match self {
            Self::AuthUnavailable { .. } => {
                Some("check PBXDASH_AUTH_KEY or [pbx] auth_key in config.toml")
            }
            Self::UpstreamTimeout { .. } => Some("retry, or raise --timeout"),
            Self::Config(_) => Some("check config.toml and PBXDASH_* environment variables"),
            Self::InvalidDate(_) => Some("use YYYY-MM-DD, no later than today"),
            _ => None,
        }
    }

    /// HTTP status attached to an upstream rejection, if any.
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::UpstreamRejected { status, .. } => *status,
            _ => None,
        }
    }
}

/// Result type alias for pbxdash operations.
pub type Result<T> = std::result::Result<T, PbxError>;
