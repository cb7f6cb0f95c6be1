//! Robot-mode output (JSON).
//!
//! Every command wraps its data in the same envelope so scripts can rely on
//! `schema_version`, `command`, and `errors` being present.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::models::ReportError;
use crate::error::Result;

/// Schema identifier for the JSON envelope.
pub const SCHEMA_VERSION: &str = "pbxdash.v1";

/// JSON envelope around a command's data.
#[derive(Debug, Clone, Serialize)]
pub struct RobotOutput<T> {
    pub schema_version: &'static str,
    pub generated_at: DateTime<Utc>,
    pub command: String,
    pub data: T,
    pub errors: Vec<ReportError>,
}

impl<T> RobotOutput<T> {
    /// Create a new robot output envelope.
    pub fn new(command: impl Into<String>, data: T) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            generated_at: Utc::now(),
            command: command.into(),
            data,
            errors: Vec::new(),
        }
    }

    /// Attach an error surfaced alongside the data.
    #[must_use]
    pub fn with_error(mut self, error: Option<ReportError>) -> Self {
        self.errors.extend(error);
        self
    }
}

/// Serialize any envelope.
///
/// # Errors
/// Returns an error if serialization fails.
pub fn render_json<T: Serialize>(output: &T, pretty: bool) -> Result<String> {
    if pretty {
        Ok(serde_json::to_string_pretty(output)?)
    } else {
        Ok(serde_json::to_string(output)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExitCode;

    #[test]
    fn envelope_carries_schema_and_errors() {
        let output = RobotOutput::new("calls", vec![1, 2]).with_error(Some(ReportError {
            code: "PBX-N001".to_string(),
            message: "timed out".to_string(),
            exit_code: ExitCode::Timeout,
        }));
        let value: serde_json::Value =
            serde_json::from_str(&render_json(&output, false).unwrap()).unwrap();

        assert_eq!(value["schema_version"], SCHEMA_VERSION);
        assert_eq!(value["command"], "calls");
        assert_eq!(value["data"], serde_json::json!([1, 2]));
        assert_eq!(value["errors"][0]["code"], "PBX-N001");
    }

    #[test]
    fn no_error_means_empty_list() {
        let output = RobotOutput::new("trunks", ()).with_error(None);
        assert!(output.errors.is_empty());
    }
}
