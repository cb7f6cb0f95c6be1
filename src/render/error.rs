//! Error rendering for pbxdash.
//!
//! Plain text for terminals, structured JSON for `--json`.

use crate::cli::args::OutputFormat;
use crate::error::PbxError;

/// Render an error for the requested output format.
#[must_use]
pub fn render_error(error: &PbxError, format: OutputFormat, pretty: bool) -> String {
    match format {
        OutputFormat::Json => render_error_json(error, pretty),
        OutputFormat::Human => render_simple(error),
    }
}

/// Render error as structured JSON for machine consumption.
#[must_use]
pub fn render_error_json(error: &PbxError, pretty: bool) -> String {
    let error_json = ErrorJson::from_error(error);
    let rendered = if pretty {
        serde_json::to_string_pretty(&error_json)
    } else {
        serde_json::to_string(&error_json)
    };
    rendered.unwrap_or_else(|_| render_simple(error))
}

fn render_simple(error: &PbxError) -> String {
    let mut lines = vec![format!("Error [{}]: {}", error.error_code(), error)];
    if let Some(hint) = error.hint() {
        lines.push(format!("Fix: {hint}"));
    }
    lines.join("\n")
}

/// JSON representation of an error for machine consumption.
#[derive(serde::Serialize)]
struct ErrorJson {
    error_code: String,
    category: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    http_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<&'static str>,
}

impl ErrorJson {
    fn from_error(error: &PbxError) -> Self {
        Self {
            error_code: error.error_code().to_string(),
            category: error.category().to_string(),
            message: error.to_string(),
            http_status: error.status_code(),
            hint: error.hint(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_render_includes_error_code() {
        let out = render_error(
            &PbxError::UpstreamTimeout { seconds: 10 },
            OutputFormat::Human,
            false,
        );
        assert!(out.starts_with("Error [PBX-N001]"));
        assert!(out.contains("10s"));
    }

    #[test]
    fn json_render_is_valid_json() {
        let out = render_error(
            &PbxError::Config("bad".to_string()),
            OutputFormat::Json,
            false,
        );
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["error_code"], "PBX-C001");
        assert_eq!(value["category"], "Configuration error");
    }

    #[test]
    fn json_render_carries_upstream_status() {
        let out = render_error_json(
            &PbxError::UpstreamRejected {
                status: Some(502),
                message: "bad gateway".to_string(),
            },
            false,
        );
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["http_status"], 502);
        assert!(value.get("hint").is_none());
    }

    #[test]
    fn json_render_respects_pretty() {
        let err = PbxError::InvalidDate("x".to_string());
        assert!(render_error_json(&err, true).contains('\n'));
        assert!(!render_error_json(&err, false).contains('\n'));
    }
}
