//! `calls` command implementation.

use chrono::Local;

use crate::cli::args::{CallsArgs, OutputFormat};
use crate::core::service::CallService;
use crate::error::{ExitCode, Result};
use crate::render;
use crate::storage::ResolvedConfig;

/// Execute the calls command.
///
/// A report that carries an error is still printed; the error only decides
/// the exit code.
///
/// # Errors
/// Returns an error if the flags are invalid or the service cannot be built.
pub async fn execute(
    args: &CallsArgs,
    config: &ResolvedConfig,
    format: OutputFormat,
    pretty: bool,
) -> Result<ExitCode> {
    let now = Local::now();
    let query = args.to_query(now)?;
    let service = CallService::from_config(config)?;

    tracing::debug!(?query, "Starting calls fetch");
    let report = service.get_calls_at(query, now).await;

    println!("{}", render::render_calls(&report, format, pretty)?);

    Ok(report
        .error
        .as_ref()
        .map_or(ExitCode::Success, |e| e.exit_code))
}
