//! `trunks` command implementation.

use crate::cli::args::OutputFormat;
use crate::core::service::CallService;
use crate::error::Result;
use crate::render;
use crate::storage::ResolvedConfig;

/// Execute the trunks command: refresh the directory from upstream and print it.
///
/// # Errors
/// Returns the upstream or storage error; nothing is printed in that case.
pub async fn execute(config: &ResolvedConfig, format: OutputFormat, pretty: bool) -> Result<()> {
    let service = CallService::from_config(config)?;
    let trunks = service.list_trunks().await?;

    println!("{}", render::render_trunks(&trunks, format, pretty)?);
    Ok(())
}
