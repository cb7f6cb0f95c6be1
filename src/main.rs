//! pbxdash - PBX call dashboard
//!
//! CLI entry point.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use clap::Parser;
use std::process::ExitCode;

use pbxdash::cli::{Cli, Commands};
use pbxdash::core::logging;
use pbxdash::storage::ResolvedConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Config is resolved first so its log level can take part; a bad config
    // is reported after logging is up.
    let config = ResolvedConfig::resolve(&cli);

    logging::init(&logging::LogSettings::resolve(&cli, config.as_ref().ok()));

    let format = cli.effective_format();
    let pretty = cli.pretty;

    let result = match config {
        Ok(config) => run(&cli, &config).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            tracing::error!(error_code = e.error_code(), "{}", e);
            eprintln!(
                "{}",
                pbxdash::render::error::render_error(&e, format, pretty)
            );
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(cli: &Cli, config: &ResolvedConfig) -> pbxdash::Result<pbxdash::ExitCode> {
    let format = cli.effective_format();
    let pretty = cli.pretty;

    tracing::debug!(
        db_file = %config.db_file.display(),
        db_source = %config.sources.db_file,
        timeout_source = %config.sources.timeout,
        "resolved configuration"
    );

    match &cli.command {
        Commands::Calls(args) => pbxdash::cli::calls::execute(args, config, format, pretty).await,
        Commands::Trunks => pbxdash::cli::trunks::execute(config, format, pretty)
            .await
            .map(|()| pbxdash::ExitCode::Success),
        Commands::Stats(args) => pbxdash::cli::stats::execute(args, config, format, pretty)
            .map(|()| pbxdash::ExitCode::Success),
        Commands::Cache(cmd) => pbxdash::cli::cache::execute(cmd, config, format, pretty)
            .map(|()| pbxdash::ExitCode::Success),
    }
}
