//! `cache` command implementation.

use crate::cli::args::{CacheCommand, OutputFormat};
use crate::error::Result;
use crate::render::{self, CacheCleared};
use crate::storage::{Database, PeriodCache, ResolvedConfig};

/// Execute a cache maintenance command.
///
/// # Errors
/// Returns an error if the database cannot be opened or written.
pub fn execute(
    command: &CacheCommand,
    config: &ResolvedConfig,
    format: OutputFormat,
    pretty: bool,
) -> Result<()> {
    let cache = PeriodCache::new(Database::open(&config.db_file)?);

    let cleared = match command {
        CacheCommand::Clear(args) => {
            let window = args.window();
            let removed = match window {
                Some(window) => usize::from(cache.forget(window)?),
                None => cache.clear()?,
            };
            tracing::info!(removed, "cleared cached windows");
            CacheCleared { removed, window }
        }
    };

    println!("{}", render::render_cache_cleared(cleared, format, pretty)?);
    Ok(())
}
