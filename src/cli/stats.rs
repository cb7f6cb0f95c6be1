//! `stats` command implementation.
//!
//! Reads stored aggregates only; never talks to upstream.

use crate::cli::args::{OutputFormat, StatsArgs, parse_date};
use crate::error::Result;
use crate::render::{self, StatsOverview};
use crate::storage::{DailyAggregateStore, Database, ResolvedConfig};

/// Execute the stats command.
///
/// # Errors
/// Returns an error if the date is malformed or the database cannot be read.
pub fn execute(
    args: &StatsArgs,
    config: &ResolvedConfig,
    format: OutputFormat,
    pretty: bool,
) -> Result<()> {
    let store = DailyAggregateStore::new(Database::open(&config.db_file)?);

    let output = if let Some(date) = &args.date {
        let day = store.read_day(parse_date(date)?)?;
        render::render_day(&day, format, pretty)?
    } else {
        let overview = StatsOverview {
            dates: store.list_dates()?,
            matrix: store.comprehensive_matrix()?,
        };
        render::render_overview(&overview, format, pretty)?
    };

    println!("{output}");
    Ok(())
}
