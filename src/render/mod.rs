//! Output rendering for human and robot modes.

pub mod error;
pub mod human;
pub mod robot;

use serde::Serialize;

use crate::cli::args::OutputFormat;
use crate::core::models::{CallsReport, DayStats, StatsDate, StatsMatrix, Trunk, Window};
use crate::error::Result;
pub use robot::{RobotOutput, SCHEMA_VERSION};

/// Data behind `pbxdash stats` without `--date`.
#[derive(Debug, Clone, Serialize)]
pub struct StatsOverview {
    pub dates: Vec<StatsDate>,
    pub matrix: StatsMatrix,
}

/// Result of `pbxdash cache clear`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheCleared {
    pub removed: usize,
    pub window: Option<Window>,
}

/// Render a call listing.
///
/// # Errors
/// Returns an error if JSON serialization fails.
pub fn render_calls(report: &CallsReport, format: OutputFormat, pretty: bool) -> Result<String> {
    match format {
        OutputFormat::Human => Ok(human::render_calls(report)),
        OutputFormat::Json => robot::render_json(
            &RobotOutput::new("calls", report).with_error(report.error.clone()),
            pretty,
        ),
    }
}

/// Render the trunk directory.
///
/// # Errors
/// Returns an error if JSON serialization fails.
pub fn render_trunks(trunks: &[Trunk], format: OutputFormat, pretty: bool) -> Result<String> {
    match format {
        OutputFormat::Human => Ok(human::render_trunks(trunks)),
        OutputFormat::Json => robot::render_json(&RobotOutput::new("trunks", trunks), pretty),
    }
}

/// Render one day's stats.
///
/// # Errors
/// Returns an error if JSON serialization fails.
pub fn render_day(day: &DayStats, format: OutputFormat, pretty: bool) -> Result<String> {
    match format {
        OutputFormat::Human => Ok(human::render_day(day)),
        OutputFormat::Json => robot::render_json(&RobotOutput::new("stats", day), pretty),
    }
}

/// Render the stats overview.
///
/// # Errors
/// Returns an error if JSON serialization fails.
pub fn render_overview(
    overview: &StatsOverview,
    format: OutputFormat,
    pretty: bool,
) -> Result<String> {
    match format {
        OutputFormat::Human => Ok(human::render_overview(&overview.dates, &overview.matrix)),
        OutputFormat::Json => robot::render_json(&RobotOutput::new("stats", overview), pretty),
    }
}

/// Render a cache clear.
///
/// # Errors
/// Returns an error if JSON serialization fails.
pub fn render_cache_cleared(
    cleared: CacheCleared,
    format: OutputFormat,
    pretty: bool,
) -> Result<String> {
    match format {
        OutputFormat::Human => Ok(human::render_cache_cleared(cleared.removed, cleared.window)),
        OutputFormat::Json => robot::render_json(&RobotOutput::new("cache", cleared), pretty),
    }
}
