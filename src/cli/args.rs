//! CLI argument definitions using clap.

use std::path::PathBuf;

use chrono::{DateTime, Local, NaiveDate};
use clap::{Args, Parser, Subcommand};

use crate::core::models::{CallQuery, Window};
use crate::error::{PbxError, Result};

/// PBX call dashboard - cached call history and per-number statistics.
#[derive(Parser, Debug)]
#[command(name = "pbxdash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    // === Global flags ===
    /// Emit JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Config file (overrides PBXDASH_CONFIG)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Upstream request timeout in seconds
    #[arg(long, value_name = "SECONDS", global = true)]
    pub timeout: Option<u64>,

    /// Log level
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Emit JSONL logs to stderr
    #[arg(long, global = true)]
    pub json_output: bool,

    /// Verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    /// Resolve the effective output format.
    #[must_use]
    pub const fn effective_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain-text tables.
    #[default]
    Human,
    /// JSON envelope.
    Json,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List outbound calls and per-number stats for a window
    Calls(CallsArgs),

    /// Fetch the trunk directory from upstream
    Trunks,

    /// Show stored daily statistics
    Stats(StatsArgs),

    /// Manage the fetched-window cache
    #[command(subcommand)]
    Cache(CacheCommand),
}

/// Arguments for the `calls` command.
#[derive(Args, Debug, Default)]
pub struct CallsArgs {
    /// Trailing window: 10m, 1h, 4h, 8h, or a number of seconds
    #[arg(long, value_name = "SPAN", conflicts_with_all = ["today", "yesterday", "day_before_yesterday", "date"])]
    pub last: Option<String>,

    /// Shift the trailing window back by this many seconds
    #[arg(long, value_name = "SECONDS", default_value_t = 0, requires = "last")]
    pub offset: i64,

    /// Since local midnight
    #[arg(long, conflicts_with_all = ["yesterday", "day_before_yesterday", "date"])]
    pub today: bool,

    /// The whole previous day
    #[arg(long, conflicts_with_all = ["day_before_yesterday", "date"])]
    pub yesterday: bool,

    /// The whole day before yesterday
    #[arg(long, conflicts_with = "date")]
    pub day_before_yesterday: bool,

    /// A whole calendar day (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub date: Option<String>,
}

impl CallsArgs {
    /// Turn the flags into a query. No flags means the last 10 minutes.
    ///
    /// # Errors
    /// Returns an error for an unknown span, a malformed or future date, or
    /// a day boundary that cannot be resolved.
    pub fn to_query(&self, now: DateTime<Local>) -> Result<CallQuery> {
        if self.today {
            return CallQuery::today(now);
        }
        if self.yesterday {
            return CallQuery::yesterday(now);
        }
        if self.day_before_yesterday {
            return CallQuery::day_before_yesterday(now);
        }
        if let Some(date) = &self.date {
            return CallQuery::for_date(parse_date(date)?, now.date_naive());
        }

        let seconds = self.last.as_deref().map_or(Ok(600), parse_span)?;
        if self.offset < 0 {
            return Err(PbxError::Config("--offset must not be negative".to_string()));
        }
        Ok(CallQuery::Rolling {
            seconds,
            offset_seconds: self.offset,
        })
    }
}

/// Arguments for the `stats` command.
#[derive(Args, Debug, Default)]
pub struct StatsArgs {
    /// Show one day in detail (YYYY-MM-DD); without it, the overview matrix
    #[arg(long, value_name = "DATE")]
    pub date: Option<String>,
}

/// Cache maintenance commands.
#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Forget fetched windows so they are fetched again. Records are kept.
    Clear(CacheClearArgs),
}

/// Arguments for `cache clear`.
#[derive(Args, Debug, Default)]
pub struct CacheClearArgs {
    /// Window start (epoch seconds); with --end, forget only this window
    #[arg(long, requires = "end")]
    pub start: Option<i64>,

    /// Window end (epoch seconds)
    #[arg(long, requires = "start")]
    pub end: Option<i64>,
}

impl CacheClearArgs {
    /// The single window to forget, if one was named.
    #[must_use]
    pub fn window(&self) -> Option<Window> {
        self.start.zip(self.end).map(|(start, end)| Window::new(start, end))
    }
}

/// Parse a trailing-window span.
///
/// # Errors
/// Returns [`PbxError::Config`] for anything other than a preset or a
/// positive number of seconds.
pub fn parse_span(span: &str) -> Result<i64> {
    let seconds = match span.trim().to_lowercase().as_str() {
        "10m" => 600,
        "1h" => 3600,
        "4h" => 14_400,
        "8h" => 28_800,
        other => other.parse::<i64>().map_err(|_| {
            PbxError::Config(format!(
                "Invalid span '{span}'. Use 10m, 1h, 4h, 8h, or a number of seconds"
            ))
        })?,
    };
    if seconds <= 0 {
        return Err(PbxError::Config("Span must be positive".to_string()));
    }
    Ok(seconds)
}

/// Parse a `YYYY-MM-DD` date.
///
/// # Errors
/// Returns [`PbxError::InvalidDate`] if the string is not a calendar date.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| PbxError::InvalidDate(format!("'{value}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn spans_accept_presets_and_seconds() {
        assert_eq!(parse_span("10m").unwrap(), 600);
        assert_eq!(parse_span("8H").unwrap(), 28_800);
        assert_eq!(parse_span("90").unwrap(), 90);
        assert!(parse_span("0").is_err());
        assert!(parse_span("soon").is_err());
    }

    #[test]
    fn default_query_is_last_ten_minutes() {
        let query = CallsArgs::default().to_query(now()).unwrap();
        assert_eq!(query, CallQuery::LAST_10_MINUTES);
    }

    #[test]
    fn date_flag_rejects_future_days() {
        let args = CallsArgs {
            date: Some("2024-03-11".to_string()),
            ..CallsArgs::default()
        };
        assert!(matches!(
            args.to_query(now()),
            Err(PbxError::InvalidDate(_))
        ));
    }

    #[test]
    fn conflicting_window_flags_are_rejected() {
        let result = Cli::try_parse_from(["pbxdash", "calls", "--last", "1h", "--today"]);
        assert!(result.is_err());
    }

    #[test]
    fn cache_clear_needs_both_bounds() {
        assert!(Cli::try_parse_from(["pbxdash", "cache", "clear", "--start", "1"]).is_err());
        let cli =
            Cli::try_parse_from(["pbxdash", "cache", "clear", "--start", "1", "--end", "2"])
                .unwrap();
        let Commands::Cache(CacheCommand::Clear(args)) = cli.command else {
            panic!("expected cache clear");
        };
        assert_eq!(args.window(), Some(Window::new(1, 2)));
    }
}
