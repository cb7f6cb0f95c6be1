//! Log subscriber setup.
//!
//! [`LogSettings::resolve`] picks the level from `--log-level`, then
//! `PBXDASH_LOG`, then the config file's `log_level`, then the default
//! (`error`, or `debug` under `--verbose`). `RUST_LOG` still wins inside the
//! filter when set. The format comes from `--json-output` or
//! `PBXDASH_LOG_FORMAT`, the sink from `PBXDASH_LOG_FILE`.

use std::fs::{File, OpenOptions};
use std::path::PathBuf;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::cli::Cli;
use crate::storage::ResolvedConfig;

const LOG_LEVEL_ENV: &str = "PBXDASH_LOG";
const LOG_FORMAT_ENV: &str = "PBXDASH_LOG_FORMAT";
const LOG_FILE_ENV: &str = "PBXDASH_LOG_FILE";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Human,
    /// One JSON object per event.
    Json,
    Compact,
}

impl LogFormat {
    #[must_use]
    pub fn from_arg(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "human" => Some(Self::Human),
            "json" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

/// Verbosity accepted on the command line, in the environment and in config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    #[default]
    Error,
}

impl LogLevel {
    /// `verbose` is an alias for `debug` and `critical` for `error`.
    #[must_use]
    pub fn from_arg(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "verbose" | "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" | "critical" => Some(Self::Error),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_filter(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Where log events go and how they look, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Append-mode file sink; stderr when `None`.
    pub file: Option<PathBuf>,
}

impl LogSettings {
    /// Resolve settings from flags, the process environment and config.
    ///
    /// `config` is `None` when the config file failed to load; that error is
    /// reported after logging is up.
    #[must_use]
    pub fn resolve(cli: &Cli, config: Option<&ResolvedConfig>) -> Self {
        Self::resolve_with(cli, config, |key| std::env::var(key).ok())
    }

    /// [`Self::resolve`] with an explicit environment lookup.
    #[must_use]
    pub fn resolve_with(
        cli: &Cli,
        config: Option<&ResolvedConfig>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let env = |key: &str| env(key).filter(|value| !value.trim().is_empty());

        let default_level = if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Error
        };
        let level = cli
            .log_level
            .as_deref()
            .and_then(LogLevel::from_arg)
            .or_else(|| env(LOG_LEVEL_ENV).as_deref().and_then(LogLevel::from_arg))
            .or_else(|| {
                config
                    .and_then(|c| c.log_level.as_deref())
                    .and_then(LogLevel::from_arg)
            })
            .unwrap_or(default_level);

        let format = if cli.json_output {
            LogFormat::Json
        } else {
            env(LOG_FORMAT_ENV)
                .as_deref()
                .and_then(LogFormat::from_arg)
                .unwrap_or_default()
        };

        let file = env(LOG_FILE_ENV).map(|path| PathBuf::from(path.trim()));

        Self {
            level,
            format,
            file,
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("pbxdash={}", self.level.as_filter())))
    }

    /// A log file that cannot be opened falls back to stderr.
    fn writer(&self) -> BoxMakeWriter {
        let file: Option<File> = self.file.as_ref().and_then(|path| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });
        match file {
            Some(file) => BoxMakeWriter::new(file),
            None => BoxMakeWriter::new(std::io::stderr),
        }
    }
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init(settings: &LogSettings) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(settings.filter())
        .with_writer(settings.writer());

    let installed = match settings.format {
        LogFormat::Json => builder
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .try_init(),
        LogFormat::Compact => builder.compact().with_target(true).try_init(),
        LogFormat::Human => builder.with_target(false).without_time().try_init(),
    };
    if installed.is_err() {
        tracing::debug!("log subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{AppPaths, Config};
    use clap::Parser;
    use std::collections::HashMap;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("pbxdash").chain(args.iter().copied()))
    }

    fn config_with_level(level: &str) -> ResolvedConfig {
        let mut config = Config::default();
        config.general.log_level = Some(level.to_string());
        ResolvedConfig::from_config(&cli(&["stats"]), config, &AppPaths::new()).unwrap()
    }

    fn resolve(cli: &Cli, config: Option<&ResolvedConfig>, env: &[(&str, &str)]) -> LogSettings {
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        LogSettings::resolve_with(cli, config, |key| env.get(key).cloned())
    }

    #[test]
    fn flag_beats_env_beats_config() {
        let config = config_with_level("info");
        let env = [(LOG_LEVEL_ENV, "warn")];

        let settings = resolve(&cli(&["--log-level", "trace", "stats"]), Some(&config), &env);
        assert_eq!(settings.level, LogLevel::Trace);

        let settings = resolve(&cli(&["stats"]), Some(&config), &env);
        assert_eq!(settings.level, LogLevel::Warn);

        let settings = resolve(&cli(&["stats"]), Some(&config), &[]);
        assert_eq!(settings.level, LogLevel::Info);
    }

    #[test]
    fn verbose_only_changes_the_default() {
        let settings = resolve(&cli(&["-v", "stats"]), None, &[]);
        assert_eq!(settings.level, LogLevel::Debug);

        let config = config_with_level("warn");
        let settings = resolve(&cli(&["-v", "stats"]), Some(&config), &[]);
        assert_eq!(settings.level, LogLevel::Warn);

        let settings = resolve(&cli(&["stats"]), None, &[]);
        assert_eq!(settings.level, LogLevel::Error);
    }

    #[test]
    fn blank_and_unknown_values_fall_through() {
        let env = [(LOG_LEVEL_ENV, "  "), (LOG_FORMAT_ENV, "fancy"), (LOG_FILE_ENV, "")];
        let settings = resolve(&cli(&["stats"]), None, &env);
        assert_eq!(
            settings,
            LogSettings {
                level: LogLevel::Error,
                format: LogFormat::Human,
                file: None,
            }
        );
    }

    #[test]
    fn json_flag_overrides_env_format() {
        let env = [
            (LOG_FORMAT_ENV, "compact"),
            (LOG_FILE_ENV, "/tmp/pbxdash.log"),
        ];
        let settings = resolve(&cli(&["--json-output", "stats"]), None, &env);
        assert_eq!(settings.format, LogFormat::Json);
        assert_eq!(settings.file, Some(PathBuf::from("/tmp/pbxdash.log")));

        let settings = resolve(&cli(&["stats"]), None, &env);
        assert_eq!(settings.format, LogFormat::Compact);
    }

    #[test]
    fn level_aliases() {
        assert_eq!(LogLevel::from_arg("critical"), Some(LogLevel::Error));
        assert_eq!(LogLevel::from_arg("VERBOSE"), Some(LogLevel::Debug));
        assert!(LogLevel::from_arg("loud").is_none());
    }
}
