//! Configuration file loading and resolution.
//!
//! Loads configuration from:
//! - Linux: `~/.config/pbxdash/config.toml`
//! - macOS: `~/Library/Application Support/ru.onlinepbx.pbxdash/config.toml`
//! - Windows: `%APPDATA%/onlinepbx/pbxdash/config/config.toml`
//!
//! ## Precedence
//!
//! Settings are resolved with the following precedence (highest first):
//! 1. CLI flags
//! 2. Environment variables
//! 3. Config file
//! 4. Built-in defaults
//!
//! ## Environment Variables
//!
//! - `PBXDASH_CONFIG`: Override config file path
//! - `PBXDASH_API_BASE`: PBX API base URL
//! - `PBXDASH_DOMAIN`: PBX domain (account) name
//! - `PBXDASH_AUTH_KEY`: Long-lived auth key used to obtain credentials
//! - `PBXDASH_DB_FILE`: Database file
//! - `PBXDASH_KEY_FILE`: Persisted credential file
//! - `PBXDASH_TIMEOUT`: Upstream request timeout in seconds

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::cli::args::Cli;
use crate::error::{PbxError, Result};

// =============================================================================
// Environment Variable Names
// =============================================================================

/// Environment variable to override config file path.
pub const ENV_CONFIG: &str = "PBXDASH_CONFIG";
/// Environment variable for the API base URL.
pub const ENV_API_BASE: &str = "PBXDASH_API_BASE";
/// Environment variable for the PBX domain.
pub const ENV_DOMAIN: &str = "PBXDASH_DOMAIN";
/// Environment variable for the auth key.
pub const ENV_AUTH_KEY: &str = "PBXDASH_AUTH_KEY";
/// Environment variable for the database file.
pub const ENV_DB_FILE: &str = "PBXDASH_DB_FILE";
/// Environment variable for the credential file.
pub const ENV_KEY_FILE: &str = "PBXDASH_KEY_FILE";
/// Environment variable for timeout in seconds.
pub const ENV_TIMEOUT: &str = "PBXDASH_TIMEOUT";

/// Default PBX API base URL.
pub const DEFAULT_API_BASE: &str = "https://api2.onlinepbx.ru";
/// Default upstream timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Default trunk directory freshness window.
pub const DEFAULT_TRUNKS_MAX_AGE_SECS: i64 = 3600;

// =============================================================================
// Resolved Configuration
// =============================================================================

/// Fully resolved configuration after merging CLI, env vars, and config file.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// PBX API base URL, without trailing slash.
    pub api_base: String,
    /// PBX domain; required for anything that talks upstream.
    pub domain: Option<String>,
    /// Auth key exchanged for credentials; required for renewal.
    pub auth_key: Option<String>,
    /// Database file.
    pub db_file: PathBuf,
    /// Persisted credential file.
    pub key_file: PathBuf,
    /// Upstream request timeout.
    pub timeout: Duration,
    /// How long a trunk directory refresh stays fresh.
    pub trunks_max_age_secs: i64,
    /// Log level from the config file, if any.
    pub log_level: Option<String>,
    /// Source of each setting for debugging.
    pub sources: ConfigSources,
}

/// Tracks the source of each configuration value.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub api_base: ConfigSource,
    pub domain: ConfigSource,
    pub auth_key: ConfigSource,
    pub db_file: ConfigSource,
    pub key_file: ConfigSource,
    pub timeout: ConfigSource,
}

/// Where a configuration value came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Value from CLI flag.
    Cli,
    /// Value from environment variable.
    Env,
    /// Value from config file.
    ConfigFile,
    /// Built-in default.
    #[default]
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI flag"),
            Self::Env => write!(f, "environment variable"),
            Self::ConfigFile => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

impl ResolvedConfig {
    /// Resolve final configuration from CLI args, environment variables, and config file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config file exists but is invalid
    /// - Any resolved value is out of range
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let config = Self::load_config(cli.config.as_deref())?;
        config.validate()?;
        Self::from_config(cli, config, &AppPaths::new())
    }

    /// Resolve against an already loaded config file.
    ///
    /// # Errors
    /// Returns an error if an override from the environment is invalid.
    pub fn from_config(cli: &Cli, config: Config, paths: &AppPaths) -> Result<Self> {
        let mut sources = ConfigSources::default();

        let api_base = Self::resolve_string(
            ENV_API_BASE,
            config.pbx.api_base,
            &mut sources.api_base,
        )
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
        .trim_end_matches('/')
        .to_string();
        let domain = Self::resolve_string(ENV_DOMAIN, config.pbx.domain, &mut sources.domain);
        let auth_key =
            Self::resolve_string(ENV_AUTH_KEY, config.pbx.auth_key, &mut sources.auth_key);

        let db_file = Self::resolve_string(
            ENV_DB_FILE,
            config.storage.db_file.map(|p| p.to_string_lossy().into_owned()),
            &mut sources.db_file,
        )
        .map_or_else(|| paths.db_file(), PathBuf::from);
        let key_file = Self::resolve_string(
            ENV_KEY_FILE,
            config.storage.key_file.map(|p| p.to_string_lossy().into_owned()),
            &mut sources.key_file,
        )
        .map_or_else(|| paths.key_file(), PathBuf::from);

        let timeout = Self::resolve_timeout(cli, &config.general, &mut sources.timeout)?;

        Ok(Self {
            api_base,
            domain,
            auth_key,
            db_file,
            key_file,
            timeout,
            trunks_max_age_secs: config.general.trunks_max_age_secs,
            log_level: config.general.log_level,
            sources,
        })
    }

    /// Load config file, respecting `--config` then `PBXDASH_CONFIG`.
    fn load_config(cli_path: Option<&Path>) -> Result<Config> {
        if let Some(path) = cli_path {
            return Config::load_from(path);
        }
        if let Ok(path) = std::env::var(ENV_CONFIG) {
            Config::load_from(Path::new(&path))
        } else {
            Config::load()
        }
    }

    /// Env var, then config file value. Empty strings count as unset.
    fn resolve_string(
        env: &str,
        file_value: Option<String>,
        source: &mut ConfigSource,
    ) -> Option<String> {
        if let Some(value) = std::env::var(env).ok().filter(|v| !v.trim().is_empty()) {
            *source = ConfigSource::Env;
            return Some(value.trim().to_string());
        }

        if let Some(value) = file_value.filter(|v| !v.trim().is_empty()) {
            *source = ConfigSource::ConfigFile;
            return Some(value);
        }

        *source = ConfigSource::Default;
        None
    }

    /// Resolve timeout setting.
    fn resolve_timeout(
        cli: &Cli,
        general: &GeneralConfig,
        source: &mut ConfigSource,
    ) -> Result<Duration> {
        // 1. CLI --timeout flag
        if let Some(timeout) = cli.timeout {
            *source = ConfigSource::Cli;
            return validate_timeout(timeout).map(Duration::from_secs);
        }

        // 2. Environment variable
        if let Ok(timeout_env) = std::env::var(ENV_TIMEOUT) {
            let timeout = timeout_env.trim().parse::<u64>().map_err(|_| {
                PbxError::Config(format!("{ENV_TIMEOUT} must be a number, got '{timeout_env}'"))
            })?;
            *source = ConfigSource::Env;
            return validate_timeout(timeout).map(Duration::from_secs);
        }

        // 3. Config file (validated on load)
        *source = if general.timeout_seconds == DEFAULT_TIMEOUT_SECS {
            ConfigSource::Default
        } else {
            ConfigSource::ConfigFile
        };
        Ok(Duration::from_secs(general.timeout_seconds))
    }

    /// Domain, or a configuration error naming how to set it.
    ///
    /// # Errors
    /// Returns [`PbxError::Config`] if no domain is configured.
    pub fn require_domain(&self) -> Result<&str> {
        self.domain.as_deref().ok_or_else(|| {
            PbxError::Config(format!(
                "PBX domain is not configured. Set {ENV_DOMAIN} or [pbx] domain in config.toml"
            ))
        })
    }
}

fn validate_timeout(seconds: u64) -> Result<u64> {
    if seconds == 0 || seconds > 300 {
        return Err(PbxError::Config(
            "Timeout must be between 1 and 300 seconds".to_string(),
        ));
    }
    Ok(seconds)
}

// =============================================================================
// Config File
// =============================================================================

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings.
    pub general: GeneralConfig,
    /// Upstream PBX account.
    pub pbx: PbxConfig,
    /// Local storage locations.
    pub storage: StorageConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Timeout for upstream requests in seconds.
    pub timeout_seconds: u64,
    /// Trunk directory freshness window in seconds.
    pub trunks_max_age_secs: i64,
    /// Default log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
}

/// Upstream PBX account settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PbxConfig {
    /// API base URL.
    pub api_base: Option<String>,
    /// Domain (account) name.
    pub domain: Option<String>,
    /// Auth key exchanged for short-lived credentials.
    pub auth_key: Option<String>,
}

/// Local storage locations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file.
    pub db_file: Option<PathBuf>,
    /// Persisted credential file.
    pub key_file: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            trunks_max_age_secs: DEFAULT_TRUNKS_MAX_AGE_SECS,
            log_level: None,
        }
    }
}

impl Config {
    /// Load configuration from the default config file path.
    ///
    /// Returns default config if the file doesn't exist.
    ///
    /// # Errors
    /// Returns an error only if the file exists but is invalid.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().config_file())
    }

    /// Load configuration from a specific path.
    ///
    /// Returns default config if the file doesn't exist.
    ///
    /// # Errors
    /// Returns an error only if the file exists but is invalid.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(?path, "Config file not found, using defaults");
            return Ok(Self::default());
        }

        tracing::debug!(?path, "Loading config file");
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| PbxError::Config(format!("Invalid config file: {e}")))?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns an error if the timeout is outside 1-300 seconds or the trunk
    /// freshness window is not positive.
    pub fn validate(&self) -> Result<()> {
        validate_timeout(self.general.timeout_seconds)?;

        if self.general.trunks_max_age_secs <= 0 {
            return Err(PbxError::Config(
                "trunks_max_age_secs must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ALL_ENV: &[&str] = &[
        ENV_CONFIG,
        ENV_API_BASE,
        ENV_DOMAIN,
        ENV_AUTH_KEY,
        ENV_DB_FILE,
        ENV_KEY_FILE,
        ENV_TIMEOUT,
    ];

    #[allow(unsafe_code)]
    fn set_env(key: &str, value: &str) {
        // SAFETY: env mutation is serialized by ENV_LOCK
        unsafe { std::env::set_var(key, value) };
    }

    #[allow(unsafe_code)]
    fn clear_env() {
        for key in ALL_ENV {
            // SAFETY: env mutation is serialized by ENV_LOCK
            unsafe { std::env::remove_var(key) };
        }
    }

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["pbxdash"];
        argv.extend_from_slice(args);
        argv.push("trunks");
        Cli::parse_from(argv)
    }

    fn paths() -> AppPaths {
        AppPaths {
            config: PathBuf::from("/cfg"),
            data: PathBuf::from("/data"),
        }
    }

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.general.timeout_seconds, 10);
        assert_eq!(config.general.trunks_max_age_secs, 3600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_missing_file_returns_default() {
        let config = Config::load_from(Path::new("/nonexistent/path/config.toml")).unwrap();
        assert!(config.pbx.domain.is_none());
    }

    #[test]
    fn load_valid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[general]
timeout_seconds = 20

[pbx]
domain = "example.onpbx.ru"
auth_key = "secret"

[storage]
db_file = "/tmp/calls.sqlite"
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.general.timeout_seconds, 20);
        assert_eq!(config.pbx.domain.as_deref(), Some("example.onpbx.ru"));
        assert_eq!(
            config.storage.db_file.as_deref(),
            Some(Path::new("/tmp/calls.sqlite"))
        );
    }

    #[test]
    fn load_invalid_toml_returns_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "this is not valid toml {{{{").unwrap();
        assert!(matches!(
            Config::load_from(file.path()),
            Err(PbxError::Config(_))
        ));
    }

    #[test]
    fn validate_rejects_out_of_range_timeout() {
        let mut config = Config::default();
        config.general.timeout_seconds = 0;
        assert!(config.validate().is_err());
        config.general.timeout_seconds = 500;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("Timeout must be between"));
    }

    #[test]
    fn defaults_fill_paths_and_base() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        let resolved = ResolvedConfig::from_config(&cli(&[]), Config::default(), &paths()).unwrap();
        assert_eq!(resolved.api_base, DEFAULT_API_BASE);
        assert_eq!(resolved.db_file, PathBuf::from("/data/calls_history.sqlite"));
        assert_eq!(resolved.key_file, PathBuf::from("/data/pbx_api_key.json"));
        assert_eq!(resolved.timeout, Duration::from_secs(10));
        assert_eq!(resolved.sources.domain, ConfigSource::Default);
        assert!(resolved.require_domain().is_err());
    }

    #[test]
    fn env_overrides_file() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        set_env(ENV_DOMAIN, "from-env.onpbx.ru");

        let mut config = Config::default();
        config.pbx.domain = Some("from-file.onpbx.ru".to_string());
        config.pbx.api_base = Some("http://localhost:9000/".to_string());

        let resolved = ResolvedConfig::from_config(&cli(&[]), config, &paths()).unwrap();
        clear_env();

        assert_eq!(resolved.require_domain().unwrap(), "from-env.onpbx.ru");
        assert_eq!(resolved.sources.domain, ConfigSource::Env);
        assert_eq!(resolved.api_base, "http://localhost:9000");
        assert_eq!(resolved.sources.api_base, ConfigSource::ConfigFile);
    }

    #[test]
    fn cli_timeout_beats_env() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        set_env(ENV_TIMEOUT, "30");

        let from_env =
            ResolvedConfig::from_config(&cli(&[]), Config::default(), &paths()).unwrap();
        let from_cli =
            ResolvedConfig::from_config(&cli(&["--timeout", "5"]), Config::default(), &paths())
                .unwrap();
        clear_env();

        assert_eq!(from_env.timeout, Duration::from_secs(30));
        assert_eq!(from_env.sources.timeout, ConfigSource::Env);
        assert_eq!(from_cli.timeout, Duration::from_secs(5));
        assert_eq!(from_cli.sources.timeout, ConfigSource::Cli);
    }

    #[test]
    fn garbage_env_timeout_is_a_config_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        set_env(ENV_TIMEOUT, "soon");

        let result = ResolvedConfig::from_config(&cli(&[]), Config::default(), &paths());
        clear_env();

        assert!(matches!(result, Err(PbxError::Config(_))));
    }

    #[test]
    fn config_source_display() {
        assert_eq!(ConfigSource::Cli.to_string(), "CLI flag");
        assert_eq!(ConfigSource::Env.to_string(), "environment variable");
        assert_eq!(ConfigSource::ConfigFile.to_string(), "config file");
        assert_eq!(ConfigSource::Default.to_string(), "default");
    }
}
