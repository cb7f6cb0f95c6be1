//! Local persistence: database, caches, configuration and paths.

pub mod calls;
pub mod config;
pub mod daily_stats;
pub mod db;
pub mod paths;
pub mod period_cache;
pub mod trunks;

pub use calls::RecordStore;
pub use config::{
    Config, ConfigSource, ConfigSources, ResolvedConfig, DEFAULT_API_BASE, ENV_API_BASE,
    ENV_AUTH_KEY, ENV_CONFIG, ENV_DB_FILE, ENV_DOMAIN, ENV_KEY_FILE, ENV_TIMEOUT,
};
pub use daily_stats::{DailyAggregateStore, WriteThroughSummary};
pub use db::{Database, run_migrations};
pub use paths::AppPaths;
pub use period_cache::{PeriodCache, interval_hash};
pub use trunks::TrunkStore;
