//! Core data models, upstream access, and call orchestration.

pub mod credentials;
pub mod fetch_plan;
pub mod http;
pub mod logging;
pub mod models;
pub mod pbx;
pub mod service;
pub mod stats;

pub use credentials::{Credential, CredentialStore};
pub use fetch_plan::{AttemptOutcome, FetchAttempt, FetchOutcome, MAX_ATTEMPTS, run_with_auth_retry};
pub use models::{
    CallQuery, CallRecord, CallerStat, CallsReport, DataSource, DayCell, DayStats, MatrixRow,
    ReportError, StatsDate, StatsMatrix, Trunk, Window,
};
pub use pbx::{PbxClient, PbxEndpoints};
pub use service::CallService;
pub use stats::compute_from_records;
