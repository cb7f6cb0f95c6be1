//! Test utilities for pbxdash.
//!
//! Provides shared helpers, test data factories, and assertion macros
//! for use across all test modules.
//!
//! # Usage
//!
//! ```rust,ignore
//! use pbxdash::test_utils::*;
//!
//! let dir = TestDir::new();
//! let db = dir.database();
//! let record = make_outbound_record("c1", 1_704_189_600, "74951234567", 60);
//! ```

use serde_json::{Value, json};
use std::fs;
use std::io::{self, Write as IoWrite};
use std::path::{Path, PathBuf};

use crate::core::models::{CallRecord, CallerStat, Trunk};
use crate::core::stats::percentage;
use crate::storage::Database;

// =============================================================================
// Test Data Factories
// =============================================================================

/// Upstream search payload for one call.
///
/// The trunk number goes into `gateway`, which is what normalization
/// prefers for the originating number.
#[must_use]
pub fn make_call_payload(
    id: &str,
    start_stamp: i64,
    gateway: &str,
    billsec: i64,
    accountcode: &str,
) -> Value {
    json!({
        "id": id,
        "start_stamp": start_stamp,
        "end_stamp": start_stamp + billsec + 5,
        "gateway": gateway,
        "caller_id_number": "101",
        "caller_id_name": "Operator",
        "destination_number": "79990001122",
        "billsec": billsec,
        "duration": billsec + 5,
        "accountcode": accountcode,
    })
}

/// A normalized outbound record.
///
/// # Panics
///
/// Panics if the generated payload does not normalize, which would be a
/// bug in the factory itself.
#[must_use]
pub fn make_outbound_record(id: &str, start_stamp: i64, gateway: &str, billsec: i64) -> CallRecord {
    CallRecord::from_payload(make_call_payload(id, start_stamp, gateway, billsec, "outbound"))
        .expect("factory payload must normalize")
}

/// A per-number stat with the percentage computed the same way the
/// aggregator does.
#[must_use]
pub fn make_caller_stat(number: &str, description: &str, total: i64, long: i64) -> CallerStat {
    CallerStat {
        number: number.to_string(),
        description: description.to_string(),
        total_calls: total,
        calls_over_threshold: long,
        percentage_over_threshold: percentage(long, total),
    }
}

/// A trunk directory entry.
#[must_use]
pub fn make_trunk(number: &str, description: &str) -> Trunk {
    Trunk {
        number: number.to_string(),
        description: description.to_string(),
        payload: json!({ "number": number, "description": description }),
    }
}

/// Upstream auth response carrying a fresh key.
#[must_use]
pub fn make_auth_response(key_id: &str, key: &str) -> Value {
    json!({
        "status": "1",
        "data": { "key_id": key_id, "key": key },
    })
}

/// Upstream search response wrapping the given call payloads.
#[must_use]
pub fn make_search_response(calls: Vec<Value>) -> Value {
    json!({ "status": "1", "data": calls })
}

/// Upstream response that says the credential is no longer accepted.
#[must_use]
pub fn make_not_auth_response() -> Value {
    json!({ "status": "0", "isNotAuth": true, "comment": "key expired" })
}

/// Upstream trunk listing.
#[must_use]
pub fn make_trunks_response(trunks: &[(&str, &str)]) -> Value {
    let data: Vec<Value> = trunks
        .iter()
        .map(|(number, description)| json!({ "number": number, "description": description }))
        .collect();
    json!({ "status": "1", "data": data })
}

// =============================================================================
// Temp Directory Utilities
// =============================================================================

/// A temporary directory for tests with automatic cleanup.
///
/// Creates an isolated directory that is automatically deleted when
/// the `TestDir` is dropped. Uses the `tempfile` crate internally.
///
/// # Examples
///
/// ```rust,ignore
/// use pbxdash::test_utils::TestDir;
///
/// let dir = TestDir::new();
/// dir.create_file("config.toml", "[pbx]\ndomain = \"example.onpbx.ru\"");
/// assert!(dir.file_exists("config.toml"));
/// ```
pub struct TestDir {
    inner: tempfile::TempDir,
}

impl TestDir {
    /// Create a new isolated temporary directory.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: tempfile::tempdir().expect("Failed to create temp directory"),
        }
    }

    /// Get the path to the temporary directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Open (and migrate) `calls.sqlite` inside this directory.
    ///
    /// # Panics
    ///
    /// Panics if the database cannot be created.
    #[must_use]
    pub fn database(&self) -> Database {
        Database::open(&self.file_path("calls.sqlite")).expect("Failed to open test database")
    }

    /// Create a file in the temporary directory with the given content.
    ///
    /// Creates parent directories as needed.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be created or written.
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.inner.path().join(name);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }

        let mut file = fs::File::create(&path).expect("Failed to create test file");
        file.write_all(content.as_bytes())
            .expect("Failed to write test file");
    }

    /// Read a file from the temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn read_file(&self, name: &str) -> io::Result<String> {
        fs::read_to_string(self.inner.path().join(name))
    }

    /// Check if a file exists in the temporary directory.
    #[must_use]
    pub fn file_exists(&self, name: &str) -> bool {
        self.inner.path().join(name).exists()
    }

    /// Get the full path to a file in the temporary directory.
    #[must_use]
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.inner.path().join(name)
    }
}

impl Default for TestDir {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Assertion Macros
// =============================================================================

/// Assert that a string contains a substring.
///
/// # Examples
///
/// ```rust,ignore
/// use pbxdash::assert_contains;
///
/// assert_contains!("Calls 02.01.2024", "02.01");
/// ```
#[macro_export]
macro_rules! assert_contains {
    ($haystack:expr, $needle:expr) => {
        let haystack = $haystack;
        let needle = $needle;
        assert!(
            haystack.contains(needle),
            "Expected string to contain {:?}\n\nActual string:\n{:?}",
            needle,
            haystack
        );
    };
}

/// Assert that a string is valid JSON.
#[macro_export]
macro_rules! assert_json_valid {
    ($json:expr) => {
        let json = $json;
        if let Err(e) = serde_json::from_str::<serde_json::Value>(json) {
            panic!(
                "Expected valid JSON, but parsing failed: {}\n\nJSON string:\n{}",
                e, json
            );
        }
    };
}

/// Assert approximate floating point equality.
///
/// # Examples
///
/// ```rust,ignore
/// use pbxdash::assert_float_eq;
///
/// assert_float_eq!(33.3, 33.300000001);
/// assert_float_eq!(33.3, 33.35, 0.1); // Custom epsilon
/// ```
#[macro_export]
macro_rules! assert_float_eq {
    ($left:expr, $right:expr) => {
        $crate::assert_float_eq!($left, $right, f64::EPSILON * 100.0)
    };
    ($left:expr, $right:expr, $epsilon:expr) => {
        let left: f64 = $left;
        let right: f64 = $right;
        let epsilon: f64 = $epsilon;
        assert!(
            (left - right).abs() < epsilon,
            "Float equality assertion failed: {} != {} (epsilon: {})",
            left,
            right,
            epsilon
        );
    };
}

// =============================================================================
// Test Helpers
// =============================================================================

/// A config file pointing at a mock upstream.
#[must_use]
pub fn make_test_config_toml(api_base: &str) -> String {
    format!(
        r#"[general]
timeout_seconds = 5
trunks_max_age_secs = 3600

[pbx]
api_base = "{api_base}"
domain = "example.onpbx.ru"
auth_key = "test-auth-key"
"#
    )
}

// =============================================================================
// Tests for Test Utilities
// =============================================================================
