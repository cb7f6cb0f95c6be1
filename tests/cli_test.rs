//! E2E tests for the pbxdash binary.
//!
//! Covers:
//! - Help output
//! - Exit codes for bad arguments and missing configuration
//! - Stats and cache commands against an isolated database
//! - A full `calls` run against a mocked upstream, followed by `stats`

mod common;

use assert_cmd::Command;
use predicates::prelude::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pbxdash::test_utils::{
    TestDir, make_call_payload, make_search_response, make_test_config_toml,
    make_trunks_response,
};
use pbxdash::util::start_of_day;

use common::logger::TestLogger;
use common::upstream::{search_path, seed_credential, trunks_path};

const PBXDASH_VARS: &[&str] = &[
    "PBXDASH_API_BASE",
    "PBXDASH_DOMAIN",
    "PBXDASH_AUTH_KEY",
    "PBXDASH_TIMEOUT",
    "PBXDASH_LOG",
    "PBXDASH_LOG_FORMAT",
    "PBXDASH_LOG_FILE",
    "RUST_LOG",
];

/// The binary with every setting pointed into `dir`.
fn pbxdash(dir: &TestDir) -> Command {
    let mut cmd = Command::cargo_bin("pbxdash").expect("binary built");
    for var in PBXDASH_VARS {
        cmd.env_remove(var);
    }
    cmd.env("PBXDASH_CONFIG", dir.file_path("config.toml"))
        .env("PBXDASH_DB_FILE", dir.file_path("calls.sqlite"))
        .env("PBXDASH_KEY_FILE", dir.file_path("pbx_api_key.json"));
    cmd
}

#[test]
fn help_lists_commands() {
    let log = TestLogger::new("help_lists_commands");
    let dir = TestDir::new();

    pbxdash(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("calls"))
        .stdout(predicate::str::contains("trunks"))
        .stdout(predicate::str::contains("stats"))
        .stdout(predicate::str::contains("cache"));
    log.finish_ok();
}

#[test]
fn stats_on_empty_database_succeeds() {
    let log = TestLogger::new("stats_on_empty_database_succeeds");
    let dir = TestDir::new();

    let output = pbxdash(&dir)
        .args(["stats", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(value["schema_version"], "pbxdash.v1");
    assert_eq!(value["command"], "stats");
    assert_eq!(value["data"]["dates"], serde_json::json!([]));
    assert_eq!(value["errors"], serde_json::json!([]));
    log.finish_ok();
}

#[test]
fn malformed_date_exits_with_parse_error() {
    let log = TestLogger::new("malformed_date_exits_with_parse_error");
    let dir = TestDir::new();

    pbxdash(&dir)
        .args(["stats", "--date", "2024-13-01"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("PBX-C002"));
    log.finish_ok();
}

#[test]
fn calls_without_domain_is_a_config_error() {
    let log = TestLogger::new("calls_without_domain_is_a_config_error");
    let dir = TestDir::new();

    pbxdash(&dir)
        .args(["calls", "--json"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("PBX-C001"));
    log.finish_ok();
}

#[test]
fn invalid_config_file_is_reported() {
    let log = TestLogger::new("invalid_config_file_is_reported");
    let dir = TestDir::new();
    dir.create_file("config.toml", "[general]\ntimeout_seconds = 0\n");

    pbxdash(&dir)
        .arg("stats")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Timeout must be between"));
    log.finish_ok();
}

#[test]
fn conflicting_window_flags_are_rejected() {
    let dir = TestDir::new();

    pbxdash(&dir)
        .args(["calls", "--last", "1h", "--yesterday"])
        .assert()
        .failure();
}

#[test]
fn json_logs_go_to_the_log_file() {
    let log = TestLogger::new("json_logs_go_to_the_log_file");
    let dir = TestDir::new();

    pbxdash(&dir)
        .args(["stats", "--json-output", "--log-level", "debug"])
        .env("PBXDASH_LOG_FILE", dir.file_path("pbxdash.log"))
        .assert()
        .success();

    let logs = dir.read_file("pbxdash.log").unwrap();
    let first = logs.lines().next().expect("at least one log line");
    let entry: serde_json::Value = serde_json::from_str(first).unwrap();
    assert_eq!(entry["level"], "DEBUG");
    assert!(logs.contains("resolved configuration"));
    log.finish_ok();
}

#[test]
fn cache_clear_reports_removed_windows() {
    let log = TestLogger::new("cache_clear_reports_removed_windows");
    let dir = TestDir::new();

    pbxdash(&dir)
        .args(["cache", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Forgot 0 cached window(s)."));
    log.finish_ok();
}

#[tokio::test(flavor = "multi_thread")]
async fn calls_for_a_day_then_stats_for_that_day() {
    let log = TestLogger::new("calls_for_a_day_then_stats_for_that_day");
    log.phase("setup");

    let server = MockServer::start().await;
    let dir = TestDir::new();
    dir.create_file("config.toml", &make_test_config_toml(&server.uri()));
    seed_credential(&dir, "1:seeded");

    let day = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let base = start_of_day(day).unwrap() + 10 * 3600;
    Mock::given(method("POST"))
        .and(path(trunks_path()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(make_trunks_response(&[("74951234567", "Sales")])),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(search_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(make_search_response(vec![
            make_call_payload("c1", base, "74951234567", 60, "outbound"),
            make_call_payload("c2", base + 60, "74951234567", 20, "outbound"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    log.phase("execute");
    let calls = pbxdash(&dir)
        .args(["calls", "--date", "2024-01-02", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stats = pbxdash(&dir)
        .args(["stats", "--date", "2024-01-02", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    log.phase("verify");
    let calls: serde_json::Value = serde_json::from_slice(&calls).unwrap();
    assert_eq!(calls["data"]["source"], "upstream");
    assert_eq!(calls["data"]["records"].as_array().unwrap().len(), 2);
    assert_eq!(calls["data"]["records"][0]["description"], "Sales");
    assert_eq!(calls["data"]["caller_stats"][0]["percentage_over_threshold"], 50.0);

    let stats: serde_json::Value = serde_json::from_slice(&stats).unwrap();
    assert_eq!(stats["data"]["stats"][0]["number"], "74951234567");
    assert_eq!(stats["data"]["total_calls"], 2);
    log.finish_ok();
}
