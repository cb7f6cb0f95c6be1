//! A mocked PBX API and a [`CallService`] wired against it.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pbxdash::core::credentials::CredentialStore;
use pbxdash::core::http::{AUTH_HEADER, build_client};
use pbxdash::core::pbx::{PbxClient, PbxEndpoints};
use pbxdash::core::service::CallService;
use pbxdash::test_utils::TestDir;

pub const DOMAIN: &str = "example.onpbx.ru";
pub const AUTH_KEY: &str = "test-auth-key";
pub const KEY_FILE: &str = "pbx_api_key.json";

pub fn auth_path() -> String {
    format!("/{DOMAIN}/auth.json")
}

pub fn search_path() -> String {
    format!("/{DOMAIN}/mongo_history/search.json")
}

pub fn trunks_path() -> String {
    format!("/{DOMAIN}/trunks/get.json")
}

/// Store a credential on disk so the first request skips the auth endpoint.
pub fn seed_credential(dir: &TestDir, credential: &str) {
    dir.create_file(
        KEY_FILE,
        &serde_json::json!({ "api_key": credential }).to_string(),
    );
}

/// Service against `server` with its database and key file in `dir`.
pub fn service(server: &MockServer, dir: &TestDir, auth_key: Option<&str>) -> CallService {
    service_with_timeout(server, dir, auth_key, Duration::from_secs(5))
}

pub fn service_with_timeout(
    server: &MockServer,
    dir: &TestDir,
    auth_key: Option<&str>,
    timeout: Duration,
) -> CallService {
    let endpoints = PbxEndpoints::new(&server.uri(), DOMAIN);
    let client = build_client(timeout).expect("client build");
    let credentials = Arc::new(CredentialStore::new(
        client.clone(),
        endpoints.auth.clone(),
        auth_key.map(str::to_string),
        dir.file_path(KEY_FILE),
        timeout,
    ));
    let pbx = PbxClient::new(client, endpoints, credentials, timeout);
    CallService::new(pbx, &dir.database(), 3600)
}

/// Respond to `path` with `body` for requests carrying `credential`.
pub async fn mount_with_credential(
    server: &MockServer,
    endpoint: String,
    credential: &str,
    body: Value,
) {
    Mock::given(method("POST"))
        .and(path(endpoint))
        .and(header(AUTH_HEADER, credential))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Auth endpoint issuing `key_id:key`.
pub async fn mount_auth(server: &MockServer, key_id: &str, key: &str) {
    Mock::given(method("POST"))
        .and(path(auth_path()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(pbxdash::test_utils::make_auth_response(key_id, key)),
        )
        .mount(server)
        .await;
}

/// Count received requests whose path is `endpoint`.
pub async fn hits(server: &MockServer, endpoint: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == endpoint)
        .count()
}
