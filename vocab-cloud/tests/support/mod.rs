//! Shared helpers for tests against a mocked open platform API.

#![allow(dead_code)]

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use vocab_cloud::{BitableConfig, VocabPipeline};
use vocab_storage::{KeyValueStore, MemoryStore};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const AUTH_PATH: &str = "/auth/v3/tenant_access_token/internal";
pub const RECORDS_PATH: &str = "/bitable/v1/apps/base123/tables/tbl456/records";
pub const TOKEN: &str = "t-test-token";

/// Request timeout used by tests; [`SLOW`] responses exceed it.
pub const TIMEOUT_MS: u64 = 300;
pub const SLOW: Duration = Duration::from_secs(3);

/// Config pointing at `base_url`, with no retries and a short timeout.
pub fn test_config(base_url: &str) -> BitableConfig {
    BitableConfig {
        api_base_url: base_url.to_string(),
        app_id: "cli_test".into(),
        app_secret: "secret".into(),
        base_id: "base123".into(),
        table_id: "tbl456".into(),
        request_timeout_ms: TIMEOUT_MS,
        submit_max_attempts: 1,
        retry_base_delay_ms: 10,
        ..BitableConfig::default()
    }
}

/// A base URL nothing listens on: connections are refused.
pub fn unreachable_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

pub fn memory_store() -> Arc<dyn KeyValueStore> {
    Arc::new(MemoryStore::new())
}

pub fn pipeline(config: BitableConfig, store: Arc<dyn KeyValueStore>) -> VocabPipeline {
    VocabPipeline::new(config, store).unwrap()
}

pub fn token_response(token: &str, expire: i64) -> serde_json::Value {
    json!({
        "code": 0,
        "msg": "ok",
        "tenant_access_token": token,
        "expire": expire
    })
}

pub fn created_response(record_id: &str) -> serde_json::Value {
    json!({
        "code": 0,
        "msg": "success",
        "data": { "record": { "id": record_id, "record_id": record_id, "fields": {} } }
    })
}

pub fn error_response(code: i64, msg: &str) -> serde_json::Value {
    json!({ "code": code, "msg": msg })
}

/// Mounts a token endpoint that always grants [`TOKEN`] for two hours.
pub async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response(TOKEN, 7200)))
        .mount(server)
        .await;
}

/// Mounts a record endpoint answering `response` for posts of `word`.
pub async fn mount_record_for_word(server: &MockServer, word: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path(RECORDS_PATH))
        .and(body_partial_json(json!({ "fields": { "生词或书目": word } })))
        .respond_with(response)
        .mount(server)
        .await;
}
