mod support;

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use support::*;
use vocab_cloud::{CloudError, keys};
use vocab_storage::{KeyValueStore, KeyValueStoreExt};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn seed_token(store: &Arc<dyn KeyValueStore>, token: &str, expires_at_ms: i64) {
    store.set_as(keys::FEISHU_TOKEN, token).await.unwrap();
    store.set_as(keys::TOKEN_EXPIRY, &expires_at_ms).await.unwrap();
}

fn in_secs(secs: i64) -> i64 {
    Utc::now().timestamp_millis() + secs * 1000
}

#[tokio::test]
async fn fetches_and_persists_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response(TOKEN, 7200)))
        .expect(1)
        .mount(&server)
        .await;

    let store = memory_store();
    let p = pipeline(test_config(&server.uri()), Arc::clone(&store));
    let before = Utc::now().timestamp_millis();
    let credential = p.credentials.get_token().await.unwrap();

    assert_eq!(credential.token, TOKEN);
    // Lifetime is shortened by the safety margin.
    let expected = before + (7200 - 60) * 1000;
    assert!(credential.expires_at_ms >= expected);
    assert!(credential.expires_at_ms < expected + 5_000);

    let stored: Option<String> = store.get_as(keys::FEISHU_TOKEN).await.unwrap();
    assert_eq!(stored.as_deref(), Some(TOKEN));
    let expiry: Option<i64> = store.get_as(keys::TOKEN_EXPIRY).await.unwrap();
    assert_eq!(expiry, Some(credential.expires_at_ms));
    let legacy: Option<i64> = store.get_as(keys::LEGACY_TOKEN_EXPIRY).await.unwrap();
    assert_eq!(legacy, Some(credential.expires_at_ms));
}

#[tokio::test]
async fn sends_app_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .and(wiremock::matchers::body_json(serde_json::json!({
            "app_id": "cli_test",
            "app_secret": "secret"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response(TOKEN, 7200)))
        .expect(1)
        .mount(&server)
        .await;

    let p = pipeline(test_config(&server.uri()), memory_store());
    p.credentials.get_token().await.unwrap();
}

#[tokio::test]
async fn cached_token_is_reused() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response(TOKEN, 7200)))
        .expect(1)
        .mount(&server)
        .await;

    let p = pipeline(test_config(&server.uri()), memory_store());
    let first = p.credentials.get_token().await.unwrap();
    let second = p.credentials.get_token().await.unwrap();
    assert_eq!(first, second);
    assert!(p.credentials.has_valid_credential().await);
}

#[tokio::test]
async fn persisted_token_skips_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response(TOKEN, 7200)))
        .expect(0)
        .mount(&server)
        .await;

    let store = memory_store();
    seed_token(&store, "t-from-last-run", in_secs(3600)).await;

    let p = pipeline(test_config(&server.uri()), store);
    assert_eq!(p.credentials.get_token().await.unwrap().token, "t-from-last-run");
}

#[tokio::test]
async fn legacy_expiry_key_is_honoured() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response(TOKEN, 7200)))
        .expect(0)
        .mount(&server)
        .await;

    let store = memory_store();
    store.set_as(keys::FEISHU_TOKEN, "t-widget").await.unwrap();
    store
        .set_as(keys::LEGACY_TOKEN_EXPIRY, &in_secs(3600))
        .await
        .unwrap();

    let p = pipeline(test_config(&server.uri()), store);
    assert_eq!(p.credentials.get_token().await.unwrap().token, "t-widget");
}

#[tokio::test]
async fn token_inside_refresh_margin_is_replaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response(TOKEN, 7200)))
        .expect(1)
        .mount(&server)
        .await;

    let store = memory_store();
    // Still valid, but within the five minute margin.
    seed_token(&store, "t-old", in_secs(120)).await;

    let p = pipeline(test_config(&server.uri()), store);
    assert_eq!(p.credentials.get_token().await.unwrap().token, TOKEN);
}

#[tokio::test]
async fn expired_token_is_replaced() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    let store = memory_store();
    seed_token(&store, "t-old", in_secs(-10)).await;

    let p = pipeline(test_config(&server.uri()), store);
    assert_eq!(p.credentials.get_token().await.unwrap().token, TOKEN);
}

#[tokio::test]
async fn garbage_expiry_counts_as_miss() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    let store = memory_store();
    store.set_as(keys::FEISHU_TOKEN, "t-old").await.unwrap();
    store.set_as(keys::TOKEN_EXPIRY, "tomorrow").await.unwrap();

    let p = pipeline(test_config(&server.uri()), store);
    assert_eq!(p.credentials.get_token().await.unwrap().token, TOKEN);
}

#[tokio::test]
async fn concurrent_callers_share_one_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_response(TOKEN, 7200))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let p = pipeline(test_config(&server.uri()), memory_store());
    let cache = &p.credentials;
    let (a, b, c, d, e) = tokio::join!(
        cache.get_token(),
        cache.get_token(),
        cache.get_token(),
        cache.get_token(),
        cache.get_token()
    );
    for result in [a, b, c, d, e] {
        assert_eq!(result.unwrap().token, TOKEN);
    }
}

#[tokio::test]
async fn refresh_ignores_cache() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response(TOKEN, 7200)))
        .expect(1)
        .mount(&server)
        .await;

    let store = memory_store();
    seed_token(&store, "t-old", in_secs(3600)).await;

    let p = pipeline(test_config(&server.uri()), store);
    assert_eq!(p.credentials.refresh().await.unwrap().token, TOKEN);
}

#[tokio::test]
async fn invalidate_drops_cached_token() {
    let store = memory_store();
    seed_token(&store, "t-old", in_secs(3600)).await;
    store
        .set_as(keys::LEGACY_TOKEN_EXPIRY, &in_secs(3600))
        .await
        .unwrap();

    let p = pipeline(test_config(&unreachable_base_url()), Arc::clone(&store));
    assert!(p.credentials.has_valid_credential().await);

    p.credentials.invalidate().await.unwrap();
    assert!(!p.credentials.has_valid_credential().await);
    assert!(store.get(keys::FEISHU_TOKEN).await.unwrap().is_none());
    assert!(store.get(keys::LEGACY_TOKEN_EXPIRY).await.unwrap().is_none());
}

#[tokio::test]
async fn non_zero_auth_code_is_auth_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(error_response(10003, "invalid param")),
        )
        .mount(&server)
        .await;

    let p = pipeline(test_config(&server.uri()), memory_store());
    match p.credentials.get_token().await {
        Err(CloudError::AuthFailed(msg)) => assert_eq!(msg, "invalid param"),
        other => panic!("expected auth failure, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_auth_response_is_auth_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .mount(&server)
        .await;

    let p = pipeline(test_config(&server.uri()), memory_store());
    let err = p.credentials.get_token().await.unwrap_err();
    assert!(matches!(err, CloudError::AuthFailed(_)), "got {err:?}");
}

#[tokio::test]
async fn unreachable_auth_endpoint_is_connectivity() {
    let p = pipeline(test_config(&unreachable_base_url()), memory_store());
    let err = p.credentials.get_token().await.unwrap_err();
    assert!(err.is_connectivity(), "got {err:?}");
}

#[tokio::test]
async fn rejected_token_is_refreshed_once() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path(RECORDS_PATH))
        .and(header("authorization", "Bearer t-stale"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(error_response(99991663, "invalid access token")),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(RECORDS_PATH))
        .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0,
            "msg": "success",
            "data": { "items": [], "has_more": false }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = memory_store();
    seed_token(&store, "t-stale", in_secs(3600)).await;

    let p = pipeline(test_config(&server.uri()), store);
    let page = p.records.list_page(None, None).await.unwrap();
    assert!(page.records.is_empty());
    assert_eq!(p.credentials.get_token().await.unwrap().token, TOKEN);
}

#[tokio::test]
async fn other_remote_errors_do_not_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response(TOKEN, 7200)))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(RECORDS_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(error_response(1254045, "FieldNameNotFound")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = memory_store();
    seed_token(&store, "t-cached", in_secs(3600)).await;

    let p = pipeline(test_config(&server.uri()), store);
    let err = p.records.list_page(None, None).await.unwrap_err();
    assert!(matches!(err, CloudError::RemoteApplication { code: 1254045, .. }));
}
