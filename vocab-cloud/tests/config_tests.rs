use pretty_assertions::assert_eq;
use vocab_cloud::config::FieldNames;
use vocab_cloud::{BitableConfig, CloudError};

fn valid() -> BitableConfig {
    BitableConfig {
        app_id: "cli_a".into(),
        app_secret: "s".into(),
        base_id: "base".into(),
        table_id: "tbl".into(),
        ..BitableConfig::default()
    }
}

#[test]
fn default_api_base_url() {
    let config = BitableConfig::default();
    assert_eq!(config.api_base_url, "https://open.feishu.cn/open-apis");
}

#[test]
fn default_token_margins() {
    let config = BitableConfig::default();
    assert_eq!(config.token_refresh_margin_secs, 300);
    assert_eq!(config.token_expiry_safety_secs, 60);
}

#[test]
fn default_retry_and_history() {
    let config = BitableConfig::default();
    assert_eq!(config.submit_max_attempts, 3);
    assert_eq!(config.retry_base_delay_ms, 1000);
    assert_eq!(config.history_limit, 100);
    assert_eq!(config.request_timeout_ms, 30_000);
}

#[test]
fn default_field_names() {
    let fields = FieldNames::default();
    assert_eq!(fields.word, "生词或书目");
    assert_eq!(fields.source_url, "相关链接");
}

#[test]
fn endpoint_urls() {
    let config = valid();
    assert_eq!(
        config.auth_url(),
        "https://open.feishu.cn/open-apis/auth/v3/tenant_access_token/internal"
    );
    assert_eq!(
        config.records_url(),
        "https://open.feishu.cn/open-apis/bitable/v1/apps/base/tables/tbl/records"
    );
    assert_eq!(
        config.record_url("rec1"),
        "https://open.feishu.cn/open-apis/bitable/v1/apps/base/tables/tbl/records/rec1"
    );
}

#[test]
fn trailing_slash_in_base_url_is_ignored() {
    let mut config = valid();
    config.api_base_url = "http://localhost:8080/".into();
    assert_eq!(
        config.auth_url(),
        "http://localhost:8080/auth/v3/tenant_access_token/internal"
    );
}

#[test]
fn validate_accepts_complete_config() {
    valid().validate().unwrap();
}

#[test]
fn validate_rejects_missing_app_secret() {
    let mut config = valid();
    config.app_secret = "  ".into();
    match config.validate() {
        Err(CloudError::Config(msg)) => assert_eq!(msg, "missing app_secret"),
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn validate_rejects_zero_attempts() {
    let mut config = valid();
    config.submit_max_attempts = 0;
    assert!(matches!(config.validate(), Err(CloudError::Config(_))));
}

#[test]
fn default_config_is_incomplete() {
    assert!(BitableConfig::default().validate().is_err());
}

#[test]
fn from_json_file_fills_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{
            "app_id": "cli_a",
            "app_secret": "s",
            "base_id": "b",
            "table_id": "t",
            "history_limit": 20
        }"#,
    )
    .unwrap();

    let config = BitableConfig::from_json_file(&path).unwrap();
    assert_eq!(config.history_limit, 20);
    assert_eq!(config.token_refresh_margin_secs, 300);
    assert_eq!(config.fields, FieldNames::default());
}

#[test]
fn from_json_file_missing_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = BitableConfig::from_json_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, CloudError::Config(_)));
}

#[test]
fn from_json_file_validates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{ "app_id": "cli_a" }"#).unwrap();
    assert!(matches!(
        BitableConfig::from_json_file(&path),
        Err(CloudError::Config(_))
    ));
}

#[test]
fn serialization_roundtrip() {
    let config = valid();
    let json = serde_json::to_string(&config).unwrap();
    let back: BitableConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back.app_id, config.app_id);
    assert_eq!(back.fields, config.fields);
    assert_eq!(back.drain_interval_secs, config.drain_interval_secs);
}
