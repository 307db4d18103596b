//! Bitable pipeline configuration.

use crate::error::{CloudError, CloudResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Remote column titles the record fields are written to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldNames {
    pub account_name: String,
    pub word: String,
    pub industry: String,
    pub source_url: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            account_name: "填写代号".to_string(),
            word: "生词或书目".to_string(),
            industry: "学科领域".to_string(),
            source_url: "相关链接".to_string(),
        }
    }
}

/// Configuration for the submission pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BitableConfig {
    /// Base URL of the open platform API (e.g., "https://open.feishu.cn/open-apis").
    pub api_base_url: String,

    /// Application credentials exchanged for a tenant access token.
    pub app_id: String,
    pub app_secret: String,

    /// Target bitable app and table.
    pub base_id: String,
    pub table_id: String,

    pub fields: FieldNames,

    /// A cached token is treated as expired this many seconds early.
    pub token_refresh_margin_secs: i64,

    /// Subtracted from the server-reported lifetime when a token is stored.
    pub token_expiry_safety_secs: i64,

    /// Timeout for every outbound HTTP request (milliseconds).
    pub request_timeout_ms: u64,

    /// Attempts made for a record POST that fails on connectivity.
    pub submit_max_attempts: u32,

    /// First backoff delay; doubles after each failed attempt.
    pub retry_base_delay_ms: u64,

    /// Maximum entries kept in the local word history.
    pub history_limit: usize,

    /// Display name used until the user submits under their own.
    pub default_username: String,

    /// Interval between background drains of the offline queue (seconds).
    pub drain_interval_secs: u64,
}

impl Default for BitableConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://open.feishu.cn/open-apis".to_string(),
            app_id: String::new(),
            app_secret: String::new(),
            base_id: String::new(),
            table_id: String::new(),
            fields: FieldNames::default(),
            token_refresh_margin_secs: 300, // 5 minutes before expiry
            token_expiry_safety_secs: 60,
            request_timeout_ms: 30_000,
            submit_max_attempts: 3,
            retry_base_delay_ms: 1000,
            history_limit: 100,
            default_username: "默认用户".to_string(),
            drain_interval_secs: 60,
        }
    }
}

impl BitableConfig {
    /// Loads a config from a JSON file. Missing keys take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> CloudResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| CloudError::Config(format!("cannot read {}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the required identifiers are present.
    pub fn validate(&self) -> CloudResult<()> {
        let required = [
            ("api_base_url", &self.api_base_url),
            ("app_id", &self.app_id),
            ("app_secret", &self.app_secret),
            ("base_id", &self.base_id),
            ("table_id", &self.table_id),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(CloudError::Config(format!("missing {name}")));
            }
        }
        if self.submit_max_attempts == 0 {
            return Err(CloudError::Config(
                "submit_max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Tenant access token endpoint.
    pub fn auth_url(&self) -> String {
        format!(
            "{}/auth/v3/tenant_access_token/internal",
            self.api_base_url.trim_end_matches('/')
        )
    }

    /// Records collection of the configured table.
    pub fn records_url(&self) -> String {
        format!(
            "{}/bitable/v1/apps/{}/tables/{}/records",
            self.api_base_url.trim_end_matches('/'),
            self.base_id,
            self.table_id
        )
    }

    /// A single record of the configured table.
    pub fn record_url(&self, record_id: &str) -> String {
        format!("{}/{record_id}", self.records_url())
    }
}
