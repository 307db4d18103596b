//! HTTP client for the bitable open platform API.
//!
//! Every endpoint answers with a `{code, msg, ...}` envelope; `code == 0` is
//! success regardless of the HTTP status. Transport failures are classified
//! by the `From<reqwest::Error>` conversion in [`crate::error`].

use crate::config::BitableConfig;
use crate::error::{CloudError, CloudResult};
use crate::types::*;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::time::Duration;
use tracing::{debug, warn};

/// A freshly issued tenant access token.
#[derive(Clone, Debug)]
pub struct TokenGrant {
    pub token: String,
    /// Lifetime reported by the server, in seconds.
    pub expire_secs: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
    tenant_access_token: Option<String>,
    expire: Option<i64>,
}

#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

impl<T> Envelope<T> {
    fn into_result(self) -> CloudResult<Option<T>> {
        if self.code != 0 {
            return Err(CloudError::RemoteApplication {
                code: self.code,
                msg: self.msg,
            });
        }
        Ok(self.data)
    }
}

#[derive(Deserialize)]
struct CreatedData {
    record: Option<CreatedRecord>,
}

#[derive(Deserialize)]
struct CreatedRecord {
    id: Option<String>,
    record_id: Option<String>,
}

#[derive(Deserialize)]
struct ListData {
    #[serde(default)]
    items: Option<Vec<RawItem>>,
    page_token: Option<String>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Deserialize)]
struct RawItem {
    record_id: String,
    #[serde(default)]
    fields: Map<String, Value>,
    #[serde(alias = "created_at")]
    created_time: Option<i64>,
}

/// HTTP client for one bitable table.
pub struct BitableClient {
    client: Client,
    config: BitableConfig,
}

impl BitableClient {
    pub fn new(config: BitableConfig) -> CloudResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| CloudError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &BitableConfig {
        &self.config
    }

    // ── Auth ──

    /// Exchanges the app credentials for a tenant access token.
    pub async fn fetch_tenant_token(&self) -> CloudResult<TokenGrant> {
        let resp = self
            .client
            .post(self.config.auth_url())
            .json(&json!({
                "app_id": self.config.app_id,
                "app_secret": self.config.app_secret,
            }))
            .send()
            .await?;

        let body: TokenResponse = read_json(resp).await?;
        if body.code != 0 {
            return Err(CloudError::AuthFailed(if body.msg.is_empty() {
                format!("token endpoint returned code {}", body.code)
            } else {
                body.msg
            }));
        }

        match (body.tenant_access_token, body.expire) {
            (Some(token), Some(expire_secs)) if !token.is_empty() => {
                Ok(TokenGrant { token, expire_secs })
            }
            _ => Err(CloudError::AuthFailed(
                "token endpoint response is missing the token or its lifetime".to_string(),
            )),
        }
    }

    // ── Records ──

    /// Appends a row and returns the remote record id.
    pub async fn create_record(
        &self,
        token: &str,
        record: &VocabularyRecord,
    ) -> CloudResult<String> {
        let body = json!({ "fields": self.record_fields(record) });
        let resp = self
            .client
            .post(self.config.records_url())
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let envelope: Envelope<CreatedData> = read_json(resp).await?;
        let created = envelope.into_result()?.and_then(|d| d.record);
        let id = created
            .and_then(|r| r.record_id.or(r.id))
            .unwrap_or_default();
        if id.is_empty() {
            warn!("record for {:?} accepted without an id", record.word);
        } else {
            debug!("created remote record {id}");
        }
        Ok(id)
    }

    /// Reads one page of rows.
    pub async fn list_records(
        &self,
        token: &str,
        page_size: Option<u32>,
        page_token: Option<&str>,
    ) -> CloudResult<RecordPage> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(size) = page_size {
            query.push(("page_size", size.to_string()));
        }
        if let Some(pt) = page_token {
            query.push(("page_token", pt.to_string()));
        }

        let resp = self
            .client
            .get(self.config.records_url())
            .bearer_auth(token)
            .query(&query)
            .send()
            .await?;

        let envelope: Envelope<ListData> = read_json(resp).await?;
        let Some(data) = envelope.into_result()? else {
            return Ok(RecordPage::default());
        };

        let fields = &self.config.fields;
        let records = data
            .items
            .unwrap_or_default()
            .into_iter()
            .map(|item| RemoteRecord {
                account_name: field_text(item.fields.get(&fields.account_name)),
                word: field_text(item.fields.get(&fields.word)),
                industry: field_text(item.fields.get(&fields.industry)),
                source_url: field_text(item.fields.get(&fields.source_url)),
                id: item.record_id,
                created_time: item.created_time,
            })
            .collect();

        Ok(RecordPage {
            records,
            page_token: data.page_token.filter(|t| !t.is_empty()),
            has_more: data.has_more,
        })
    }

    /// Overwrites the provided fields of a row.
    pub async fn update_record(
        &self,
        token: &str,
        record_id: &str,
        update: &RecordUpdate,
    ) -> CloudResult<()> {
        let fields = &self.config.fields;
        let mut map = Map::new();
        if let Some(v) = update.account_name.as_ref().filter(|v| !v.is_empty()) {
            map.insert(fields.account_name.clone(), json!(v));
        }
        if let Some(v) = update.word.as_ref().filter(|v| !v.is_empty()) {
            map.insert(fields.word.clone(), json!(v));
        }
        if let Some(v) = update.industry.as_ref().filter(|v| !v.is_empty()) {
            map.insert(fields.industry.clone(), json!(v));
        }
        if let Some(v) = &update.source_url {
            map.insert(fields.source_url.clone(), json!(normalize_source_url(v)));
        }

        let resp = self
            .client
            .put(self.config.record_url(record_id))
            .bearer_auth(token)
            .json(&json!({ "fields": map }))
            .send()
            .await?;

        let envelope: Envelope<Value> = read_json(resp).await?;
        envelope.into_result()?;
        Ok(())
    }

    /// Deletes a row.
    pub async fn delete_record(&self, token: &str, record_id: &str) -> CloudResult<()> {
        let resp = self
            .client
            .delete(self.config.record_url(record_id))
            .bearer_auth(token)
            .send()
            .await?;

        let envelope: Envelope<Value> = read_json(resp).await?;
        envelope.into_result()?;
        Ok(())
    }

    fn record_fields(&self, record: &VocabularyRecord) -> Map<String, Value> {
        let fields = &self.config.fields;
        let mut map = Map::new();
        map.insert(fields.account_name.clone(), json!(record.account_name));
        map.insert(fields.word.clone(), json!(record.word));
        map.insert(fields.industry.clone(), json!(record.industry));
        map.insert(fields.source_url.clone(), json!(record.source_url));
        map
    }
}

/// Decodes a JSON body regardless of HTTP status; the envelope carries the
/// real outcome. Non-JSON bodies become `Api` errors with the status.
async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> CloudResult<T> {
    let status = resp.status();
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| {
        let snippet: String = String::from_utf8_lossy(&bytes).chars().take(200).collect();
        CloudError::Api(format!("HTTP {status}: unexpected body ({e}): {snippet}"))
    })
}

/// Flattens a bitable cell to text. Text cells are strings, link cells are
/// `{link, text}` objects and rich text is an array of `{text}` segments.
fn field_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(obj)) => obj
            .get("link")
            .or_else(|| obj.get("text"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        Some(Value::Array(parts)) => parts
            .iter()
            .map(|p| field_text(Some(p)))
            .collect::<Vec<_>>()
            .join(""),
        Some(other) => other.to_string(),
    }
}
