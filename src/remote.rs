//! Remote schema and record client
//!
//! Thin REST client over the provider's record API: list applications, list
//! fields for an application, fetch records with offset/limit pagination.
//! Every request carries the current bearer token; non-2xx responses fail
//! the call with status and body, never a silent skip.

use serde_json::{Map, Value as JsonValue};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Page size for apps and records pagination. The fetch loop terminates when
/// a page returns fewer rows than this.
pub const PAGE_SIZE: usize = 100;

/// Errors surfaced by the remote client.
#[derive(Debug, Clone, Error)]
pub enum RemoteApiError {
    #[error("remote API returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("malformed remote response: {0}")]
    Malformed(String),
    #[error("invalid remote base URL: {0}")]
    InvalidBaseUrl(String),
}

impl From<reqwest::Error> for RemoteApiError {
    fn from(error: reqwest::Error) -> Self {
        RemoteApiError::Network(error.to_string())
    }
}

/// One remote application summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAppInfo {
    pub app_id: String,
    pub code: String,
    pub name: String,
}

/// One remote field schema entry.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFieldInfo {
    pub code: String,
    pub label: String,
    pub field_type: String,
    pub required: bool,
    pub options: Option<JsonValue>,
}

/// One remote record with provider value envelopes already flattened.
///
/// A record without a usable id is carried through so the orchestrator can
/// count it as an isolated per-record failure instead of aborting the batch.
#[derive(Debug, Clone)]
pub struct RemoteRecord {
    pub id: Option<String>,
    pub fields: Map<String, JsonValue>,
}

/// Remote REST client bound to one connector's domain and bearer token.
pub struct RemoteClient {
    http: reqwest::Client,
    base_url: Url,
    bearer_token: String,
}

impl RemoteClient {
    /// Build a client from connector configuration and a valid access token.
    ///
    /// `api_base` overrides the domain-derived base, for test doubles.
    pub fn from_config(
        config: &JsonValue,
        bearer_token: String,
    ) -> Result<Self, RemoteApiError> {
        let base = config
            .get("api_base")
            .or_else(|| config.get("domain"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| RemoteApiError::InvalidBaseUrl("missing 'domain'".to_string()))?;

        let base_url =
            Url::parse(base).map_err(|e| RemoteApiError::InvalidBaseUrl(e.to_string()))?;

        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            bearer_token,
        })
    }

    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<JsonValue, RemoteApiError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| RemoteApiError::InvalidBaseUrl(e.to_string()))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.bearer_token)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteApiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| RemoteApiError::Malformed(e.to_string()))
    }

    /// List all applications, paging until a short page terminates the loop.
    pub async fn list_apps(&self) -> Result<Vec<RemoteAppInfo>, RemoteApiError> {
        let mut apps = Vec::new();
        let mut offset = 0usize;

        loop {
            let body = self
                .get_json(
                    "/k/v1/apps.json",
                    &[
                        ("offset", offset.to_string()),
                        ("limit", PAGE_SIZE.to_string()),
                    ],
                )
                .await?;

            let page = body
                .get("apps")
                .and_then(|v| v.as_array())
                .ok_or_else(|| RemoteApiError::Malformed("missing 'apps' array".to_string()))?;

            for app in page {
                apps.push(RemoteAppInfo {
                    app_id: string_field(app, "appId")?,
                    code: app
                        .get("code")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    name: string_field(app, "name")?,
                });
            }

            if page.len() < PAGE_SIZE {
                break;
            }
            offset += PAGE_SIZE;
        }

        debug!(apps = apps.len(), "Listed remote applications");
        Ok(apps)
    }

    /// List the field schema for one application.
    pub async fn list_fields(&self, app_id: &str) -> Result<Vec<RemoteFieldInfo>, RemoteApiError> {
        let body = self
            .get_json("/k/v1/app/form/fields.json", &[("app", app_id.to_string())])
            .await?;

        let properties = body
            .get("properties")
            .and_then(|v| v.as_object())
            .ok_or_else(|| RemoteApiError::Malformed("missing 'properties' object".to_string()))?;

        let mut fields = Vec::with_capacity(properties.len());
        for (code, spec) in properties {
            fields.push(RemoteFieldInfo {
                code: code.clone(),
                label: spec
                    .get("label")
                    .and_then(|v| v.as_str())
                    .unwrap_or(code)
                    .to_string(),
                field_type: string_field(spec, "type")?,
                required: spec
                    .get("required")
                    .map(truthy)
                    .unwrap_or(false),
                options: spec.get("options").cloned(),
            });
        }

        // Stable order for cache writes and diffs
        fields.sort_by(|a, b| a.code.cmp(&b.code));

        debug!(app_id, fields = fields.len(), "Listed remote fields");
        Ok(fields)
    }

    /// Fetch all records of an application, optionally filtered, paging with
    /// offset/limit until a page comes back short.
    pub async fn fetch_records(
        &self,
        app_id: &str,
        filter: Option<&str>,
    ) -> Result<Vec<RemoteRecord>, RemoteApiError> {
        let mut records = Vec::new();
        let mut offset = 0usize;

        loop {
            let query = match filter {
                Some(filter) => format!("{} limit {} offset {}", filter, PAGE_SIZE, offset),
                None => format!("limit {} offset {}", PAGE_SIZE, offset),
            };

            let body = self
                .get_json(
                    "/k/v1/records.json",
                    &[("app", app_id.to_string()), ("query", query)],
                )
                .await?;

            let page = body
                .get("records")
                .and_then(|v| v.as_array())
                .ok_or_else(|| RemoteApiError::Malformed("missing 'records' array".to_string()))?;

            for raw in page {
                records.push(flatten_record(raw));
            }

            if page.len() < PAGE_SIZE {
                break;
            }
            offset += PAGE_SIZE;
        }

        debug!(app_id, records = records.len(), "Fetched remote records");
        Ok(records)
    }
}

fn string_field(value: &JsonValue, key: &str) -> Result<String, RemoteApiError> {
    value
        .get(key)
        .and_then(|v| {
            v.as_str()
                .map(|s| s.to_string())
                .or_else(|| v.as_i64().map(|n| n.to_string()))
        })
        .ok_or_else(|| RemoteApiError::Malformed(format!("missing '{}'", key)))
}

fn truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Bool(b) => *b,
        JsonValue::String(s) => s == "true",
        _ => false,
    }
}

/// Flatten the provider's `{type, value}` envelopes into plain values and
/// pull the record id out of the `$id` meta field.
fn flatten_record(raw: &JsonValue) -> RemoteRecord {
    let mut fields = Map::new();
    let mut id = None;

    if let Some(obj) = raw.as_object() {
        for (code, envelope) in obj {
            let value = envelope
                .get("value")
                .cloned()
                .unwrap_or_else(|| envelope.clone());

            if code == "$id" {
                id = match &value {
                    JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
                    JsonValue::Number(n) => Some(n.to_string()),
                    _ => None,
                };
                continue;
            }

            // Skip other provider meta fields; they are not part of the
            // business record.
            if code.starts_with('$') {
                continue;
            }

            fields.insert(code.clone(), value);
        }
    }

    RemoteRecord { id, fields }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flatten_unwraps_value_envelopes_and_extracts_id() {
        let raw = json!({
            "$id": {"type": "__ID__", "value": "42"},
            "$revision": {"type": "__REVISION__", "value": "3"},
            "ステータス": {"type": "DROP_DOWN", "value": "申請中"},
            "担当者": {"type": "USER_SELECT", "value": [{"code": "sato"}]},
        });

        let record = flatten_record(&raw);
        assert_eq!(record.id.as_deref(), Some("42"));
        assert_eq!(record.fields.get("ステータス"), Some(&json!("申請中")));
        assert_eq!(
            record.fields.get("担当者"),
            Some(&json!([{"code": "sato"}]))
        );
        assert!(!record.fields.contains_key("$revision"));
    }

    #[test]
    fn flatten_without_id_is_carried_not_dropped() {
        let raw = json!({
            "ステータス": {"type": "DROP_DOWN", "value": "申請中"},
        });

        let record = flatten_record(&raw);
        assert!(record.id.is_none());
        assert_eq!(record.fields.len(), 1);
    }

    #[test]
    fn truthy_accepts_bool_and_string_forms() {
        assert!(truthy(&json!(true)));
        assert!(truthy(&json!("true")));
        assert!(!truthy(&json!("false")));
        assert!(!truthy(&json!(null)));
    }

    #[test]
    fn client_requires_domain_config() {
        let result = RemoteClient::from_config(&json!({}), "token".to_string());
        assert!(matches!(result, Err(RemoteApiError::InvalidBaseUrl(_))));

        let result = RemoteClient::from_config(
            &json!({"domain": "https://example.cybozu.com"}),
            "token".to_string(),
        );
        assert!(result.is_ok());
    }
}
