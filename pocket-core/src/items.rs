//! Item API client.
//!
//! Thin wrappers over the three item endpoints used by the command line:
//! - `POST /v3/get` - retrieve items
//! - `POST /v3/add` - save a URL
//! - `POST /v3/send` - modify items (archive)
//!
//! Requests are JSON and always carry the consumer key and access token.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use thiserror::Error;
use url::Url;

use crate::model::{Authorization, ConsumerKey};

/// Number of items `list` retrieves when no count is given.
pub const DEFAULT_COUNT: u32 = 10;

/// Error type for item API calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The service could not be reached.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The service answered with an error status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body did not have the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(#[from] serde_json::Error),

    /// A URL could not be built from the configured base.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// A saved item as returned by `/v3/get`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    #[serde(deserialize_with = "number_or_string")]
    pub item_id: u64,

    #[serde(default)]
    pub given_url: String,

    #[serde(default)]
    pub resolved_url: String,

    #[serde(default)]
    pub given_title: String,

    #[serde(default)]
    pub resolved_title: String,

    #[serde(default)]
    pub excerpt: String,

    #[serde(default, deserialize_with = "number_or_string")]
    pub sort_id: u64,

    #[serde(default, deserialize_with = "number_or_string")]
    pub time_added: u64,
}

impl Item {
    /// Best available title.
    pub fn title(&self) -> &str {
        [&self.resolved_title, &self.given_title]
            .into_iter()
            .find(|t| !t.is_empty())
            .map(String::as_str)
            .unwrap_or_else(|| self.url())
    }

    /// Best available URL.
    pub fn url(&self) -> &str {
        if self.resolved_url.is_empty() {
            &self.given_url
        } else {
            &self.resolved_url
        }
    }

    /// When the item was saved.
    pub fn added_at(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.time_added)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

/// The service encodes numbers as strings; accept both.
fn number_or_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| serde::de::Error::custom(format!("invalid number {}", n))),
        Value::String(s) if s.is_empty() => Ok(0),
        Value::String(s) => s.parse().map_err(serde::de::Error::custom),
        Value::Null => Ok(0),
        other => Err(serde::de::Error::custom(format!(
            "expected number or string, got {}",
            other
        ))),
    }
}

/// Filters for [`ItemClient::retrieve`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrieveOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// Fields for [`ItemClient::add`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct AddOptions {
    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Comma-separated list of tags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RetrieveResponse {
    #[serde(default, deserialize_with = "item_list")]
    list: Vec<Item>,
}

/// The service sends `[]` instead of `{}` for an empty list.
fn item_list<'de, D>(deserializer: D) -> Result<Vec<Item>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ItemList {
        Map(HashMap<String, Item>),
        Seq(Vec<Item>),
    }

    Ok(match ItemList::deserialize(deserializer)? {
        ItemList::Map(map) => map.into_values().collect(),
        ItemList::Seq(items) => items,
    })
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    action_results: Vec<Value>,
}

/// Authenticated client for the item endpoints.
#[derive(Debug, Clone)]
pub struct ItemClient {
    base_url: Url,
    consumer_key: ConsumerKey,
    authorization: Authorization,
    http_client: reqwest::Client,
}

impl ItemClient {
    /// Create a client acting on behalf of `authorization`.
    pub fn new(
        base_url: &str,
        consumer_key: ConsumerKey,
        authorization: Authorization,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            consumer_key,
            authorization,
            http_client: reqwest::Client::new(),
        })
    }

    /// The user this client acts for.
    pub fn username(&self) -> &str {
        &self.authorization.username
    }

    async fn post(&self, path: &str, mut body: Value) -> Result<Value, ApiError> {
        let url = self.base_url.join(path)?;
        if let Value::Object(map) = &mut body {
            map.insert("consumer_key".into(), json!(self.consumer_key.expose()));
            map.insert(
                "access_token".into(),
                json!(self.authorization.access_token.expose()),
            );
        }

        tracing::debug!("POST {}", url);
        let response = self
            .http_client
            .post(url)
            .header("X-Accept", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .headers()
                .get("x-error")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("unknown error")
                        .to_string()
                });
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Retrieve items, sorted by their sort id.
    pub async fn retrieve(&self, options: &RetrieveOptions) -> Result<Vec<Item>, ApiError> {
        let body = serde_json::to_value(options)?;
        let response: RetrieveResponse = serde_json::from_value(self.post("/v3/get", body).await?)?;

        let mut items = response.list;
        items.sort_by_key(|item| item.sort_id);
        Ok(items)
    }

    /// Save a URL.
    pub async fn add(&self, options: &AddOptions) -> Result<(), ApiError> {
        let body = serde_json::to_value(options)?;
        self.post("/v3/add", body).await?;
        Ok(())
    }

    /// Archive an item. Returns whether the service applied the action.
    pub async fn archive(&self, item_id: u64) -> Result<bool, ApiError> {
        let body = json!({
            "actions": [{ "action": "archive", "item_id": item_id.to_string() }],
        });
        let response: SendResponse = serde_json::from_value(self.post("/v3/send", body).await?)?;

        Ok(response
            .action_results
            .first()
            .map(|r| !matches!(r, Value::Bool(false) | Value::Null))
            .unwrap_or(false))
    }
}
