use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::article::RawArticle;
use crate::config::SyncOptions;
use crate::error::SyncError;
use crate::query::RetrieveParams;

const RETRIEVE_PATH: &str = "/v3/get";

/// Body of one retrieve call: credentials plus the flattened parameters.
#[derive(Debug, Clone, Serialize)]
struct RetrieveRequest<'a> {
    consumer_key: &'a str,
    access_token: &'a str,
    #[serde(flatten)]
    params: &'a RetrieveParams,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RetrieveResponse {
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default, deserialize_with = "article_list")]
    pub list: BTreeMap<String, RawArticle>,
}

/// Anything that can answer a retrieve call: the live API, or a double in tests.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    async fn retrieve(&self, params: &RetrieveParams) -> Result<RetrieveResponse, SyncError>;
}

#[derive(Debug, Clone)]
pub struct PocketClient {
    client: Client,
    endpoint: String,
    consumer_key: String,
    access_token: String,
}

impl PocketClient {
    pub fn new(
        base_url: &str,
        consumer_key: &str,
        access_token: &str,
        request_timeout: Duration,
    ) -> Result<Self, SyncError> {
        if consumer_key.trim().is_empty() {
            return Err(SyncError::configuration("consumerKey was not set"));
        }
        if access_token.trim().is_empty() {
            return Err(SyncError::configuration("accessToken was not set"));
        }
        let client = Client::builder()
            .user_agent(concat!("pocket-sync/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}{RETRIEVE_PATH}", base_url.trim_end_matches('/')),
            consumer_key: consumer_key.to_owned(),
            access_token: access_token.to_owned(),
        })
    }

    pub fn from_options(options: &SyncOptions) -> Result<Self, SyncError> {
        let (consumer_key, access_token) = options.credentials()?;
        Self::new(
            &options.api_base_url,
            consumer_key,
            access_token,
            options.request_timeout(),
        )
    }
}

#[async_trait]
impl ArticleSource for PocketClient {
    async fn retrieve(&self, params: &RetrieveParams) -> Result<RetrieveResponse, SyncError> {
        let body = RetrieveRequest {
            consumer_key: &self.consumer_key,
            access_token: &self.access_token,
            params,
        };
        debug!(offset = ?params.offset, count = params.count, "retrieve request");

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Accept", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .headers()
                .get("X-Error")
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
                .unwrap_or_else(|| reason(status));
            warn!(status = status.as_u16(), error = %message, "retrieve rejected");
            return Err(SyncError::RemoteApi {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn reason(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("unexpected status")
        .to_string()
}

// An empty result comes back as `"list": []` rather than `{}`. Entries that are not
// objects are skipped one by one instead of failing the page.
fn article_list<'de, D>(deserializer: D) -> Result<BTreeMap<String, RawArticle>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries: Vec<(Option<String>, Value)> = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Object(map)) => map.into_iter().map(|(key, v)| (Some(key), v)).collect(),
        Some(Value::Array(items)) => items.into_iter().map(|v| (None, v)).collect(),
        _ => Vec::new(),
    };

    let mut list = BTreeMap::new();
    for (key, value) in entries {
        match serde_json::from_value::<RawArticle>(value) {
            Ok(mut article) => {
                if article.item_id.is_empty() {
                    article.item_id = key.unwrap_or_default();
                }
                list.insert(article.item_id.clone(), article);
            }
            Err(e) => warn!(key = ?key, error = %e, "skipping undecodable article"),
        }
    }
    Ok(list)
}
