use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::BackendError;
use crate::models::release::{ReleaseRecord, TimelineData};
use crate::models::runtime::{RuntimeData, RuntimeInfo, UserInfo};

const GET_RUNTIME: &str = include_str!("../queries/get_runtime.graphql");
const APPLICATION_TIMELINE: &str = include_str!("../queries/application_timeline.graphql");
const GET_RESOURCE: &str = include_str!("../queries/get_resource.graphql");

/// Filters for one page of release history.
#[derive(Debug, Clone, Copy)]
pub struct HistoryQuery<'a> {
    pub application: &'a str,
    pub namespace: &'a str,
    pub runtime: &'a str,
    pub page_size: usize,
}

/// Coordinates of the live resource inside an application.
#[derive(Debug, Clone, Copy)]
pub struct ResourceQuery<'a> {
    pub application: &'a str,
    pub name: &'a str,
    pub kind: &'a str,
    pub version: &'a str,
    pub group: &'a str,
}

/// Read-only access to the backend.
#[async_trait]
pub trait StatusClient: Send + Sync {
    async fn fetch_runtime(&self, runtime: &str) -> Result<RuntimeInfo, BackendError>;

    /// Newest-first page of at most `page_size` releases.
    async fn fetch_release_history(
        &self,
        query: HistoryQuery<'_>,
    ) -> Result<Vec<ReleaseRecord>, BackendError>;

    /// Raw `liveState` JSON string; empty when the resource does not exist.
    async fn fetch_live_resource(
        &self,
        ingress_host: &str,
        query: ResourceQuery<'_>,
    ) -> Result<String, BackendError>;

    /// Id of the caller's active account, when the backend lists it.
    async fn fetch_account_id(&self) -> Result<Option<String>, BackendError>;
}

/// Retry policy for transient transport failures.
#[derive(Debug, Clone, Copy)]
pub struct TransportRetry {
    /// Extra attempts after the first one.
    pub retries: u32,
    pub pause: Duration,
}

impl Default for TransportRetry {
    fn default() -> Self {
        Self {
            retries: 3,
            pause: Duration::from_secs(1),
        }
    }
}

/// `StatusClient` over the GraphQL and REST APIs.
pub struct GraphqlStatusClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    retry: TransportRetry,
}

#[derive(Debug, Deserialize)]
struct GraphQlEnvelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Option<Vec<GraphQlErrorMessage>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorMessage {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResourceData {
    resource: Option<ResourceNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceNode {
    #[serde(default)]
    live_state: Option<String>,
}

impl GraphqlStatusClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|source| BackendError::Transport {
                url: base_url.to_string(),
                source,
            })?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            retry: TransportRetry::default(),
        })
    }

    pub fn with_retry(mut self, retry: TransportRetry) -> Self {
        self.retry = retry;
        self
    }

    fn central_graphql_url(&self) -> String {
        format!("{}/2.0/api/graphql", self.base_url)
    }

    async fn send(
        &self,
        url: &str,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, BackendError> {
        let attempts = self.retry.retries + 1;
        let mut attempt = 1;
        loop {
            match build().send().await {
                Ok(resp) if resp.status().is_server_error() && attempt < attempts => {
                    tracing::warn!(
                        "{url} returned {} (attempt {attempt}/{attempts}), retrying",
                        resp.status()
                    );
                }
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    return Err(BackendError::Status {
                        url: url.to_string(),
                        status,
                        body: body.chars().take(500).collect(),
                    });
                }
                Err(e) if (e.is_connect() || e.is_timeout()) && attempt < attempts => {
                    tracing::warn!("{url}: {e} (attempt {attempt}/{attempts}), retrying");
                }
                Err(source) => {
                    return Err(BackendError::Transport {
                        url: url.to_string(),
                        source,
                    });
                }
            }
            attempt += 1;
            tokio::time::sleep(self.retry.pause).await;
        }
    }

    async fn graphql<T: DeserializeOwned>(
        &self,
        url: &str,
        name: &'static str,
        query: &'static str,
        variables: serde_json::Value,
    ) -> Result<T, BackendError> {
        let body = serde_json::json!({
            "operationName": name,
            "query": query,
            "variables": variables,
        });
        tracing::debug!("graphql {name} -> {url}");
        let resp = self
            .send(url, || {
                self.http
                    .post(url)
                    .header("authorization", &self.api_key)
                    .json(&body)
            })
            .await?;
        let text = resp.text().await.map_err(|source| BackendError::Transport {
            url: url.to_string(),
            source,
        })?;
        decode_envelope(name, &text)
    }
}

/// Unwrap a GraphQL response body into its `data`, surfacing server errors.
fn decode_envelope<T: DeserializeOwned>(name: &'static str, text: &str) -> Result<T, BackendError> {
    let envelope: GraphQlEnvelope<T> =
        serde_json::from_str(text).map_err(|e| BackendError::Decode {
            what: name,
            reason: e.to_string(),
        })?;
    let errors = envelope.errors.unwrap_or_default();
    if !errors.is_empty() {
        return Err(BackendError::GraphQl {
            query: name,
            messages: errors.into_iter().map(|e| e.message).collect(),
        });
    }
    envelope.data.ok_or_else(|| BackendError::Decode {
        what: name,
        reason: "response has no data".to_string(),
    })
}

fn runtime_info(runtime: &str, data: RuntimeData) -> Result<RuntimeInfo, BackendError> {
    let node = data.runtime.ok_or_else(|| BackendError::Decode {
        what: "getRuntime",
        reason: format!("runtime '{runtime}' not found"),
    })?;
    let namespace = node.metadata.namespace.ok_or_else(|| BackendError::Decode {
        what: "getRuntime",
        reason: "runtime has no namespace".to_string(),
    })?;
    let ingress_host = node.ingress_host.ok_or_else(|| BackendError::Decode {
        what: "getRuntime",
        reason: "runtime has no ingress host".to_string(),
    })?;
    Ok(RuntimeInfo {
        name: node.metadata.name.unwrap_or_else(|| runtime.to_string()),
        namespace,
        ingress_host: ingress_host.trim_end_matches('/').to_string(),
    })
}

#[async_trait]
impl StatusClient for GraphqlStatusClient {
    async fn fetch_runtime(&self, runtime: &str) -> Result<RuntimeInfo, BackendError> {
        let data: RuntimeData = self
            .graphql(
                &self.central_graphql_url(),
                "getRuntime",
                GET_RUNTIME,
                serde_json::json!({ "runtime": runtime }),
            )
            .await?;
        runtime_info(runtime, data)
    }

    async fn fetch_release_history(
        &self,
        query: HistoryQuery<'_>,
    ) -> Result<Vec<ReleaseRecord>, BackendError> {
        let data: TimelineData = self
            .graphql(
                &self.central_graphql_url(),
                "ApplicationTimelineListQuery",
                APPLICATION_TIMELINE,
                serde_json::json!({
                    "filters": {
                        "name": query.application,
                        "namespace": query.namespace,
                        "runtime": query.runtime,
                    },
                    "pagination": { "first": query.page_size },
                }),
            )
            .await?;
        let mut records = data.into_records();
        records.truncate(query.page_size);
        Ok(records)
    }

    async fn fetch_live_resource(
        &self,
        ingress_host: &str,
        query: ResourceQuery<'_>,
    ) -> Result<String, BackendError> {
        let url = format!("{}/app-proxy/api/graphql", ingress_host.trim_end_matches('/'));
        let data: ResourceData = self
            .graphql(
                &url,
                "getResource",
                GET_RESOURCE,
                serde_json::json!({
                    "application": query.application,
                    "kind": query.kind,
                    "name": query.name,
                    "resourceName": query.name,
                    "version": query.version,
                    "group": query.group,
                }),
            )
            .await?;
        Ok(data
            .resource
            .and_then(|r| r.live_state)
            .unwrap_or_default())
    }

    async fn fetch_account_id(&self) -> Result<Option<String>, BackendError> {
        let url = format!("{}/api/user", self.base_url);
        let resp = self
            .send(&url, || {
                self.http
                    .get(&url)
                    .header("authorization", &self.api_key)
                    .header("accept-charset", "UTF-8")
            })
            .await?;
        let info: UserInfo = resp.json().await.map_err(|e| BackendError::Decode {
            what: "/api/user",
            reason: e.to_string(),
        })?;
        Ok(info.active_account_id().map(str::to_string))
    }
}
