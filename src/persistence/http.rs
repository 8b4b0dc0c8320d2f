//! JSON-over-HTTP client for the remote diagram store.
//!
//! The remote side exposes two endpoints below a base URL:
//!
//! - `GET {base}/load?entity_id={id}` answering `{ success, diagram_data? }`
//! - `POST {base}/save` taking [`SaveRequest`] and answering `{ success, message? }`

use super::{RemoteStore, SaveAck, SaveRequest};
use crate::error::StoreError;
use crate::types::Snapshot;
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Response body of the load endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct LoadResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub diagram_data: Option<Snapshot>,
}

/// Response body of the save endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct SaveResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

impl LoadResponse {
    /// Both `success: false` and a missing diagram mean "no diagram yet".
    fn into_snapshot(self) -> Option<Snapshot> {
        if self.success {
            self.diagram_data
        } else {
            None
        }
    }
}

/// Client for the remote store.
#[derive(Debug, Clone)]
pub struct HttpStore {
    base_url: String,
    client: Client,
}

impl HttpStore {
    /// Creates a client rooted at `base_url` with a per-request `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    async fn read_body(response: reqwest::Response) -> Result<String, StoreError> {
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl RemoteStore for HttpStore {
    async fn load(&self, entity_id: &str) -> Result<Option<Snapshot>, StoreError> {
        debug!("loading diagram for entity {entity_id}");
        let response = self
            .client
            .get(self.url("load"))
            .query(&[("entity_id", entity_id)])
            .send()
            .await?;
        let body = Self::read_body(response).await?;
        let parsed: LoadResponse = serde_json::from_str(&body)?;
        Ok(parsed.into_snapshot())
    }

    async fn save(&self, request: &SaveRequest) -> Result<SaveAck, StoreError> {
        debug!(
            "saving diagram for entity {} ({} nodes)",
            request.entity_id,
            request.diagram_data.nodes.len()
        );
        let response = self
            .client
            .post(self.url("save"))
            .json(request)
            .send()
            .await?;
        let body = Self::read_body(response).await?;
        let parsed: SaveResponse = serde_json::from_str(&body)?;
        if parsed.success {
            Ok(SaveAck {
                message: parsed.message,
            })
        } else {
            Err(StoreError::Rejected(
                parsed.message.unwrap_or_else(|| "no reason given".to_string()),
            ))
        }
    }
}
