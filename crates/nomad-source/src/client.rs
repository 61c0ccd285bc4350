// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! [`Orchestrator`] implementation over the Nomad HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use futures::future;
use futures::stream::StreamExt;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::constants;
use crate::error::NomadError;
use crate::frames::decode_stream;
use crate::model::{AgentSelf, Allocation, EventBatch, LogStreamKind, NodeIdentity, StreamFrame};
use crate::orchestrator::{ChunkStream, EventBatchStream, Orchestrator};

const TOKEN_HEADER: &str = "X-Nomad-Token";

#[derive(Clone, Debug)]
pub struct NomadConfig {
    /// Base address of the local agent, e.g. `http://127.0.0.1:4646`.
    pub address: String,
    pub token: Option<String>,
    pub region: Option<String>,
    pub namespace: Option<String>,
    /// Applied to non-streaming requests only.
    pub request_timeout: Duration,
}

impl Default for NomadConfig {
    fn default() -> Self {
        Self {
            address: constants::DEFAULT_NOMAD_ADDR.to_string(),
            token: None,
            region: None,
            namespace: None,
            request_timeout: constants::REQUEST_TIMEOUT,
        }
    }
}

pub struct NomadClient {
    http: reqwest::Client,
    config: NomadConfig,
    node: NodeIdentity,
}

impl NomadClient {
    /// Builds the client and resolves the local node through
    /// `/v1/agent/self`. Fails if the agent cannot be reached or does not run
    /// a client.
    pub async fn connect(config: NomadConfig) -> Result<Self, NomadError> {
        if reqwest::Url::parse(&config.address).is_err() {
            return Err(NomadError::InvalidAddress(config.address));
        }
        let http = reqwest::Client::builder().build()?;
        let mut client = Self {
            http,
            config,
            node: NodeIdentity::default(),
        };

        let agent: AgentSelf = client.get_json("/v1/agent/self", &[]).await?;
        let id = agent
            .stats
            .client
            .map(|c| c.node_id)
            .filter(|id| !id.is_empty())
            .ok_or(NomadError::NotAClient)?;
        client.node = NodeIdentity {
            id,
            name: agent.config.node_name,
        };

        info!(
            node_id = %client.node.id,
            node_name = %client.node.name,
            "NOMAD | Connected to nomad agent"
        );
        Ok(client)
    }

    #[must_use]
    pub fn node(&self) -> &NodeIdentity {
        &self.node
    }

    fn request(&self, path: &str, query: &[(&str, &str)]) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.address.trim_end_matches('/'), path);
        let mut req = self.http.get(url).query(query);
        if let Some(region) = &self.config.region {
            req = req.query(&[("region", region)]);
        }
        if let Some(namespace) = &self.config.namespace {
            req = req.query(&[("namespace", namespace)]);
        }
        if let Some(token) = &self.config.token {
            req = req.header(TOKEN_HEADER, token);
        }
        req
    }

    async fn send(req: reqwest::RequestBuilder) -> Result<reqwest::Response, NomadError> {
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let text = resp.text().await.unwrap_or_default();
        let message = text.lines().next().unwrap_or_default().to_string();
        Err(NomadError::Status { status, message })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, NomadError> {
        let req = self
            .request(path, query)
            .timeout(self.config.request_timeout);
        let body = Self::send(req).await?.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn open_stream(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<futures::stream::BoxStream<'static, Result<Bytes, NomadError>>, NomadError> {
        let resp = Self::send(self.request(path, query)).await?;
        Ok(resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(NomadError::from))
            .boxed())
    }
}

/// Maps a log frame to the bytes it carries. Heartbeats and file events
/// carry none.
fn frame_data(frame: StreamFrame) -> Option<Result<Bytes, NomadError>> {
    if let Some(event) = &frame.file_event {
        warn!(
            file = frame.file.as_deref().unwrap_or_default(),
            "NOMAD | Log file event: {event}"
        );
        return None;
    }
    if frame.is_heartbeat() {
        return None;
    }
    let data = frame.data.unwrap_or_default();
    Some(
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map(Bytes::from)
            .map_err(NomadError::from),
    )
}

#[async_trait]
impl Orchestrator for NomadClient {
    async fn node_allocations(&self) -> Result<Vec<Allocation>, NomadError> {
        let path = format!("/v1/node/{}/allocations", self.node.id);
        let allocs: Vec<Allocation> = self.get_json(&path, &[]).await?;
        debug!(count = allocs.len(), "NOMAD | Listed node allocations");
        Ok(allocs)
    }

    async fn log_stream(
        &self,
        alloc_id: &str,
        task: &str,
        kind: LogStreamKind,
    ) -> Result<ChunkStream, NomadError> {
        let path = format!("/v1/client/fs/logs/{alloc_id}");
        let body = self
            .open_stream(
                &path,
                &[
                    ("task", task),
                    ("type", kind.as_str()),
                    ("origin", constants::LOG_ORIGIN),
                    ("offset", "0"),
                    ("follow", "true"),
                ],
            )
            .await?;

        Ok(decode_stream::<StreamFrame, _>(body)
            .filter_map(|frame| future::ready(frame.map_or_else(|e| Some(Err(e)), frame_data)))
            .boxed())
    }

    async fn event_stream(&self, alloc_id: &str) -> Result<EventBatchStream, NomadError> {
        let topic = format!("Allocation:{alloc_id}");
        let body = self
            .open_stream("/v1/event/stream", &[("topic", topic.as_str()), ("index", "0")])
            .await?;
        Ok(decode_stream::<EventBatch, _>(body))
    }
}
