//! HTTP implementation of [`Backend`] on top of `reqwest`.

use async_trait::async_trait;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::Config;
use crate::stream::frames;
use crate::workflow::{ProjectId, StreamKey, TaskId, WorkflowPhase};
use crate::{Error, Result};

use super::types::{
    Ack, ChatRequest, ChatResponse, ConfirmRequest, ConfirmResponse, ProjectSnapshot,
    ReorderRequest, StartRequest, TaskBundle,
};
use super::{Backend, FrameStream};

/// Talks to the agent runner over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build a backend from config. The request timeout applies to
    /// request/response calls only; streams stay open as long as the runner
    /// keeps them open.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout())
            .build()?;
        Ok(Self::new(config.effective_base_url(), client))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// URL of the SSE endpoint for a stream key.
    pub fn stream_url(&self, key: &StreamKey) -> String {
        match (key.phase, &key.project_id) {
            (WorkflowPhase::Assess, Some(project)) => {
                self.url(&format!("/api/projects/{}/assess/stream", project))
            }
            _ => self.url("/api/cursor/stream"),
        }
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        debug!(path, "POST");
        let resp = self.client.post(self.url(path)).json(body).send().await?;
        read_json(resp).await
    }
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    let text = resp.text().await?;
    if !status.is_success() {
        // Runner errors usually still carry `{error}`; prefer it over the status line.
        if let Ok(ack) = serde_json::from_str::<Ack>(&text) {
            if let Some(err) = ack.failure() {
                return Err(Error::Backend(err));
            }
        }
        return Err(Error::HttpStatus {
            status: status.as_u16(),
            body: text,
        });
    }
    Ok(serde_json::from_str(&text)?)
}

#[async_trait]
impl Backend for HttpBackend {
    async fn start(&self, request: &StartRequest) -> Result<()> {
        let ack: Ack = self.post_json("/api/cursor/start", request).await?;
        match ack.failure() {
            Some(err) => Err(Error::Backend(err)),
            None => Ok(()),
        }
    }

    async fn open_stream(&self, key: &StreamKey) -> Result<FrameStream> {
        let url = self.stream_url(key);
        debug!(%url, key = %key, "opening stream");
        let mut req = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream");
        if key.phase != WorkflowPhase::Assess {
            req = req.query(&key.query());
        }
        let resp = req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::HttpStatus { status, body });
        }
        Ok(frames(resp.bytes_stream()).boxed())
    }

    async fn confirm(&self, request: &ConfirmRequest) -> Result<TaskBundle> {
        let resp: ConfirmResponse = self.post_json("/api/cursor/confirm", request).await?;
        if let Some(err) = resp.error.filter(|e| !e.is_empty()) {
            return Err(Error::Backend(err));
        }
        resp.tasks
            .ok_or_else(|| Error::Backend("Confirm returned no tasks".to_string()))
    }

    async fn reorder(&self, project_id: &ProjectId, task_ids: &[TaskId]) -> Result<()> {
        let body = ReorderRequest {
            task_ids: task_ids.to_vec(),
        };
        let ack: Ack = self
            .post_json(&format!("/api/projects/{}/reorder", project_id), &body)
            .await?;
        match ack.failure() {
            Some(err) => Err(Error::Backend(err)),
            None => Ok(()),
        }
    }

    async fn chat(&self, project_id: &ProjectId, request: &ChatRequest) -> Result<ChatResponse> {
        let resp: ChatResponse = self
            .post_json(&format!("/api/projects/{}/chat", project_id), request)
            .await?;
        if let Some(err) = resp.error.as_ref().filter(|e| !e.is_empty()) {
            return Err(Error::Backend(err.clone()));
        }
        Ok(resp)
    }

    async fn load_project(&self, project_id: &ProjectId) -> Result<ProjectSnapshot> {
        let url = self.url(&format!("/api/projects/{}", project_id));
        debug!(%url, "GET");
        let resp = self.client.get(url).send().await?;
        read_json(resp).await
    }
}
