//! Agent runner interface.
//!
//! [`Backend`] is the seam between the orchestrator and the network. The
//! runtime only ever talks to a `dyn Backend`; [`HttpBackend`] is the real
//! implementation and tests substitute a scripted one.

mod client;
mod types;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::stream::SseFrame;
use crate::workflow::{ProjectId, StreamKey, TaskId};
use crate::Result;

pub use client::HttpBackend;
pub(crate) use types::value_text;
pub use types::{
    Ack, ChatRequest, ChatResponse, ConfirmRequest, ConfirmResponse, DonePayload, Feature,
    PlanFeature, PlanPayload, PlanTask, ProjectInfo, ProjectSnapshot, QuestionAnswer,
    QuestionPayload, ReorderRequest, StartRequest, TaskBundle, TaskRecord, DEFAULT_TASK_STATUS,
    UNGROUPED_FEATURE,
};

/// Frames of one open stream, in arrival order.
pub type FrameStream = BoxStream<'static, Result<SseFrame>>;

#[async_trait]
pub trait Backend: Send + Sync {
    /// Begin a phase's backend computation. Must succeed before its stream opens.
    async fn start(&self, request: &StartRequest) -> Result<()>;

    /// Open the SSE channel for a stream key.
    async fn open_stream(&self, key: &StreamKey) -> Result<FrameStream>;

    /// Materialize the pending plan into persisted tasks.
    async fn confirm(&self, request: &ConfirmRequest) -> Result<TaskBundle>;

    /// Persist a new task ordering.
    async fn reorder(&self, project_id: &ProjectId, task_ids: &[TaskId]) -> Result<()>;

    async fn chat(&self, project_id: &ProjectId, request: &ChatRequest) -> Result<ChatResponse>;

    async fn load_project(&self, project_id: &ProjectId) -> Result<ProjectSnapshot>;
}
