//! Commands for the TEA (The Elm Architecture) pattern.
//!
//! Commands are outputs from the update function - they represent side effects
//! to be executed by the runtime.

use std::time::Duration;

use crate::api::{ChatRequest, ConfirmRequest, StartRequest};
use crate::workflow::{ProjectId, StreamId, StreamKey, TaskId};

/// Output commands from the update function.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // Streams (spawn a reader actor / cancel it)
    /// Call `start` when present, then read the stream for `key`. A
    /// `timeout` closes the stream with `StreamTimedOut` once it elapses.
    OpenStream {
        id: StreamId,
        key: StreamKey,
        start: Option<StartRequest>,
        timeout: Option<Duration>,
    },
    CloseStream {
        id: StreamId,
    },

    // Request/response calls
    ConfirmPlan {
        request: ConfirmRequest,
    },
    Reorder {
        project_id: ProjectId,
        task_ids: Vec<TaskId>,
    },
    SendChat {
        project_id: ProjectId,
        request: ChatRequest,
    },
    LoadProject {
        project_id: ProjectId,
    },
}
