//! Messages for the TEA (The Elm Architecture) pattern.
//!
//! Messages are inputs to the update function - they come from the user,
//! from stream reader actors, or from command completion callbacks.

use crate::api::{ChatResponse, ProjectSnapshot, TaskBundle};
use crate::stream::StreamEvent;
use crate::workflow::{FeatureId, PlanTopic, ProjectId, StreamId, TaskId};

/// Input messages to the update function.
#[derive(Debug, Clone)]
pub enum Message {
    // User intents
    /// Switch to a project, discarding all state of the previous one.
    OpenProject(ProjectId),
    /// Start a planning conversation.
    SubmitPrompt {
        topic: PlanTopic,
        prompt: String,
    },
    SelectQuestion(usize),
    /// Answer the question under the cursor.
    AnswerQuestion(String),
    SubmitAnswers,
    SetAgentAssignment {
        task: String,
        agent: String,
    },
    RegeneratePlan,
    ConfirmPlan,
    /// Drop pending questions or plan and go back to idle.
    Dismiss,
    RunTask(TaskId),
    Assess {
        folder: Option<String>,
    },
    Prioritize,
    TestConnection,
    Chat {
        message: String,
        task_ids: Vec<TaskId>,
        feature_ids: Vec<FeatureId>,
    },
    /// Close the active stream, if any.
    Cancel,

    // From stream reader actors
    Stream {
        id: StreamId,
        event: StreamEvent,
    },
    /// The stream could not start or the connection dropped. `error` carries
    /// the runner's message when it sent one.
    StreamFailed {
        id: StreamId,
        error: Option<String>,
    },
    StreamTimedOut {
        id: StreamId,
    },

    // Command completion callbacks. Each carries the project the call was
    // made for; replies for another project are dropped.
    PlanConfirmed {
        project_id: Option<ProjectId>,
        bundle: TaskBundle,
    },
    PlanConfirmFailed {
        project_id: Option<ProjectId>,
        error: String,
    },
    ProjectLoaded {
        project_id: ProjectId,
        snapshot: ProjectSnapshot,
    },
    ProjectLoadFailed {
        project_id: ProjectId,
        error: String,
    },
    Reordered {
        project_id: ProjectId,
    },
    ReorderFailed {
        project_id: ProjectId,
        error: String,
    },
    ChatReplied {
        project_id: ProjectId,
        response: ChatResponse,
    },
    ChatFailed {
        project_id: ProjectId,
        error: String,
    },
}

impl Message {
    /// The stream a reader message belongs to.
    pub fn stream_id(&self) -> Option<StreamId> {
        match self {
            Message::Stream { id, .. }
            | Message::StreamFailed { id, .. }
            | Message::StreamTimedOut { id } => Some(*id),
            _ => None,
        }
    }

    /// Whether this message is the result of a request/response call.
    pub fn completes_call(&self) -> bool {
        self.reply_project().is_some()
    }

    /// For call results, the project the call was made for (`Some(None)` when
    /// no project was open).
    pub fn reply_project(&self) -> Option<Option<&ProjectId>> {
        match self {
            Message::PlanConfirmed { project_id, .. }
            | Message::PlanConfirmFailed { project_id, .. } => Some(project_id.as_ref()),
            Message::ProjectLoaded { project_id, .. }
            | Message::ProjectLoadFailed { project_id, .. }
            | Message::Reordered { project_id }
            | Message::ReorderFailed { project_id, .. }
            | Message::ChatReplied { project_id, .. }
            | Message::ChatFailed { project_id, .. } => Some(Some(project_id)),
            _ => None,
        }
    }

    /// Whether this message ends the stream it belongs to.
    pub fn ends_stream(&self) -> bool {
        match self {
            Message::Stream { event, .. } => event.is_terminal(),
            Message::StreamFailed { .. } | Message::StreamTimedOut { .. } => true,
            _ => false,
        }
    }
}
