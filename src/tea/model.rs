//! Model for the TEA (The Elm Architecture) pattern.
//!
//! The Model is pure orchestrator state - no channels, no handles, no runtime
//! infrastructure. One Model exists per open project session.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;

use crate::api::{
    value_text, Feature, PlanPayload, ProjectInfo, QuestionAnswer, QuestionPayload, TaskRecord,
};
use crate::config::Config;
use crate::queue::TaskQueue;
use crate::stream::{
    ActivityLogEntry, AgentActivityEntry, BoundedLog, FileActivityEntry, ACTIVITY_LOG_CAP,
    AGENT_ACTIVITY_CAP, FILE_ACTIVITY_CAP,
};
use crate::workflow::{
    PhaseMachine, PlanTopic, ProjectId, StreamId, StreamKey, TaskId, WorkflowPhase,
};

/// Level of a notification message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Error,
    Info,
}

/// A notification message to display to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
        }
    }
}

/// A clarifying question awaiting the user's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingQuestion {
    pub id: String,
    pub question: String,
    pub hint: Option<String>,
    pub answer: String,
    pub answered: bool,
}

impl PendingQuestion {
    /// Build from the runner's payload. Questions without an id are numbered
    /// from 1 in the order received.
    pub fn from_payload(index: usize, payload: QuestionPayload) -> Self {
        let id = payload
            .id
            .as_ref()
            .and_then(value_text)
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| (index + 1).to_string());
        Self {
            id,
            question: payload.question,
            hint: payload.hint.filter(|h| !h.is_empty()),
            answer: String::new(),
            answered: false,
        }
    }

    pub fn to_answer(&self) -> QuestionAnswer {
        QuestionAnswer {
            id: self.id.clone(),
            question: self.question.clone(),
            answer: self.answer.clone(),
        }
    }
}

/// Per-phase streaming state. Cleared on every phase change and on every
/// terminal stream event.
#[derive(Debug, Clone, PartialEq)]
pub struct Transient {
    pub status_message: Option<String>,
    pub step: Option<String>,
    pub prompt: Option<String>,
    /// Accumulated `thinking` output.
    pub streamed_text: String,
    /// Verbatim non-thinking output, kept only for phases that show it.
    pub raw_output: String,
    pub activity_log: BoundedLog<ActivityLogEntry>,
    pub file_activity: BoundedLog<FileActivityEntry>,
    pub agent_activity: BoundedLog<AgentActivityEntry>,
}

impl Default for Transient {
    fn default() -> Self {
        Self {
            status_message: None,
            step: None,
            prompt: None,
            streamed_text: String::new(),
            raw_output: String::new(),
            activity_log: BoundedLog::new(ACTIVITY_LOG_CAP),
            file_activity: BoundedLog::new(FILE_ACTIVITY_CAP),
            agent_activity: BoundedLog::new(AGENT_ACTIVITY_CAP),
        }
    }
}

impl Transient {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.status_message.is_none()
            && self.step.is_none()
            && self.prompt.is_none()
            && self.streamed_text.is_empty()
            && self.raw_output.is_empty()
            && self.activity_log.is_empty()
            && self.file_activity.is_empty()
            && self.agent_activity.is_empty()
    }
}

/// The stream currently feeding the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveStream {
    pub id: StreamId,
    pub key: StreamKey,
}

/// Pure orchestrator state - the single source of truth.
#[derive(Debug, Clone)]
pub struct Model {
    // Project context
    pub project_id: Option<ProjectId>,
    pub project: Option<ProjectInfo>,
    pub features: Vec<Feature>,
    pub tasks: Vec<TaskRecord>,
    /// Root path shown for the running agent.
    pub folder: Option<String>,

    // Phase and streaming
    pub machine: PhaseMachine,
    pub active_stream: Option<ActiveStream>,
    pub transient: Transient,

    // Clarifying questions
    pub topic: PlanTopic,
    pub last_prompt: Option<String>,
    pub pending_questions: Vec<PendingQuestion>,
    pub question_cursor: usize,
    /// Answers the current plan was generated from, reused on regenerate.
    pub last_answers: Vec<QuestionAnswer>,

    // Plan review
    pub pending_plan: Option<PlanPayload>,
    pub agent_assignments: HashMap<String, String>,
    pub confirming: bool,

    // Task execution
    pub queue: TaskQueue,
    pub current_task: Option<TaskId>,

    // Results
    pub test_result: Option<String>,
    pub prioritize_result: Option<String>,
    pub chat_reply: Option<String>,
    pub notification: Option<Notification>,

    // Settings (immutable after init)
    pub project_type: String,
    pub prioritize_timeout: Duration,
}

impl Model {
    pub fn new(config: &Config) -> Self {
        Self {
            project_id: config.project_id.as_deref().map(ProjectId::new),
            project: None,
            features: Vec::new(),
            tasks: Vec::new(),
            folder: None,
            machine: PhaseMachine::new(),
            active_stream: None,
            transient: Transient::default(),
            topic: PlanTopic::default(),
            last_prompt: None,
            pending_questions: Vec::new(),
            question_cursor: 0,
            last_answers: Vec::new(),
            pending_plan: None,
            agent_assignments: HashMap::new(),
            confirming: false,
            queue: TaskQueue::new(),
            current_task: None,
            test_result: None,
            prioritize_result: None,
            chat_reply: None,
            notification: None,
            project_type: config.effective_project_type().to_string(),
            prioritize_timeout: config.prioritize_timeout(),
        }
    }

    /// Drop everything tied to the current project and switch to another.
    pub fn reset_for_project(&mut self, project_id: ProjectId) {
        let project_type = std::mem::take(&mut self.project_type);
        let prioritize_timeout = self.prioritize_timeout;
        *self = Self {
            project_id: Some(project_id),
            project_type,
            prioritize_timeout,
            ..Self::new(&Config::default())
        };
    }

    pub fn phase(&self) -> WorkflowPhase {
        self.machine.phase()
    }

    pub fn is_waiting(&self) -> bool {
        self.machine.is_waiting()
    }

    pub fn active_stream_id(&self) -> Option<StreamId> {
        self.active_stream.as_ref().map(|s| s.id)
    }

    /// Whether `id` names the stream currently feeding the model.
    pub fn is_active(&self, id: StreamId) -> bool {
        self.active_stream_id() == Some(id)
    }

    pub fn current_question(&self) -> Option<&PendingQuestion> {
        self.pending_questions.get(self.question_cursor)
    }

    pub fn answers(&self) -> Vec<QuestionAnswer> {
        self.pending_questions.iter().map(PendingQuestion::to_answer).collect()
    }

    pub fn task(&self, id: &TaskId) -> Option<&TaskRecord> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    /// Folder recorded on the project itself.
    pub fn project_folder(&self) -> Option<String> {
        self.project.as_ref().and_then(|p| p.folder.clone())
    }

    /// Move the listed tasks to the front in the given order; unlisted tasks
    /// keep their relative order after them.
    pub fn apply_order(&mut self, ordered: &[TaskId]) {
        let rank: HashMap<&TaskId, usize> =
            ordered.iter().enumerate().map(|(i, id)| (id, i)).collect();
        self.tasks
            .sort_by_key(|t| rank.get(&t.id).copied().unwrap_or(usize::MAX));
    }

    /// Replace the board with tasks from the runner, filling in defaults.
    pub fn replace_tasks(&mut self, tasks: Vec<TaskRecord>) {
        self.tasks = tasks.into_iter().map(TaskRecord::normalized).collect();
    }

    /// Mark a task's status on the local board.
    pub fn set_task_status(&mut self, id: &TaskId, status: &str) {
        if let Some(task) = self.tasks.iter_mut().find(|t| &t.id == id) {
            task.status = Some(status.to_string());
        }
    }
}

/// Read a string field from an untyped project summary.
pub fn summary_text(summary: &Option<Value>, key: &str) -> Option<String> {
    summary.as_ref()?.get(key).and_then(value_text)
}
