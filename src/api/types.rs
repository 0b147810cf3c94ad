//! Wire types exchanged with the agent runner.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::workflow::{FeatureId, PlanTopic, ProjectId, TaskId, WorkflowPhase};

/// Default board status for tasks the runner returns without one.
pub const DEFAULT_TASK_STATUS: &str = "todo";
/// Feature grouping for tasks the runner returns without one.
pub const UNGROUPED_FEATURE: &str = "_none";

/// Text of a scalar JSON value: strings as-is, numbers and bools printed.
pub(crate) fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Body of `POST /api/cursor/start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub project_type: String,
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_answers: Option<Vec<QuestionAnswer>>,
    pub phase: WorkflowPhase,
    #[serde(rename = "project_id", default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
}

impl StartRequest {
    pub fn new(phase: WorkflowPhase, project_type: impl Into<String>) -> Self {
        let action_type = match phase {
            WorkflowPhase::Questions | WorkflowPhase::Plan => "plan",
            WorkflowPhase::Task => "run",
            other => other.as_str(),
        };
        Self {
            project_type: project_type.into(),
            action_type: action_type.to_string(),
            plan_target: None,
            prompt: None,
            question_answers: None,
            phase,
            project_id: None,
            task_id: None,
        }
    }

    pub fn target(mut self, topic: PlanTopic) -> Self {
        self.plan_target = Some(topic.as_str().to_string());
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn answers(mut self, answers: Vec<QuestionAnswer>) -> Self {
        self.question_answers = Some(answers);
        self
    }

    pub fn project(mut self, project_id: Option<ProjectId>) -> Self {
        self.project_id = project_id;
        self
    }

    pub fn task(mut self, task_id: TaskId) -> Self {
        self.task_id = Some(task_id);
        self
    }
}

/// `{ok}|{error}` acknowledgement used by several endpoints.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub ok: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Ack {
    /// The backend-reported failure, if any.
    pub fn failure(&self) -> Option<String> {
        match (&self.error, self.ok) {
            (Some(err), _) if !err.is_empty() => Some(err.clone()),
            (_, Some(false)) => Some("Request rejected by agent runner".to_string()),
            _ => None,
        }
    }
}

/// A clarifying question as sent by the runner.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuestionPayload {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, alias = "text")]
    pub question: String,
    #[serde(default)]
    pub hint: Option<String>,
}

/// An answered question, as sent back in `questionAnswers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionAnswer {
    pub id: String,
    pub question: String,
    pub answer: String,
}

/// A proposed plan: project summary plus features with their tasks.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlanPayload {
    #[serde(default)]
    pub project: Option<Value>,
    #[serde(default)]
    pub features: Vec<PlanFeature>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PlanPayload {
    pub fn task_count(&self) -> usize {
        self.features.iter().map(|f| f.tasks.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlanFeature {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tasks: Vec<PlanTask>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlanTask {
    #[serde(default, alias = "name")]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of a stream's `done` event. Which fields are set depends on the phase.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonePayload {
    #[serde(default)]
    pub ok: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub questions: Option<Vec<QuestionPayload>>,
    #[serde(default)]
    pub plan: Option<PlanPayload>,
    #[serde(default, alias = "result", alias = "text")]
    pub output: Option<String>,
    #[serde(default)]
    pub ordered_task_ids: Option<Vec<TaskId>>,
    #[serde(default)]
    pub status: Option<String>,
}

impl DonePayload {
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref().filter(|e| !e.is_empty())
    }
}

/// Body of `POST /api/cursor/confirm`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub agent_assignments: HashMap<String, String>,
    #[serde(rename = "project_id", skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ConfirmResponse {
    #[serde(default)]
    pub ok: Option<bool>,
    #[serde(default)]
    pub tasks: Option<TaskBundle>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Tasks materialized from a confirmed plan.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct TaskBundle {
    #[serde(default)]
    pub project: Option<Value>,
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default)]
    pub nodes: Vec<TaskRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: FeatureId,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A task on the board. Only `id` is guaranteed by the runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "featureId")]
    pub feature_id: Option<FeatureId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(id),
            status: None,
            feature_id: None,
            title: None,
            extra: Map::new(),
        }
    }

    /// Fill in the board defaults for missing status and feature grouping.
    pub fn normalized(mut self) -> Self {
        if self.status.as_deref().map_or(true, str::is_empty) {
            self.status = Some(DEFAULT_TASK_STATUS.to_string());
        }
        if self.feature_id.as_ref().map_or(true, |f| f.as_str().is_empty()) {
            self.feature_id = Some(FeatureId::new(UNGROUPED_FEATURE));
        }
        self
    }
}

/// Read-only project snapshot from `GET /api/projects/{id}`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ProjectSnapshot {
    #[serde(default)]
    pub project: ProjectInfo,
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default)]
    pub tasks: Vec<TaskRecord>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ProjectInfo {
    #[serde(default)]
    pub id: Option<ProjectId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub folder: Option<String>,
    /// Raw assessment text, parsed on demand with [`crate::assessment::parse`].
    #[serde(default)]
    pub assessment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRequest {
    pub task_ids: Vec<TaskId>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub selected_task_ids: Vec<TaskId>,
    pub selected_feature_ids: Vec<FeatureId>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    #[serde(default)]
    pub reply: Option<String>,
    #[serde(default)]
    pub ordered_task_ids: Option<Vec<TaskId>>,
    #[serde(default)]
    pub error: Option<String>,
}
