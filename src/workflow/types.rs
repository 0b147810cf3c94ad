//! Core workflow type definitions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Wire representation of an identifier: the agent runner sends ids as either
/// JSON strings or numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Int(i64),
    Float(f64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s,
            RawId::Int(n) => n.to_string(),
            RawId::Float(n) => n.to_string(),
        }
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                RawId::deserialize(deserializer).map(|raw| Self(raw.into()))
            }
        }

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of a persisted task on the project board.
    TaskId
);

string_id!(
    /// Identifier of a project known to the agent runner.
    ProjectId
);

string_id!(
    /// Identifier of a feature grouping on the board.
    FeatureId
);

/// Unique identifier for one stream invocation.
///
/// Every message coming back from a stream reader carries the id of the
/// stream it was read from, so events from a stream that has since been
/// closed or replaced can be told apart from the active one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(pub Uuid);

impl StreamId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for StreamId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Phases of the agent workflow.
///
/// `Idle` is the resting state. `Plan` doubles as the plan-review state once
/// its stream has finished; `Questions` likewise while answers are collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    #[default]
    Idle,
    /// Project assessment stream.
    Assess,
    /// Single-shot connectivity check.
    Test,
    /// Clarifying questions for a planning conversation.
    Questions,
    /// Plan generation, then plan review.
    Plan,
    /// One queued task running.
    Task,
    /// Backlog prioritization.
    Prioritize,
}

impl WorkflowPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowPhase::Idle => "idle",
            WorkflowPhase::Assess => "assess",
            WorkflowPhase::Test => "test",
            WorkflowPhase::Questions => "questions",
            WorkflowPhase::Plan => "plan",
            WorkflowPhase::Task => "task",
            WorkflowPhase::Prioritize => "prioritize",
        }
    }

    /// Phases whose non-thinking output is kept verbatim.
    pub fn keeps_raw_output(&self) -> bool {
        matches!(
            self,
            WorkflowPhase::Prioritize | WorkflowPhase::Task | WorkflowPhase::Test
        )
    }
}

impl std::fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which backlog a planning conversation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlanTopic {
    #[default]
    Planning,
    Tasks,
}

impl PlanTopic {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTopic::Planning => "planning",
            PlanTopic::Tasks => "tasks",
        }
    }
}

impl std::str::FromStr for PlanTopic {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "planning" => Ok(PlanTopic::Planning),
            "tasks" => Ok(PlanTopic::Tasks),
            other => Err(format!("unknown topic '{}', expected planning or tasks", other)),
        }
    }
}

/// Logical identity of a stream: (phase, optional task id, project id).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamKey {
    pub phase: WorkflowPhase,
    pub task_id: Option<TaskId>,
    pub project_id: Option<ProjectId>,
}

impl StreamKey {
    pub fn new(phase: WorkflowPhase, project_id: Option<ProjectId>) -> Self {
        Self {
            phase,
            task_id: None,
            project_id,
        }
    }

    pub fn with_task(mut self, task_id: TaskId) -> Self {
        self.task_id = Some(task_id);
        self
    }

    /// Query parameters for `GET /api/cursor/stream`.
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("phase", self.phase.as_str().to_string())];
        if let Some(task) = &self.task_id {
            params.push(("taskId", task.0.clone()));
        }
        if let Some(project) = &self.project_id {
            params.push(("project_id", project.0.clone()));
        }
        params
    }
}

impl std::fmt::Display for StreamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.phase)?;
        if let Some(task) = &self.task_id {
            write!(f, "/{}", task)?;
        }
        if let Some(project) = &self.project_id {
            write!(f, "@{}", project)?;
        }
        Ok(())
    }
}
