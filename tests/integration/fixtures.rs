//! Test fixtures for integration tests.
//!
//! Provides helpers for:
//! - A scripted in-memory runner implementing [`Backend`]
//! - Building SSE frames for the common events
//! - Predefined task bundles and project snapshots

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use agentflow::api::{
    Backend, ChatRequest, ChatResponse, ConfirmRequest, FrameStream, ProjectInfo,
    ProjectSnapshot, StartRequest, TaskBundle, TaskRecord,
};
use agentflow::app::Orchestrator;
use agentflow::config::Config;
use agentflow::stream::SseFrame;
use agentflow::workflow::{ProjectId, StreamKey, TaskId, WorkflowPhase};
use agentflow::{Error, Result};

/// What the runner does when a stream is opened.
#[derive(Debug, Clone)]
pub enum Script {
    /// Serve these frames, then close the connection.
    Frames(Vec<SseFrame>),
    /// Accept the connection and never send anything.
    Silent,
    /// Refuse the start call with this message.
    StartError(String),
}

/// One call the orchestrator made against the runner.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Start {
        phase: WorkflowPhase,
        task: Option<TaskId>,
    },
    Open(StreamKey),
    Confirm,
    Reorder(Vec<TaskId>),
    Chat(String),
    Load(ProjectId),
}

#[derive(Default)]
struct Inner {
    scripts: HashMap<(WorkflowPhase, Option<TaskId>), Script>,
    calls: Vec<Call>,
    bundle: TaskBundle,
    snapshot: ProjectSnapshot,
    chat: ChatResponse,
}

/// In-memory runner whose responses are scripted per phase and task.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the stream for a phase.
    pub fn script(&self, phase: WorkflowPhase, script: Script) -> &Self {
        self.inner.lock().unwrap().scripts.insert((phase, None), script);
        self
    }

    /// Script the stream for one task.
    pub fn script_task(&self, task: &str, script: Script) -> &Self {
        self.inner
            .lock()
            .unwrap()
            .scripts
            .insert((WorkflowPhase::Task, Some(TaskId::new(task))), script);
        self
    }

    pub fn set_bundle(&self, bundle: TaskBundle) -> &Self {
        self.inner.lock().unwrap().bundle = bundle;
        self
    }

    pub fn set_snapshot(&self, snapshot: ProjectSnapshot) -> &Self {
        self.inner.lock().unwrap().snapshot = snapshot;
        self
    }

    pub fn set_chat(&self, chat: ChatResponse) -> &Self {
        self.inner.lock().unwrap().chat = chat;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Phases whose streams were opened, in order.
    pub fn opened_phases(&self) -> Vec<WorkflowPhase> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Open(key) => Some(key.phase),
                _ => None,
            })
            .collect()
    }

    /// Tasks whose streams were opened, in order.
    pub fn opened_tasks(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Open(key) => key.task_id.map(String::from),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.inner.lock().unwrap().calls.push(call);
    }

    fn lookup(&self, phase: WorkflowPhase, task: Option<&TaskId>) -> Option<Script> {
        let inner = self.inner.lock().unwrap();
        inner
            .scripts
            .get(&(phase, task.cloned()))
            .or_else(|| inner.scripts.get(&(phase, None)))
            .cloned()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn start(&self, request: &StartRequest) -> Result<()> {
        self.record(Call::Start {
            phase: request.phase,
            task: request.task_id.clone(),
        });
        match self.lookup(request.phase, request.task_id.as_ref()) {
            Some(Script::StartError(message)) => Err(Error::Backend(message)),
            _ => Ok(()),
        }
    }

    async fn open_stream(&self, key: &StreamKey) -> Result<FrameStream> {
        self.record(Call::Open(key.clone()));
        Ok(match self.lookup(key.phase, key.task_id.as_ref()) {
            Some(Script::Frames(frames)) => stream::iter(frames.into_iter().map(Ok)).boxed(),
            Some(Script::Silent) => stream::pending().boxed(),
            // Unscripted streams close immediately.
            Some(Script::StartError(_)) | None => stream::empty().boxed(),
        })
    }

    async fn confirm(&self, _request: &ConfirmRequest) -> Result<TaskBundle> {
        self.record(Call::Confirm);
        Ok(self.inner.lock().unwrap().bundle.clone())
    }

    async fn reorder(&self, _project_id: &ProjectId, task_ids: &[TaskId]) -> Result<()> {
        self.record(Call::Reorder(task_ids.to_vec()));
        Ok(())
    }

    async fn chat(&self, _project_id: &ProjectId, request: &ChatRequest) -> Result<ChatResponse> {
        self.record(Call::Chat(request.message.clone()));
        Ok(self.inner.lock().unwrap().chat.clone())
    }

    async fn load_project(&self, project_id: &ProjectId) -> Result<ProjectSnapshot> {
        self.record(Call::Load(project_id.clone()));
        Ok(self.inner.lock().unwrap().snapshot.clone())
    }
}

pub fn status(message: &str) -> SseFrame {
    SseFrame::new("status", format!(r#"{{"message":"{}"}}"#, message))
}

pub fn thinking(text: &str) -> SseFrame {
    SseFrame::new("output", format!(r#"{{"type":"thinking","text":"{}"}}"#, text))
}

pub fn done(data: &str) -> SseFrame {
    SseFrame::new("done", data)
}

pub fn error(message: &str) -> SseFrame {
    SseFrame::new("error", format!(r#"{{"error":"{}"}}"#, message))
}

/// A stream that reports one status line and finishes with `data`.
pub fn finishes_with(data: &str) -> Script {
    Script::Frames(vec![status("working"), done(data)])
}

pub fn bundle(ids: &[&str]) -> TaskBundle {
    TaskBundle {
        nodes: ids
            .iter()
            .map(|id| {
                let mut task = TaskRecord::new(*id);
                task.title = Some(format!("Task {}", id));
                task
            })
            .collect(),
        ..TaskBundle::default()
    }
}

pub fn snapshot(ids: &[(&str, &str)]) -> ProjectSnapshot {
    ProjectSnapshot {
        project: ProjectInfo {
            id: Some(ProjectId::new("p1")),
            name: Some("Shop".to_string()),
            folder: Some("/srv/shop".to_string()),
            assessment: None,
        },
        tasks: ids
            .iter()
            .map(|(id, status)| {
                let mut task = TaskRecord::new(*id);
                task.status = Some(status.to_string());
                task
            })
            .collect(),
        ..ProjectSnapshot::default()
    }
}

pub fn test_config(project: Option<&str>) -> Config {
    Config {
        project_id: project.map(str::to_string),
        ..Config::default()
    }
}

pub fn orchestrator(backend: &ScriptedBackend, project: Option<&str>) -> Orchestrator {
    Orchestrator::new(&test_config(project), Arc::new(backend.clone()))
}
