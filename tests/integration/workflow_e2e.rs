//! End-to-end workflow integration tests.
//!
//! These tests drive the orchestrator from a prompt through questions, plan
//! review and sequential task execution against a scripted runner.

use agentflow::api::ChatResponse;
use agentflow::assessment;
use agentflow::stream::SseFrame;
use agentflow::tea::{Message, NotificationLevel};
use agentflow::workflow::{PlanTopic, ProjectId, TaskId, WorkflowPhase};

use crate::fixtures::{
    bundle, done, error, finishes_with, orchestrator, snapshot, status, thinking, Call, Script,
    ScriptedBackend,
};

const PLAN: &str = r#"{"plan":{"project":{"name":"Shop"},"features":[{"name":"Auth","tasks":[{"title":"Login form"},{"title":"Session store"}]}]}}"#;

fn prompt(text: &str) -> Message {
    Message::SubmitPrompt {
        topic: PlanTopic::Planning,
        prompt: text.to_string(),
    }
}

fn statuses(orch: &agentflow::Orchestrator) -> Vec<(String, String)> {
    orch.model()
        .tasks
        .iter()
        .map(|t| (t.id.to_string(), t.status.clone().unwrap_or_default()))
        .collect()
}

/// Test: prompt with no clarifying questions goes straight to a plan, and
/// confirming the plan runs every task one at a time in order.
#[tokio::test]
async fn test_e2e_prompt_to_completed_tasks() {
    let backend = ScriptedBackend::new();
    backend
        .script(
            WorkflowPhase::Questions,
            Script::Frames(vec![
                thinking("Reading"),
                thinking("the code"),
                done(r#"{"questions":[]}"#),
            ]),
        )
        .script(WorkflowPhase::Plan, finishes_with(PLAN))
        .script(WorkflowPhase::Task, finishes_with(r#"{"ok":true}"#))
        .set_bundle(bundle(&["t1", "t2", "t3"]))
        .set_snapshot(snapshot(&[("t1", "done"), ("t2", "done"), ("t3", "done")]));
    let mut orch = orchestrator(&backend, Some("p1"));

    orch.dispatch(prompt("Add login"));
    assert!(orch.is_busy());
    orch.run_until_settled().await;

    assert_eq!(orch.model().phase(), WorkflowPhase::Plan);
    assert_eq!(
        backend.opened_phases(),
        vec![WorkflowPhase::Questions, WorkflowPhase::Plan]
    );
    let plan = orch.model().pending_plan.clone().expect("plan should be pending");
    assert_eq!(plan.features[0].name, "Auth");
    assert_eq!(plan.task_count(), 2);
    assert!(orch.model().transient.is_empty(), "transient state cleared after done");

    orch.dispatch(Message::ConfirmPlan);
    orch.run_until_settled().await;

    assert_eq!(backend.opened_tasks(), vec!["t1", "t2", "t3"]);
    let model = orch.model();
    assert_eq!(model.phase(), WorkflowPhase::Plan);
    assert!(model.queue.is_empty());
    assert!(model.current_task.is_none());
    assert!(model.pending_plan.is_none());
    assert!(!model.is_waiting());
    assert_eq!(
        model.notification.as_ref().map(|n| n.level),
        Some(NotificationLevel::Info)
    );
    assert!(backend.calls().contains(&Call::Load(ProjectId::new("p1"))));
    assert!(statuses(&orch).iter().all(|(_, s)| s == "done"));
    assert_eq!(orch.open_streams(), 0);
}

/// Test: each task's start call comes only after the previous task finished.
#[tokio::test]
async fn test_e2e_tasks_start_sequentially() {
    let backend = ScriptedBackend::new();
    backend
        .script(WorkflowPhase::Questions, finishes_with(r#"{"questions":[]}"#))
        .script(WorkflowPhase::Plan, finishes_with(PLAN))
        .script(WorkflowPhase::Task, finishes_with(r#"{"ok":true}"#))
        .set_bundle(bundle(&["a", "b"]));
    let mut orch = orchestrator(&backend, Some("p1"));

    orch.dispatch(prompt("Add login"));
    orch.run_until_settled().await;
    orch.dispatch(Message::ConfirmPlan);
    orch.run_until_settled().await;

    let task_calls: Vec<Call> = backend
        .calls()
        .into_iter()
        .filter(|c| match c {
            Call::Start { phase, .. } => *phase == WorkflowPhase::Task,
            Call::Open(key) => key.phase == WorkflowPhase::Task,
            _ => false,
        })
        .collect();
    assert_eq!(task_calls.len(), 4);
    assert_eq!(
        task_calls[0],
        Call::Start {
            phase: WorkflowPhase::Task,
            task: Some(TaskId::new("a"))
        }
    );
    assert!(matches!(&task_calls[1], Call::Open(key) if key.task_id == Some(TaskId::new("a"))));
    assert_eq!(
        task_calls[2],
        Call::Start {
            phase: WorkflowPhase::Task,
            task: Some(TaskId::new("b"))
        }
    );
}

/// Test: clarifying questions are collected, then answers start the plan.
#[tokio::test]
async fn test_e2e_questions_then_plan() {
    let backend = ScriptedBackend::new();
    backend
        .script(
            WorkflowPhase::Questions,
            finishes_with(
                r#"{"questions":[{"id":1,"question":"Which database?","hint":"e.g. Postgres"},{"question":"Auth provider?"}]}"#,
            ),
        )
        .script(WorkflowPhase::Plan, finishes_with(PLAN));
    let mut orch = orchestrator(&backend, Some("p1"));

    orch.dispatch(prompt("Add login"));
    orch.run_until_settled().await;

    let model = orch.model();
    assert_eq!(model.phase(), WorkflowPhase::Questions);
    assert_eq!(model.pending_questions.len(), 2);
    assert_eq!(model.pending_questions[0].id, "1");
    assert_eq!(model.pending_questions[0].hint.as_deref(), Some("e.g. Postgres"));
    assert_eq!(model.pending_questions[1].id, "2");

    orch.dispatch(Message::AnswerQuestion("Postgres".to_string()));
    orch.dispatch(Message::SubmitAnswers);
    orch.run_until_settled().await;

    let model = orch.model();
    assert_eq!(model.phase(), WorkflowPhase::Plan);
    assert!(model.pending_plan.is_some());
    assert!(model.pending_questions.is_empty());
    assert_eq!(model.last_answers.len(), 2);
    assert_eq!(model.last_answers[0].answer, "Postgres");
    assert_eq!(model.last_answers[1].answer, "");
}

/// Test: a failing task stops the queue; later tasks never start.
#[tokio::test]
async fn test_e2e_task_failure_stops_queue() {
    let backend = ScriptedBackend::new();
    backend
        .script(WorkflowPhase::Questions, finishes_with(r#"{"questions":[]}"#))
        .script(WorkflowPhase::Plan, finishes_with(PLAN))
        .script(WorkflowPhase::Task, finishes_with(r#"{"ok":true}"#))
        .script_task(
            "t2",
            Script::Frames(vec![status("compiling"), error("compile failed")]),
        )
        .set_bundle(bundle(&["t1", "t2", "t3"]));
    let mut orch = orchestrator(&backend, Some("p1"));

    orch.dispatch(prompt("Add login"));
    orch.run_until_settled().await;
    orch.dispatch(Message::ConfirmPlan);
    orch.run_until_settled().await;

    assert_eq!(backend.opened_tasks(), vec!["t1", "t2"]);
    let model = orch.model();
    assert_eq!(model.phase(), WorkflowPhase::Plan);
    assert!(model.queue.is_empty());
    assert!(!model.is_waiting());
    let notification = model.notification.as_ref().expect("error notification");
    assert_eq!(notification.level, NotificationLevel::Error);
    assert_eq!(notification.message, "compile failed");
    assert_eq!(
        statuses(&orch),
        vec![
            ("t1".to_string(), "done".to_string()),
            ("t2".to_string(), "failed".to_string()),
            ("t3".to_string(), "todo".to_string()),
        ]
    );
}

/// Test: a refused start surfaces the runner's message unchanged.
#[tokio::test]
async fn test_e2e_start_error_is_verbatim() {
    let backend = ScriptedBackend::new();
    backend.script(
        WorkflowPhase::Test,
        Script::StartError("agent not configured".to_string()),
    );
    let mut orch = orchestrator(&backend, None);

    orch.dispatch(Message::TestConnection);
    orch.run_until_settled().await;

    let model = orch.model();
    assert_eq!(model.phase(), WorkflowPhase::Idle);
    assert_eq!(
        model.notification.as_ref().map(|n| n.message.as_str()),
        Some("agent not configured")
    );
    assert!(backend.opened_phases().is_empty());
}

/// Test: a stream that closes without `done` reports a lost connection.
#[tokio::test]
async fn test_e2e_dropped_stream_is_connection_lost() {
    let backend = ScriptedBackend::new();
    backend.script(WorkflowPhase::Test, Script::Frames(vec![status("hello")]));
    let mut orch = orchestrator(&backend, None);

    orch.dispatch(Message::TestConnection);
    orch.run_until_settled().await;

    assert_eq!(
        orch.model().notification.as_ref().map(|n| n.message.as_str()),
        Some(agentflow::tea::CONNECTION_LOST)
    );
    assert_eq!(orch.model().phase(), WorkflowPhase::Idle);
}

/// Test: connection test output falls back to the raw stream output.
#[tokio::test]
async fn test_e2e_connection_test_output() {
    let backend = ScriptedBackend::new();
    backend.script(
        WorkflowPhase::Test,
        Script::Frames(vec![
            SseFrame::new("output", r#"{"type":"stdout","text":"pong"}"#),
            done("{}"),
        ]),
    );
    let mut orch = orchestrator(&backend, None);

    orch.dispatch(Message::TestConnection);
    orch.run_until_settled().await;

    assert_eq!(orch.model().test_result.as_deref(), Some("pong"));
}

/// Test: an assessment streams without a start call, then the project is
/// reloaded and its assessment text parses into sections.
#[tokio::test]
async fn test_e2e_assessment_reloads_project() {
    let backend = ScriptedBackend::new();
    let mut loaded = snapshot(&[]);
    loaded.project.assessment = Some(
        "Here you go:\n```json\n{\"description\":\"A web shop\",\"features\":[{\"id\":\"f1\",\"name\":\"Cart\"}]}\n```"
            .to_string(),
    );
    backend
        .script(
            WorkflowPhase::Assess,
            Script::Frames(vec![
                SseFrame::new("folder", r#"{"path":"/srv/shop"}"#),
                status("Scanning"),
                done("{}"),
            ]),
        )
        .set_snapshot(loaded);
    let mut orch = orchestrator(&backend, Some("p1"));

    orch.dispatch(Message::Assess { folder: None });
    orch.run_until_settled().await;

    let calls = backend.calls();
    assert!(!calls.iter().any(|c| matches!(c, Call::Start { .. })));
    assert!(calls.contains(&Call::Load(ProjectId::new("p1"))));

    let model = orch.model();
    assert_eq!(model.phase(), WorkflowPhase::Idle);
    assert_eq!(model.folder.as_deref(), Some("/srv/shop"));
    let text = model
        .project
        .as_ref()
        .and_then(|p| p.assessment.clone())
        .expect("assessment text");
    let parsed = assessment::parse(&text).expect("assessment should parse");
    assert_eq!(parsed.overview, "A web shop");
    assert_eq!(parsed.features[0].name, "Cart");
}

/// Test: prioritizing reorders the board and persists the new order.
#[tokio::test]
async fn test_e2e_prioritize_reorders_tasks() {
    let backend = ScriptedBackend::new();
    backend
        .script(
            WorkflowPhase::Prioritize,
            Script::Frames(vec![
                SseFrame::new("output", r#"{"type":"stdout","text":"t3 unblocks the rest"}"#),
                done(r#"{"orderedTaskIds":["t3","t1","t2"]}"#),
            ]),
        )
        .set_snapshot(snapshot(&[("t1", "todo"), ("t2", "todo"), ("t3", "todo")]));
    let mut orch = orchestrator(&backend, Some("p1"));

    orch.dispatch(Message::OpenProject(ProjectId::new("p1")));
    orch.run_until_settled().await;
    orch.dispatch(Message::Prioritize);
    orch.run_until_settled().await;

    let ids: Vec<String> = statuses(&orch).into_iter().map(|(id, _)| id).collect();
    assert_eq!(ids, vec!["t3", "t1", "t2"]);
    assert_eq!(
        orch.model().prioritize_result.as_deref(),
        Some("t3 unblocks the rest")
    );
    assert!(backend.calls().contains(&Call::Reorder(vec![
        TaskId::new("t3"),
        TaskId::new("t1"),
        TaskId::new("t2"),
    ])));
}

/// Test: a chat reply with an ordering reorders the board.
#[tokio::test]
async fn test_e2e_chat_reply_reorders() {
    let backend = ScriptedBackend::new();
    backend
        .set_snapshot(snapshot(&[("t1", "todo"), ("t2", "todo")]))
        .set_chat(ChatResponse {
            reply: Some("Do t2 first".to_string()),
            ordered_task_ids: Some(vec![TaskId::new("t2"), TaskId::new("t1")]),
            error: None,
        });
    let mut orch = orchestrator(&backend, Some("p1"));

    orch.dispatch(Message::OpenProject(ProjectId::new("p1")));
    orch.run_until_settled().await;
    orch.dispatch(Message::Chat {
        message: "  what first?  ".to_string(),
        task_ids: vec![TaskId::new("t1")],
        feature_ids: vec![],
    });
    assert!(orch.is_busy());
    orch.run_until_settled().await;

    assert_eq!(orch.model().chat_reply.as_deref(), Some("Do t2 first"));
    let ids: Vec<String> = statuses(&orch).into_iter().map(|(id, _)| id).collect();
    assert_eq!(ids, vec!["t2", "t1"]);
    let calls = backend.calls();
    assert!(calls.contains(&Call::Chat("what first?".to_string())));
    assert!(calls.contains(&Call::Reorder(vec![TaskId::new("t2"), TaskId::new("t1")])));
}
