//! Cancellation and timeout integration tests.
//!
//! These tests verify that a cancelled or timed-out stream releases the
//! orchestrator, and that late events from a closed stream change nothing.

use agentflow::api::DonePayload;
use agentflow::app::Orchestrator;
use agentflow::stream::StreamEvent;
use agentflow::tea::{Message, NotificationLevel};
use agentflow::workflow::{PlanTopic, WorkflowPhase};
use std::sync::Arc;

use crate::fixtures::{finishes_with, orchestrator, test_config, Script, ScriptedBackend};

fn prompt() -> Message {
    Message::SubmitPrompt {
        topic: PlanTopic::Planning,
        prompt: "Add login".to_string(),
    }
}

fn notification(orch: &Orchestrator) -> Option<(NotificationLevel, String)> {
    orch.model()
        .notification
        .as_ref()
        .map(|n| (n.level, n.message.clone()))
}

/// Test: cancelling a silent stream frees the orchestrator immediately.
#[tokio::test]
async fn test_cancel_releases_active_stream() {
    let backend = ScriptedBackend::new();
    backend.script(WorkflowPhase::Questions, Script::Silent);
    let mut orch = orchestrator(&backend, Some("p1"));

    orch.dispatch(prompt());
    assert!(orch.is_busy());
    assert_eq!(orch.open_streams(), 1);
    assert!(orch.model().is_waiting());

    orch.dispatch(Message::Cancel);

    assert!(!orch.is_busy());
    assert_eq!(orch.open_streams(), 0);
    assert_eq!(orch.model().phase(), WorkflowPhase::Idle);
    assert!(orch.model().transient.is_empty());
    assert_eq!(
        notification(&orch),
        Some((NotificationLevel::Info, "Cancelled".to_string()))
    );
}

/// Test: a second stream cannot start while one is running.
#[tokio::test]
async fn test_second_stream_rejected_while_active() {
    let backend = ScriptedBackend::new();
    backend.script(WorkflowPhase::Questions, Script::Silent);
    let mut orch = orchestrator(&backend, Some("p1"));

    orch.dispatch(prompt());
    let first = orch.model().active_stream_id();
    orch.dispatch(Message::TestConnection);

    assert_eq!(orch.model().active_stream_id(), first);
    assert_eq!(orch.open_streams(), 1);
    assert_eq!(
        notification(&orch).map(|(level, _)| level),
        Some(NotificationLevel::Error)
    );
    orch.dispatch(Message::Cancel);
}

/// Test: events arriving for a cancelled stream are ignored.
#[tokio::test]
async fn test_late_events_from_cancelled_stream_ignored() {
    let backend = ScriptedBackend::new();
    backend.script(WorkflowPhase::Questions, Script::Silent);
    let mut orch = orchestrator(&backend, Some("p1"));

    orch.dispatch(prompt());
    let stale = orch.model().active_stream_id().expect("stream is active");
    orch.dispatch(Message::Cancel);

    orch.dispatch(Message::Stream {
        id: stale,
        event: StreamEvent::Status {
            message: "still here".to_string(),
        },
    });
    orch.dispatch(Message::Stream {
        id: stale,
        event: StreamEvent::Done(DonePayload::default()),
    });
    orch.dispatch(Message::StreamFailed {
        id: stale,
        error: Some("late failure".to_string()),
    });

    assert_eq!(orch.model().phase(), WorkflowPhase::Idle);
    assert!(orch.model().transient.is_empty());
    assert!(orch.model().pending_plan.is_none());
    assert_eq!(
        notification(&orch),
        Some((NotificationLevel::Info, "Cancelled".to_string()))
    );
}

/// Test: after a cancel the next prompt starts a fresh stream.
#[tokio::test]
async fn test_new_prompt_after_cancel() {
    let backend = ScriptedBackend::new();
    backend.script(WorkflowPhase::Questions, Script::Silent);
    let mut orch = orchestrator(&backend, Some("p1"));

    orch.dispatch(prompt());
    let first = orch.model().active_stream_id();
    orch.dispatch(Message::Cancel);

    backend.script(
        WorkflowPhase::Questions,
        finishes_with(r#"{"questions":[{"question":"Which database?"}]}"#),
    );
    orch.dispatch(prompt());
    assert_ne!(orch.model().active_stream_id(), first);
    orch.run_until_settled().await;

    assert_eq!(orch.model().phase(), WorkflowPhase::Questions);
    assert_eq!(orch.model().pending_questions.len(), 1);
}

/// Test: cancel with nothing running is a no-op.
#[tokio::test]
async fn test_cancel_when_idle_is_noop() {
    let backend = ScriptedBackend::new();
    let mut orch = orchestrator(&backend, None);

    orch.dispatch(Message::Cancel);

    assert_eq!(orch.model().phase(), WorkflowPhase::Idle);
    assert!(orch.model().notification.is_none());
    assert!(backend.calls().is_empty());
}

/// Test: a prioritize stream that never finishes times out after 90s.
#[tokio::test(start_paused = true)]
async fn test_prioritize_times_out() {
    let backend = ScriptedBackend::new();
    backend.script(WorkflowPhase::Prioritize, Script::Silent);
    let mut orch = orchestrator(&backend, Some("p1"));

    let started = tokio::time::Instant::now();
    orch.dispatch(Message::Prioritize);
    orch.run_until_settled().await;

    assert!(started.elapsed() >= std::time::Duration::from_secs(90));
    assert_eq!(orch.model().phase(), WorkflowPhase::Idle);
    assert_eq!(orch.open_streams(), 0);
    assert_eq!(
        notification(&orch),
        Some((
            NotificationLevel::Error,
            "prioritize timed out after 90s".to_string()
        ))
    );
}

/// Test: the prioritize timeout follows the configuration.
#[tokio::test(start_paused = true)]
async fn test_prioritize_timeout_configurable() {
    let backend = ScriptedBackend::new();
    backend.script(WorkflowPhase::Prioritize, Script::Silent);
    let mut config = test_config(Some("p1"));
    config.prioritize_timeout_secs = Some(5);
    let mut orch = Orchestrator::new(&config, Arc::new(backend.clone()));

    orch.dispatch(Message::Prioritize);
    orch.run_until_settled().await;

    assert_eq!(
        notification(&orch).map(|(_, message)| message),
        Some("prioritize timed out after 5s".to_string())
    );
}

/// Test: other phases have no deadline.
#[tokio::test(start_paused = true)]
async fn test_questions_stream_has_no_deadline() {
    let backend = ScriptedBackend::new();
    backend.script(WorkflowPhase::Questions, Script::Silent);
    let mut orch = orchestrator(&backend, Some("p1"));

    orch.dispatch(prompt());
    tokio::time::sleep(std::time::Duration::from_secs(600)).await;

    assert!(orch.is_busy());
    assert!(orch.model().is_waiting());
    orch.dispatch(Message::Cancel);
    assert!(!orch.is_busy());
}
