//! Pure update function for the TEA (The Elm Architecture) pattern.
//!
//! The update function takes a model and a message, mutates the model,
//! and returns a list of commands to execute. What happens after a stream's
//! `done` is a function of the current phase and the payload alone, so every
//! workflow path here is testable without a network.

use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::api::{
    ChatRequest, ConfirmRequest, DonePayload, QuestionAnswer, StartRequest, TaskBundle,
};
use crate::stream::{append_fragment, ActivityKind, ActivityLogEntry, OutputKind, StreamEvent};
use crate::workflow::{StreamId, StreamKey, TaskId, WorkflowPhase};

use super::command::Command;
use super::message::Message;
use super::model::{ActiveStream, Model, Notification, PendingQuestion};

/// Shown when a stream ends without the runner saying why.
pub const CONNECTION_LOST: &str = "Connection lost";
/// Test result for a successful run that printed nothing.
pub const NO_OUTPUT: &str = "Connected (no output)";

const TASK_RUNNING: &str = "in_progress";
const TASK_DONE: &str = "done";
const TASK_FAILED: &str = "failed";

fn set_error(model: &mut Model, message: impl Into<String>) {
    let message = message.into();
    warn!(phase = %model.phase(), "{}", message);
    model.notification = Some(Notification::error(message));
}

fn set_info(model: &mut Model, message: impl Into<String>) {
    let message = message.into();
    info!(phase = %model.phase(), "{}", message);
    model.notification = Some(Notification::info(message));
}

/// Pure update function: Model + Message → Commands
pub fn update(model: &mut Model, msg: Message) -> Vec<Command> {
    let mut cmds = Vec::new();

    if let Some(project) = msg.reply_project() {
        if project != model.project_id.as_ref() {
            debug!(project = ?project, "dropping reply for another project");
            return cmds;
        }
    }

    match msg {
        Message::OpenProject(project_id) => {
            debug!(project = %project_id, "Message::OpenProject");
            if let Some(active) = model.active_stream.take() {
                cmds.push(Command::CloseStream { id: active.id });
            }
            model.reset_for_project(project_id.clone());
            cmds.push(Command::LoadProject { project_id });
        }

        Message::SubmitPrompt { topic, prompt } => {
            let prompt = prompt.trim().to_string();
            if prompt.is_empty() {
                set_error(model, "Enter a prompt to start planning");
                return cmds;
            }
            let request = StartRequest::new(WorkflowPhase::Questions, model.project_type.clone())
                .target(topic)
                .prompt(prompt.clone())
                .project(model.project_id.clone());
            if let Some(cmd) = open_stream(model, WorkflowPhase::Questions, Some(request), None, None) {
                model.topic = topic;
                model.last_prompt = Some(prompt);
                model.pending_questions.clear();
                model.question_cursor = 0;
                model.pending_plan = None;
                model.agent_assignments.clear();
                cmds.push(cmd);
            }
        }

        Message::SelectQuestion(index) => {
            if index < model.pending_questions.len() {
                model.question_cursor = index;
            }
        }

        Message::AnswerQuestion(answer) => {
            let cursor = model.question_cursor;
            let Some(question) = model.pending_questions.get_mut(cursor) else {
                set_error(model, "No question to answer");
                return cmds;
            };
            question.answered = !answer.trim().is_empty();
            question.answer = answer.trim().to_string();
            if cursor + 1 < model.pending_questions.len() {
                model.question_cursor = cursor + 1;
            }
        }

        Message::SubmitAnswers => {
            if model.phase() != WorkflowPhase::Questions || model.pending_questions.is_empty() {
                set_error(model, "There are no questions to submit");
                return cmds;
            }
            let answers = model.answers();
            cmds.extend(start_plan(model, answers));
        }

        Message::SetAgentAssignment { task, agent } => {
            if model.pending_plan.is_none() {
                set_error(model, "There is no plan to assign agents to");
                return cmds;
            }
            model.agent_assignments.insert(task, agent);
        }

        Message::RegeneratePlan => {
            if model.phase() != WorkflowPhase::Plan || model.is_waiting() {
                set_error(model, "Nothing to regenerate");
                return cmds;
            }
            let answers = model.last_answers.clone();
            cmds.extend(start_plan(model, answers));
        }

        Message::ConfirmPlan => {
            if model.pending_plan.is_none() || model.phase() != WorkflowPhase::Plan {
                set_error(model, "There is no plan to confirm");
                return cmds;
            }
            if model.confirming || model.is_waiting() {
                set_error(model, "Plan confirmation already in progress");
                return cmds;
            }
            model.confirming = true;
            cmds.push(Command::ConfirmPlan {
                request: ConfirmRequest {
                    agent_assignments: model.agent_assignments.clone(),
                    project_id: model.project_id.clone(),
                },
            });
        }

        Message::Dismiss => {
            if model.active_stream.is_some() {
                set_error(model, "Cancel the running operation first");
                return cmds;
            }
            model.pending_questions.clear();
            model.question_cursor = 0;
            model.pending_plan = None;
            model.agent_assignments.clear();
            settle(model, WorkflowPhase::Idle);
        }

        Message::RunTask(task_id) => {
            if !model.tasks.is_empty() && model.task(&task_id).is_none() {
                set_error(model, format!("Unknown task {}", task_id));
                return cmds;
            }
            cmds.extend(start_task(model, task_id));
        }

        Message::Assess { folder } => {
            let Some(project_id) = model.project_id.clone() else {
                set_error(model, "Select a project before running an assessment");
                return cmds;
            };
            let key = StreamKey::new(WorkflowPhase::Assess, Some(project_id));
            if let Some(cmd) = open_stream(model, WorkflowPhase::Assess, None, Some(key), None) {
                if let Some(folder) = folder {
                    model.folder = Some(folder);
                }
                cmds.push(cmd);
            }
        }

        Message::Prioritize => {
            if model.project_id.is_none() {
                set_error(model, "Select a project before prioritizing");
                return cmds;
            }
            let request = StartRequest::new(WorkflowPhase::Prioritize, model.project_type.clone())
                .project(model.project_id.clone());
            let timeout = Some(model.prioritize_timeout);
            cmds.extend(open_stream(model, WorkflowPhase::Prioritize, Some(request), None, timeout));
        }

        Message::TestConnection => {
            let request = StartRequest::new(WorkflowPhase::Test, model.project_type.clone())
                .project(model.project_id.clone());
            cmds.extend(open_stream(model, WorkflowPhase::Test, Some(request), None, None));
        }

        Message::Chat {
            message,
            task_ids,
            feature_ids,
        } => {
            let Some(project_id) = model.project_id.clone() else {
                set_error(model, "Select a project before chatting");
                return cmds;
            };
            let message = message.trim().to_string();
            if message.is_empty() {
                set_error(model, "Enter a message");
                return cmds;
            }
            model.chat_reply = None;
            cmds.push(Command::SendChat {
                project_id,
                request: ChatRequest {
                    message,
                    selected_task_ids: task_ids,
                    selected_feature_ids: feature_ids,
                },
            });
        }

        Message::Cancel => {
            let Some(active) = model.active_stream.clone() else {
                trace!("Message::Cancel with no active stream");
                return cmds;
            };
            info!(stream = %active.id.short(), key = %active.key, "cancelling stream");
            if let Some(phase) = finish_stream(model, active.id) {
                cmds.push(Command::CloseStream { id: active.id });
                fall_back(model, phase);
                set_info(model, "Cancelled");
            }
        }

        Message::Stream { id, event } => {
            if !model.is_active(id) {
                trace!(stream = %id.short(), "dropping event from inactive stream");
                return cmds;
            }
            cmds.extend(apply_event(model, id, event));
        }

        Message::StreamFailed { id, error } => {
            cmds.extend(fail_stream(model, id, error));
        }

        Message::StreamTimedOut { id } => {
            let timeout = model.prioritize_timeout;
            let phase = model.phase();
            cmds.extend(fail_stream(model, id, Some(timeout_message(phase, timeout))));
        }

        Message::PlanConfirmed { bundle, .. } => {
            if !model.confirming {
                debug!("dropping confirmation nobody is waiting for");
                return cmds;
            }
            model.confirming = false;
            cmds.extend(seed_queue(model, bundle));
        }

        Message::PlanConfirmFailed { error, .. } => {
            if !model.confirming {
                return cmds;
            }
            model.confirming = false;
            set_error(model, format!("Failed to confirm plan: {}", error));
        }

        Message::ProjectLoaded { snapshot, .. } => {
            debug!(tasks = snapshot.tasks.len(), "Message::ProjectLoaded");
            model.features = snapshot.features;
            model.replace_tasks(snapshot.tasks);
            if model.active_stream.is_none() {
                model.folder = snapshot.project.folder.clone();
            }
            model.project = Some(snapshot.project);
        }

        Message::ProjectLoadFailed { error, .. } => {
            set_error(model, format!("Failed to load project: {}", error));
        }

        Message::Reordered { project_id } => {
            debug!(project = %project_id, "Message::Reordered");
        }

        Message::ReorderFailed { error, .. } => {
            set_error(model, format!("Failed to save task order: {}", error));
        }

        Message::ChatReplied { response, .. } => {
            model.chat_reply = response.reply.filter(|r| !r.is_empty());
            if let Some(ordered) = response.ordered_task_ids.filter(|ids| !ids.is_empty()) {
                cmds.extend(reorder(model, ordered));
            }
        }

        Message::ChatFailed { error, .. } => {
            set_error(model, error);
        }
    }

    cmds
}

fn timeout_message(phase: WorkflowPhase, timeout: Duration) -> String {
    format!("{} timed out after {}s", phase, timeout.as_secs())
}

/// Enter a stream-backed phase and emit the command that opens its stream.
///
/// Refuses while another stream is active, and when the phase machine does
/// not allow the transition. Nothing is mutated on refusal.
fn open_stream(
    model: &mut Model,
    phase: WorkflowPhase,
    start: Option<StartRequest>,
    key: Option<StreamKey>,
    timeout: Option<Duration>,
) -> Option<Command> {
    if let Some(active) = &model.active_stream {
        let message = format!("Wait for the running {} to finish", active.key.phase);
        set_error(model, message);
        return None;
    }
    if let Err(e) = model.machine.begin(phase) {
        set_error(model, e.to_string());
        return None;
    }

    model.transient.clear();
    model.notification = None;
    let key = key.unwrap_or_else(|| StreamKey::new(phase, model.project_id.clone()));
    let id = StreamId::new();
    debug!(stream = %id.short(), key = %key, "opening stream");
    model.active_stream = Some(ActiveStream {
        id,
        key: key.clone(),
    });

    Some(Command::OpenStream {
        id,
        key,
        start,
        timeout,
    })
}

/// End the active stream if `id` is it. Clears transient state and the
/// waiting flag, and returns the phase the stream belonged to.
fn finish_stream(model: &mut Model, id: StreamId) -> Option<WorkflowPhase> {
    if !model.is_active(id) {
        trace!(stream = %id.short(), "ignoring end of inactive stream");
        return None;
    }
    model.active_stream = None;
    model.transient.clear();
    model.machine.finish();
    Some(model.phase())
}

/// Move to a resting phase. Every caller picks a target reachable from the
/// phase it is in, so a failure here is only logged.
fn settle(model: &mut Model, target: WorkflowPhase) {
    if let Err(e) = model.machine.settle(target) {
        warn!(error = %e, "could not settle phase");
    }
}

/// Where to rest after a stream fails or is cancelled.
/// Plan review when a plan is still pending, idle otherwise.
fn resting_phase(model: &Model) -> WorkflowPhase {
    if model.pending_plan.is_some() {
        WorkflowPhase::Plan
    } else {
        WorkflowPhase::Idle
    }
}

fn fall_back(model: &mut Model, phase: WorkflowPhase) {
    match phase {
        WorkflowPhase::Task => {
            if let Some(task) = model.current_task.take() {
                model.set_task_status(&task, TASK_FAILED);
            }
            model.queue.clear();
            settle(model, WorkflowPhase::Plan);
        }
        WorkflowPhase::Assess => {
            model.folder = model.project_folder();
            settle(model, resting_phase(model));
        }
        WorkflowPhase::Plan if model.pending_plan.is_some() => {
            settle(model, WorkflowPhase::Plan);
        }
        _ => settle(model, WorkflowPhase::Idle),
    }
}

fn fail_stream(model: &mut Model, id: StreamId, error: Option<String>) -> Vec<Command> {
    let Some(phase) = finish_stream(model, id) else {
        return Vec::new();
    };
    let message = error
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| CONNECTION_LOST.to_string());
    fall_back(model, phase);
    set_error(model, message);
    vec![Command::CloseStream { id }]
}

fn apply_event(model: &mut Model, id: StreamId, event: StreamEvent) -> Vec<Command> {
    let transient = &mut model.transient;
    match event {
        StreamEvent::Folder { path } => {
            model.folder = Some(path);
        }
        StreamEvent::Prompt { prompt } => {
            transient.prompt = Some(prompt);
        }
        StreamEvent::Step { step, message } => {
            let status = StreamEvent::step_status(&step, message.as_deref());
            transient
                .activity_log
                .push(ActivityLogEntry::new(ActivityKind::Step, status.clone()));
            transient.step = Some(step);
            transient.status_message = Some(status);
        }
        StreamEvent::Status { message } => {
            transient
                .activity_log
                .push(ActivityLogEntry::new(ActivityKind::Status, message.clone()));
            transient.status_message = Some(message);
        }
        StreamEvent::AgentActivity(entry) => {
            transient.agent_activity.push(entry);
        }
        StreamEvent::FileActivity(entry) => {
            transient.file_activity.record(entry);
        }
        StreamEvent::Output { kind, text } => match kind {
            OutputKind::Thinking => append_fragment(&mut transient.streamed_text, &text),
            OutputKind::Other(_) => {
                if model.machine.phase().keeps_raw_output() {
                    transient.raw_output.push_str(&text);
                }
            }
        },
        StreamEvent::Done(payload) => return handle_done(model, id, payload),
        StreamEvent::Error { message } => return fail_stream(model, id, message),
    }
    Vec::new()
}

fn handle_done(model: &mut Model, id: StreamId, payload: DonePayload) -> Vec<Command> {
    if !model.is_active(id) {
        return Vec::new();
    }
    // Raw output must be read before the transient state goes.
    let raw_output = std::mem::take(&mut model.transient.raw_output);
    let Some(phase) = finish_stream(model, id) else {
        return Vec::new();
    };
    debug!(stream = %id.short(), phase = %phase, "stream done");

    let mut cmds = vec![Command::CloseStream { id }];
    match phase {
        WorkflowPhase::Assess => cmds.extend(assess_done(model, payload)),
        WorkflowPhase::Test => test_done(model, payload, raw_output),
        WorkflowPhase::Questions => cmds.extend(questions_done(model, payload)),
        WorkflowPhase::Plan => plan_done(model, payload),
        WorkflowPhase::Task => cmds.extend(task_done(model, payload)),
        WorkflowPhase::Prioritize => cmds.extend(prioritize_done(model, payload, raw_output)),
        WorkflowPhase::Idle => warn!("done event while idle"),
    }
    cmds
}

fn load_project(model: &Model) -> Option<Command> {
    model
        .project_id
        .clone()
        .map(|project_id| Command::LoadProject { project_id })
}

fn assess_done(model: &mut Model, payload: DonePayload) -> Option<Command> {
    settle(model, resting_phase(model));
    if let Some(err) = payload.error() {
        model.folder = model.project_folder();
        set_error(model, err);
        return None;
    }
    set_info(model, "Assessment complete");
    load_project(model)
}

fn test_done(model: &mut Model, payload: DonePayload, raw_output: String) {
    settle(model, WorkflowPhase::Idle);
    if let Some(err) = payload.error() {
        set_error(model, err);
        return;
    }
    let output = payload
        .output
        .filter(|o| !o.trim().is_empty())
        .or_else(|| Some(raw_output).filter(|o| !o.trim().is_empty()))
        .unwrap_or_else(|| NO_OUTPUT.to_string());
    model.test_result = Some(output);
}

fn questions_done(model: &mut Model, payload: DonePayload) -> Vec<Command> {
    if let Some(err) = payload.error() {
        let err = err.to_string();
        settle(model, WorkflowPhase::Idle);
        set_error(model, err);
        return Vec::new();
    }

    // Items without question text are skipped, not fatal.
    let questions = payload.questions.map(|questions| {
        questions
            .into_iter()
            .filter(|q| !q.question.trim().is_empty())
            .collect::<Vec<_>>()
    });

    match questions {
        Some(questions) if !questions.is_empty() => {
            debug!(count = questions.len(), "clarifying questions received");
            model.pending_questions = questions
                .into_iter()
                .enumerate()
                .map(|(i, q)| PendingQuestion::from_payload(i, q))
                .collect();
            model.question_cursor = 0;
            settle(model, WorkflowPhase::Questions);
            Vec::new()
        }
        Some(_) => {
            debug!("no clarifying questions, generating plan");
            start_plan(model, Vec::new())
        }
        None => {
            warn!("questions stream finished without a question list");
            let cmds = start_plan(model, Vec::new());
            if !cmds.is_empty() {
                set_info(model, "The agent returned no questions; generating the plan directly");
            }
            cmds
        }
    }
}

fn start_plan(model: &mut Model, answers: Vec<QuestionAnswer>) -> Vec<Command> {
    let request = StartRequest::new(WorkflowPhase::Plan, model.project_type.clone())
        .target(model.topic)
        .answers(answers.clone())
        .project(model.project_id.clone());
    match open_stream(model, WorkflowPhase::Plan, Some(request), None, None) {
        Some(cmd) => {
            model.pending_questions.clear();
            model.question_cursor = 0;
            model.pending_plan = None;
            model.agent_assignments.clear();
            model.last_answers = answers;
            vec![cmd]
        }
        None => Vec::new(),
    }
}

fn plan_done(model: &mut Model, payload: DonePayload) {
    if let Some(plan) = payload.plan {
        debug!(features = plan.features.len(), tasks = plan.task_count(), "plan received");
        model.pending_plan = Some(plan);
        model.agent_assignments.clear();
        settle(model, WorkflowPhase::Plan);
        return;
    }
    let err = payload
        .error()
        .unwrap_or("The agent did not return a plan")
        .to_string();
    settle(model, WorkflowPhase::Idle);
    set_error(model, err);
}

/// Replace the board with confirmed tasks and start running them.
fn seed_queue(model: &mut Model, bundle: TaskBundle) -> Vec<Command> {
    let ids: Vec<TaskId> = bundle.nodes.iter().map(|t| t.id.clone()).collect();
    info!(tasks = ids.len(), "plan confirmed");

    if !bundle.features.is_empty() {
        model.features = bundle.features;
    }
    model.replace_tasks(bundle.nodes);
    model.pending_plan = None;
    model.agent_assignments.clear();
    model.queue.replace(ids);

    run_next(model)
}

fn start_task(model: &mut Model, task_id: TaskId) -> Vec<Command> {
    let request = StartRequest::new(WorkflowPhase::Task, model.project_type.clone())
        .task(task_id.clone())
        .project(model.project_id.clone());
    let key = StreamKey::new(WorkflowPhase::Task, model.project_id.clone()).with_task(task_id.clone());
    match open_stream(model, WorkflowPhase::Task, Some(request), Some(key), None) {
        Some(cmd) => {
            info!(task = %task_id, remaining = model.queue.len(), "running task");
            model.set_task_status(&task_id, TASK_RUNNING);
            model.current_task = Some(task_id);
            vec![cmd]
        }
        None => {
            model.queue.clear();
            Vec::new()
        }
    }
}

/// Run the next queued task, or return to plan review when none are left.
fn run_next(model: &mut Model) -> Vec<Command> {
    match model.queue.pop() {
        Some(next) => start_task(model, next),
        None => {
            settle(model, WorkflowPhase::Plan);
            set_info(model, "All tasks finished");
            load_project(model).into_iter().collect()
        }
    }
}

fn task_done(model: &mut Model, payload: DonePayload) -> Vec<Command> {
    let finished = model.current_task.take();
    if let Some(err) = payload.error() {
        let err = err.to_string();
        if let Some(task) = &finished {
            model.set_task_status(task, TASK_FAILED);
        }
        let dropped = model.queue.len();
        model.queue.clear();
        settle(model, WorkflowPhase::Plan);
        warn!(dropped, "task failed, queue stopped");
        set_error(model, err);
        return Vec::new();
    }
    if let Some(task) = &finished {
        model.set_task_status(task, TASK_DONE);
    }
    run_next(model)
}

fn prioritize_done(model: &mut Model, payload: DonePayload, raw_output: String) -> Vec<Command> {
    settle(model, WorkflowPhase::Idle);
    if let Some(err) = payload.error() {
        set_error(model, err);
        return Vec::new();
    }
    model.prioritize_result = payload
        .output
        .filter(|o| !o.trim().is_empty())
        .or_else(|| Some(raw_output).filter(|o| !o.trim().is_empty()));
    match payload.ordered_task_ids.filter(|ids| !ids.is_empty()) {
        Some(ordered) => reorder(model, ordered),
        None => Vec::new(),
    }
}

fn reorder(model: &mut Model, ordered: Vec<TaskId>) -> Vec<Command> {
    model.apply_order(&ordered);
    match model.project_id.clone() {
        Some(project_id) => vec![Command::Reorder {
            project_id,
            task_ids: ordered,
        }],
        None => Vec::new(),
    }
}
