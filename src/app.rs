//! Orchestrator runtime: owns the [`Model`], feeds it messages and executes
//! the commands [`update`] returns.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::actors::{ActorHandle, StreamActor};
use crate::api::Backend;
use crate::config::Config;
use crate::tea::{update, Command, Message, Model};
use crate::util::with_timeout;
use crate::workflow::StreamId;

/// Drives one project session against a [`Backend`].
///
/// All model mutation happens in [`Orchestrator::dispatch`] on the caller's
/// task. Stream readers and request/response calls run as spawned tokio tasks
/// and report back over the message channel.
pub struct Orchestrator {
    model: Model,
    backend: Arc<dyn Backend>,
    msg_tx: mpsc::UnboundedSender<Message>,
    msg_rx: mpsc::UnboundedReceiver<Message>,
    streams: HashMap<StreamId, ActorHandle>,
    pending_calls: usize,
    request_timeout: Duration,
}

impl Orchestrator {
    pub fn new(config: &Config, backend: Arc<dyn Backend>) -> Self {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        Self {
            model: Model::new(config),
            backend,
            msg_tx,
            msg_rx,
            streams: HashMap::new(),
            pending_calls: 0,
            request_timeout: config.request_timeout(),
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Sender for feeding messages from outside, e.g. a UI loop.
    pub fn sender(&self) -> mpsc::UnboundedSender<Message> {
        self.msg_tx.clone()
    }

    /// Number of stream readers currently running.
    pub fn open_streams(&self) -> usize {
        self.streams.len()
    }

    /// Whether a stream or a request/response call is still outstanding.
    pub fn is_busy(&self) -> bool {
        self.model.active_stream.is_some() || self.pending_calls > 0
    }

    /// Apply one message and execute the resulting commands.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&mut self, msg: Message) {
        if msg.completes_call() {
            self.pending_calls = self.pending_calls.saturating_sub(1);
        }
        if msg.ends_stream() {
            if let Some(id) = msg.stream_id() {
                self.streams.remove(&id);
            }
        }

        for cmd in update(&mut self.model, msg) {
            self.execute_command(cmd);
        }
    }

    /// Wait for the next background message and dispatch it.
    pub async fn next(&mut self) -> bool {
        match self.msg_rx.recv().await {
            Some(msg) => {
                self.dispatch(msg);
                true
            }
            None => false,
        }
    }

    /// Dispatch background messages until no stream or call is outstanding.
    pub async fn run_until_settled(&mut self) {
        while self.is_busy() {
            if !self.next().await {
                break;
            }
        }
    }

    /// Cancel every running stream reader.
    pub fn shutdown(&mut self) {
        for (id, handle) in self.streams.drain() {
            debug!(stream = %id.short(), "shutting down stream reader");
            handle.shutdown();
        }
    }

    fn execute_command(&mut self, cmd: Command) {
        match cmd {
            Command::OpenStream {
                id,
                key,
                start,
                timeout,
            } => {
                debug!(stream = %id.short(), key = %key, "Command::OpenStream");
                let handle = StreamActor::new(self.backend.clone(), self.msg_tx.clone(), id, key)
                    .with_start(start)
                    .with_timeout(timeout)
                    .spawn();
                self.streams.insert(id, handle);
            }

            Command::CloseStream { id } => {
                trace!(stream = %id.short(), "Command::CloseStream");
                if let Some(handle) = self.streams.remove(&id) {
                    handle.shutdown();
                }
            }

            Command::ConfirmPlan { request } => {
                debug!(assignments = request.agent_assignments.len(), "Command::ConfirmPlan");
                let timeout = self.request_timeout;
                self.spawn_call(move |backend| async move {
                    let result = with_timeout(timeout, backend.confirm(&request)).await;
                    let project_id = request.project_id;
                    match result {
                        Ok(bundle) => Message::PlanConfirmed { project_id, bundle },
                        Err(e) => Message::PlanConfirmFailed {
                            project_id,
                            error: e.to_string(),
                        },
                    }
                });
            }

            Command::Reorder {
                project_id,
                task_ids,
            } => {
                debug!(project = %project_id, tasks = task_ids.len(), "Command::Reorder");
                let timeout = self.request_timeout;
                self.spawn_call(move |backend| async move {
                    let result = with_timeout(timeout, backend.reorder(&project_id, &task_ids)).await;
                    match result {
                        Ok(()) => Message::Reordered { project_id },
                        Err(e) => Message::ReorderFailed {
                            project_id,
                            error: e.to_string(),
                        },
                    }
                });
            }

            Command::SendChat {
                project_id,
                request,
            } => {
                debug!(project = %project_id, "Command::SendChat");
                let timeout = self.request_timeout;
                self.spawn_call(move |backend| async move {
                    let result = with_timeout(timeout, backend.chat(&project_id, &request)).await;
                    match result {
                        Ok(response) => Message::ChatReplied {
                            project_id,
                            response,
                        },
                        Err(e) => Message::ChatFailed {
                            project_id,
                            error: e.to_string(),
                        },
                    }
                });
            }

            Command::LoadProject { project_id } => {
                debug!(project = %project_id, "Command::LoadProject");
                let timeout = self.request_timeout;
                self.spawn_call(move |backend| async move {
                    let result = with_timeout(timeout, backend.load_project(&project_id)).await;
                    match result {
                        Ok(snapshot) => Message::ProjectLoaded {
                            project_id,
                            snapshot,
                        },
                        Err(e) => Message::ProjectLoadFailed {
                            project_id,
                            error: e.to_string(),
                        },
                    }
                });
            }
        }
    }

    fn spawn_call<F, Fut>(&mut self, call: F)
    where
        F: FnOnce(Arc<dyn Backend>) -> Fut,
        Fut: Future<Output = Message> + Send + 'static,
    {
        self.pending_calls += 1;
        let fut = call(self.backend.clone());
        let tx = self.msg_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(fut.await);
        });
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
