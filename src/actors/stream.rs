//! Stream reader actor: starts a phase on the runner and forwards its events.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::api::{Backend, StartRequest};
use crate::stream::decode;
use crate::tea::Message;
use crate::util::deadline;
use crate::workflow::{StreamId, StreamKey};
use crate::Error;

use super::ActorHandle;

/// Actor that reads one stream and turns its frames into [`Message`]s.
///
/// Events are forwarded in arrival order. The actor stops after forwarding a
/// terminal event, on transport failure, on cancellation, or when its
/// deadline passes. Nothing is sent after cancellation.
pub struct StreamActor {
    backend: Arc<dyn Backend>,
    msg_tx: mpsc::UnboundedSender<Message>,
    id: StreamId,
    key: StreamKey,
    start: Option<StartRequest>,
    timeout: Option<Duration>,
}

impl StreamActor {
    pub fn new(
        backend: Arc<dyn Backend>,
        msg_tx: mpsc::UnboundedSender<Message>,
        id: StreamId,
        key: StreamKey,
    ) -> Self {
        Self {
            backend,
            msg_tx,
            id,
            key,
            start: None,
            timeout: None,
        }
    }

    /// Call `start` on the runner before opening the stream.
    pub fn with_start(mut self, start: Option<StartRequest>) -> Self {
        self.start = start;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn spawn(self) -> ActorHandle {
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();

        debug!(stream = %self.id.short(), key = %self.key, "StreamActor::spawn");

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel_clone.cancelled() => {
                    debug!(stream = %self.id.short(), "StreamActor cancelled");
                }
                _ = deadline(self.timeout) => {
                    warn!(stream = %self.id.short(), key = %self.key, "stream timed out");
                    let _ = self.msg_tx.send(Message::StreamTimedOut { id: self.id });
                }
                _ = self.run() => {}
            }
        });

        ActorHandle::new(cancel)
    }

    fn send(&self, msg: Message) -> bool {
        self.msg_tx.send(msg).is_ok()
    }

    async fn run(&self) {
        let id = self.id;

        if let Some(request) = &self.start {
            if let Err(e) = self.backend.start(request).await {
                warn!(stream = %id.short(), error = %e, "start failed");
                let error = match e {
                    Error::Backend(message) => message,
                    other => format!("Failed to start {}: {}", self.key.phase, other),
                };
                self.send(Message::StreamFailed {
                    id,
                    error: Some(error),
                });
                return;
            }
        }

        let mut frames = match self.backend.open_stream(&self.key).await {
            Ok(frames) => frames,
            Err(e) => {
                warn!(stream = %id.short(), error = %e, "could not open stream");
                self.send(Message::StreamFailed { id, error: None });
                return;
            }
        };

        while let Some(frame) = frames.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(stream = %id.short(), error = %e, "stream transport error");
                    self.send(Message::StreamFailed { id, error: None });
                    return;
                }
            };
            let Some(event) = decode(&frame.event, &frame.data) else {
                continue;
            };
            trace!(stream = %id.short(), event = %frame.event, "stream event");
            let terminal = event.is_terminal();
            if !self.send(Message::Stream { id, event }) || terminal {
                return;
            }
        }

        debug!(stream = %id.short(), "stream closed before done");
        self.send(Message::StreamFailed { id, error: None });
    }
}
