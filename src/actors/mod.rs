//! Actor system for background tasks.
//!
//! Each actor is an independent tokio task that communicates with the
//! orchestrator via message passing. The only actor is the stream reader
//! (StreamActor), one per open stream.

pub mod stream;

use tokio_util::sync::CancellationToken;

pub use stream::StreamActor;

/// Handle to a running actor, used for graceful shutdown.
#[derive(Debug, Clone)]
pub struct ActorHandle {
    cancel: CancellationToken,
}

impl ActorHandle {
    /// Create a new actor handle with a cancellation token.
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// Signal the actor to shut down. Safe to call more than once.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Check if shutdown has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
