//! Streaming protocol client: SSE framing, typed events and bounded buffers.

pub mod buffer;
pub mod event;
pub mod sse;

pub use buffer::{
    ActivityKind, ActivityLogEntry, AgentActivityEntry, BoundedLog, FileActivityEntry,
    ACTIVITY_LOG_CAP, AGENT_ACTIVITY_CAP, FILE_ACTIVITY_CAP,
};
pub use event::{append_fragment, decode, OutputKind, StreamEvent};
pub use sse::{frames, SseDecoder, SseFrame};
