//! Typed stream events.
//!
//! [`decode`] maps one SSE frame to a [`StreamEvent`]. It never fails: a
//! frame that cannot be understood is dropped (`None`) and the stream keeps
//! going. The `error` event is the exception, it is terminal even when its
//! payload is garbage.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::trace;

use crate::api::{value_text, DonePayload};

use super::buffer::{AgentActivityEntry, FileActivityEntry};

/// Kind of an `output` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputKind {
    /// Model reasoning, accumulated into the streamed text.
    Thinking,
    /// Anything else (`stdout`, `text`, ...), kept verbatim.
    Other(String),
}

impl OutputKind {
    fn from_wire(kind: &str) -> Self {
        match kind {
            "thinking" => OutputKind::Thinking,
            other => OutputKind::Other(other.to_string()),
        }
    }
}

/// A decoded server-pushed event.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Folder { path: String },
    Prompt { prompt: String },
    Step { step: String, message: Option<String> },
    Status { message: String },
    AgentActivity(AgentActivityEntry),
    FileActivity(FileActivityEntry),
    Output { kind: OutputKind, text: String },
    Done(DonePayload),
    Error { message: Option<String> },
}

impl StreamEvent {
    /// `done` and `error` end the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done(_) | StreamEvent::Error { .. })
    }

    /// Status line shown for a `step` event.
    pub fn step_status(step: &str, message: Option<&str>) -> String {
        match message {
            Some(message) if !message.is_empty() => message.to_string(),
            _ => format!("Step: {}", step),
        }
    }
}

#[derive(Deserialize)]
struct FolderPayload {
    #[serde(alias = "folder")]
    path: String,
}

#[derive(Deserialize)]
struct PromptPayload {
    #[serde(alias = "text")]
    prompt: String,
}

#[derive(Deserialize)]
struct StepPayload {
    step: Value,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct StatusPayload {
    #[serde(alias = "status")]
    message: String,
}

#[derive(Deserialize)]
struct OutputPayload {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(alias = "content", alias = "data")]
    text: String,
}

fn parse<T: DeserializeOwned>(data: &str) -> Option<T> {
    serde_json::from_str(data).ok()
}

/// Decode one named frame into a typed event.
pub fn decode(name: &str, data: &str) -> Option<StreamEvent> {
    let event = match name {
        "folder" => parse::<FolderPayload>(data).map(|p| StreamEvent::Folder { path: p.path }),
        "prompt" => parse::<PromptPayload>(data).map(|p| StreamEvent::Prompt { prompt: p.prompt }),
        "step" => parse::<StepPayload>(data).and_then(|p| {
            value_text(&p.step).map(|step| StreamEvent::Step {
                step,
                message: p.message,
            })
        }),
        "status" => {
            parse::<StatusPayload>(data).map(|p| StreamEvent::Status { message: p.message })
        }
        "agentActivity" => parse::<AgentActivityEntry>(data).map(StreamEvent::AgentActivity),
        "fileActivity" => parse::<FileActivityEntry>(data).map(StreamEvent::FileActivity),
        "output" => parse::<OutputPayload>(data).map(|p| StreamEvent::Output {
            kind: OutputKind::from_wire(&p.kind),
            text: p.text,
        }),
        "done" => parse::<DonePayload>(data).map(StreamEvent::Done),
        "error" => {
            let message = parse::<Value>(data)
                .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
                .filter(|m| !m.is_empty());
            return Some(StreamEvent::Error { message });
        }
        other => {
            trace!(event = other, "ignoring unknown stream event");
            return None;
        }
    };

    if event.is_none() {
        trace!(event = name, data, "dropping malformed stream event");
    }
    event
}

fn is_boundary(c: char) -> bool {
    c.is_whitespace() || matches!(c, '.' | '!' | '?' | ',' | ';' | ':')
}

/// Append a thinking fragment, inserting one space only where two words
/// would otherwise run together.
pub fn append_fragment(buffer: &mut String, fragment: &str) {
    if fragment.is_empty() {
        return;
    }
    if let (Some(prev), Some(next)) = (buffer.chars().last(), fragment.chars().next()) {
        if !is_boundary(prev) && !is_boundary(next) {
            buffer.push(' ');
        }
    }
    buffer.push_str(fragment);
}
