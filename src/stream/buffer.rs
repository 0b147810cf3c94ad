//! Bounded ring buffers for streamed activity.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Cap of the activity log.
pub const ACTIVITY_LOG_CAP: usize = 50;
/// Cap of the file-activity buffer.
pub const FILE_ACTIVITY_CAP: usize = 50;
/// Cap of the agent-activity buffer.
pub const AGENT_ACTIVITY_CAP: usize = 100;

/// Fixed-capacity FIFO that evicts its oldest entry on overflow.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedLog<T> {
    items: VecDeque<T>,
    cap: usize,
}

impl<T> BoundedLog<T> {
    pub fn new(cap: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(cap),
            cap,
        }
    }

    pub fn push(&mut self, item: T) {
        if self.cap == 0 {
            return;
        }
        if self.items.len() == self.cap {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn last_mut(&mut self) -> Option<&mut T> {
        self.items.back_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// Severity/category of an activity log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Step,
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
}

impl ActivityLogEntry {
    pub fn new(kind: ActivityKind, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }
}

/// A file operation reported by the agent (read, edit, search, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileActivityEntry {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default)]
    pub done: bool,
}

impl FileActivityEntry {
    /// The file or glob the operation acts on; a path wins over a pattern.
    pub fn target(&self) -> Option<&str> {
        self.path.as_deref().or(self.pattern.as_deref())
    }

    /// Whether `self` is the finishing record of the in-flight `started` one.
    pub fn finishes(&self, started: &FileActivityEntry) -> bool {
        self.done
            && !started.done
            && self.action == started.action
            && self.target().is_some()
            && self.target() == started.target()
    }
}

impl BoundedLog<FileActivityEntry> {
    /// Append a file activity, collapsing a start/finish pair into one row.
    pub fn record(&mut self, entry: FileActivityEntry) {
        if let Some(last) = self.last_mut() {
            if entry.finishes(last) {
                *last = entry;
                return;
            }
        }
        self.push(entry);
    }
}

/// Free-form agent activity record; the runner's fields are kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AgentActivityEntry {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl AgentActivityEntry {
    /// Short human label: `message`, `text` or `type`, whichever is present.
    pub fn label(&self) -> Option<&str> {
        ["message", "text", "type"]
            .iter()
            .find_map(|key| self.fields.get(*key).and_then(Value::as_str))
    }
}
