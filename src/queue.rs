//! FIFO of tasks waiting to run.

use std::collections::VecDeque;

use crate::workflow::TaskId;

/// Task ids awaiting sequential execution.
///
/// At most one task from the queue runs at a time; the orchestrator pops the
/// next id only after the previous task's stream has finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQueue {
    pending: VecDeque<TaskId>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop whatever is queued and enqueue `ids` in order.
    pub fn replace<I: IntoIterator<Item = TaskId>>(&mut self, ids: I) {
        self.pending.clear();
        self.pending.extend(ids);
    }

    pub fn pop(&mut self) -> Option<TaskId> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn to_vec(&self) -> Vec<TaskId> {
        self.pending.iter().cloned().collect()
    }
}

impl From<Vec<TaskId>> for TaskQueue {
    fn from(ids: Vec<TaskId>) -> Self {
        Self {
            pending: ids.into(),
        }
    }
}
