//! Workflow phase types and the phase state machine.

mod state;
mod types;

pub use state::{PhaseHistoryEntry, PhaseMachine};
pub use types::{FeatureId, PlanTopic, ProjectId, StreamId, StreamKey, TaskId, WorkflowPhase};
