//! Phase state machine with transition validation.
//!
//! `PhaseMachine` owns the single active [`WorkflowPhase`] and the `waiting`
//! flag that tells the surface whether a stream is in flight for it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::stream::BoundedLog;

use super::WorkflowPhase;

const PHASE_HISTORY_CAP: usize = 100;

/// A record of a phase transition with timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseHistoryEntry {
    /// The phase that was entered.
    pub phase: WorkflowPhase,
    /// When this phase was entered.
    pub entered_at: DateTime<Utc>,
}

/// Owns the current phase and enforces valid transitions.
///
/// Valid transitions:
///
/// ```text
/// idle ──► questions ──► plan ──► task ──► task ... ──► plan (review)
///  │  ▲        │          │ ▲       │
///  │  └────────┴──────────┘ └───────┘
///  ├──► assess ──► idle        (also plan ──► assess ──► plan)
///  ├──► prioritize ──► idle
///  ├──► test ──► idle
///  └──► task                    (single task re-run)
/// ```
#[derive(Debug, Clone)]
pub struct PhaseMachine {
    phase: WorkflowPhase,
    waiting: bool,
    history: BoundedLog<PhaseHistoryEntry>,
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseMachine {
    /// Create a machine resting in `Idle`.
    pub fn new() -> Self {
        let mut history = BoundedLog::new(PHASE_HISTORY_CAP);
        history.push(PhaseHistoryEntry {
            phase: WorkflowPhase::Idle,
            entered_at: Utc::now(),
        });
        Self {
            phase: WorkflowPhase::Idle,
            waiting: false,
            history,
        }
    }

    /// Check if a transition to the target phase is valid from the current phase.
    pub fn can_transition(&self, target: WorkflowPhase) -> bool {
        use WorkflowPhase::*;
        matches!(
            (self.phase, target),
            (Idle, Questions)
                | (Plan, Questions)
                | (Questions, Plan)
                | (Plan, Plan)
                | (Plan, Task)
                | (Idle, Task)
                | (Task, Task)
                | (Task, Plan)
                | (Idle, Assess)
                | (Plan, Assess)
                | (Assess, Idle)
                | (Assess, Plan)
                | (Idle, Prioritize)
                | (Prioritize, Idle)
                | (Idle, Test)
                | (Test, Idle)
                | (Questions, Idle)
                | (Plan, Idle)
        )
    }

    /// Enter a stream-backed phase: transition and set `waiting`.
    pub fn begin(&mut self, target: WorkflowPhase) -> Result<()> {
        self.transition(target)?;
        self.waiting = true;
        Ok(())
    }

    /// Return to a resting phase (`idle` or plan review) without waiting.
    pub fn settle(&mut self, target: WorkflowPhase) -> Result<()> {
        if self.phase == target {
            self.waiting = false;
            return Ok(());
        }
        self.transition(target)?;
        self.waiting = false;
        Ok(())
    }

    /// Mark the phase's stream as finished.
    ///
    /// Returns `true` only for the call that actually flipped `waiting`.
    pub fn finish(&mut self) -> bool {
        std::mem::replace(&mut self.waiting, false)
    }

    fn transition(&mut self, target: WorkflowPhase) -> Result<()> {
        if !self.can_transition(target) {
            return Err(Error::InvalidPhaseTransition {
                from: self.phase.to_string(),
                to: target.to_string(),
            });
        }

        self.phase = target;
        self.history.push(PhaseHistoryEntry {
            phase: target,
            entered_at: Utc::now(),
        });

        Ok(())
    }

    /// Get the current phase.
    pub fn phase(&self) -> WorkflowPhase {
        self.phase
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting
    }

    /// Get the history of phases visited, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &PhaseHistoryEntry> {
        self.history.iter()
    }
}
