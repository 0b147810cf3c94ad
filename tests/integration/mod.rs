//! Integration test suite for agentflow.
//!
//! These tests drive the [`agentflow::Orchestrator`] end to end: real stream
//! reader actors, the real update function and a scripted in-memory runner
//! standing in for the HTTP backend.
//!
//! # Test Categories
//!
//! - `workflow_e2e`: Prompt to plan to sequential task execution, assessment, chat
//! - `cancellation`: Cancel, stale streams and the prioritize timeout
//!
//! # CI Compatibility
//!
//! No network access is needed; every runner response is scripted.

mod fixtures;

mod cancellation;
mod workflow_e2e;
