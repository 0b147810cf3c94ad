//! The Elm Architecture (TEA) implementation for the orchestrator.
//!
//! This module provides a clean separation of concerns:
//! - `Model`: Pure orchestrator state
//! - `Message`: Inputs to the update function
//! - `Command`: Outputs (side effects) from the update function
//! - `update`: Pure function that transforms state

pub mod command;
pub mod message;
pub mod model;
pub mod update;

pub use command::Command;
pub use message::Message;
pub use model::{
    summary_text, ActiveStream, Model, Notification, NotificationLevel, PendingQuestion, Transient,
};
pub use update::{update, CONNECTION_LOST, NO_OUTPUT};
