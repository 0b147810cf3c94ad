pub mod api;
pub mod assessment;
pub mod config;
pub mod error;
pub mod log;
pub mod queue;
pub mod stream;
pub mod util;
pub mod workflow;

// Model / update / runtime split
pub mod actors;
pub mod app;
pub mod tea;

pub use app::Orchestrator;
pub use error::{Error, Result};
