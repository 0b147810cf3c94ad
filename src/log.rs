//! Structured logging for debugging agentflow.
//!
//! Records go to `~/.agentflow/agentflow.log`, truncated on startup.
//!
//! Level guide:
//! - ERROR: failures that stop an operation
//! - WARN: recoverable surprises (stream lost, backend-reported errors)
//! - INFO: phase changes, stream open/close, queue progress
//! - DEBUG: commands, validation rejections, config
//! - TRACE: every decoded or dropped stream event
//!
//! Debug mode can be enabled with `--debug` flag or `AGENTFLOW_DEBUG=1` env var.
//! `RUST_LOG` takes precedence over both when set.

use std::fs::File;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::config::Config;

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

/// Initialize logging to ~/.agentflow/agentflow.log
pub fn init() {
    init_with_debug(false);
}

/// Initialize logging with explicit debug mode setting.
pub fn init_with_debug(debug: bool) {
    let debug_enabled = debug || env_debug();
    DEBUG_ENABLED.store(debug_enabled, Ordering::SeqCst);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug_enabled)));

    let Some(file) = open_log_file() else {
        // No home directory: fall back to stderr so nothing is silently lost.
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .with(filter)
            .try_init();
        return;
    };

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .with(filter)
        .try_init();
}

/// Check if debug mode is enabled.
pub fn is_debug() -> bool {
    DEBUG_ENABLED.load(Ordering::Relaxed)
}

fn env_debug() -> bool {
    std::env::var("AGENTFLOW_DEBUG")
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false)
}

fn default_directive(debug: bool) -> &'static str {
    if debug {
        "agentflow=debug"
    } else {
        "agentflow=info"
    }
}

fn open_log_file() -> Option<File> {
    let path = Config::log_path().ok()?;
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).ok()?;
    }
    // Truncate file on startup
    File::create(path).ok()
}
