use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::{Error, Result};

const DEFAULT_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_PROJECT_TYPE: &str = "existing";
const DEFAULT_PRIORITIZE_TIMEOUT_SECS: u64 = 90;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Root URL of the agent runner.
    pub base_url: Option<String>,
    /// Sent as `projectType` on every start call.
    pub project_type: Option<String>,
    /// Project opened when the CLI is not given `--project`.
    pub project_id: Option<String>,
    pub prioritize_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn agentflow_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".agentflow"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::agentflow_dir()?.join("agentflow.toml"))
    }

    pub fn log_path() -> Result<PathBuf> {
        Ok(Self::agentflow_dir()?.join("agentflow.log"))
    }

    pub fn effective_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn effective_project_type(&self) -> &str {
        self.project_type.as_deref().unwrap_or(DEFAULT_PROJECT_TYPE)
    }

    pub fn prioritize_timeout(&self) -> Duration {
        Duration::from_secs(
            self.prioritize_timeout_secs
                .unwrap_or(DEFAULT_PRIORITIZE_TIMEOUT_SECS),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "Config::load");
        if !path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        debug!(
            base_url = config.effective_base_url(),
            project_type = config.effective_project_type(),
            "Config loaded"
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                debug!(dir = %dir.display(), "Creating config directory");
                fs::create_dir_all(dir)?;
            }
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        debug!(path = %path.display(), "Config saved");
        Ok(())
    }
}
