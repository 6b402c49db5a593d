//! Ambient configuration (spec §4.9): the `RunnerConfig` TOML document
//! controlling remote-session parameters and backend selection.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackendKind {
    Live,
    Mock,
}

impl Default for SessionBackendKind {
    fn default() -> Self {
        // A freshly-configured controller cannot accidentally mutate a
        // live firewall without an explicit `backend = "live"`.
        SessionBackendKind::Mock
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default = "default_repo_dir")]
    pub repo_dir: PathBuf,
    #[serde(default = "default_remote_user")]
    pub remote_user: String,
    #[serde(default = "default_op_timeout_secs")]
    pub op_timeout_secs: u64,
    #[serde(default = "default_step_deadline_secs")]
    pub step_deadline_secs: u64,
    #[serde(default)]
    pub backend: SessionBackendKind,
    #[serde(default)]
    pub fixtures_dir: Option<PathBuf>,
}

fn default_repo_dir() -> PathBuf {
    PathBuf::from("./firewall")
}

fn default_remote_user() -> String {
    "firelet".to_string()
}

fn default_op_timeout_secs() -> u64 {
    5
}

fn default_step_deadline_secs() -> u64 {
    60
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            repo_dir: default_repo_dir(),
            remote_user: default_remote_user(),
            op_timeout_secs: default_op_timeout_secs(),
            step_deadline_secs: default_step_deadline_secs(),
            backend: SessionBackendKind::default(),
            fixtures_dir: None,
        }
    }
}

impl RunnerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<RunnerConfig> {
        let contents = fs::read_to_string(path)?;
        let config: RunnerConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn from_str(contents: &str) -> Result<RunnerConfig> {
        let config: RunnerConfig = toml::from_str(contents)?;
        Ok(config)
    }

    pub fn fixtures_dir(&self) -> PathBuf {
        self.fixtures_dir
            .clone()
            .unwrap_or_else(|| self.repo_dir.clone())
    }
}
