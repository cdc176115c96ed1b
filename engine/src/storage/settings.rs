//! Settings file management

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::EngineError;
use crate::filesys::file::File;
use crate::logs::LogLevel;
use crate::models::deployment::DeploymentTarget;

/// Engine settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON logs on stdout
    #[serde(default)]
    pub log_json: bool,

    /// Deployment platform configuration
    #[serde(default)]
    pub vercel: VercelSettings,

    /// Repository host configuration
    #[serde(default)]
    pub github: GithubSettings,

    /// Deployment tracking
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// API retry policy
    #[serde(default)]
    pub retry: RetrySettings,

    /// Deployment workspaces
    #[serde(default)]
    pub workspace: WorkspaceSettings,
}

/// Deployment platform settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VercelSettings {
    #[serde(default = "default_vercel_url")]
    pub base_url: String,

    #[serde(default)]
    pub team_id: Option<String>,

    /// Environment variable holding the API token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    #[serde(default)]
    pub target: DeploymentTarget,
}

fn default_vercel_url() -> String {
    "https://api.vercel.com".to_string()
}

fn default_token_env() -> String {
    "VERCEL_TOKEN".to_string()
}

impl Default for VercelSettings {
    fn default() -> Self {
        Self {
            base_url: default_vercel_url(),
            team_id: None,
            token_env: default_token_env(),
            target: DeploymentTarget::Production,
        }
    }
}

/// Repository host settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubSettings {
    /// Account owning site repositories
    #[serde(default = "default_github_owner")]
    pub owner: String,
}

fn default_github_owner() -> String {
    "docsite".to_string()
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            owner: default_github_owner(),
        }
    }
}

/// Deployment tracking settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,

    #[serde(default = "default_error_log_grace")]
    pub error_log_grace_secs: u64,
}

fn default_poll_interval() -> u64 {
    5
}

fn default_max_poll_attempts() -> u32 {
    120
}

fn default_error_log_grace() -> u64 {
    3
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            max_poll_attempts: default_max_poll_attempts(),
            error_log_grace_secs: default_error_log_grace(),
        }
    }
}

/// API retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_retries() -> u32 {
    3
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
        }
    }
}

/// Workspace settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceSettings {
    /// Parent of temporary workspaces; the storage layout decides if unset
    #[serde(default)]
    pub base_dir: Option<PathBuf>,
}

/// Load settings, falling back to defaults when the file does not exist
pub async fn load_settings(file: &File) -> Result<Settings, EngineError> {
    if !file.exists().await {
        info!("No settings file at {}, using defaults", file.path().display());
        return Ok(Settings::default());
    }
    file.read_json().await
}
