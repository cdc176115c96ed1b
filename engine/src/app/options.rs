//! Engine configuration options

use std::time::Duration;

use crate::deploy::tracker::TrackerSettings;
use crate::http::client::RetryOptions;
use crate::logs::LogOptions;
use crate::pipeline::PipelineOptions;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;

/// Main engine options
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Logging configuration
    pub log: LogOptions,

    /// Deployment platform API
    pub vercel: VercelOptions,

    /// Retry policy of platform API calls
    pub retry: RetryOptions,

    /// Pipeline configuration
    pub pipeline: PipelineOptions,

    /// Buffered events per progress subscriber
    pub broadcast_capacity: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            log: LogOptions::default(),
            vercel: VercelOptions::default(),
            retry: RetryOptions::default(),
            pipeline: PipelineOptions::default(),
            broadcast_capacity: 256,
        }
    }
}

impl EngineOptions {
    /// Build options from a settings file and the storage layout
    pub fn from_settings(settings: &Settings, layout: &StorageLayout) -> Self {
        let defaults = Self::default();

        let workspace_dir = settings
            .workspace
            .base_dir
            .clone()
            .unwrap_or_else(|| layout.workspaces_dir().path().to_path_buf());

        Self {
            log: LogOptions {
                log_level: settings.log_level.clone(),
                json_format: settings.log_json,
                log_dir: Some(layout.logs_dir().path().to_path_buf()),
                ..defaults.log
            },
            vercel: VercelOptions {
                base_url: settings.vercel.base_url.clone(),
                team_id: settings.vercel.team_id.clone(),
                token_env: settings.vercel.token_env.clone(),
            },
            retry: RetryOptions {
                max_retries: settings.retry.max_retries,
                ..defaults.retry
            },
            pipeline: PipelineOptions {
                github_owner: settings.github.owner.clone(),
                workspace_dir,
                target: settings.vercel.target,
                tracker: TrackerSettings {
                    poll_interval: Duration::from_secs(settings.tracker.poll_interval_secs),
                    max_poll_attempts: settings.tracker.max_poll_attempts,
                    error_log_grace: Duration::from_secs(settings.tracker.error_log_grace_secs),
                },
            },
            broadcast_capacity: defaults.broadcast_capacity,
        }
    }
}

/// Deployment platform API options
#[derive(Debug, Clone)]
pub struct VercelOptions {
    /// API base URL
    pub base_url: String,

    /// Team the projects live in
    pub team_id: Option<String>,

    /// Environment variable holding the API token
    pub token_env: String,
}

impl Default for VercelOptions {
    fn default() -> Self {
        Self {
            base_url: "https://api.vercel.com".to_string(),
            team_id: None,
            token_env: "VERCEL_TOKEN".to_string(),
        }
    }
}
