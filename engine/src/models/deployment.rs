//! Deployment models

use serde::{Deserialize, Serialize};

pub use vercel_models::Target as DeploymentTarget;

/// A deployment created on the platform for one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentHandle {
    /// Platform deployment ID
    pub id: String,

    /// Deployment URL, without scheme as returned by the platform
    pub url: Option<String>,

    /// Target the deployment was created against
    pub target: DeploymentTarget,
}

/// Terminal status of a tracked deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Ready,
    Error,
    Canceled,
    Timeout,
}

/// Result of waiting for a deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentOutcome {
    pub deployment_id: String,

    pub status: OutcomeStatus,

    /// Always set when `status` is `Error`
    pub error: Option<String>,

    pub build_logs: Vec<String>,

    pub url: Option<String>,
}

impl DeploymentOutcome {
    pub fn is_ready(&self) -> bool {
        self.status == OutcomeStatus::Ready
    }
}

/// Where the files of a new deployment come from
#[derive(Debug, Clone)]
pub enum DeploymentSource {
    /// Files held in memory
    Files(Vec<crate::models::content::GeneratedFile>),

    /// A materialized directory, uploaded file by file
    Directory(std::path::PathBuf),
}

/// Parameters of a deployment creation
#[derive(Debug, Clone)]
pub struct NewDeployment {
    /// Project name or ID
    pub project: String,

    pub source: DeploymentSource,

    pub target: DeploymentTarget,
}
