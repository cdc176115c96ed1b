use serde::{Deserialize, Serialize};

/// Deployment build state as reported by `readyState`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReadyState {
    Queued,
    Initializing,
    Building,
    Ready,
    Error,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl ReadyState {
    /// Whether no further progress happens after this state
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReadyState::Ready | ReadyState::Error | ReadyState::Canceled)
    }
}

/// Deployment target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    #[default]
    Production,
    Preview,
}

/// A single inlined file of a deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlinedFile {
    /// Path relative to the deployment root
    pub file: String,

    /// File contents
    pub data: String,

    /// `base64` or `utf-8`
    pub encoding: String,
}

/// Project settings sent with a deployment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_command: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_directory: Option<String>,
}

/// `POST /v13/deployments` body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeploymentRequest {
    pub name: String,

    pub project: String,

    pub target: Target,

    pub files: Vec<InlinedFile>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_settings: Option<ProjectSettings>,
}

/// Deployment object returned by create and get calls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub id: String,

    #[serde(default)]
    pub url: Option<String>,

    pub ready_state: ReadyState,

    #[serde(default)]
    pub error_code: Option<String>,

    #[serde(default)]
    pub error_message: Option<String>,

    #[serde(default)]
    pub error_step: Option<String>,
}
