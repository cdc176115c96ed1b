//! Error types for the docsite engine

use thiserror::Error;

/// Main error type for the docsite engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Vercel API error ({status}): {body}")]
    RemoteError { status: u16, body: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Generation error: {0}")]
    GenerateError(String),

    #[error("Publish error: {0}")]
    PublishError(String),

    #[error("Vercel deployment failed: {0}")]
    DeployFailed(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// HTTP status of a remote API failure, if this is one
    pub fn remote_status(&self) -> Option<u16> {
        match self {
            EngineError::RemoteError { status, .. } => Some(*status),
            EngineError::HttpError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether a remote call failed because the resource does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(_)) || self.remote_status() == Some(404)
    }

    /// Whether a remote call failed because the resource already exists
    pub fn is_conflict(&self) -> bool {
        self.remote_status() == Some(409)
    }
}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::Internal(err.to_string())
    }
}
