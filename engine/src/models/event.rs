//! Build events pushed to live observers

use serde::{Deserialize, Serialize};
use vercel_models::ReadyState;

/// Output stream a build log line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    Stdout,
    Stderr,
    Fatal,
    Command,
}

/// Transient notification for the progress broadcaster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BuildEvent {
    /// A pipeline step is starting
    Step {
        step: usize,
        total: usize,
        message: String,
    },

    /// A remote build log line
    Log { stream: LogStream, text: String },

    /// The remote deployment changed state
    State { state: ReadyState },

    /// The pipeline finished successfully
    Completed { url: Option<String> },

    /// The pipeline failed or was cancelled
    Failed { error: String },
}
