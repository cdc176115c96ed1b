//! Outcome of best-effort side effects

use tracing::warn;

use crate::errors::EngineError;

/// Result of an operation whose failure must not fail the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoftResult<T = ()> {
    Ok(T),
    SoftFailure(String),
}

impl<T> SoftResult<T> {
    /// Convert a fallible call, logging the failure
    pub fn from_result(result: Result<T, EngineError>, action: &str) -> Self {
        match result {
            Ok(value) => SoftResult::Ok(value),
            Err(e) => {
                warn!("Failed to {}: {}", action, e);
                SoftResult::SoftFailure(format!("failed to {}: {}", action, e))
            }
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, SoftResult::Ok(_))
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            SoftResult::Ok(_) => None,
            SoftResult::SoftFailure(reason) => Some(reason),
        }
    }
}
