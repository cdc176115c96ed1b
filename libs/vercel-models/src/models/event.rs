use serde::{Deserialize, Serialize};

use crate::models::ReadyState;

/// Build event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    Stdout,
    Stderr,
    Fatal,
    Command,
    #[serde(alias = "deployment-state")]
    StateChange,
    #[serde(other)]
    Other,
}

/// Nested info block carried by state events
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInfo {
    #[serde(default)]
    pub ready_state: Option<ReadyState>,
}

/// Event payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    #[serde(default)]
    pub text: Option<String>,

    #[serde(default)]
    pub ready_state: Option<ReadyState>,

    #[serde(default)]
    pub info: Option<EventInfo>,
}

/// One line of `GET /v3/deployments/{id}/events`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,

    #[serde(default)]
    pub created: Option<i64>,

    #[serde(default)]
    pub payload: EventPayload,

    /// Some API versions put the text at the top level
    #[serde(default)]
    pub text: Option<String>,
}

impl DeploymentEvent {
    /// Textual content of the event, if any
    pub fn text(&self) -> Option<&str> {
        self.payload
            .text
            .as_deref()
            .or(self.text.as_deref())
    }

    /// Ready state announced by a state event, if any
    pub fn ready_state(&self) -> Option<ReadyState> {
        self.payload
            .ready_state
            .or_else(|| self.payload.info.as_ref().and_then(|i| i.ready_state))
    }
}
