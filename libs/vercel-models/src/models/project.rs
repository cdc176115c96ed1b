use serde::{Deserialize, Serialize};

/// `POST /v10/projects` body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
}

/// Project object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
}

/// `POST /v10/projects/{id}/domains` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddDomainRequest {
    pub name: String,
}

/// Environment variable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvVar {
    pub key: String,
    pub value: String,

    /// `plain`, `encrypted` or `sensitive`
    #[serde(rename = "type")]
    pub var_type: String,

    pub target: Vec<String>,
}

/// Protection settings for `PATCH /v9/projects/{id}`
///
/// A `None` field serializes as `null`, which disables that protection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectionSettings {
    pub sso_protection: Option<serde_json::Value>,
    pub password_protection: Option<serde_json::Value>,
}
