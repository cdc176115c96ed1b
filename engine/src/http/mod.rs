//! Remote build platform client

pub mod client;
pub mod deployments;
pub mod lines;
pub mod projects;

use async_trait::async_trait;
use futures::stream::BoxStream;
use vercel_models::{Deployment, DeploymentEvent, Project, ProtectionSettings};

use crate::errors::EngineError;
use crate::http::client::VercelClient;
use crate::models::deployment::{DeploymentHandle, NewDeployment};

/// Line stream of a deployment's live event feed
pub type EventLines = BoxStream<'static, Result<String, EngineError>>;

/// Remote build platform operations used by the engine
///
/// Every call retries rate-limited and 5xx responses internally. Management
/// calls treat "already exists" and "already absent" as success.
#[async_trait]
pub trait RemoteBuildClient: Send + Sync {
    async fn create_deployment(&self, deployment: &NewDeployment) -> Result<DeploymentHandle, EngineError>;

    async fn get_status(&self, deployment_id: &str) -> Result<Deployment, EngineError>;

    async fn stream_events(&self, deployment_id: &str) -> Result<EventLines, EngineError>;

    async fn list_all_events(&self, deployment_id: &str) -> Result<Vec<DeploymentEvent>, EngineError>;

    async fn ensure_project(&self, name: &str) -> Result<Project, EngineError>;

    async fn delete_project(&self, name: &str) -> Result<(), EngineError>;

    async fn add_domain(&self, project: &str, domain: &str) -> Result<(), EngineError>;

    async fn upsert_env_var(&self, project: &str, key: &str, value: &str) -> Result<(), EngineError>;

    async fn update_protection(&self, project: &str, settings: &ProtectionSettings) -> Result<(), EngineError>;
}

#[async_trait]
impl RemoteBuildClient for VercelClient {
    async fn create_deployment(&self, deployment: &NewDeployment) -> Result<DeploymentHandle, EngineError> {
        self.post_deployment(deployment).await
    }

    async fn get_status(&self, deployment_id: &str) -> Result<Deployment, EngineError> {
        self.get_deployment(deployment_id).await
    }

    async fn stream_events(&self, deployment_id: &str) -> Result<EventLines, EngineError> {
        self.follow_events(deployment_id).await
    }

    async fn list_all_events(&self, deployment_id: &str) -> Result<Vec<DeploymentEvent>, EngineError> {
        self.all_events(deployment_id).await
    }

    async fn ensure_project(&self, name: &str) -> Result<Project, EngineError> {
        self.create_or_get_project(name).await
    }

    async fn delete_project(&self, name: &str) -> Result<(), EngineError> {
        self.remove_project(name).await
    }

    async fn add_domain(&self, project: &str, domain: &str) -> Result<(), EngineError> {
        self.attach_domain(project, domain).await
    }

    async fn upsert_env_var(&self, project: &str, key: &str, value: &str) -> Result<(), EngineError> {
        self.put_env_var(project, key, value).await
    }

    async fn update_protection(&self, project: &str, settings: &ProtectionSettings) -> Result<(), EngineError> {
        self.set_protection(project, settings).await
    }
}
