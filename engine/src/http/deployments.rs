//! Deployment API client

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{debug, info};
use vercel_models::{CreateDeploymentRequest, Deployment, DeploymentEvent, InlinedFile};

use crate::errors::EngineError;
use crate::filesys::dir::Dir;
use crate::http::client::VercelClient;
use crate::http::lines::split_lines;
use crate::models::deployment::{DeploymentHandle, DeploymentSource, NewDeployment};

impl VercelClient {
    /// Create a deployment from inlined files
    pub async fn post_deployment(
        &self,
        deployment: &NewDeployment,
    ) -> Result<DeploymentHandle, EngineError> {
        let files = inline_files(&deployment.source).await?;
        info!(
            "Creating {:?} deployment for project {} ({} files)",
            deployment.target,
            deployment.project,
            files.len()
        );

        let body = CreateDeploymentRequest {
            name: deployment.project.clone(),
            project: deployment.project.clone(),
            target: deployment.target,
            files,
            project_settings: None,
        };

        let created: Deployment = self.post("/v13/deployments", &body).await?;
        debug!(
            "Deployment {} created in state {:?}",
            created.id, created.ready_state
        );

        Ok(DeploymentHandle {
            id: created.id,
            url: created.url,
            target: deployment.target,
        })
    }

    /// Get the current deployment object
    pub async fn get_deployment(&self, deployment_id: &str) -> Result<Deployment, EngineError> {
        self.get(&format!("/v13/deployments/{}", deployment_id)).await
    }

    /// Open the live, forward-ordered event feed of a deployment
    pub async fn follow_events(
        &self,
        deployment_id: &str,
    ) -> Result<BoxStream<'static, Result<String, EngineError>>, EngineError> {
        let path = format!("/v3/deployments/{}/events?follow=1&builds=1", deployment_id);
        let response = self.send_streaming(&path).await?;
        Ok(split_lines(response.bytes_stream().map(|chunk| chunk.map_err(EngineError::from))))
    }

    /// Fetch every event recorded so far
    pub async fn all_events(&self, deployment_id: &str) -> Result<Vec<DeploymentEvent>, EngineError> {
        let path = format!("/v3/deployments/{}/events?builds=1&limit=-1", deployment_id);
        let raw: Vec<serde_json::Value> = self.get(&path).await?;

        // Event kinds we do not model are skipped rather than failing the fetch
        Ok(raw
            .into_iter()
            .filter_map(|value| serde_json::from_value(value).ok())
            .collect())
    }
}

async fn inline_files(source: &DeploymentSource) -> Result<Vec<InlinedFile>, EngineError> {
    match source {
        DeploymentSource::Files(files) => Ok(files
            .iter()
            .map(|f| InlinedFile {
                file: f.path.clone(),
                data: f.content.clone(),
                encoding: "utf-8".to_string(),
            })
            .collect()),
        DeploymentSource::Directory(path) => {
            let dir = Dir::new(path);
            let mut files = Vec::new();
            for relative in dir.walk_files().await? {
                let bytes = dir.file(&relative).read_bytes().await?;
                files.push(InlinedFile {
                    file: relative,
                    data: BASE64.encode(bytes),
                    encoding: "base64".to_string(),
                });
            }
            Ok(files)
        }
    }
}
