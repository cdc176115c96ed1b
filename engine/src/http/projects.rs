//! Project, domain and environment API client

use tracing::{debug, info};
use vercel_models::{AddDomainRequest, CreateProjectRequest, EnvVar, Project, ProtectionSettings};

use crate::errors::EngineError;
use crate::http::client::VercelClient;

impl VercelClient {
    /// Create a project, or return the existing one with the same name
    pub async fn create_or_get_project(&self, name: &str) -> Result<Project, EngineError> {
        let body = CreateProjectRequest {
            name: name.to_string(),
            framework: None,
        };

        match self.post::<Project, _>("/v10/projects", &body).await {
            Ok(project) => {
                info!("Created project {} ({})", project.name, project.id);
                Ok(project)
            }
            Err(e) if e.is_conflict() => {
                debug!("Project {} already exists", name);
                self.get(&format!("/v9/projects/{}", name)).await
            }
            Err(e) => Err(e),
        }
    }

    /// Delete a project; a missing project counts as deleted
    pub async fn remove_project(&self, name: &str) -> Result<(), EngineError> {
        match self.delete(&format!("/v9/projects/{}", name)).await {
            Err(e) if e.is_not_found() => {
                debug!("Project {} already absent", name);
                Ok(())
            }
            other => other,
        }
    }

    /// Attach a domain; an already attached domain counts as success
    pub async fn attach_domain(&self, project: &str, domain: &str) -> Result<(), EngineError> {
        let body = AddDomainRequest {
            name: domain.to_string(),
        };
        match self
            .post::<serde_json::Value, _>(&format!("/v10/projects/{}/domains", project), &body)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_conflict() => {
                debug!("Domain {} already attached to {}", domain, project);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Create or replace an encrypted environment variable
    pub async fn put_env_var(&self, project: &str, key: &str, value: &str) -> Result<(), EngineError> {
        let body = EnvVar {
            key: key.to_string(),
            value: value.to_string(),
            var_type: "encrypted".to_string(),
            target: vec!["production".to_string(), "preview".to_string()],
        };
        let _: serde_json::Value = self
            .post(&format!("/v10/projects/{}/env?upsert=true", project), &body)
            .await?;
        Ok(())
    }

    /// Update deployment protection of a project
    pub async fn set_protection(
        &self,
        project: &str,
        settings: &ProtectionSettings,
    ) -> Result<(), EngineError> {
        let _: serde_json::Value = self
            .patch(&format!("/v9/projects/{}", project), settings)
            .await?;
        Ok(())
    }
}
