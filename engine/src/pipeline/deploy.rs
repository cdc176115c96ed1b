//! Steps shared by both flows: generation, deployment and site access

use std::sync::Arc;

use tracing::{debug, info};
use vercel_models::{Project, ProtectionSettings};

use crate::deploy::tracker::FALLBACK_ERROR_MESSAGE;
use crate::deploy::workspace::TempWorkspace;
use crate::errors::EngineError;
use crate::models::content::GeneratedFile;
use crate::models::deployment::{DeploymentOutcome, DeploymentSource, NewDeployment};
use crate::models::site::SiteMetadata;
use crate::pipeline::drift::{compute_config_hashes, preserve_drifted};
use crate::pipeline::observer::SiteObserver;
use crate::pipeline::{Pipeline, RunContext, SoftResult};
use crate::services::generator::GenerateOptions;

impl Pipeline {
    /// Run the generator and hash the config files it produced
    pub(crate) async fn generate_files(&self, ctx: &mut RunContext) -> Result<(), EngineError> {
        let options = GenerateOptions {
            migrate_theme: ctx.options.migrate_theme,
            drifted_paths: ctx.drifted.clone(),
        };

        let mut generated = self
            .services
            .generator
            .generate(&ctx.site, &ctx.articles, &options)
            .await?;
        if generated.files.is_empty() {
            return Err(EngineError::GenerateError(
                "generator produced no files".to_string(),
            ));
        }

        let mut hashes = compute_config_hashes(&generated.files);
        if !ctx.options.migrate_theme && !ctx.drifted.is_empty() {
            let stored = ctx.site.metadata.config_hashes.clone().unwrap_or_default();
            preserve_drifted(&mut generated.files, &mut hashes, &ctx.drifted, &stored);
        }

        debug!(
            site_id = %ctx.site_id(),
            files = generated.files.len(),
            "Generated site files"
        );
        ctx.generated = generated;
        ctx.config_hashes = hashes;
        Ok(())
    }

    /// Provision the project and deploy a file set through a workspace
    pub(crate) async fn deploy(
        &self,
        ctx: &mut RunContext,
        files: Vec<GeneratedFile>,
    ) -> Result<(), EngineError> {
        let site_id = ctx.site_id().to_string();

        let project = self.client.ensure_project(&ctx.site.slug).await?;
        self.persist(
            &site_id,
            SiteMetadata {
                vercel_project_id: Some(project.id.clone()),
                vercel_project_name: Some(project.name.clone()),
                ..Default::default()
            },
        )
        .await?;

        if let Some(keys) = &ctx.site.metadata.auth_keys {
            for (key, value) in keys {
                self.client.upsert_env_var(&project.id, key, value).await?;
            }
            debug!(site_id = %site_id, count = keys.len(), "Synced environment variables");
        }
        ctx.project = Some(project.clone());

        let workspace =
            TempWorkspace::create(&self.options.workspace_dir, &site_id, self.registry.clone())
                .await?;
        let result = self.deploy_from(ctx, &workspace, &project, &files).await;
        workspace.cleanup().await;
        let outcome = result?;

        ctx.deployment = Some(outcome.clone());
        if !outcome.is_ready() {
            let error = outcome
                .error
                .unwrap_or_else(|| FALLBACK_ERROR_MESSAGE.to_string());
            return Err(EngineError::DeployFailed(error));
        }

        let url = outcome.url.as_deref().map(public_url);
        info!(site_id = %site_id, url = ?url, "Deployment ready");
        self.persist(
            &site_id,
            SiteMetadata {
                deployment_url: url.clone(),
                ..Default::default()
            },
        )
        .await?;
        ctx.deployment_url = url;
        Ok(())
    }

    async fn deploy_from(
        &self,
        ctx: &RunContext,
        workspace: &TempWorkspace,
        project: &Project,
        files: &[GeneratedFile],
    ) -> Result<DeploymentOutcome, EngineError> {
        let site_id = ctx.site_id();
        workspace.materialize(files).await?;

        let handle = self
            .client
            .create_deployment(&NewDeployment {
                project: project.name.clone(),
                source: DeploymentSource::Directory(workspace.path().to_path_buf()),
                target: self.options.target,
            })
            .await?;
        info!(site_id, deployment_id = %handle.id, "Deployment created");

        self.persist(
            site_id,
            SiteMetadata {
                production_deployment_id: Some(handle.id.clone()),
                ..Default::default()
            },
        )
        .await?;

        let observer = Arc::new(SiteObserver::new(site_id, self.services.broadcaster.clone()));
        let settings = ctx
            .options
            .tracker
            .as_ref()
            .unwrap_or(self.tracker.settings());
        let mut outcome = self.tracker.wait_with(&handle.id, settings, observer).await;

        if outcome.url.is_none() {
            outcome.url = handle.url;
        }
        Ok(outcome)
    }

    /// Make the site public and attach custom domains, best effort
    pub(crate) async fn protect(&self, ctx: &mut RunContext) {
        let Some(project) = ctx.project.clone() else {
            return;
        };

        let mut results = vec![SoftResult::from_result(
            self.client
                .update_protection(&project.id, &ProtectionSettings::default())
                .await,
            "disable deployment protection",
        )];

        for domain in ctx.site.metadata.custom_domains.iter().flatten() {
            results.push(SoftResult::from_result(
                self.client.add_domain(&project.id, domain).await,
                &format!("attach domain {}", domain),
            ));
        }

        ctx.soft_failures.extend(
            results
                .iter()
                .filter_map(|r| r.failure().map(str::to_string)),
        );
    }
}

/// Deployment URLs come back without a scheme
pub fn public_url(url: &str) -> String {
    if url.starts_with("https://") || url.starts_with("http://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}
