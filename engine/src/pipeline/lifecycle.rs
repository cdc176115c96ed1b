//! Run completion, cancellation and teardown

use chrono::Utc;
use tracing::{error, info, warn};

use crate::deploy::workspace::release_workspace;
use crate::errors::EngineError;
use crate::models::event::BuildEvent;
use crate::models::site::{Site, SiteMetadata, SiteStatus};
use crate::pipeline::{Pipeline, RunContext, SoftResult};
use crate::services::publisher::Repository;
use crate::services::store::{load_site, modify_site};

pub const CANCELLED_MESSAGE: &str = "Build cancelled by user";

/// Whether the last write on the site was a user cancellation
///
/// Completion writes of a cancelled run are dropped so the cancellation
/// stays the final state.
pub(crate) fn was_cancelled(site: &Site) -> bool {
    site.status == SiteStatus::Error
        && site.metadata.last_build_error.as_deref() == Some(CANCELLED_MESSAGE)
}

/// Result of a site teardown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Teardown {
    pub repository: SoftResult,
    pub project: SoftResult,
}

impl Pipeline {
    /// Merge the results of a successful run and mark the site live
    pub(crate) async fn finalize_site(&self, ctx: &mut RunContext) -> Result<(), EngineError> {
        ctx.finalized = true;
        let site_id = ctx.site_id().to_string();

        let results = SiteMetadata {
            github_repo: ctx.repository.as_ref().map(Repository::full_name),
            github_repo_url: ctx.repository.as_ref().map(|r| r.html_url.clone()),
            vercel_project_id: ctx.project.as_ref().map(|p| p.id.clone()),
            vercel_project_name: ctx.project.as_ref().map(|p| p.name.clone()),
            production_deployment_id: ctx.deployment.as_ref().map(|d| d.deployment_id.clone()),
            deployment_url: ctx.deployment_url.clone(),
            last_commit_sha: ctx.commit_sha.clone(),
            article_count: Some(ctx.articles.len()),
            generated_article_jrns: Some(ctx.articles.iter().map(|a| a.jrn.clone()).collect()),
            config_hashes: Some(ctx.config_hashes.clone()),
            last_build_at: Some(Utc::now()),
            ..Default::default()
        };

        let written = modify_site(self.services.store.as_ref(), &site_id, |site| {
            if was_cancelled(site) {
                return false;
            }
            site.metadata.merge(results.clone());
            site.metadata.build_progress = None;
            site.metadata.last_build_error = None;
            site.status = SiteStatus::Active;
            true
        })
        .await?;
        if written.is_none() {
            info!(site_id = %site_id, "Build was cancelled; not marking site live");
            return Ok(());
        }

        if !ctx.soft_failures.is_empty() {
            warn!(
                site_id = %site_id,
                failures = ?ctx.soft_failures,
                "Site is live with incomplete access settings"
            );
        }
        info!(site_id = %site_id, url = ?ctx.deployment_url, "Site is live");

        self.services.broadcaster.emit(
            &site_id,
            BuildEvent::Completed {
                url: ctx.deployment_url.clone(),
            },
        );
        Ok(())
    }

    /// Record a failed run; partial metadata already persisted is kept
    pub(crate) async fn fail_run(&self, site_id: &str, err: &EngineError) {
        let message = err.to_string();
        error!(site_id, "Pipeline failed: {}", message);

        let recorded = modify_site(self.services.store.as_ref(), site_id, |site| {
            if was_cancelled(site) {
                return false;
            }
            site.status = SiteStatus::Error;
            site.metadata.last_build_error = Some(message.clone());
            true
        })
        .await;

        match recorded {
            Ok(Some(_)) => {}
            Ok(None) => {
                info!(site_id, "Build was cancelled; keeping cancellation status");
                return;
            }
            Err(e) if e.is_not_found() => warn!(site_id, "Site disappeared during the build"),
            Err(e) => error!(site_id, "Failed to record build failure: {}", e),
        }

        self.services
            .broadcaster
            .emit(site_id, BuildEvent::Failed { error: message });
    }

    /// Cancel the build of a site
    ///
    /// Only a pending or building site is affected; returns whether it was.
    /// The remote deployment, if any, keeps running.
    pub async fn cancel(&self, site_id: &str) -> Result<bool, EngineError> {
        let cancelled = modify_site(self.services.store.as_ref(), site_id, |site| {
            if !site.status.is_in_progress() {
                return false;
            }
            site.status = SiteStatus::Error;
            site.metadata.last_build_error = Some(CANCELLED_MESSAGE.to_string());
            site.metadata.build_progress = None;
            true
        })
        .await?;
        if cancelled.is_none() {
            info!(site_id, "Nothing to cancel");
            return Ok(false);
        }

        release_workspace(self.registry.as_ref(), site_id).await;

        info!(site_id, "Build cancelled");
        self.services.broadcaster.emit(
            site_id,
            BuildEvent::Failed {
                error: CANCELLED_MESSAGE.to_string(),
            },
        );
        Ok(true)
    }

    /// Delete a site: the record first, then its remote resources
    pub async fn delete_site(&self, site_id: &str) -> Result<Teardown, EngineError> {
        let site = load_site(self.services.store.as_ref(), site_id).await?;

        release_workspace(self.registry.as_ref(), site_id).await;
        self.services.store.delete(site_id).await?;
        info!(site_id, "Deleted site record");

        let repository = match site.metadata.repo_parts() {
            Some((owner, name)) => SoftResult::from_result(
                self.services.publisher.delete_repository(owner, name).await,
                &format!("delete repository {}/{}", owner, name),
            ),
            None => SoftResult::Ok(()),
        };

        let project_ref = site
            .metadata
            .vercel_project_id
            .as_deref()
            .or(site.metadata.vercel_project_name.as_deref());
        let project = match project_ref {
            Some(project) => SoftResult::from_result(
                self.client.delete_project(project).await,
                &format!("delete project {}", project),
            ),
            None => SoftResult::Ok(()),
        };

        Ok(Teardown {
            repository,
            project,
        })
    }
}
