//! Regenerate flow: refresh content, publish the difference, redeploy

use async_trait::async_trait;
use tracing::{info, warn};

use crate::errors::EngineError;
use crate::models::site::SiteMetadata;
use crate::pipeline::drift::{detect_drift, stale_paths, CONFIG_PATHS};
use crate::pipeline::{Pipeline, PipelineStep, RunContext};
use crate::services::publisher::Repository;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegenerateStep {
    FetchArticles,
    FetchMigrationContext,
    Generate,
    PublishUpdate,
    Deploy,
    Protect,
    Finalize,
}

pub static REGENERATE_STEPS: [RegenerateStep; 7] = [
    RegenerateStep::FetchArticles,
    RegenerateStep::FetchMigrationContext,
    RegenerateStep::Generate,
    RegenerateStep::PublishUpdate,
    RegenerateStep::Deploy,
    RegenerateStep::Protect,
    RegenerateStep::Finalize,
];

#[async_trait]
impl PipelineStep for RegenerateStep {
    fn message(&self) -> &'static str {
        match self {
            RegenerateStep::FetchArticles => "Fetching articles",
            RegenerateStep::FetchMigrationContext => "Checking for manual config edits",
            RegenerateStep::Generate => "Regenerating site files",
            RegenerateStep::PublishUpdate => "Publishing changes",
            RegenerateStep::Deploy => "Deploying to Vercel",
            RegenerateStep::Protect => "Configuring site access",
            RegenerateStep::Finalize => "Finalizing site",
        }
    }

    async fn run(&self, pipeline: &Pipeline, ctx: &mut RunContext) -> Result<(), EngineError> {
        match self {
            RegenerateStep::FetchArticles => pipeline.fetch_articles(ctx).await,
            RegenerateStep::FetchMigrationContext => pipeline.fetch_migration_context(ctx).await,
            RegenerateStep::Generate => pipeline.generate_files(ctx).await,
            RegenerateStep::PublishUpdate => pipeline.publish_update(ctx).await,
            RegenerateStep::Deploy => pipeline.deploy_commit(ctx).await,
            RegenerateStep::Protect => {
                pipeline.protect(ctx).await;
                Ok(())
            }
            RegenerateStep::Finalize => pipeline.finalize_site(ctx).await,
        }
    }
}

fn repository_of(ctx: &RunContext) -> Result<Repository, EngineError> {
    ctx.repository
        .clone()
        .ok_or_else(|| EngineError::Internal("repository not resolved".to_string()))
}

impl Pipeline {
    async fn fetch_articles(&self, ctx: &mut RunContext) -> Result<(), EngineError> {
        let metadata = &ctx.site.metadata;
        let jrns = metadata
            .selected_article_jrns
            .clone()
            .or_else(|| metadata.generated_article_jrns.clone())
            .unwrap_or_default();

        if jrns.is_empty() {
            return Err(EngineError::ValidationError(
                "site has no articles selected".to_string(),
            ));
        }

        let articles = self.services.content.fetch_articles(&jrns).await?;
        if articles.is_empty() {
            return Err(EngineError::ValidationError(
                "none of the selected articles exist anymore".to_string(),
            ));
        }
        if articles.len() < jrns.len() {
            warn!(
                site_id = %ctx.site_id(),
                "{} of {} selected articles were not found",
                jrns.len() - articles.len(),
                jrns.len()
            );
        }

        ctx.articles = articles;
        Ok(())
    }

    /// Compare remote config files against the hashes of the last run
    async fn fetch_migration_context(&self, ctx: &mut RunContext) -> Result<(), EngineError> {
        let (owner, name) = ctx
            .site
            .metadata
            .repo_parts()
            .map(|(owner, name)| (owner.to_string(), name.to_string()))
            .ok_or_else(|| EngineError::ValidationError("site has no repository".to_string()))?;

        let paths: Vec<String> = CONFIG_PATHS.iter().map(|p| p.to_string()).collect();
        let remote = self
            .services
            .publisher
            .read_files(&owner, &name, &paths)
            .await?;

        let stored = ctx.site.metadata.config_hashes.clone().unwrap_or_default();
        ctx.drifted = detect_drift(&stored, &remote);

        if !ctx.drifted.is_empty() {
            if ctx.options.migrate_theme {
                info!(site_id = %ctx.site_id(), paths = ?ctx.drifted, "Overwriting edited config files");
            } else {
                warn!(site_id = %ctx.site_id(), paths = ?ctx.drifted, "Config files were edited by hand; keeping them");
            }
        }

        ctx.remote_paths = self.services.publisher.list_paths(&owner, &name).await?;

        let html_url = ctx
            .site
            .metadata
            .github_repo_url
            .clone()
            .unwrap_or_else(|| format!("https://github.com/{}/{}", owner, name));
        ctx.repository = Some(Repository {
            owner,
            name,
            html_url,
        });
        Ok(())
    }

    async fn publish_update(&self, ctx: &mut RunContext) -> Result<(), EngineError> {
        let repository = repository_of(ctx)?;
        let deletions = stale_paths(&ctx.remote_paths, &ctx.generated, &ctx.drifted);

        let commit = self
            .services
            .publisher
            .publish(&repository.owner, &repository.name, &ctx.generated.files, &deletions)
            .await?;
        info!(
            site_id = %ctx.site_id(),
            commit = %commit,
            updated = ctx.generated.files.len(),
            deleted = deletions.len(),
            "Published update"
        );

        self.persist(
            ctx.site_id(),
            SiteMetadata {
                last_commit_sha: Some(commit.clone()),
                ..Default::default()
            },
        )
        .await?;

        ctx.commit_sha = Some(commit);
        Ok(())
    }

    /// Deploy the full tree at the published commit
    async fn deploy_commit(&self, ctx: &mut RunContext) -> Result<(), EngineError> {
        let repository = repository_of(ctx)?;
        let commit = ctx
            .commit_sha
            .clone()
            .ok_or_else(|| EngineError::Internal("no commit to deploy".to_string()))?;

        let files = self
            .services
            .publisher
            .download(&repository.owner, &repository.name, &commit)
            .await?;

        self.deploy(ctx, files).await
    }
}
