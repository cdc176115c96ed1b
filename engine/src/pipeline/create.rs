//! Create flow: validate, generate, publish, deploy, protect

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::info;

use crate::errors::EngineError;
use crate::models::site::SiteMetadata;
use crate::pipeline::{Pipeline, PipelineStep, RunContext};

const MAX_SLUG_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateStep {
    Validate,
    Generate,
    Publish,
    Deploy,
    Protect,
}

pub static CREATE_STEPS: [CreateStep; 5] = [
    CreateStep::Validate,
    CreateStep::Generate,
    CreateStep::Publish,
    CreateStep::Deploy,
    CreateStep::Protect,
];

#[async_trait]
impl PipelineStep for CreateStep {
    fn message(&self) -> &'static str {
        match self {
            CreateStep::Validate => "Validating site content",
            CreateStep::Generate => "Generating site files",
            CreateStep::Publish => "Creating repository and publishing files",
            CreateStep::Deploy => "Deploying to Vercel",
            CreateStep::Protect => "Configuring site access",
        }
    }

    async fn run(&self, pipeline: &Pipeline, ctx: &mut RunContext) -> Result<(), EngineError> {
        match self {
            CreateStep::Validate => validate_input(ctx),
            CreateStep::Generate => pipeline.generate_files(ctx).await,
            CreateStep::Publish => pipeline.publish_initial(ctx).await,
            CreateStep::Deploy => {
                let files = ctx.generated.files.clone();
                pipeline.deploy(ctx, files).await
            }
            CreateStep::Protect => {
                pipeline.protect(ctx).await;
                Ok(())
            }
        }
    }
}

/// Structural checks on a new site; no remote calls
fn validate_input(ctx: &RunContext) -> Result<(), EngineError> {
    validate_slug(&ctx.site.slug)?;

    if ctx.articles.is_empty() {
        return Err(EngineError::ValidationError(
            "at least one article is required".to_string(),
        ));
    }

    let mut slugs = HashSet::new();
    for article in &ctx.articles {
        if article.jrn.trim().is_empty() {
            return Err(EngineError::ValidationError(format!(
                "article '{}' has no resource name",
                article.title
            )));
        }
        if article.slug.trim().is_empty() {
            return Err(EngineError::ValidationError(format!(
                "article {} has no slug",
                article.jrn
            )));
        }
        if !slugs.insert(article.slug.as_str()) {
            return Err(EngineError::ValidationError(format!(
                "duplicate article slug '{}'",
                article.slug
            )));
        }
    }

    Ok(())
}

/// Slugs name the repository and the project
pub fn validate_slug(slug: &str) -> Result<(), EngineError> {
    let valid_chars = slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

    if slug.is_empty()
        || slug.len() > MAX_SLUG_LEN
        || !valid_chars
        || slug.starts_with('-')
        || slug.ends_with('-')
    {
        return Err(EngineError::ValidationError(format!(
            "invalid site slug '{}'",
            slug
        )));
    }
    Ok(())
}

impl Pipeline {
    /// Create the repository and commit the first file set
    async fn publish_initial(&self, ctx: &mut RunContext) -> Result<(), EngineError> {
        let site_id = ctx.site_id().to_string();

        let repository = self
            .services
            .publisher
            .ensure_repository(&self.options.github_owner, &ctx.site.slug)
            .await?;
        self.persist(
            &site_id,
            SiteMetadata {
                github_repo: Some(repository.full_name()),
                github_repo_url: Some(repository.html_url.clone()),
                ..Default::default()
            },
        )
        .await?;

        let commit = self
            .services
            .publisher
            .publish(&repository.owner, &repository.name, &ctx.generated.files, &[])
            .await?;
        info!(
            site_id = %site_id,
            commit = %commit,
            files = ctx.generated.files.len(),
            "Published {}",
            repository.full_name()
        );

        self.persist(
            &site_id,
            SiteMetadata {
                last_commit_sha: Some(commit.clone()),
                ..Default::default()
            },
        )
        .await?;

        ctx.repository = Some(repository);
        ctx.commit_sha = Some(commit);
        Ok(())
    }
}
