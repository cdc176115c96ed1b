//! Build/deploy pipeline orchestration
//!
//! A run is an ordered list of steps executed by one generic runner. Before
//! each step the runner persists `"[k/n] message"` as the site's build
//! progress and broadcasts a `step` event; a failing step ends the run with
//! the site in `error`. Workspace cleanup runs on every exit path.

pub mod create;
pub mod deploy;
pub mod drift;
pub mod lifecycle;
pub mod observer;
pub mod regenerate;
pub mod soft;

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use vercel_models::Project;

use crate::deploy::tracker::{CompletionTracker, TrackerSettings};
use crate::deploy::workspace::{release_workspace, WorkspaceRegistry};
use crate::errors::EngineError;
use crate::http::RemoteBuildClient;
use crate::models::content::{Article, GeneratedSite};
use crate::models::deployment::{DeploymentOutcome, DeploymentTarget};
use crate::models::event::BuildEvent;
use crate::models::site::{Site, SiteMetadata, SiteStatus};
use crate::pipeline::lifecycle::was_cancelled;
use crate::services::publisher::Repository;
use crate::services::store::modify_site;
use crate::services::Collaborators;

pub use create::{CreateStep, CREATE_STEPS};
pub use lifecycle::CANCELLED_MESSAGE;
pub use regenerate::{RegenerateStep, REGENERATE_STEPS};
pub use soft::SoftResult;

/// Pipeline-wide options
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Account that owns the site repositories
    pub github_owner: String,

    /// Parent directory of temporary deployment workspaces
    pub workspace_dir: PathBuf,

    pub target: DeploymentTarget,

    /// Tracker settings used unless a run overrides them
    pub tracker: TrackerSettings,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            github_owner: "docsite".to_string(),
            workspace_dir: std::env::temp_dir().join("docsite-workspaces"),
            target: DeploymentTarget::Production,
            tracker: TrackerSettings::default(),
        }
    }
}

/// Options of a single run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Overwrite hand-edited theme and auth config on regenerate
    pub migrate_theme: bool,

    /// Per-run tracker override
    pub tracker: Option<TrackerSettings>,
}

/// Generated inputs of a create run
#[derive(Debug, Clone, Default)]
pub struct CreateInput {
    pub articles: Vec<Article>,
}

/// State threaded through the steps of one run
#[derive(Debug)]
pub struct RunContext {
    /// Site as loaded when the run started
    pub site: Site,
    pub options: RunOptions,
    pub articles: Vec<Article>,
    pub generated: GeneratedSite,

    /// Config paths edited by hand since the last run
    pub drifted: BTreeSet<String>,

    /// Files on the default branch before publishing
    pub remote_paths: Vec<String>,

    pub config_hashes: BTreeMap<String, String>,
    pub repository: Option<Repository>,
    pub commit_sha: Option<String>,
    pub project: Option<Project>,
    pub deployment: Option<DeploymentOutcome>,
    pub deployment_url: Option<String>,

    /// Best-effort side effects that did not go through
    pub soft_failures: Vec<String>,

    finalized: bool,
}

impl RunContext {
    pub fn new(site: Site, options: RunOptions) -> Self {
        Self {
            site,
            options,
            articles: Vec::new(),
            generated: GeneratedSite::default(),
            drifted: BTreeSet::new(),
            remote_paths: Vec::new(),
            config_hashes: BTreeMap::new(),
            repository: None,
            commit_sha: None,
            project: None,
            deployment: None,
            deployment_url: None,
            soft_failures: Vec::new(),
            finalized: false,
        }
    }

    pub fn site_id(&self) -> &str {
        &self.site.id
    }
}

/// One named step of a flow
#[async_trait]
pub trait PipelineStep: Send + Sync {
    /// Progress message shown while the step runs
    fn message(&self) -> &'static str;

    async fn run(&self, pipeline: &Pipeline, ctx: &mut RunContext) -> Result<(), EngineError>;
}

/// Orchestrates create and regenerate runs
pub struct Pipeline {
    client: Arc<dyn RemoteBuildClient>,
    tracker: CompletionTracker,
    registry: Arc<dyn WorkspaceRegistry>,
    services: Collaborators,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        client: Arc<dyn RemoteBuildClient>,
        registry: Arc<dyn WorkspaceRegistry>,
        services: Collaborators,
        options: PipelineOptions,
    ) -> Self {
        let tracker = CompletionTracker::new(client.clone(), options.tracker.clone());
        Self {
            client,
            tracker,
            registry,
            services,
            options,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn registry(&self) -> &Arc<dyn WorkspaceRegistry> {
        &self.registry
    }

    /// Run the create flow; failures end up on the site record
    pub async fn run_create(&self, site: Site, input: CreateInput, options: RunOptions) {
        let mut ctx = RunContext::new(site, options);
        ctx.articles = input.articles;
        self.execute("create", &CREATE_STEPS[..], ctx).await;
    }

    /// Run the regenerate flow; failures end up on the site record
    pub async fn run_regenerate(&self, site: Site, options: RunOptions) {
        let ctx = RunContext::new(site, options);
        self.execute("regenerate", &REGENERATE_STEPS[..], ctx).await;
    }

    pub fn spawn_create(
        self: &Arc<Self>,
        site: Site,
        input: CreateInput,
        options: RunOptions,
    ) -> JoinHandle<()> {
        let pipeline = self.clone();
        tokio::spawn(async move { pipeline.run_create(site, input, options).await })
    }

    pub fn spawn_regenerate(self: &Arc<Self>, site: Site, options: RunOptions) -> JoinHandle<()> {
        let pipeline = self.clone();
        tokio::spawn(async move { pipeline.run_regenerate(site, options).await })
    }

    async fn execute<S: PipelineStep>(&self, flow: &'static str, steps: &[S], mut ctx: RunContext) {
        let site_id = ctx.site_id().to_string();
        info!(site_id = %site_id, flow, "Pipeline starting");

        match self.drive(steps, &mut ctx).await {
            Ok(()) => info!(site_id = %site_id, flow, "Pipeline finished"),
            Err(e) => self.fail_run(&site_id, &e).await,
        }

        if release_workspace(self.registry.as_ref(), &site_id).await {
            debug!(site_id = %site_id, "Released leftover workspace");
        }
    }

    async fn drive<S: PipelineStep>(
        &self,
        steps: &[S],
        ctx: &mut RunContext,
    ) -> Result<(), EngineError> {
        self.begin_run(ctx).await?;

        let total = steps.len();
        for (index, step) in steps.iter().enumerate() {
            if !self
                .mark_progress(ctx.site_id(), index + 1, total, step.message())
                .await?
            {
                info!(site_id = %ctx.site_id(), step = step.message(), "Run was cancelled; stopping");
                ctx.finalized = true;
                return Ok(());
            }

            if let Err(e) = step.run(self, ctx).await {
                error!(site_id = %ctx.site_id(), step = step.message(), "Step failed: {}", e);
                return Err(e);
            }
        }

        if !ctx.finalized {
            self.finalize_site(ctx).await?;
        }
        Ok(())
    }

    async fn begin_run(&self, ctx: &mut RunContext) -> Result<(), EngineError> {
        let store = self.services.store.as_ref();
        let started = if store.get(ctx.site_id()).await?.is_some() {
            modify_site(store, ctx.site_id(), |site| {
                reset_for_run(site);
                true
            })
            .await?
        } else {
            let mut site = ctx.site.clone();
            reset_for_run(&mut site);
            store.update(&site).await?;
            Some(site)
        };

        if let Some(site) = started {
            ctx.site = site;
        }
        Ok(())
    }

    /// Persist and broadcast the progress of a step
    ///
    /// Returns false, writing nothing, once the run has been cancelled.
    async fn mark_progress(
        &self,
        site_id: &str,
        step: usize,
        total: usize,
        message: &str,
    ) -> Result<bool, EngineError> {
        let progress = format!("[{}/{}] {}", step, total, message);
        let written = modify_site(self.services.store.as_ref(), site_id, |site| {
            if was_cancelled(site) {
                return false;
            }
            site.metadata.build_progress = Some(progress.clone());
            true
        })
        .await?;
        if written.is_none() {
            return Ok(false);
        }
        info!(site_id, "{}", progress);

        self.services.broadcaster.emit(
            site_id,
            BuildEvent::Step {
                step,
                total,
                message: message.to_string(),
            },
        );
        Ok(true)
    }

    /// Read-merge-write of learned metadata
    ///
    /// Only metadata is touched, so a concurrent status change survives.
    pub(crate) async fn persist(
        &self,
        site_id: &str,
        patch: SiteMetadata,
    ) -> Result<(), EngineError> {
        modify_site(self.services.store.as_ref(), site_id, |site| {
            site.metadata.merge(patch.clone());
            true
        })
        .await?;
        Ok(())
    }
}

fn reset_for_run(site: &mut Site) {
    site.status = SiteStatus::Building;
    site.metadata.build_progress = None;
    site.metadata.last_build_error = None;
}
