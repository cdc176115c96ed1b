//! Engine assembly

use std::sync::Arc;

use secrecy::SecretString;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

use crate::app::options::EngineOptions;
use crate::deploy::workspace::InMemoryWorkspaceRegistry;
use crate::errors::EngineError;
use crate::http::client::VercelClient;
use crate::logs::init_logging;
use crate::pipeline::Pipeline;
use crate::services::broadcast::ChannelBroadcaster;
use crate::services::Collaborators;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::load_settings;
use crate::utils::version_info;

/// Read the platform API token from the environment
pub fn read_token(env_var: &str) -> Result<SecretString, EngineError> {
    match std::env::var(env_var) {
        Ok(token) if !token.trim().is_empty() => Ok(SecretString::from(token)),
        _ => Err(EngineError::ConfigError(format!(
            "environment variable {} is not set",
            env_var
        ))),
    }
}

/// Create the platform client described by the options
pub fn build_client(options: &EngineOptions) -> Result<VercelClient, EngineError> {
    let token = read_token(&options.vercel.token_env)?;
    VercelClient::new(
        &options.vercel.base_url,
        token,
        options.vercel.team_id.clone(),
        options.retry.clone(),
    )
}

/// Create the progress channel live observers subscribe to
///
/// Pass it as the `broadcaster` of the [`Collaborators`] given to
/// [`build_pipeline`].
pub fn build_broadcaster(options: &EngineOptions) -> Arc<ChannelBroadcaster> {
    Arc::new(ChannelBroadcaster::new(options.broadcast_capacity))
}

/// Wire the platform client, workspace registry and collaborators together
pub fn build_pipeline(
    options: &EngineOptions,
    services: Collaborators,
) -> Result<Arc<Pipeline>, EngineError> {
    let client = Arc::new(build_client(options)?);
    let registry = Arc::new(InMemoryWorkspaceRegistry::new());

    info!(
        "Pipeline ready (Vercel API {}, owner {})",
        client.base_url(),
        options.pipeline.github_owner
    );
    Ok(Arc::new(Pipeline::new(
        client,
        registry,
        services,
        options.pipeline.clone(),
    )))
}

/// Load settings, prepare storage and start logging
///
/// The returned guard must be held for as long as logs should be written.
pub async fn bootstrap(
    layout: &StorageLayout,
) -> Result<(EngineOptions, Option<WorkerGuard>), EngineError> {
    let settings = load_settings(&layout.settings_file()).await?;
    layout.setup().await?;

    let options = EngineOptions::from_settings(&settings, layout);
    let guard = init_logging(options.log.clone())?;

    let version = version_info();
    info!(
        "docsite-engine {} ({}) using {}",
        version.version,
        version.git_hash,
        layout.base_dir.display()
    );
    Ok((options, guard))
}
