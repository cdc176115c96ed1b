//! Collaborator contracts of the pipeline

pub mod broadcast;
pub mod generator;
pub mod publisher;
pub mod store;

use std::sync::Arc;

use crate::services::broadcast::ProgressBroadcaster;
use crate::services::generator::{ContentSource, SiteGenerator};
use crate::services::publisher::RepositoryPublisher;
use crate::services::store::SiteStore;

/// External collaborators a pipeline is assembled from
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn SiteStore>,
    pub publisher: Arc<dyn RepositoryPublisher>,
    pub generator: Arc<dyn SiteGenerator>,
    pub content: Arc<dyn ContentSource>,
    pub broadcaster: Arc<dyn ProgressBroadcaster>,
}
