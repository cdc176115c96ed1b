//! Site record store

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::errors::EngineError;
use crate::models::site::Site;

/// Durable storage of site records
///
/// `update` is last write wins. Writers that must not clobber a concurrent
/// change go through [`modify_site`], which relies on `update_if`.
#[async_trait]
pub trait SiteStore: Send + Sync {
    async fn get(&self, site_id: &str) -> Result<Option<Site>, EngineError>;

    /// Insert or replace a site
    async fn update(&self, site: &Site) -> Result<(), EngineError>;

    /// Replace a site only if its stored revision still equals `site.revision`
    ///
    /// Returns false when another write got there first or the site is gone.
    async fn update_if(&self, site: &Site) -> Result<bool, EngineError>;

    /// Returns whether a site was deleted
    async fn delete(&self, site_id: &str) -> Result<bool, EngineError>;
}

/// Load a site, failing when it does not exist
pub async fn load_site(store: &dyn SiteStore, site_id: &str) -> Result<Site, EngineError> {
    store
        .get(site_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("site {}", site_id)))
}

const MAX_WRITE_ATTEMPTS: usize = 8;

/// Read-modify-write a site with a revision check
///
/// `apply` edits the freshly loaded site and returns false to leave it
/// unwritten. On a conflicting write the site is reloaded and `apply` runs
/// again, so its decision is always made against the record it replaces.
/// Returns the written site, or `None` when `apply` declined.
pub async fn modify_site<F>(
    store: &dyn SiteStore,
    site_id: &str,
    mut apply: F,
) -> Result<Option<Site>, EngineError>
where
    F: FnMut(&mut Site) -> bool + Send,
{
    for attempt in 1..=MAX_WRITE_ATTEMPTS {
        let mut site = load_site(store, site_id).await?;
        if !apply(&mut site) {
            return Ok(None);
        }
        if store.update_if(&site).await? {
            site.revision += 1;
            return Ok(Some(site));
        }
        debug!(site_id, attempt, "Site changed while writing, retrying");
    }

    Err(EngineError::StorageError(format!(
        "site {} kept changing during {} write attempts",
        site_id, MAX_WRITE_ATTEMPTS
    )))
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemorySiteStore {
    sites: RwLock<HashMap<String, Site>>,
}

impl MemorySiteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sites.read().await.len()
    }
}

#[async_trait]
impl SiteStore for MemorySiteStore {
    async fn get(&self, site_id: &str) -> Result<Option<Site>, EngineError> {
        Ok(self.sites.read().await.get(site_id).cloned())
    }

    async fn update(&self, site: &Site) -> Result<(), EngineError> {
        let mut sites = self.sites.write().await;
        let revision = sites.get(&site.id).map_or(0, |s| s.revision);
        sites.insert(site.id.clone(), stamped(site, revision + 1));
        Ok(())
    }

    async fn update_if(&self, site: &Site) -> Result<bool, EngineError> {
        let mut sites = self.sites.write().await;
        match sites.get(&site.id) {
            Some(current) if current.revision == site.revision => {
                sites.insert(site.id.clone(), stamped(site, site.revision + 1));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, site_id: &str) -> Result<bool, EngineError> {
        Ok(self.sites.write().await.remove(site_id).is_some())
    }
}

fn stamped(site: &Site, revision: u64) -> Site {
    let mut site = site.clone();
    site.revision = revision;
    site.updated_at = Utc::now();
    site
}
