//! Temporary deployment workspaces

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use crate::errors::EngineError;
use crate::filesys::dir::Dir;
use crate::models::content::GeneratedFile;

/// `site_id -> workspace path` lookup shared by pipeline runs and cancel
pub trait WorkspaceRegistry: Send + Sync {
    fn register(&self, site_id: &str, path: PathBuf);

    fn lookup(&self, site_id: &str) -> Option<PathBuf>;

    /// Remove the entry; removing a missing entry is a no-op
    fn unregister(&self, site_id: &str) -> Option<PathBuf>;
}

/// Process-local registry
#[derive(Debug, Default)]
pub struct InMemoryWorkspaceRegistry {
    entries: RwLock<HashMap<String, PathBuf>>,
}

impl InMemoryWorkspaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WorkspaceRegistry for InMemoryWorkspaceRegistry {
    fn register(&self, site_id: &str, path: PathBuf) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(site_id.to_string(), path);
    }

    fn lookup(&self, site_id: &str) -> Option<PathBuf> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(site_id).cloned()
    }

    fn unregister(&self, site_id: &str) -> Option<PathBuf> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(site_id)
    }
}

/// De-register and delete the workspace of a site, if any
///
/// Returns whether a workspace was registered.
pub async fn release_workspace(registry: &dyn WorkspaceRegistry, site_id: &str) -> bool {
    let Some(path) = registry.unregister(site_id) else {
        return false;
    };

    debug!(site_id, path = %path.display(), "Removing workspace");
    if let Err(e) = Dir::new(&path).delete().await {
        warn!(site_id, "Failed to remove workspace {}: {}", path.display(), e);
    }
    true
}

/// A directory holding one deployment's files
///
/// Registered under its site for the lifetime of the value. Dropping it
/// without [`TempWorkspace::cleanup`] still removes the directory.
pub struct TempWorkspace {
    site_id: String,
    dir: Dir,
    registry: Arc<dyn WorkspaceRegistry>,
    released: bool,
}

impl TempWorkspace {
    pub async fn create(
        base: &Path,
        site_id: &str,
        registry: Arc<dyn WorkspaceRegistry>,
    ) -> Result<Self, EngineError> {
        // Leftover from an earlier run of the same site
        release_workspace(registry.as_ref(), site_id).await;

        let dir = Dir::create_temp_dir(base, &format!("site-{}", sanitize(site_id))).await?;
        registry.register(site_id, dir.path().to_path_buf());
        debug!(site_id, path = %dir.path().display(), "Created workspace");

        Ok(Self {
            site_id: site_id.to_string(),
            dir,
            registry,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write files below the workspace root
    pub async fn materialize(&self, files: &[GeneratedFile]) -> Result<(), EngineError> {
        for file in files {
            if !is_safe_relative(&file.path) {
                return Err(EngineError::ValidationError(format!(
                    "refusing to write outside the workspace: {}",
                    file.path
                )));
            }
            self.dir.file(&file.path).write_bytes(file.content.as_bytes()).await?;
        }
        Ok(())
    }

    /// Delete and de-register the workspace
    pub async fn cleanup(mut self) {
        self.released = true;
        if self.owns_registration() {
            self.registry.unregister(&self.site_id);
        }
        if let Err(e) = self.dir.delete().await {
            warn!(site_id = %self.site_id, "Failed to remove workspace: {}", e);
        }
    }

    fn owns_registration(&self) -> bool {
        self.registry.lookup(&self.site_id).as_deref() == Some(self.dir.path())
    }
}

impl Drop for TempWorkspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if self.owns_registration() {
            self.registry.unregister(&self.site_id);
        }
        if let Err(e) = std::fs::remove_dir_all(self.dir.path()) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(site_id = %self.site_id, "Failed to remove workspace: {}", e);
            }
        }
    }
}

fn sanitize(site_id: &str) -> String {
    site_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

fn is_safe_relative(path: &str) -> bool {
    !path.is_empty()
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
