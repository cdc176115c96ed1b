//! Repository publisher contract

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::models::content::GeneratedFile;

/// A hosted repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub owner: String,
    pub name: String,

    /// Browsable URL
    pub html_url: String,
}

impl Repository {
    /// `owner/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Commits file sets to hosted repositories
#[async_trait]
pub trait RepositoryPublisher: Send + Sync {
    /// Create the repository unless it already exists
    async fn ensure_repository(&self, owner: &str, name: &str) -> Result<Repository, EngineError>;

    /// Commit additions and deletions atomically, returning the commit id
    ///
    /// Either everything lands in one new commit or nothing is applied.
    async fn publish(
        &self,
        owner: &str,
        name: &str,
        files: &[GeneratedFile],
        delete_paths: &[String],
    ) -> Result<String, EngineError>;

    /// Current content of the given paths on the default branch; missing
    /// paths are left out
    async fn read_files(
        &self,
        owner: &str,
        name: &str,
        paths: &[String],
    ) -> Result<Vec<GeneratedFile>, EngineError>;

    /// Every file path on the default branch
    async fn list_paths(&self, owner: &str, name: &str) -> Result<Vec<String>, EngineError>;

    /// Full tree at a commit
    async fn download(
        &self,
        owner: &str,
        name: &str,
        commit: &str,
    ) -> Result<Vec<GeneratedFile>, EngineError>;

    async fn delete_repository(&self, owner: &str, name: &str) -> Result<(), EngineError>;
}
