//! Content models

use serde::{Deserialize, Serialize};

/// A published article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// Stable article resource name
    pub jrn: String,
    pub title: String,
    pub slug: String,
    pub content: String,
}

/// A file produced by the site generator or read from the repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    /// Repository-relative path, `/`-separated
    pub path: String,
    pub content: String,
}

impl GeneratedFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Output of one generator run
#[derive(Debug, Clone, Default)]
pub struct GeneratedSite {
    pub files: Vec<GeneratedFile>,

    /// Path prefixes fully owned by the generator; remote files under them
    /// that are no longer generated get deleted
    pub owned_prefixes: Vec<String>,
}
