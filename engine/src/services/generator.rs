//! Site generation and content contracts

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::errors::EngineError;
use crate::models::content::{Article, GeneratedSite};
use crate::models::site::Site;

/// Options passed to the generator for one run
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Rewrite theme and auth configuration even where it was edited by hand
    pub migrate_theme: bool,

    /// Config paths whose remote content no longer matches the last
    /// generated hash
    pub drifted_paths: BTreeSet<String>,
}

/// Produces the static site file set
#[async_trait]
pub trait SiteGenerator: Send + Sync {
    async fn generate(
        &self,
        site: &Site,
        articles: &[Article],
        options: &GenerateOptions,
    ) -> Result<GeneratedSite, EngineError>;
}

/// Source of published articles
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetch articles by resource name; unknown names are skipped
    async fn fetch_articles(&self, jrns: &[String]) -> Result<Vec<Article>, EngineError>;
}
