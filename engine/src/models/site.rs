//! Site models

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Site lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteStatus {
    /// Created, no build started yet
    Pending,

    /// A pipeline run is in progress
    Building,

    /// Last run succeeded and the site is live
    Active,

    /// Last run failed or was cancelled
    Error,
}

impl SiteStatus {
    /// Whether a build may still be running for a site in this status
    pub fn is_in_progress(&self) -> bool {
        matches!(self, SiteStatus::Pending | SiteStatus::Building)
    }
}

/// A documentation site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub id: String,
    pub name: String,

    /// Used as the repository and project name
    pub slug: String,

    pub status: SiteStatus,

    #[serde(default)]
    pub metadata: SiteMetadata,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Bumped by the store on every write
    #[serde(default)]
    pub revision: u64,
}

impl Site {
    /// Create a new site in pending state
    pub fn new(id: impl Into<String>, name: impl Into<String>, slug: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            slug: slug.into(),
            status: SiteStatus::Pending,
            metadata: SiteMetadata::default(),
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }
}

/// Structured metadata bag of a site
///
/// Every field is optional so a value of this type doubles as a patch for
/// [`SiteMetadata::merge`]. Keys this engine does not know are kept in
/// `extra` and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_repo: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_repo_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vercel_project_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vercel_project_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub production_deployment_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_commit_sha: Option<String>,

    /// `"[k/n] message"` while a run is in progress
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_progress: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_build_error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_count: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_article_jrns: Option<Vec<String>>,

    /// Generated config file path to content hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_hashes: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branding: Option<serde_json::Value>,

    /// Auth key name to value, exposed to the build as env vars
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_keys: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_article_jrns: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_domains: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_build_at: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

macro_rules! merge_fields {
    ($target:ident, $patch:ident; $($field:ident),+ $(,)?) => {
        $(
            if $patch.$field.is_some() {
                $target.$field = $patch.$field;
            }
        )+
    };
}

impl SiteMetadata {
    /// Merge a patch into this metadata
    ///
    /// Fields set in `patch` win; everything else is left untouched.
    pub fn merge(&mut self, patch: SiteMetadata) {
        merge_fields!(self, patch;
            github_repo,
            github_repo_url,
            vercel_project_id,
            vercel_project_name,
            production_deployment_id,
            deployment_url,
            last_commit_sha,
            build_progress,
            last_build_error,
            article_count,
            generated_article_jrns,
            config_hashes,
            branding,
            auth_keys,
            selected_article_jrns,
            custom_domains,
            last_build_at,
        );
        self.extra.extend(patch.extra);
    }

    /// `owner` and `repo` parsed from `github_repo`
    pub fn repo_parts(&self) -> Option<(&str, &str)> {
        self.github_repo
            .as_deref()
            .and_then(|full| full.split_once('/'))
            .filter(|(owner, repo)| !owner.is_empty() && !repo.is_empty())
    }
}
