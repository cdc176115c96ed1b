//! Pipeline orchestration tests

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::time::Duration;

use docsite_engine::deploy::tracker::{TrackerSettings, TIMEOUT_MESSAGE};
use docsite_engine::deploy::workspace::WorkspaceRegistry;
use docsite_engine::models::site::{Site, SiteMetadata, SiteStatus};
use docsite_engine::pipeline::{CreateInput, RunOptions, SoftResult, CANCELLED_MESSAGE};
use docsite_engine::services::store::SiteStore;
use docsite_engine::utils::config_hash;
use vercel_models::ReadyState;

use crate::fakes::{
    article, count, docs_json, event, failed_status, status, FakeBuildClient, FakeContent,
    FakePublisher, Harness, PACKAGE_JSON,
};

fn new_site() -> Site {
    Site::new("site-1", "Acme Docs", "acme-docs")
}

/// A site published by an earlier run, as regenerate finds it
fn live_site() -> Site {
    let mut site = new_site();
    site.status = SiteStatus::Active;
    site.metadata = SiteMetadata {
        github_repo: Some("acme/acme-docs".to_string()),
        github_repo_url: Some("https://github.com/acme/acme-docs".to_string()),
        vercel_project_id: Some("prj_acme-docs".to_string()),
        article_count: Some(1),
        generated_article_jrns: Some(vec![article(1).jrn]),
        selected_article_jrns: Some(vec![article(1).jrn, article(2).jrn, article(3).jrn]),
        config_hashes: Some(BTreeMap::from([
            ("docs.json".to_string(), config_hash(&docs_json(&site, false))),
            ("package.json".to_string(), config_hash(PACKAGE_JSON)),
        ])),
        branding: Some(serde_json::json!({"primaryColor": "#0f766e"})),
        auth_keys: Some(BTreeMap::from([("DOCS_API_KEY".to_string(), "secret".to_string())])),
        custom_domains: Some(vec!["docs.acme.dev".to_string()]),
        ..Default::default()
    };
    site.metadata
        .extra
        .insert("legacyNavOrder".to_string(), serde_json::json!(["a", "b"]));
    site
}

fn published_tree(site: &Site) -> FakePublisher {
    let docs = docs_json(site, false);
    FakePublisher::with_tree(&[
        ("docs.json", docs.as_str()),
        ("package.json", PACKAGE_JSON),
        ("docs/article-1.mdx", "# Article 1"),
        ("docs/retired.mdx", "# Retired"),
        ("README.md", "hand written"),
    ])
}

fn content() -> FakeContent {
    FakeContent::with(vec![article(1), article(2), article(3)])
}

#[tokio::test(start_paused = true)]
async fn test_create_with_failed_deployment() {
    let client = FakeBuildClient::new()
        .with_statuses(vec![failed_status("Command \"npm run build\" exited with 1", "build")])
        .with_events(vec![event("stderr", "Error: Cannot find module 'docs-theme'")]);
    let h = Harness::new(client, FakePublisher::default(), content());
    let site = new_site();
    h.insert(&site).await;

    h.pipeline
        .run_create(
            site,
            CreateInput {
                articles: vec![article(1), article(2)],
            },
            RunOptions::default(),
        )
        .await;

    let site = h.store.site("site-1").await;
    assert_eq!(site.status, SiteStatus::Error);
    let error = site.metadata.last_build_error.unwrap();
    assert!(error.starts_with("Vercel deployment failed"), "{}", error);
    assert!(error.contains("exited with 1"));

    // Learned before the failure and kept
    assert_eq!(
        site.metadata.github_repo_url.as_deref(),
        Some("https://github.com/acme/acme-docs")
    );
    assert_eq!(site.metadata.production_deployment_id.as_deref(), Some("dpl_1"));
    assert!(site.metadata.deployment_url.is_none());

    assert!(h.registry.lookup("site-1").is_none());
    assert!(h.leftover_workspaces().is_empty());
    assert_eq!(h.broadcaster.failed().len(), 1);
    assert_eq!(h.broadcaster.completed(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_create_success_reports_progress() {
    let client = FakeBuildClient::new().with_statuses(vec![status(ReadyState::Ready)]);
    let h = Harness::new(client, FakePublisher::default(), content());
    let mut site = new_site();
    site.metadata.custom_domains = Some(vec!["docs.acme.dev".to_string()]);
    h.insert(&site).await;

    h.pipeline
        .run_create(
            site,
            CreateInput {
                articles: vec![article(1), article(2)],
            },
            RunOptions::default(),
        )
        .await;

    let site = h.store.site("site-1").await;
    assert_eq!(site.status, SiteStatus::Active);
    assert!(site.metadata.build_progress.is_none());
    assert!(site.metadata.last_build_error.is_none());
    assert_eq!(site.metadata.article_count, Some(2));
    assert_eq!(site.metadata.github_repo.as_deref(), Some("acme/acme-docs"));
    assert_eq!(
        site.metadata.deployment_url.as_deref(),
        Some("https://acme-docs-abc123.vercel.app")
    );
    assert_eq!(
        site.metadata.config_hashes.unwrap()["package.json"],
        config_hash(PACKAGE_JSON)
    );
    assert!(site.metadata.last_build_at.is_some());

    let expected = vec![
        "[1/5] Validating site content",
        "[2/5] Generating site files",
        "[3/5] Creating repository and publishing files",
        "[4/5] Deploying to Vercel",
        "[5/5] Configuring site access",
    ];
    assert_eq!(*h.store.progress.lock().unwrap(), expected);

    let steps = h.broadcaster.steps();
    assert_eq!(steps.len(), 5);
    assert!(steps.iter().enumerate().all(|(i, (k, n, _))| *k == i + 1 && *n == 5));
    assert_eq!(h.broadcaster.completed(), 1);
    assert!(h.broadcaster.failed().is_empty());

    // The deployment was built from the materialized workspace
    let deployments = h.client.deployments.lock().unwrap().clone();
    assert_eq!(deployments.len(), 1);
    assert_eq!(deployments[0].project, "acme-docs");
    assert!(deployments[0].files.contains(&"docs/article-2.mdx".to_string()));
    assert!(h.leftover_workspaces().is_empty());

    assert_eq!(*h.client.domains.lock().unwrap(), vec!["docs.acme.dev"]);
}

#[tokio::test(start_paused = true)]
async fn test_create_validation_failure_has_no_side_effects() {
    let h = Harness::new(FakeBuildClient::new(), FakePublisher::default(), content());
    let site = new_site();
    h.insert(&site).await;

    h.pipeline
        .run_create(site, CreateInput::default(), RunOptions::default())
        .await;

    let site = h.store.site("site-1").await;
    assert_eq!(site.status, SiteStatus::Error);
    assert_eq!(
        site.metadata.last_build_error.as_deref(),
        Some("Validation error: at least one article is required")
    );
    assert!(h.publisher.commits.lock().unwrap().is_empty());
    assert!(h.client.deployments.lock().unwrap().is_empty());
    assert_eq!(h.broadcaster.failed().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_protection_failure_is_soft() {
    let client = FakeBuildClient::new().with_statuses(vec![status(ReadyState::Ready)]);
    client.fail_protection.store(true, Ordering::SeqCst);
    let h = Harness::new(client, FakePublisher::default(), content());
    let site = new_site();
    h.insert(&site).await;

    h.pipeline
        .run_create(
            site,
            CreateInput {
                articles: vec![article(1)],
            },
            RunOptions::default(),
        )
        .await;

    let site = h.store.site("site-1").await;
    assert_eq!(site.status, SiteStatus::Active);
    assert_eq!(count(&h.client.protection_updates), 1);
    assert_eq!(h.broadcaster.completed(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_regenerate_success() {
    let client = FakeBuildClient::new().with_statuses(vec![status(ReadyState::Ready)]);
    let site = live_site();
    let h = Harness::new(client, published_tree(&site), content());
    h.insert(&site).await;

    h.pipeline.run_regenerate(site, RunOptions::default()).await;

    let site = h.store.site("site-1").await;
    assert_eq!(site.status, SiteStatus::Active);
    assert!(site.metadata.build_progress.is_none());
    assert_eq!(site.metadata.article_count, Some(3));
    assert_eq!(
        site.metadata.generated_article_jrns,
        Some(vec![article(1).jrn, article(2).jrn, article(3).jrn])
    );

    // Preserved configuration
    assert_eq!(
        site.metadata.branding,
        Some(serde_json::json!({"primaryColor": "#0f766e"}))
    );
    assert_eq!(
        site.metadata.custom_domains,
        Some(vec!["docs.acme.dev".to_string()])
    );
    assert_eq!(
        site.metadata.extra.get("legacyNavOrder"),
        Some(&serde_json::json!(["a", "b"]))
    );
    assert_eq!(site.metadata.last_commit_sha.as_deref(), Some("commit-1"));

    let progress = h.store.progress.lock().unwrap().clone();
    assert_eq!(progress.len(), 7);
    assert_eq!(progress[0], "[1/7] Fetching articles");
    assert_eq!(progress[6], "[7/7] Finalizing site");
    assert_eq!(h.broadcaster.steps().len(), 7);
    assert_eq!(h.broadcaster.completed(), 1);

    // Stale generated pages go, hand-written files stay
    let commit = h.publisher.commits.lock().unwrap()[0].clone();
    assert_eq!(commit.deleted, vec!["docs/retired.mdx"]);
    assert!(h.publisher.file("README.md").is_some());

    // Deployed from the downloaded commit
    assert_eq!(*h.publisher.downloads.lock().unwrap(), vec!["commit-1"]);
    let deployments = h.client.deployments.lock().unwrap().clone();
    assert!(deployments[0].files.contains(&"README.md".to_string()));
    assert!(!deployments[0].files.contains(&"docs/retired.mdx".to_string()));

    assert_eq!(
        *h.client.env_vars.lock().unwrap(),
        vec![("DOCS_API_KEY".to_string(), "secret".to_string())]
    );
    assert_eq!(*h.client.domains.lock().unwrap(), vec!["docs.acme.dev"]);
    assert!(h.registry.lookup("site-1").is_none());
    assert!(h.leftover_workspaces().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_regenerate_keeps_hand_edited_config() {
    let client = FakeBuildClient::new().with_statuses(vec![status(ReadyState::Ready)]);
    let site = live_site();
    let publisher = published_tree(&site);
    publisher
        .tree
        .lock()
        .unwrap()
        .insert("docs.json".to_string(), "{\"edited\":true}".to_string());
    let h = Harness::new(client, publisher, content());
    h.insert(&site).await;
    let stored_hash = site.metadata.config_hashes.as_ref().unwrap()["docs.json"].clone();

    h.pipeline.run_regenerate(site, RunOptions::default()).await;

    let site = h.store.site("site-1").await;
    assert_eq!(site.status, SiteStatus::Active);
    assert_eq!(h.publisher.file("docs.json").as_deref(), Some("{\"edited\":true}"));
    assert_eq!(site.metadata.config_hashes.unwrap()["docs.json"], stored_hash);

    let commit = h.publisher.commits.lock().unwrap()[0].clone();
    assert!(!commit.files.contains(&"docs.json".to_string()));

    let options = h.generator.last_options.lock().unwrap().clone().unwrap();
    assert!(options.drifted_paths.contains("docs.json"));
}

#[tokio::test(start_paused = true)]
async fn test_regenerate_with_migration_overwrites_config() {
    let client = FakeBuildClient::new().with_statuses(vec![status(ReadyState::Ready)]);
    let site = live_site();
    let publisher = published_tree(&site);
    publisher
        .tree
        .lock()
        .unwrap()
        .insert("docs.json".to_string(), "{\"edited\":true}".to_string());
    let h = Harness::new(client, publisher, content());
    h.insert(&site).await;

    let options = RunOptions {
        migrate_theme: true,
        ..Default::default()
    };
    h.pipeline.run_regenerate(site.clone(), options).await;

    let migrated = docs_json(&site, true);
    assert_eq!(h.publisher.file("docs.json"), Some(migrated.clone()));
    let stored = h.store.site("site-1").await;
    assert_eq!(
        stored.metadata.config_hashes.unwrap()["docs.json"],
        config_hash(&migrated)
    );
}

#[tokio::test(start_paused = true)]
async fn test_regenerate_timeout_marks_error() {
    let client = FakeBuildClient::new().with_statuses(vec![status(ReadyState::Building)]);
    let site = live_site();
    let h = Harness::new(client, published_tree(&site), content());
    h.insert(&site).await;

    let options = RunOptions {
        tracker: Some(TrackerSettings {
            poll_interval: Duration::from_secs(10),
            max_poll_attempts: 2,
            error_log_grace: Duration::from_secs(1),
        }),
        ..Default::default()
    };
    h.pipeline.run_regenerate(site, options).await;

    let site = h.store.site("site-1").await;
    assert_eq!(site.status, SiteStatus::Error);
    assert!(site
        .metadata
        .last_build_error
        .unwrap()
        .contains(TIMEOUT_MESSAGE));
    assert_eq!(h.broadcaster.failed().len(), 1);
    assert!(h.leftover_workspaces().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_regenerate_without_repository_fails() {
    let h = Harness::new(FakeBuildClient::new(), FakePublisher::default(), content());
    let mut site = new_site();
    site.metadata.selected_article_jrns = Some(vec![article(1).jrn]);
    h.insert(&site).await;

    h.pipeline.run_regenerate(site, RunOptions::default()).await;

    let site = h.store.site("site-1").await;
    assert_eq!(site.status, SiteStatus::Error);
    assert_eq!(
        site.metadata.last_build_error.as_deref(),
        Some("Validation error: site has no repository")
    );
    assert_eq!(
        site.metadata.build_progress.as_deref(),
        Some("[2/7] Checking for manual config edits")
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancel_building_site() {
    let h = Harness::new(FakeBuildClient::new(), FakePublisher::default(), content());
    let mut site = new_site();
    site.status = SiteStatus::Building;
    h.insert(&site).await;

    let workspace = h.workspace_base.path().join("site-1-manual");
    std::fs::create_dir_all(&workspace).unwrap();
    std::fs::write(workspace.join("index.mdx"), "# Home").unwrap();
    h.registry.register("site-1", workspace.clone());

    assert!(h.pipeline.cancel("site-1").await.unwrap());

    let site = h.store.site("site-1").await;
    assert_eq!(site.status, SiteStatus::Error);
    assert_eq!(site.metadata.last_build_error.as_deref(), Some(CANCELLED_MESSAGE));
    assert_eq!(CANCELLED_MESSAGE, "Build cancelled by user");
    assert!(!workspace.exists());
    assert!(h.registry.lookup("site-1").is_none());
    assert_eq!(h.broadcaster.failed(), vec![CANCELLED_MESSAGE.to_string()]);

    // Already finished: nothing to do
    assert!(!h.pipeline.cancel("site-1").await.unwrap());
    assert_eq!(h.broadcaster.failed().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_run_is_not_overwritten_by_completion() {
    let client = FakeBuildClient::new().with_statuses(vec![status(ReadyState::Building)]);
    let site = live_site();
    let h = Harness::new(client, published_tree(&site), content());
    h.insert(&site).await;

    let options = RunOptions {
        tracker: Some(TrackerSettings {
            poll_interval: Duration::from_secs(1),
            max_poll_attempts: 10_000,
            error_log_grace: Duration::from_secs(1),
        }),
        ..Default::default()
    };
    let handle = h.pipeline.spawn_regenerate(site, options);

    // Wait until the remote deployment exists
    while h.client.deployments.lock().unwrap().is_empty() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(h.pipeline.cancel("site-1").await.unwrap());

    // The remote build finishes anyway
    h.client.set_statuses(vec![status(ReadyState::Ready)]);
    handle.await.unwrap();

    let site = h.store.site("site-1").await;
    assert_eq!(site.status, SiteStatus::Error);
    assert_eq!(site.metadata.last_build_error.as_deref(), Some(CANCELLED_MESSAGE));
    assert!(site.metadata.build_progress.is_none());
    assert_eq!(h.broadcaster.completed(), 0);
    assert_eq!(h.broadcaster.failed(), vec![CANCELLED_MESSAGE.to_string()]);
    assert_eq!(count(&h.client.protection_updates), 0);
    assert!(h.leftover_workspaces().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_between_read_and_write_is_not_overwritten() {
    let client = FakeBuildClient::new().with_statuses(vec![status(ReadyState::Ready)]);
    let h = Harness::new(client, FakePublisher::default(), content());
    let site = new_site();
    h.insert(&site).await;

    // Cancelled right after the run reads the record to advance to step 3
    h.store.cancel_on_read_at("[2/5] Generating site files");

    h.pipeline
        .run_create(
            site,
            CreateInput {
                articles: vec![article(1)],
            },
            RunOptions::default(),
        )
        .await;

    let site = h.store.site("site-1").await;
    assert_eq!(site.status, SiteStatus::Error);
    assert_eq!(site.metadata.last_build_error.as_deref(), Some(CANCELLED_MESSAGE));
    assert!(site.metadata.build_progress.is_none());
    assert_eq!(
        *h.store.progress.lock().unwrap(),
        vec!["[1/5] Validating site content", "[2/5] Generating site files"]
    );

    assert!(h.publisher.commits.lock().unwrap().is_empty());
    assert!(h.client.deployments.lock().unwrap().is_empty());
    assert_eq!(h.broadcaster.completed(), 0);
    assert!(h.broadcaster.failed().is_empty());
    assert_eq!(h.broadcaster.steps().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_delete_site() {
    let site = live_site();
    let h = Harness::new(FakeBuildClient::new(), published_tree(&site), content());
    h.insert(&site).await;

    let teardown = h.pipeline.delete_site("site-1").await.unwrap();

    assert_eq!(teardown.repository, SoftResult::Ok(()));
    assert_eq!(teardown.project, SoftResult::Ok(()));
    assert_eq!(*h.publisher.deleted_repos.lock().unwrap(), vec!["acme/acme-docs"]);
    assert_eq!(*h.client.deleted_projects.lock().unwrap(), vec!["prj_acme-docs"]);
    assert!(h.store.get("site-1").await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_delete_site_survives_remote_failures() {
    let site = live_site();
    let publisher = published_tree(&site);
    publisher.fail_delete.store(true, Ordering::SeqCst);
    let h = Harness::new(FakeBuildClient::new(), publisher, content());
    h.insert(&site).await;

    let teardown = h.pipeline.delete_site("site-1").await.unwrap();

    assert!(!teardown.repository.is_ok());
    assert!(teardown.project.is_ok());
    assert!(h.store.get("site-1").await.unwrap().is_none());
}
