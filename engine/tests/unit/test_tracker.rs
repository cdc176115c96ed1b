//! Completion tracker tests

use std::sync::Arc;
use std::time::Duration;

use docsite_engine::deploy::tracker::{
    CompletionTracker, TrackerSettings, CANCELED_MESSAGE, TIMEOUT_MESSAGE,
};
use docsite_engine::models::deployment::OutcomeStatus;
use docsite_engine::models::event::LogStream;
use vercel_models::ReadyState;

use crate::fakes::{
    count, event, failed_status, fast_tracker, log_line, state_line, status, FakeBuildClient,
    RecordingObserver,
};

fn tracker(client: &Arc<FakeBuildClient>) -> CompletionTracker {
    CompletionTracker::new(client.clone(), fast_tracker())
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

#[tokio::test(start_paused = true)]
async fn test_already_ready_skips_stream_and_poller() {
    let client = Arc::new(FakeBuildClient::new().with_statuses(vec![status(ReadyState::Ready)]));
    let observer = Arc::new(RecordingObserver::default());

    let outcome = tracker(&client).wait("dpl_1", observer.clone()).await;

    assert_eq!(outcome.status, OutcomeStatus::Ready);
    assert!(outcome.error.is_none());
    assert_eq!(outcome.url.as_deref(), Some("acme-docs-abc123.vercel.app"));
    assert_eq!(count(&client.status_calls), 1);
    assert_eq!(count(&client.stream_calls), 0);
    assert_eq!(count(&client.event_fetches), 0);
    assert!(observer.texts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_already_failed_fetches_full_log_once() {
    let client = Arc::new(
        FakeBuildClient::new()
            .with_statuses(vec![failed_status("Command \"npm run build\" exited with 1", "build")])
            .with_events(vec![
                event("stdout", "Installing dependencies"),
                event("stderr", "Error: Cannot find module 'docs-theme'"),
            ]),
    );
    let observer = Arc::new(RecordingObserver::default());

    let outcome = tracker(&client).wait("dpl_1", observer.clone()).await;

    assert_eq!(outcome.status, OutcomeStatus::Error);
    assert_eq!(
        outcome.error.as_deref(),
        Some("build: Command \"npm run build\" exited with 1")
    );
    assert_eq!(
        outcome.build_logs,
        vec!["Installing dependencies", "Error: Cannot find module 'docs-theme'"]
    );
    assert_eq!(count(&client.stream_calls), 0);
    assert_eq!(count(&client.event_fetches), 1);
    assert_eq!(observer.texts().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stream_wins_before_first_poll() {
    let client = Arc::new(
        FakeBuildClient::new()
            .with_statuses(vec![status(ReadyState::Building)])
            .with_stream(
                vec![
                    (secs(1), log_line("command", "npm run build")),
                    (secs(1), log_line("stdout", "Compiled 12 pages")),
                    (secs(1), state_line("READY")),
                ],
                true,
            ),
    );
    let observer = Arc::new(RecordingObserver::default());

    let outcome = tracker(&client).wait("dpl_1", observer.clone()).await;

    assert_eq!(outcome.status, OutcomeStatus::Ready);
    assert_eq!(outcome.build_logs, vec!["npm run build", "Compiled 12 pages"]);
    // Only the initial check; the poller's first tick at 5s never fired
    assert_eq!(count(&client.status_calls), 1);
    assert_eq!(count(&client.event_fetches), 0);

    let logs = observer.logs.lock().unwrap().clone();
    assert_eq!(logs[0].0, LogStream::Command);
    assert_eq!(logs[1].0, LogStream::Stdout);
    assert_eq!(*observer.states.lock().unwrap(), vec![ReadyState::Ready]);
}

#[tokio::test(start_paused = true)]
async fn test_unparseable_stream_lines_are_skipped() {
    let client = Arc::new(
        FakeBuildClient::new()
            .with_statuses(vec![status(ReadyState::Building)])
            .with_stream(
                vec![
                    (secs(1), "event: keepalive".to_string()),
                    (secs(1), log_line("stdout", "Compiled 12 pages")),
                    (secs(1), "{\"type\": ".to_string()),
                    (secs(1), state_line("READY")),
                ],
                true,
            ),
    );
    let observer = Arc::new(RecordingObserver::default());

    let outcome = tracker(&client).wait("dpl_1", observer.clone()).await;

    assert_eq!(outcome.status, OutcomeStatus::Ready);
    assert_eq!(outcome.build_logs, vec!["Compiled 12 pages"]);
    assert_eq!(observer.texts(), vec!["Compiled 12 pages"]);
    assert_eq!(*observer.states.lock().unwrap(), vec![ReadyState::Ready]);
    assert_eq!(count(&client.status_calls), 1);
}

#[tokio::test(start_paused = true)]
async fn test_error_replay_skips_streamed_lines() {
    let client = Arc::new(
        FakeBuildClient::new()
            .with_statuses(vec![status(ReadyState::Building), status(ReadyState::Error)])
            .with_stream(
                vec![
                    (secs(1), log_line("stdout", "Cloning repository")),
                    (secs(1), log_line("stdout", "Running build")),
                    (secs(1), state_line("ERROR")),
                ],
                true,
            )
            .with_events(vec![
                event("stdout", "Cloning repository"),
                event("stdout", "Running build"),
                event("stderr", "Error: page intro.mdx has invalid frontmatter"),
                event("stdout", "Build exited with 1"),
            ]),
    );
    let observer = Arc::new(RecordingObserver::default());

    let outcome = tracker(&client).wait("dpl_1", observer.clone()).await;

    assert_eq!(outcome.status, OutcomeStatus::Error);
    assert_eq!(
        outcome.build_logs,
        vec![
            "Cloning repository",
            "Running build",
            "Error: page intro.mdx has invalid frontmatter",
            "Build exited with 1",
        ]
    );
    // Each line reached the observer exactly once
    assert_eq!(
        observer.texts(),
        vec![
            "Cloning repository",
            "Running build",
            "Error: page intro.mdx has invalid frontmatter",
            "Build exited with 1",
        ]
    );

    let error = outcome.error.unwrap();
    assert!(error.contains("Error: page intro.mdx has invalid frontmatter"));
    assert_eq!(count(&client.event_fetches), 1);
}

#[tokio::test(start_paused = true)]
async fn test_authoritative_log_replaces_streamed_lines() {
    let client = Arc::new(
        FakeBuildClient::new()
            .with_statuses(vec![
                status(ReadyState::Building),
                failed_status("Out of memory", "build"),
            ])
            .with_stream(
                vec![
                    (secs(1), log_line("stdout", "partial line")),
                    (secs(1), state_line("ERROR")),
                ],
                true,
            )
            .with_events(vec![event("stdout", "complete line")]),
    );
    let observer = Arc::new(RecordingObserver::default());

    let outcome = tracker(&client).wait("dpl_1", observer).await;

    assert_eq!(outcome.build_logs, vec!["complete line"]);
    assert_eq!(outcome.error.as_deref(), Some("build: Out of memory"));
}

#[tokio::test(start_paused = true)]
async fn test_fatal_event_means_error() {
    let client = Arc::new(
        FakeBuildClient::new()
            .with_statuses(vec![status(ReadyState::Building)])
            .with_stream(vec![(secs(1), log_line("fatal", "Fatal: build container crashed"))], true)
            .with_events(vec![event("fatal", "Fatal: build container crashed")]),
    );
    let observer = Arc::new(RecordingObserver::default());

    let outcome = tracker(&client).wait("dpl_1", observer.clone()).await;

    assert_eq!(outcome.status, OutcomeStatus::Error);
    assert_eq!(outcome.error.as_deref(), Some("Fatal: build container crashed"));
    assert_eq!(observer.texts(), vec!["Fatal: build container crashed"]);
}

#[tokio::test(start_paused = true)]
async fn test_broken_stream_lets_poller_decide() {
    let client = Arc::new(
        FakeBuildClient::new()
            .with_statuses(vec![
                status(ReadyState::Building),
                status(ReadyState::Building),
                status(ReadyState::Ready),
            ])
            .with_broken_stream(),
    );

    let outcome = tracker(&client)
        .wait("dpl_1", Arc::new(RecordingObserver::default()))
        .await;

    assert_eq!(outcome.status, OutcomeStatus::Ready);
    assert_eq!(outcome.url.as_deref(), Some("acme-docs-abc123.vercel.app"));
    assert_eq!(count(&client.status_calls), 3);
}

#[tokio::test(start_paused = true)]
async fn test_poller_times_out() {
    let client = Arc::new(FakeBuildClient::new().with_statuses(vec![status(ReadyState::Building)]));
    let settings = TrackerSettings {
        poll_interval: secs(2),
        max_poll_attempts: 3,
        error_log_grace: secs(1),
    };

    let outcome = tracker(&client)
        .wait_with("dpl_1", &settings, Arc::new(RecordingObserver::default()))
        .await;

    assert_eq!(outcome.status, OutcomeStatus::Timeout);
    assert_eq!(outcome.error.as_deref(), Some(TIMEOUT_MESSAGE));
    assert_eq!(count(&client.status_calls), 4);
}

#[tokio::test(start_paused = true)]
async fn test_canceled_deployment() {
    let client = Arc::new(FakeBuildClient::new().with_statuses(vec![
        status(ReadyState::Building),
        status(ReadyState::Canceled),
    ]));

    let outcome = tracker(&client)
        .wait("dpl_1", Arc::new(RecordingObserver::default()))
        .await;

    assert_eq!(outcome.status, OutcomeStatus::Canceled);
    assert_eq!(outcome.error.as_deref(), Some(CANCELED_MESSAGE));
}

#[tokio::test(start_paused = true)]
async fn test_error_without_details_uses_fallback() {
    let client = Arc::new(
        FakeBuildClient::new()
            .with_statuses(vec![status(ReadyState::Error)])
            .with_events(vec![event("stdout", "Cloning repository")]),
    );

    let outcome = tracker(&client)
        .wait("dpl_1", Arc::new(RecordingObserver::default()))
        .await;

    assert_eq!(outcome.status, OutcomeStatus::Error);
    assert!(!outcome.error.unwrap().is_empty());
}
