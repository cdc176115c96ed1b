//! Deployment completion tracking
//!
//! Waits for a remote deployment to reach a terminal state by racing the
//! platform's live event feed against status polling. The event feed is
//! unreliable (connections drop, the terminal event may never arrive), the
//! status endpoint is slow to reflect progress; whichever reports a terminal
//! state first decides the outcome and the other activity is cancelled.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vercel_models::{Deployment, DeploymentEvent, EventType, ReadyState};

use crate::http::RemoteBuildClient;
use crate::models::deployment::{DeploymentOutcome, OutcomeStatus};
use crate::models::event::LogStream;

pub const TIMEOUT_MESSAGE: &str = "Deployment timed out waiting for the build to finish";
pub const CANCELED_MESSAGE: &str = "Deployment was canceled";
pub const FALLBACK_ERROR_MESSAGE: &str = "Deployment failed without error details";

const ERROR_MARKERS: [&str; 3] = ["error", "fatal", "failed"];
const CONTEXT_BEFORE: usize = 2;
const CONTEXT_AFTER: usize = 10;
const MAX_ERROR_CHARS: usize = 2000;

/// Tracker timing settings
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    /// Delay between status polls
    pub poll_interval: Duration,

    /// Polls before giving up with a timeout
    pub max_poll_attempts: u32,

    /// Wait before fetching the full log of a failed build
    pub error_log_grace: Duration,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_poll_attempts: 120, // 10 minutes
            error_log_grace: Duration::from_secs(3),
        }
    }
}

/// Receives remote build output while a deployment is tracked
pub trait BuildObserver: Send + Sync {
    fn on_log(&self, _stream: LogStream, _text: &str) {}

    fn on_state_change(&self, _state: ReadyState) {}
}

/// Observer that ignores everything
pub struct NoopObserver;

impl BuildObserver for NoopObserver {}

/// Log lines captured from the live feed
#[derive(Debug, Default)]
struct StreamedLog {
    lines: Vec<String>,
    emitted: HashSet<String>,
}

type SharedLog = Arc<Mutex<StreamedLog>>;

fn record_line(log: &SharedLog, text: &str) {
    let mut log = log.lock().unwrap_or_else(|e| e.into_inner());
    log.lines.push(text.to_string());
    log.emitted.insert(text.to_string());
}

fn take_log(log: &SharedLog) -> StreamedLog {
    let mut log = log.lock().unwrap_or_else(|e| e.into_inner());
    std::mem::take(&mut *log)
}

enum Finish {
    Stream(ReadyState),
    Poll(Deployment),
    Timeout,
}

/// Waits for deployments on one platform client
pub struct CompletionTracker {
    client: Arc<dyn RemoteBuildClient>,
    settings: TrackerSettings,
}

impl CompletionTracker {
    pub fn new(client: Arc<dyn RemoteBuildClient>, settings: TrackerSettings) -> Self {
        Self { client, settings }
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    /// Wait with the default settings
    pub async fn wait(
        &self,
        deployment_id: &str,
        observer: Arc<dyn BuildObserver>,
    ) -> DeploymentOutcome {
        self.wait_with(deployment_id, &self.settings, observer).await
    }

    /// Wait for a deployment to reach a terminal state
    ///
    /// Never fails: transport errors turn into a `Timeout` outcome once the
    /// poll budget is exhausted.
    pub async fn wait_with(
        &self,
        deployment_id: &str,
        settings: &TrackerSettings,
        observer: Arc<dyn BuildObserver>,
    ) -> DeploymentOutcome {
        // Fast path: already finished, nothing to race
        match self.client.get_status(deployment_id).await {
            Ok(status) if status.ready_state.is_terminal() => {
                info!(
                    deployment_id,
                    state = ?status.ready_state,
                    "Deployment already terminal"
                );
                return match status.ready_state {
                    ReadyState::Ready => ready_outcome(deployment_id, status.url, Vec::new()),
                    ReadyState::Canceled => canceled_outcome(deployment_id, Vec::new()),
                    _ => {
                        self.reconcile_error(
                            deployment_id,
                            Duration::ZERO,
                            observer.as_ref(),
                            StreamedLog::default(),
                            Some(status),
                        )
                        .await
                    }
                };
            }
            Ok(status) => debug!(deployment_id, state = ?status.ready_state, "Deployment in progress"),
            Err(e) => warn!(deployment_id, "Initial status check failed: {}", e),
        }

        let streamed: SharedLog = Arc::default();
        let cancel = CancellationToken::new();

        let mut stream_task = tokio::spawn(read_stream(
            self.client.clone(),
            deployment_id.to_string(),
            observer.clone(),
            streamed.clone(),
            cancel.child_token(),
        ));
        let mut poll_task = tokio::spawn(poll_status(
            self.client.clone(),
            deployment_id.to_string(),
            settings.clone(),
            cancel.child_token(),
        ));

        let finish = tokio::select! {
            streamed_state = &mut stream_task => match streamed_state {
                Ok(Some(state)) => Finish::Stream(state),
                // The stream gave up; the poller decides
                _ => join_poller(&mut poll_task).await,
            },
            polled = &mut poll_task => finish_from_poll(polled),
        };

        cancel.cancel();
        stream_task.abort();
        poll_task.abort();

        let log = take_log(&streamed);
        let (state, status) = match finish {
            Finish::Stream(state) => {
                debug!(deployment_id, ?state, "Event stream won the race");
                (state, None)
            }
            Finish::Poll(status) => {
                debug!(deployment_id, state = ?status.ready_state, "Status poll won the race");
                (status.ready_state, Some(status))
            }
            Finish::Timeout => {
                warn!(deployment_id, "Deployment did not finish within the poll budget");
                return DeploymentOutcome {
                    deployment_id: deployment_id.to_string(),
                    status: OutcomeStatus::Timeout,
                    error: Some(TIMEOUT_MESSAGE.to_string()),
                    build_logs: log.lines,
                    url: None,
                };
            }
        };

        match state {
            ReadyState::Ready => {
                let url = status.and_then(|s| s.url);
                ready_outcome(deployment_id, url, log.lines)
            }
            ReadyState::Canceled => canceled_outcome(deployment_id, log.lines),
            _ => {
                self.reconcile_error(deployment_id, settings.error_log_grace, observer.as_ref(), log, status)
                    .await
            }
        }
    }

    /// Build the outcome of a failed deployment from the authoritative log
    async fn reconcile_error(
        &self,
        deployment_id: &str,
        grace: Duration,
        observer: &dyn BuildObserver,
        streamed: StreamedLog,
        status: Option<Deployment>,
    ) -> DeploymentOutcome {
        // Diagnostic lines often land after the terminal event
        if !grace.is_zero() {
            tokio::time::sleep(grace).await;
        }

        let build_logs = match self.client.list_all_events(deployment_id).await {
            Ok(events) => replay_events(&events, observer, &streamed.emitted),
            Err(e) => {
                warn!(deployment_id, "Failed to fetch full build log: {}", e);
                streamed.lines
            }
        };

        let status = match status {
            Some(status) => Some(status),
            None => self.client.get_status(deployment_id).await.ok(),
        };

        let error = synthesize_error(status.as_ref(), &build_logs);
        info!(deployment_id, error = %error, "Deployment failed");

        DeploymentOutcome {
            deployment_id: deployment_id.to_string(),
            status: OutcomeStatus::Error,
            error: Some(error),
            build_logs,
            url: status.and_then(|s| s.url),
        }
    }
}

async fn read_stream(
    client: Arc<dyn RemoteBuildClient>,
    deployment_id: String,
    observer: Arc<dyn BuildObserver>,
    streamed: SharedLog,
    cancel: CancellationToken,
) -> Option<ReadyState> {
    let reading = async {
        let mut lines = match client.stream_events(&deployment_id).await {
            Ok(lines) => lines,
            Err(e) => {
                debug!(deployment_id, "Event stream unavailable: {}", e);
                return None;
            }
        };

        while let Some(line) = lines.next().await {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    debug!(deployment_id, "Event stream interrupted: {}", e);
                    return None;
                }
            };

            let event: DeploymentEvent = match serde_json::from_str(&line) {
                Ok(event) => event,
                Err(_) => {
                    debug!(deployment_id, "Skipping unparseable event line");
                    continue;
                }
            };

            if let Some(state) = handle_stream_event(&event, observer.as_ref(), &streamed) {
                return Some(state);
            }
        }

        None
    };

    tokio::select! {
        _ = cancel.cancelled() => None,
        state = reading => match state {
            Some(state) => Some(state),
            None => {
                // Keep the race open until the poller finishes
                cancel.cancelled().await;
                None
            }
        },
    }
}

/// Route one live event; returns the terminal state it signals, if any
fn handle_stream_event(
    event: &DeploymentEvent,
    observer: &dyn BuildObserver,
    streamed: &SharedLog,
) -> Option<ReadyState> {
    let stream = match event.event_type {
        EventType::Stdout => LogStream::Stdout,
        EventType::Stderr => LogStream::Stderr,
        EventType::Command => LogStream::Command,
        EventType::Fatal => LogStream::Fatal,
        EventType::StateChange => {
            let state = event.ready_state()?;
            observer.on_state_change(state);
            return state.is_terminal().then_some(state);
        }
        EventType::Other => return None,
    };

    if let Some(text) = event.text() {
        observer.on_log(stream, text);
        record_line(streamed, text);
    }

    // A fatal event ends the build even without a state change
    (stream == LogStream::Fatal).then_some(ReadyState::Error)
}

async fn poll_status(
    client: Arc<dyn RemoteBuildClient>,
    deployment_id: String,
    settings: TrackerSettings,
    cancel: CancellationToken,
) -> Option<Deployment> {
    for attempt in 1..=settings.max_poll_attempts {
        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(settings.poll_interval) => {}
        }

        match client.get_status(&deployment_id).await {
            Ok(status) if status.ready_state.is_terminal() => return Some(status),
            Ok(status) => debug!(
                deployment_id,
                attempt,
                state = ?status.ready_state,
                "Deployment still running"
            ),
            Err(e) => warn!(deployment_id, attempt, "Status poll failed: {}", e),
        }
    }

    None
}

async fn join_poller(poll_task: &mut JoinHandle<Option<Deployment>>) -> Finish {
    finish_from_poll(poll_task.await)
}

fn finish_from_poll(polled: Result<Option<Deployment>, tokio::task::JoinError>) -> Finish {
    match polled {
        Ok(Some(status)) => Finish::Poll(status),
        Ok(None) => Finish::Timeout,
        Err(e) => {
            warn!("Status poller stopped unexpectedly: {}", e);
            Finish::Timeout
        }
    }
}

/// Replay the authoritative log, skipping lines observers already saw
fn replay_events(
    events: &[DeploymentEvent],
    observer: &dyn BuildObserver,
    already_emitted: &HashSet<String>,
) -> Vec<String> {
    let mut lines = Vec::new();

    for event in events {
        let stream = match event.event_type {
            EventType::Stdout => LogStream::Stdout,
            EventType::Stderr => LogStream::Stderr,
            EventType::Fatal => LogStream::Fatal,
            _ => continue,
        };
        let Some(text) = event.text() else {
            continue;
        };

        if !already_emitted.contains(text) {
            observer.on_log(stream, text);
        }
        lines.push(text.to_string());
    }

    lines
}

fn ready_outcome(deployment_id: &str, url: Option<String>, build_logs: Vec<String>) -> DeploymentOutcome {
    DeploymentOutcome {
        deployment_id: deployment_id.to_string(),
        status: OutcomeStatus::Ready,
        error: None,
        build_logs,
        url,
    }
}

fn canceled_outcome(deployment_id: &str, build_logs: Vec<String>) -> DeploymentOutcome {
    DeploymentOutcome {
        deployment_id: deployment_id.to_string(),
        status: OutcomeStatus::Canceled,
        error: Some(CANCELED_MESSAGE.to_string()),
        build_logs,
        url: None,
    }
}

/// Human readable error for a failed deployment; never empty
pub fn synthesize_error(status: Option<&Deployment>, logs: &[String]) -> String {
    if let Some(status) = status {
        let message = status
            .error_message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty());
        if let Some(message) = message {
            return match status.error_step.as_deref().filter(|s| !s.is_empty()) {
                Some(step) => format!("{}: {}", step, message),
                None => message.to_string(),
            };
        }
    }

    if let Some(block) = extract_error_block(logs) {
        return block;
    }

    match status.and_then(|s| s.error_code.as_deref()).filter(|c| !c.is_empty()) {
        Some(code) => format!("Deployment failed with error code {}", code),
        None => FALLBACK_ERROR_MESSAGE.to_string(),
    }
}

/// Lines around the first error-looking line of a build log
pub fn extract_error_block(logs: &[String]) -> Option<String> {
    let first = logs.iter().position(|line| {
        let lower = line.to_lowercase();
        ERROR_MARKERS.iter().any(|marker| lower.contains(marker))
    })?;

    let start = first.saturating_sub(CONTEXT_BEFORE);
    let end = (first + CONTEXT_AFTER + 1).min(logs.len());

    let block = logs[start..end]
        .iter()
        .map(|line| line.trim_end())
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if block.is_empty() {
        return None;
    }
    Some(truncate_chars(block, MAX_ERROR_CHARS))
}

fn truncate_chars(mut text: String, max: usize) -> String {
    if let Some((idx, _)) = text.char_indices().nth(max) {
        text.truncate(idx);
        text.push('…');
    }
    text
}
