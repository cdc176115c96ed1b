//! Progress fan-out

use tokio::sync::broadcast;
use tracing::trace;

use crate::models::event::BuildEvent;

/// Fire-and-forget delivery of build events to live observers
pub trait ProgressBroadcaster: Send + Sync {
    fn emit(&self, site_id: &str, event: BuildEvent);
}

/// An event tagged with its site
#[derive(Debug, Clone, PartialEq)]
pub struct SiteEvent {
    pub site_id: String,
    pub event: BuildEvent,
}

/// Broadcaster backed by a tokio broadcast channel
///
/// Slow subscribers lag and lose events; emitting never blocks.
pub struct ChannelBroadcaster {
    sender: broadcast::Sender<SiteEvent>,
}

impl ChannelBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SiteEvent> {
        self.sender.subscribe()
    }
}

impl Default for ChannelBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

impl ProgressBroadcaster for ChannelBroadcaster {
    fn emit(&self, site_id: &str, event: BuildEvent) {
        let event = SiteEvent {
            site_id: site_id.to_string(),
            event,
        };
        if self.sender.send(event).is_err() {
            trace!(site_id, "No subscribers for build event");
        }
    }
}
