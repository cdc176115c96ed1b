//! Forwarding of remote build output to the progress broadcaster

use std::sync::Arc;

use vercel_models::ReadyState;

use crate::deploy::tracker::BuildObserver;
use crate::models::event::{BuildEvent, LogStream};
use crate::services::broadcast::ProgressBroadcaster;

pub struct SiteObserver {
    site_id: String,
    broadcaster: Arc<dyn ProgressBroadcaster>,
}

impl SiteObserver {
    pub fn new(site_id: impl Into<String>, broadcaster: Arc<dyn ProgressBroadcaster>) -> Self {
        Self {
            site_id: site_id.into(),
            broadcaster,
        }
    }
}

impl BuildObserver for SiteObserver {
    fn on_log(&self, stream: LogStream, text: &str) {
        self.broadcaster.emit(
            &self.site_id,
            BuildEvent::Log {
                stream,
                text: text.to_string(),
            },
        );
    }

    fn on_state_change(&self, state: ReadyState) {
        self.broadcaster
            .emit(&self.site_id, BuildEvent::State { state });
    }
}
