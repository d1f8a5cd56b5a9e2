//! User messages delivered as `message` events

use super::protocol::HostEvent;
use puya_bridge_core::Notifier;
use puya_bridge_core::notify::Severity;
use tokio::sync::mpsc;
use tracing::debug;

pub struct ChannelNotifier {
    event_tx: mpsc::UnboundedSender<HostEvent>,
}

impl ChannelNotifier {
    pub fn new(event_tx: mpsc::UnboundedSender<HostEvent>) -> Self {
        Self { event_tx }
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        debug!(?severity, "{}", message);
        // The writer is gone only during shutdown
        let _ = self.event_tx.send(HostEvent::Message {
            severity,
            message: message.to_string(),
        });
    }
}
