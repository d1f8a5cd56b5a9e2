//! User-facing notifications
//!
//! The registry reports start failures and restart confirmations through a
//! [`Notifier`]; the host decides how they reach the user.

use std::sync::Mutex;
use tracing::{error, info};

/// Message severity shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, severity: Severity, message: &str);

    fn info(&self, message: &str) {
        self.notify(Severity::Info, message);
    }

    fn warn(&self, message: &str) {
        self.notify(Severity::Warning, message);
    }

    fn error(&self, message: &str) {
        self.notify(Severity::Error, message);
    }
}

/// Writes notifications to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => info!(target: "puya_bridge::user", "{}", message),
            Severity::Warning => tracing::warn!(target: "puya_bridge::user", "{}", message),
            Severity::Error => error!(target: "puya_bridge::user", "{}", message),
        }
    }
}

/// Keeps every notification, for inspection
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(Severity, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(Severity, String)> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    pub fn errors(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|(s, _)| *s == Severity::Error)
            .map(|(_, m)| m)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push((severity, message.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_notifier_filters_errors() {
        let notifier = RecordingNotifier::new();
        notifier.info("restarted");
        notifier.error("failed");
        notifier.warn("careful");

        assert_eq!(notifier.messages().len(), 3);
        assert_eq!(notifier.errors(), vec!["failed".to_string()]);
    }
}
