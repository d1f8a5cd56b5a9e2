//! Bridge error types

use thiserror::Error;

/// Result type alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors raised while resolving, launching, talking to or stopping a
/// language server session.
#[derive(Debug, Error, Clone)]
pub enum BridgeError {
    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        context: Option<String>,
    },

    /// The server process could not be spawned
    #[error("Failed to spawn '{command}': {message}")]
    Spawn {
        command: String,
        message: String,
        context: Option<String>,
    },

    /// Transport error
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        context: Option<String>,
    },

    /// Protocol error (malformed frame or unexpected message)
    #[error("Protocol error: {message}")]
    Protocol {
        message: String,
        context: Option<String>,
    },

    /// Error response from the server
    #[error("Server error {code}: {message}")]
    Server {
        code: i32,
        message: String,
        context: Option<String>,
    },

    /// Timeout
    #[error("Request timeout after {seconds} seconds")]
    Timeout {
        seconds: u64,
        context: Option<String>,
    },

    /// Serialization error
    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        context: Option<String>,
    },

    /// Session is not running
    #[error("Session not running")]
    NotRunning,

    /// Other error
    #[error("Bridge error: {message}")]
    Other {
        message: String,
        context: Option<String>,
    },
}

impl BridgeError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            context: None,
        }
    }

    pub fn spawn(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Spawn {
            command: command.into(),
            message: message.into(),
            context: None,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            context: None,
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
            context: None,
        }
    }

    pub fn server(code: i32, message: impl Into<String>) -> Self {
        Self::Server {
            code,
            message: message.into(),
            context: None,
        }
    }

    pub fn timeout(seconds: u64) -> Self {
        Self::Timeout {
            seconds,
            context: None,
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
            context: None,
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
            context: None,
        }
    }

    /// Attach context describing where the error happened
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let ctx = Some(context.into());
        match &mut self {
            Self::Config { context: c, .. } => *c = ctx,
            Self::Spawn { context: c, .. } => *c = ctx,
            Self::Transport { context: c, .. } => *c = ctx,
            Self::Protocol { context: c, .. } => *c = ctx,
            Self::Server { context: c, .. } => *c = ctx,
            Self::Timeout { context: c, .. } => *c = ctx,
            Self::Serialization { context: c, .. } => *c = ctx,
            Self::Other { context: c, .. } => *c = ctx,
            Self::NotRunning => {}
        }
        self
    }

    pub fn context(&self) -> Option<&str> {
        match self {
            Self::Config { context, .. }
            | Self::Spawn { context, .. }
            | Self::Transport { context, .. }
            | Self::Protocol { context, .. }
            | Self::Server { context, .. }
            | Self::Timeout { context, .. }
            | Self::Serialization { context, .. }
            | Self::Other { context, .. } => context.as_deref(),
            Self::NotRunning => None,
        }
    }

    /// Stable code for programmatic handling (and for the host protocol)
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "BRIDGE_CONFIG",
            Self::Spawn { .. } => "BRIDGE_SPAWN",
            Self::Transport { .. } => "BRIDGE_TRANSPORT",
            Self::Protocol { .. } => "BRIDGE_PROTOCOL",
            Self::Server { .. } => "BRIDGE_SERVER",
            Self::Timeout { .. } => "BRIDGE_TIMEOUT",
            Self::Serialization { .. } => "BRIDGE_SERIALIZATION",
            Self::NotRunning => "BRIDGE_NOT_RUNNING",
            Self::Other { .. } => "BRIDGE_OTHER",
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        Self::transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_context_sets_context() {
        let err = BridgeError::transport("pipe closed").with_context("stopping session for 'app'");
        assert_eq!(err.context(), Some("stopping session for 'app'"));
        assert_eq!(err.error_code(), "BRIDGE_TRANSPORT");
    }

    #[test]
    fn test_not_running_has_no_context() {
        let err = BridgeError::NotRunning.with_context("ignored");
        assert!(err.context().is_none());
    }

    #[test]
    fn test_spawn_display() {
        let err = BridgeError::spawn("puyapy-lsp", "No such file or directory");
        assert_eq!(
            err.to_string(),
            "Failed to spawn 'puyapy-lsp': No such file or directory"
        );
        assert_eq!(err.error_code(), "BRIDGE_SPAWN");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "broken");
        let err: BridgeError = io.into();
        assert!(matches!(err, BridgeError::Transport { .. }));
    }
}
