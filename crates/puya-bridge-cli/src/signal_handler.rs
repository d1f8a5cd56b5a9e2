//! Ctrl+C / SIGTERM handling for the host loop

use futures::stream::StreamExt;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::{Handle, Signals};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

/// Waits for the first termination signal on a background task
pub struct SignalHandler {
    handle: Handle,
    task: JoinHandle<()>,
    received: Option<oneshot::Receiver<i32>>,
}

impl SignalHandler {
    /// Start listening for SIGINT and SIGTERM
    pub fn start() -> std::io::Result<Self> {
        let mut signals = Signals::new([SIGINT, SIGTERM])?;
        let handle = signals.handle();
        let (tx, rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            if let Some(signal) = signals.next().await {
                debug!(signal, "Termination signal received");
                let _ = tx.send(signal);
            }
        });

        Ok(Self {
            handle,
            task,
            received: Some(rx),
        })
    }

    /// Resolves once a signal arrives. Never resolves if called twice or
    /// after the handler was closed.
    pub async fn interrupted(&mut self) {
        match self.received.take() {
            Some(rx) => {
                if rx.await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
            None => std::future::pending::<()>().await,
        }
    }

    /// Stop listening
    pub fn close(self) {
        self.handle.close();
        self.task.abort();
    }
}
