//! Background message receiver for the language client

use super::handlers::ClientContext;
use crate::protocol::{LspMessage, LspResponse, RequestId};
use crate::transport::LspTransport;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Requests awaiting a response, keyed by id
pub(super) type PendingRequests = Arc<Mutex<HashMap<RequestId, oneshot::Sender<LspResponse>>>>;

/// Routes responses to waiting callers and answers server requests until
/// the connection ends or `cancel` fires.
pub(super) async fn message_receiver(
    transport: Arc<dyn LspTransport>,
    context: Arc<ClientContext>,
    pending: PendingRequests,
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(folder = %context.folder.name, "Message receiver shutting down");
                break;
            }
            result = transport.receive() => result,
        };

        match message {
            Ok(LspMessage::Response(response)) => {
                let sender = pending
                    .lock()
                    .ok()
                    .and_then(|mut p| p.remove(&response.id));
                match sender {
                    Some(sender) => {
                        if sender.send(response).is_err() {
                            debug!("Caller stopped waiting for response");
                        }
                    }
                    None => warn!("Received response for unknown request: {}", response.id),
                }
            }
            Ok(LspMessage::Notification(notification)) => {
                context.handle_notification(notification);
            }
            Ok(LspMessage::Request(request)) => {
                let response = context.handle_request(request);
                if let Err(e) = transport.send(LspMessage::Response(response)).await {
                    warn!("Failed to answer server request: {}", e);
                }
            }
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    error!(folder = %context.folder.name, "Language server connection lost: {}", e);
                }
                break;
            }
        }
    }

    running.store(false, Ordering::SeqCst);
    // Dropping the senders fails every outstanding call
    if let Ok(mut pending) = pending.lock() {
        for (id, _) in pending.drain() {
            debug!("Abandoning pending request {}", id);
        }
    }
}
