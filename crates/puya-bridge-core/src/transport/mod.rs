//! Byte transports carrying framed LSP messages
//!
//! - **Stdio**: spawn the server and talk over its stdin/stdout
//! - **Socket**: connect to a server already listening on a local port

mod framed;

pub use framed::FramedTransport;

use crate::error::BridgeResult;
use crate::protocol::LspMessage;
use async_trait::async_trait;

/// Transport for LSP communication
///
/// Reading and writing are independent, so a background receiver can sit
/// in [`receive`](Self::receive) while requests are being sent.
#[async_trait]
pub trait LspTransport: Send + Sync {
    async fn send(&self, message: LspMessage) -> BridgeResult<()>;

    /// Next message from the server. Errors once the stream has ended.
    async fn receive(&self) -> BridgeResult<LspMessage>;

    /// Stop writing and release the server process, if any
    async fn close(&self) -> BridgeResult<()>;

    fn is_connected(&self) -> bool;
}
