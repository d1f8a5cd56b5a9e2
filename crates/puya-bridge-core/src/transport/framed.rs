//! `Content-Length` framed transport over stdio or TCP

use super::LspTransport;
use crate::error::{BridgeError, BridgeResult};
use crate::launch::LaunchPlan;
use crate::protocol::{LspCodec, LspMessage};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, warn};

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

pub struct FramedTransport {
    reader: Mutex<FramedRead<BoxedReader, LspCodec>>,
    /// Dropped on close, which closes the server's stdin or our socket half
    writer: Mutex<Option<FramedWrite<BoxedWriter, LspCodec>>>,
    child: Mutex<Option<Child>>,
    connected: AtomicBool,
    /// How long a closed server may take to exit before it is killed
    exit_grace: Duration,
}

impl FramedTransport {
    /// Spawn the plan's command and speak over its stdin/stdout.
    ///
    /// The server's stderr is forwarded to the log, tagged with the folder.
    pub async fn spawn_stdio(plan: &LaunchPlan) -> BridgeResult<Self> {
        let strategy = &plan.strategy;
        let mut cmd = Command::new(&strategy.command);
        cmd.args(strategy.args())
            .envs(&plan.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &strategy.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(|e| {
            BridgeError::spawn(strategy.to_string(), e.to_string())
                .with_context(format!("starting server for folder '{}'", plan.folder.name))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BridgeError::transport("Failed to get stdin handle"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::transport("Failed to get stdout handle"))?;

        if let Some(stderr) = child.stderr.take() {
            let folder = plan.folder.name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(folder = %folder, "server: {}", line);
                }
            });
        }

        debug!(pid = ?child.id(), command = %strategy, "Spawned language server");

        let mut transport = Self::from_io(stdout, stdin, plan.shutdown_timeout);
        transport.child = Mutex::new(Some(child));
        Ok(transport)
    }

    /// Connect to a server listening on `127.0.0.1:<port>`
    pub async fn connect_socket(port: u16, exit_grace: Duration) -> BridgeResult<Self> {
        let stream = TcpStream::connect(("127.0.0.1", port)).await.map_err(|e| {
            BridgeError::transport(e.to_string())
                .with_context(format!("connecting to language server on port {}", port))
        })?;
        let (read, write) = stream.into_split();
        debug!(port, "Connected to language server socket");
        Ok(Self::from_io(read, write, exit_grace))
    }

    /// Wrap an existing reader/writer pair
    pub fn from_io<R, W>(reader: R, writer: W, exit_grace: Duration) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            reader: Mutex::new(FramedRead::new(Box::new(reader) as BoxedReader, LspCodec::new())),
            writer: Mutex::new(Some(FramedWrite::new(
                Box::new(writer) as BoxedWriter,
                LspCodec::new(),
            ))),
            child: Mutex::new(None),
            connected: AtomicBool::new(true),
            exit_grace,
        }
    }
}

#[async_trait]
impl LspTransport for FramedTransport {
    async fn send(&self, message: LspMessage) -> BridgeResult<()> {
        let mut writer = self.writer.lock().await;
        let sink = writer.as_mut().ok_or(BridgeError::NotRunning)?;
        if let Err(e) = sink.send(message).await {
            self.connected.store(false, Ordering::SeqCst);
            return Err(e);
        }
        Ok(())
    }

    async fn receive(&self) -> BridgeResult<LspMessage> {
        let mut reader = self.reader.lock().await;
        match reader.next().await {
            Some(result) => result,
            None => {
                self.connected.store(false, Ordering::SeqCst);
                Err(BridgeError::transport("Connection closed"))
            }
        }
    }

    async fn close(&self) -> BridgeResult<()> {
        self.connected.store(false, Ordering::SeqCst);

        if let Some(mut writer) = self.writer.lock().await.take() {
            // Flush anything queued (the `exit` notification) before hanging up
            if let Err(e) = writer.close().await {
                debug!("Error closing writer: {}", e);
            }
        }

        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(());
        };

        tokio::select! {
            result = child.wait() => {
                let status = result.map_err(|e| BridgeError::transport(e.to_string()))?;
                debug!(code = ?status.code(), "Language server exited");
            }
            _ = tokio::time::sleep(self.exit_grace) => {
                warn!("Language server did not exit within {:?}, killing it", self.exit_grace);
                child.kill().await.ok();
            }
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl Drop for FramedTransport {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.get_mut().take() {
            let _ = child.start_kill();
        }
    }
}
