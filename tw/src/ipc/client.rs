//! IPC client for communicating with the daemon
//!
//! Provides a simple interface for the CLI to send requests to the daemon
//! via Unix Domain Socket.

use std::path::PathBuf;
use std::time::Duration;

use eyre::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::debug;

use super::get_socket_path;
use super::listener::MAX_MESSAGE_SIZE;
use super::messages::{DaemonMessage, DaemonResponse};
use crate::domain::{ItemId, ItemStatus, TrackedItem};
use crate::events::WatchEvent;
use crate::reconcile::IngestReport;

/// Default timeout for IPC operations
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Submitting a URL waits on tracker logins and downloads
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(120);

/// Maximum response size; item lists can be long
const MAX_RESPONSE_SIZE: usize = 4 * 1024 * 1024;

fn unexpected(response: DaemonResponse) -> eyre::Report {
    match response {
        DaemonResponse::Error { kind, message } => eyre::eyre!("Daemon error ({}): {}", kind, message),
        other => eyre::eyre!("Unexpected response: {:?}", other),
    }
}

/// Client for communicating with the daemon via IPC
#[derive(Debug, Clone)]
pub struct DaemonClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl Default for DaemonClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DaemonClient {
    /// Create a new client with the default socket path
    pub fn new() -> Self {
        Self::with_socket_path(get_socket_path())
    }

    /// Create a client with a custom socket path
    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set a custom timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check if the daemon socket exists
    pub fn socket_exists(&self) -> bool {
        self.socket_path.exists()
    }

    pub async fn submit_url(&self, url: &str, save_path: Option<String>) -> Result<IngestReport> {
        debug!(%url, "DaemonClient: submitting url");
        let msg = DaemonMessage::SubmitUrl {
            url: url.to_string(),
            save_path,
        };
        let timeout = self.timeout.max(SUBMIT_TIMEOUT);
        match self.request(msg, timeout).await? {
            DaemonResponse::Submitted { status, item } => Ok(IngestReport { status, item }),
            other => Err(unexpected(other)),
        }
    }

    pub async fn list_items(&self) -> Result<Vec<TrackedItem>> {
        match self.send_message(DaemonMessage::ListItems).await? {
            DaemonResponse::Items { items } => Ok(items),
            other => Err(unexpected(other)),
        }
    }

    pub async fn remove_item(&self, id: ItemId) -> Result<()> {
        debug!(id, "DaemonClient: removing item");
        match self.request(DaemonMessage::RemoveItem { id }, SUBMIT_TIMEOUT).await? {
            DaemonResponse::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    pub async fn set_watch(&self, id: ItemId, minutes: u32) -> Result<()> {
        match self.send_message(DaemonMessage::SetWatch { id, minutes }).await? {
            DaemonResponse::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    pub async fn download_paths(&self) -> Result<Vec<String>> {
        match self.send_message(DaemonMessage::DownloadPaths).await? {
            DaemonResponse::Paths { paths } => Ok(paths),
            other => Err(unexpected(other)),
        }
    }

    /// Check if daemon is alive and get its version
    pub async fn ping(&self) -> Result<String> {
        debug!("DaemonClient: pinging daemon");
        match self.send_message(DaemonMessage::Ping).await? {
            DaemonResponse::Pong { version } => Ok(version),
            other => Err(unexpected(other)),
        }
    }

    /// Request daemon to shutdown gracefully
    pub async fn shutdown(&self) -> Result<()> {
        debug!("DaemonClient: requesting daemon shutdown");
        match self.send_message(DaemonMessage::Shutdown).await? {
            DaemonResponse::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Open a subscription: the current statuses, then a stream of events
    pub async fn subscribe(&self) -> Result<(Vec<ItemStatus>, Subscription)> {
        let stream = self.connect().await?;
        let mut subscription = Subscription {
            reader: BufReader::new(stream),
        };
        subscription.write(&DaemonMessage::Subscribe, self.timeout).await?;
        let first = tokio::time::timeout(self.timeout, subscription.read())
            .await
            .context("Read timeout")??;
        match first {
            Some(DaemonResponse::Snapshot { statuses }) => Ok((statuses, subscription)),
            Some(other) => Err(unexpected(other)),
            None => Err(eyre::eyre!("Daemon closed the connection")),
        }
    }

    async fn connect(&self) -> Result<UnixStream> {
        tokio::time::timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("Connection timeout")?
            .context("Failed to connect to daemon socket")
    }

    async fn send_message(&self, msg: DaemonMessage) -> Result<DaemonResponse> {
        self.request(msg, self.timeout).await
    }

    /// Send a message and wait up to `timeout` for the response
    async fn request(&self, msg: DaemonMessage, timeout: Duration) -> Result<DaemonResponse> {
        debug!(?self.socket_path, ?msg, "DaemonClient: sending message");
        let stream = self.connect().await?;
        let mut conn = Subscription {
            reader: BufReader::new(stream),
        };
        conn.write(&msg, self.timeout).await?;

        let response = tokio::time::timeout(timeout, conn.read())
            .await
            .context("Read timeout")??
            .ok_or_else(|| eyre::eyre!("Daemon closed the connection"))?;

        debug!(?response, "DaemonClient: received response");
        Ok(response)
    }
}

/// Open connection to the daemon, read line by line
pub struct Subscription {
    reader: BufReader<UnixStream>,
}

impl Subscription {
    async fn write(&mut self, msg: &DaemonMessage, timeout: Duration) -> Result<()> {
        let msg_json = serde_json::to_string(msg).context("Failed to serialize message")?;
        if msg_json.len() > MAX_MESSAGE_SIZE {
            return Err(eyre::eyre!("Message too large: {} bytes", msg_json.len()));
        }

        let stream = self.reader.get_mut();
        tokio::time::timeout(timeout, async {
            stream
                .write_all(msg_json.as_bytes())
                .await
                .context("Failed to write message")?;
            stream.write_all(b"\n").await.context("Failed to write newline")?;
            stream.flush().await.context("Failed to flush stream")?;
            Ok::<_, eyre::Error>(())
        })
        .await
        .context("Write timeout")?
    }

    /// Next response line, or `None` once the daemon hangs up
    async fn read(&mut self) -> Result<Option<DaemonResponse>> {
        let mut line = String::new();
        let bytes_read = self
            .reader
            .read_line(&mut line)
            .await
            .context("Failed to read response")?;
        if bytes_read == 0 {
            return Ok(None);
        }
        if bytes_read > MAX_RESPONSE_SIZE {
            return Err(eyre::eyre!("Response too large: {} bytes", bytes_read));
        }
        let response = serde_json::from_str(line.trim()).context("Failed to parse daemon response")?;
        Ok(Some(response))
    }

    /// Wait for the next event; `None` when the daemon stops
    pub async fn next_event(&mut self) -> Result<Option<WatchEvent>> {
        match self.read().await? {
            Some(DaemonResponse::Event { event }) => Ok(Some(event)),
            Some(other) => Err(unexpected(other)),
            None => Ok(None),
        }
    }
}
