//! Per-connection session: handshake, relay loop and teardown.
//!
//! ```text
//! AwaitingHandshake ──first read (n > 0)──► Active ──read (n > 0)──► Active
//!        │                                     │
//!        └── EOF / error / shutdown ──────────┴── EOF / error / shutdown ──► Closed
//! ```
//!
//! Teardown runs exactly once on every path into `Closed`, including a
//! panic inside the read loop.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use metrics::counter;
use natter_core::messages::decode_line;
use natter_core::{ConnectionId, Nickname, OutboundMessage};
use natter_settings::ServerSettings;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::broadcast::Broadcaster;
use crate::metrics::MESSAGES_TOTAL;
use crate::registry::{ConnectionRegistry, Departure, Outbox};

/// Per-session tunables, taken from [`ServerSettings`].
#[derive(Clone, Copy, Debug)]
pub struct SessionConfig {
    /// Size of one transport read. One read is one message.
    pub read_buffer_bytes: usize,
    /// How long teardown waits for queued outbound messages to flush.
    pub drain_timeout: Duration,
}

impl From<&ServerSettings> for SessionConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            read_buffer_bytes: settings.read_buffer_bytes,
            drain_timeout: settings.drain_timeout(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&ServerSettings::default())
    }
}

/// Where a session is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Registered, waiting for the first read to bind a nickname.
    AwaitingHandshake,
    /// Nickname bound; reads are relayed as chat.
    Active,
    /// Torn down.
    Closed,
}

/// Why a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    /// The first read returned nothing or failed; no nickname was bound.
    HandshakeFailed,
    /// The peer closed the connection after the handshake.
    PeerClosed,
    /// A read failed after the handshake.
    ReadFailed,
    /// The server is shutting down.
    Shutdown,
    /// The read loop panicked.
    Panicked,
}

/// Returned by [`SessionHandler::run`] once teardown has completed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSummary {
    /// Connection the session served.
    pub id: ConnectionId,
    /// Nickname the registry held at teardown.
    pub nickname: Option<Nickname>,
    /// Why the session ended.
    pub end: SessionEnd,
    /// Chat messages relayed from this connection.
    pub messages: u64,
    /// Whether teardown found the connection registered and announced the leave.
    pub announced_leave: bool,
}

/// Drives one accepted connection from handshake to teardown.
pub struct SessionHandler {
    id: ConnectionId,
    registry: Arc<ConnectionRegistry>,
    broadcaster: Broadcaster,
    config: SessionConfig,
    shutdown: CancellationToken,
    state: SessionState,
    messages: u64,
}

impl SessionHandler {
    /// `id` must already be registered; the acceptor does that before
    /// spawning the session.
    pub fn new(
        id: ConnectionId,
        broadcaster: Broadcaster,
        config: SessionConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            id,
            registry: Arc::clone(broadcaster.registry()),
            broadcaster,
            config,
            shutdown,
            state: SessionState::AwaitingHandshake,
            messages: 0,
        }
    }

    /// Connection this session serves.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the session over `stream` until the peer leaves, then tear down.
    ///
    /// `outbox` is the receiving end of the queue registered for this
    /// connection; a writer task drains it to the stream.
    pub async fn run<S>(mut self, stream: S, outbox: Outbox) -> SessionSummary
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (mut reader, writer) = tokio::io::split(stream);
        let writer = tokio::spawn(write_outbox(writer, outbox, self.id.clone()));

        let end = match AssertUnwindSafe(self.drive(&mut reader)).catch_unwind().await {
            Ok(end) => end,
            Err(_) => {
                error!(conn_id = %self.id, "session panicked");
                SessionEnd::Panicked
            }
        };

        let departure = self.teardown(end);
        self.close(writer).await;

        SessionSummary {
            id: self.id,
            announced_leave: departure.is_some(),
            nickname: departure.and_then(|d| d.nickname),
            end,
            messages: self.messages,
        }
    }

    async fn drive<R>(&mut self, reader: &mut R) -> SessionEnd
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = vec![0u8; self.config.read_buffer_bytes.max(1)];
        loop {
            let read = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => return SessionEnd::Shutdown,
                read = reader.read(&mut buf) => read,
            };

            let n = match read {
                Ok(0) => return self.end_on(SessionEnd::PeerClosed),
                Ok(n) => n,
                Err(e) => {
                    debug!(conn_id = %self.id, error = %e, "read failed");
                    return self.end_on(SessionEnd::ReadFailed);
                }
            };

            match self.state {
                SessionState::AwaitingHandshake => self.complete_handshake(&buf[..n]),
                SessionState::Active => self.relay(&buf[..n]),
                SessionState::Closed => return SessionEnd::PeerClosed,
            }
        }
    }

    /// A failed first read is a failed handshake, whatever the cause.
    fn end_on(&self, end: SessionEnd) -> SessionEnd {
        if self.state == SessionState::AwaitingHandshake {
            SessionEnd::HandshakeFailed
        } else {
            end
        }
    }

    fn complete_handshake(&mut self, bytes: &[u8]) {
        let nickname = Nickname::from_wire(bytes);
        if !self.registry.set_nickname(&self.id, nickname.clone()) {
            warn!(conn_id = %self.id, "connection left the registry before its handshake");
        }
        let _ = self.broadcaster.broadcast(&OutboundMessage::joined(&nickname));
        info!(conn_id = %self.id, nickname = %nickname, "{nickname} has joined the chat!");
        self.state = SessionState::Active;
    }

    fn relay(&mut self, bytes: &[u8]) {
        let payload = decode_line(bytes);
        // A miss means teardown raced the read; show the sender as unknown.
        let nickname = self.registry.lookup_nickname(&self.id);
        let message = OutboundMessage::chat(self.id.clone(), nickname.as_ref(), &payload);
        let _ = self.broadcaster.broadcast(&message);
        self.messages += 1;
        counter!(MESSAGES_TOTAL).increment(1);
        debug!(conn_id = %self.id, "{}", message.text);
    }

    fn teardown(&mut self, end: SessionEnd) -> Option<Departure> {
        self.state = SessionState::Closed;
        let Some(departure) = self.registry.unregister(&self.id) else {
            warn!(conn_id = %self.id, ?end, "connection already unregistered, not announcing leave");
            return None;
        };
        let message = OutboundMessage::left(departure.nickname.as_ref());
        let _ = self.broadcaster.broadcast(&message);
        info!(conn_id = %self.id, ?end, messages = self.messages, "{}", message.text);
        Some(departure)
    }

    /// Let the writer flush what is queued, then close the transport.
    async fn close(&self, writer: JoinHandle<()>) {
        let abort = writer.abort_handle();
        if tokio::time::timeout(self.config.drain_timeout, writer)
            .await
            .is_err()
        {
            warn!(conn_id = %self.id, "outbound queue did not drain in time, closing");
            abort.abort();
        }
    }
}

/// Write queued messages to the socket until every sender is gone, then
/// shut the write side down.
async fn write_outbox<W>(mut writer: W, mut outbox: Outbox, id: ConnectionId)
where
    W: AsyncWrite + Unpin,
{
    while let Some(text) = outbox.recv().await {
        let written = async {
            writer.write_all(text.as_bytes()).await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = written {
            debug!(conn_id = %id, error = %e, "write failed, discarding outbound queue");
            return;
        }
    }
    if let Err(e) = writer.shutdown().await {
        debug!(conn_id = %id, error = %e, "shutdown failed");
    }
}
