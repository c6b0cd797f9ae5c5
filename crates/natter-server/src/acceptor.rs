//! Accept loop: capacity check, rejection notice and session spawning.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use natter_core::ConnectionId;
use natter_core::messages::SERVER_FULL_NOTICE;
use natter_settings::ServerSettings;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::broadcast::Broadcaster;
use crate::errors::RegistryError;
use crate::metrics::{CONNECTIONS_REJECTED_TOTAL, CONNECTIONS_TOTAL};
use crate::registry::{ConnectionHandle, ConnectionRegistry};
use crate::session::{SessionConfig, SessionHandler};

/// What happened to one accepted connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Admission {
    /// Registered and handed to a new session task.
    Spawned(ConnectionId),
    /// Turned away with the full-server notice.
    Rejected,
    /// Registered, then rolled back because no session could be started.
    RolledBack,
}

/// Owns the listener and admits connections into the registry.
pub struct ConnectionAcceptor {
    listener: TcpListener,
    broadcaster: Broadcaster,
    session: SessionConfig,
    send_queue: usize,
    accept_backoff: Duration,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl ConnectionAcceptor {
    /// Sessions it spawns join `tracker` and stop when `shutdown` fires.
    pub fn new(
        listener: TcpListener,
        broadcaster: Broadcaster,
        settings: &ServerSettings,
        shutdown: CancellationToken,
        tracker: TaskTracker,
    ) -> Self {
        Self {
            listener,
            broadcaster,
            session: SessionConfig::from(settings),
            send_queue: settings.send_queue,
            accept_backoff: settings.accept_backoff(),
            shutdown,
            tracker,
        }
    }

    /// Registry checked for capacity before each session starts.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        self.broadcaster.registry()
    }

    /// Accept until the shutdown token fires. Accept errors are logged and
    /// never end the loop.
    pub async fn run(self) {
        loop {
            let accepted = tokio::select! {
                () = self.shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };
            match accepted {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!(%peer, error = %e, "could not set TCP_NODELAY");
                    }
                    let _ = self.admit(stream, peer);
                }
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    tokio::time::sleep(self.accept_backoff).await;
                }
            }
        }
        info!("acceptor stopped");
    }

    /// Register `stream` and spawn its session, or turn it away if the
    /// registry is full. Never waits on the connection itself.
    pub fn admit<S>(&self, stream: S, peer: impl Display) -> Admission
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (handle, outbox) = ConnectionHandle::channel(self.send_queue);
        let id = handle.id().clone();

        match self.registry().register(handle) {
            Ok(()) => {}
            Err(RegistryError::Full { capacity }) => {
                counter!(CONNECTIONS_REJECTED_TOTAL).increment(1);
                info!(%peer, capacity, "server full, rejecting connection");
                let _ = self.tracker.spawn(reject(stream, self.session.drain_timeout));
                return Admission::Rejected;
            }
            Err(e @ RegistryError::AlreadyRegistered(_)) => {
                error!(%peer, error = %e, "fresh connection id collided, dropping connection");
                return Admission::Rejected;
            }
        }

        if self.shutdown.is_cancelled() || self.tracker.is_closed() {
            let _ = self.registry().unregister(&id);
            warn!(%peer, conn_id = %id, "shutting down, connection rolled back");
            return Admission::RolledBack;
        }

        counter!(CONNECTIONS_TOTAL).increment(1);
        info!(%peer, conn_id = %id, "connection accepted");

        let session = SessionHandler::new(
            id.clone(),
            self.broadcaster.clone(),
            self.session,
            self.shutdown.child_token(),
        );
        let _ = self.tracker.spawn(async move {
            let summary = session.run(stream, outbox).await;
            debug!(
                conn_id = %summary.id,
                end = ?summary.end,
                messages = summary.messages,
                "session finished"
            );
        });
        Admission::Spawned(id)
    }
}

/// Send the full-server notice straight to the connection and close it.
async fn reject<S>(mut stream: S, timeout: Duration)
where
    S: AsyncWrite + Unpin,
{
    let sent = tokio::time::timeout(timeout, async {
        stream.write_all(SERVER_FULL_NOTICE.as_bytes()).await?;
        stream.shutdown().await
    })
    .await;
    match sent {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "could not deliver full-server notice"),
        Err(_) => debug!("full-server notice timed out"),
    }
}
