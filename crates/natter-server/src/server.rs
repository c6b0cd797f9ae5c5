//! Server lifecycle: bind, spawn the acceptor, shut down.
//!
//! [`start`] returns once the listener is bound. Every task it spawns is
//! tracked by the returned [`ServerHandle`], so [`ServerHandle::shutdown`]
//! returns only after each session has announced its leave and closed.

use std::net::SocketAddr;
use std::sync::Arc;

use natter_settings::ServerSettings;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::acceptor::ConnectionAcceptor;
use crate::broadcast::Broadcaster;
use crate::errors::ServerError;
use crate::registry::ConnectionRegistry;

/// Bind the listener and start accepting. Returns a handle to stop it.
pub async fn start(settings: ServerSettings) -> Result<ServerHandle, ServerError> {
    settings.validate()?;

    let addr = settings.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
    let local_addr = listener.local_addr()?;

    let registry = Arc::new(ConnectionRegistry::new(settings.max_clients));
    let shutdown = CancellationToken::new();
    let tracker = TaskTracker::new();

    let acceptor = ConnectionAcceptor::new(
        listener,
        Broadcaster::new(Arc::clone(&registry)),
        &settings,
        shutdown.clone(),
        tracker.clone(),
    );
    let acceptor = tokio::spawn(acceptor.run());

    info!(
        %local_addr,
        max_clients = settings.max_clients,
        "natter server listening"
    );

    Ok(ServerHandle {
        local_addr,
        registry,
        shutdown,
        tracker,
        acceptor,
    })
}

/// Handle returned by [`start`]: owns the acceptor and every session task.
pub struct ServerHandle {
    local_addr: SocketAddr,
    registry: Arc<ConnectionRegistry>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    acceptor: JoinHandle<()>,
}

impl ServerHandle {
    /// Address the listener is bound to. Useful when binding port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Live connection registry shared with every session.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Connections currently registered, handshake complete or not.
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Token that stops the acceptor and every session when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop accepting, end every session and wait for their teardown.
    pub async fn shutdown(self) {
        info!(
            connections = self.registry.len(),
            "shutting down natter server"
        );
        self.shutdown.cancel();
        self.wait().await;
    }

    /// Wait until the acceptor has stopped and every session has finished.
    /// Returns only after the shutdown token has been cancelled.
    pub async fn wait(self) {
        if let Err(e) = self.acceptor.await {
            warn!(error = %e, "acceptor task failed");
        }
        let _ = self.tracker.close();
        self.tracker.wait().await;
        info!("natter server stopped");
    }
}
