//! # natter-server
//!
//! The chat relay server: a connection registry, a broadcaster that fans
//! each message out to every other registered connection, one session task
//! per accepted connection and the accept loop that enforces capacity.
//!
//! ```text
//! accept ─► register placeholder ─► spawn session
//!                                     │
//!            handshake (nickname) ────┤─► broadcast "<nick> has joined the chat!"
//!            read loop ───────────────┤─► broadcast "<nick>: <payload>" (not to self)
//!            teardown (exactly once) ─┘─► unregister, broadcast "<nick> has left the chat!"
//! ```

#![deny(unsafe_code)]

pub mod acceptor;
pub mod broadcast;
pub mod errors;
pub mod metrics;
pub mod registry;
pub mod server;
pub mod session;

pub use acceptor::{Admission, ConnectionAcceptor};
pub use broadcast::{BroadcastReport, Broadcaster};
pub use errors::{RegistryError, ServerError};
pub use registry::{ConnectionHandle, ConnectionRegistry, Departure};
pub use server::{ServerHandle, start};
pub use session::{SessionConfig, SessionEnd, SessionHandler, SessionState, SessionSummary};
