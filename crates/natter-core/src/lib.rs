//! # natter-core
//!
//! Types shared between the natter server and client: connection ids,
//! nicknames, outbound messages and the fixed texts the server sends.

#![deny(unsafe_code)]

pub mod ids;
pub mod messages;

pub use ids::ConnectionId;
pub use messages::{Nickname, OutboundMessage};

/// Default TCP port for both server and client.
pub const DEFAULT_PORT: u16 = 8080;

/// Default size of a single transport read. One read is treated as one message.
pub const READ_BUFFER_BYTES: usize = 1024;

/// Default number of concurrently registered connections.
pub const MAX_CLIENTS: usize = 10;
