//! Server error types.

use natter_core::ConnectionId;
use natter_settings::SettingsError;

/// Errors that stop the server from starting.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address the bind was attempted on.
        addr: String,
        /// Underlying socket error.
        #[source]
        source: std::io::Error,
    },
    /// Settings failed validation.
    #[error("invalid server settings: {0}")]
    Settings(#[from] SettingsError),
    /// Any other socket error during startup.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons the registry refuses a new connection.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The live set already holds `capacity` connections.
    #[error("server is full ({capacity} connections)")]
    Full {
        /// Configured maximum.
        capacity: usize,
    },
    /// The id is already in the live set.
    #[error("connection already registered: {0}")]
    AlreadyRegistered(ConnectionId),
}
