//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a settings
//! file may list only the fields it wants to change.

use std::time::Duration;

use natter_core::{DEFAULT_PORT, MAX_CLIENTS, READ_BUFFER_BYTES};
use natter_core::messages::QUIT_COMMAND;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 9000, "maxClients": 32 },
///   "logging": { "format": "json" }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NatterSettings {
    /// Chat server settings.
    pub server: ServerSettings,
    /// Chat client settings.
    pub client: ClientSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl NatterSettings {
    /// Reject values the server or client cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.client.validate()
    }
}

/// Chat server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port. `0` picks a free port.
    pub port: u16,
    /// Maximum number of concurrently registered connections.
    pub max_clients: usize,
    /// Size of one transport read; one read is one chat message.
    pub read_buffer_bytes: usize,
    /// Outbound queue length per connection before messages are dropped.
    pub send_queue: usize,
    /// How long teardown waits for a connection's queued messages to flush.
    pub drain_timeout_ms: u64,
    /// Pause after a failed accept before trying again.
    pub accept_backoff_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            max_clients: MAX_CLIENTS,
            read_buffer_bytes: READ_BUFFER_BYTES,
            send_queue: 256,
            drain_timeout_ms: 2_000,
            accept_backoff_ms: 100,
        }
    }
}

impl ServerSettings {
    /// `host:port` string for binding the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// [`Self::drain_timeout_ms`] as a duration.
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    /// [`Self::accept_backoff_ms`] as a duration.
    pub fn accept_backoff(&self) -> Duration {
        Duration::from_millis(self.accept_backoff_ms)
    }

    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        require(self.max_clients > 0, "server.maxClients", AT_LEAST_ONE)?;
        require(self.read_buffer_bytes > 0, "server.readBufferBytes", AT_LEAST_ONE)?;
        require(self.send_queue > 0, "server.sendQueue", AT_LEAST_ONE)
    }
}

/// Chat client settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// Server port to connect to.
    pub port: u16,
    /// Size of one transport read from the server.
    pub read_buffer_bytes: usize,
    /// Input line that ends the session.
    pub quit_command: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            read_buffer_bytes: READ_BUFFER_BYTES,
            quit_command: QUIT_COMMAND.to_string(),
        }
    }
}

impl ClientSettings {
    /// Reject values the client cannot run with.
    pub fn validate(&self) -> Result<()> {
        require(self.port != 0, "client.port", "must not be 0")?;
        require(self.read_buffer_bytes > 0, "client.readBufferBytes", AT_LEAST_ONE)
    }
}

const AT_LEAST_ONE: &str = "must be at least 1";

fn require(ok: bool, key: &'static str, reason: &'static str) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(SettingsError::InvalidValue { key, reason })
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive. Overridden by `RUST_LOG`.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}
