//! Metric names recorded through the `metrics` facade.
//!
//! Nothing is exported unless the embedding binary installs a recorder.

/// Accepted connections that got a session (counter).
pub const CONNECTIONS_TOTAL: &str = "natter_connections_total";
/// Connections turned away because the server was full (counter).
pub const CONNECTIONS_REJECTED_TOTAL: &str = "natter_connections_rejected_total";
/// Currently registered connections (gauge).
pub const CONNECTIONS_ACTIVE: &str = "natter_connections_active";
/// Chat messages relayed, announcements excluded (counter).
pub const MESSAGES_TOTAL: &str = "natter_messages_total";
/// Per-recipient deliveries dropped because the outbound queue was full (counter).
pub const BROADCAST_DROPS_TOTAL: &str = "natter_broadcast_drops_total";
