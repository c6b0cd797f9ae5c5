//! Nicknames, outbound messages and the fixed texts of the chat protocol.
//!
//! There is no structured wire format. Every message is raw UTF-8 text, the
//! first message a client sends is its nickname, and the server prefixes
//! relayed chat lines with `"<nickname>: "`.

use std::fmt;
use std::sync::Arc;

use crate::ids::ConnectionId;

/// Sent to a connection that arrives while the server is at capacity.
pub const SERVER_FULL_NOTICE: &str = "Server is full. Please try again later.";

/// Display name used when a sender's nickname cannot be found.
pub const UNKNOWN_SENDER: &str = "Unknown";

/// Leave announcement for a session that never bound a nickname.
pub const ANONYMOUS_LEAVE: &str = "A user has left the chat!";

/// Printed by the client once the server closes the connection.
pub const DISCONNECTED_NOTICE: &str = "Disconnected from server.";

/// Client input line that ends the session.
pub const QUIT_COMMAND: &str = "/quit";

/// Decode one transport read as text.
///
/// Invalid UTF-8 is replaced rather than rejected. Trailing CR, LF and NUL
/// bytes are stripped so line-oriented clients and the natter client look
/// the same to everyone else.
pub fn decode_line(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.trim_end_matches(['\r', '\n', '\0']).to_owned()
}

/// Display name a client chose for itself.
///
/// Not validated for uniqueness or content. Duplicates are allowed.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Nickname(String);

impl Nickname {
    /// Use `name` as given. Callers decoding wire bytes want [`Self::from_wire`].
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Decode one transport read as a nickname. See [`decode_line`].
    pub fn from_wire(bytes: &[u8]) -> Self {
        Self(decode_line(bytes))
    }

    /// The display name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Nickname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Nickname {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One chat line on its way to the other connections.
///
/// `origin` is the connection the line came from and is excluded from
/// delivery. System announcements have no origin and reach everyone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Sender to skip, or `None` for announcements.
    pub origin: Option<ConnectionId>,
    /// Exact bytes written to each recipient.
    pub text: Arc<str>,
}

impl OutboundMessage {
    /// A system announcement delivered to every registered connection.
    pub fn announcement(text: impl Into<Arc<str>>) -> Self {
        Self {
            origin: None,
            text: text.into(),
        }
    }

    /// A line delivered to everyone except `origin`.
    pub fn from_sender(origin: ConnectionId, text: impl Into<Arc<str>>) -> Self {
        Self {
            origin: Some(origin),
            text: text.into(),
        }
    }

    /// `"<nickname> has joined the chat!"`
    pub fn joined(nickname: &Nickname) -> Self {
        Self::announcement(format!("{nickname} has joined the chat!"))
    }

    /// `"<nickname> has left the chat!"`, or the anonymous form when the
    /// session never bound a nickname.
    pub fn left(nickname: Option<&Nickname>) -> Self {
        match nickname {
            Some(name) => Self::announcement(format!("{name} has left the chat!")),
            None => Self::announcement(ANONYMOUS_LEAVE),
        }
    }

    /// `"<nickname>: <payload>"` from `origin`. A missing nickname is shown
    /// as [`UNKNOWN_SENDER`].
    pub fn chat(origin: ConnectionId, nickname: Option<&Nickname>, payload: &str) -> Self {
        let name = nickname.map_or(UNKNOWN_SENDER, Nickname::as_str);
        Self::from_sender(origin, format!("{name}: {payload}"))
    }

    /// Whether this message should be delivered to `recipient`.
    pub fn is_for(&self, recipient: &ConnectionId) -> bool {
        self.origin.as_ref() != Some(recipient)
    }
}
