//! Registry of live connections and their nicknames.
//!
//! The handle set and the nickname map live behind one mutex so every
//! operation sees either all or none of a concurrent mutation. The lock is
//! never held across an `.await`: broadcasts copy a [`snapshot`] and deliver
//! outside it.
//!
//! [`snapshot`]: ConnectionRegistry::snapshot

use std::collections::BTreeMap;
use std::sync::Arc;

use metrics::gauge;
use natter_core::{ConnectionId, Nickname};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::errors::RegistryError;
use crate::metrics::CONNECTIONS_ACTIVE;

/// Receiving end of a connection's outbound queue, drained by its session.
pub type Outbox = mpsc::Receiver<Arc<str>>;

/// One live connection as seen by other tasks: its id and the bounded
/// queue feeding its socket writer.
#[derive(Clone, Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::Sender<Arc<str>>,
}

impl ConnectionHandle {
    /// Create a handle with a fresh id and a queue of `queue_len` messages.
    pub fn channel(queue_len: usize) -> (Self, Outbox) {
        let (tx, rx) = mpsc::channel(queue_len);
        (
            Self {
                id: ConnectionId::new(),
                tx,
            },
            rx,
        )
    }

    /// Connection this handle delivers to.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Queue `text` without waiting.
    pub(crate) fn try_send(
        &self,
        text: Arc<str>,
    ) -> Result<(), mpsc::error::TrySendError<Arc<str>>> {
        self.tx.try_send(text)
    }
}

/// What [`ConnectionRegistry::unregister`] removed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Departure {
    /// Last nickname bound to the connection, if the handshake completed.
    pub nickname: Option<Nickname>,
}

struct Entry {
    handle: ConnectionHandle,
    nickname: Option<Nickname>,
}

/// Thread-safe set of live connections plus their nicknames.
pub struct ConnectionRegistry {
    entries: Mutex<BTreeMap<ConnectionId, Entry>>,
    capacity: usize,
}

impl ConnectionRegistry {
    /// Create a registry admitting at most `capacity` connections at once.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            capacity,
        }
    }

    /// Add `handle` to the live set with no nickname bound.
    ///
    /// The capacity check and the insertion happen in one critical section,
    /// so concurrent registrations can never exceed the bound.
    pub fn register(&self, handle: ConnectionHandle) -> Result<(), RegistryError> {
        let mut entries = self.entries.lock();
        if entries.contains_key(handle.id()) {
            return Err(RegistryError::AlreadyRegistered(handle.id().clone()));
        }
        if entries.len() >= self.capacity {
            return Err(RegistryError::Full {
                capacity: self.capacity,
            });
        }
        let _ = entries.insert(
            handle.id().clone(),
            Entry {
                handle,
                nickname: None,
            },
        );
        gauge!(CONNECTIONS_ACTIVE).set(entries.len() as f64);
        Ok(())
    }

    /// Bind a display name. Returns `false` without doing anything if the
    /// connection is no longer registered.
    pub fn set_nickname(&self, id: &ConnectionId, nickname: Nickname) -> bool {
        match self.entries.lock().get_mut(id) {
            Some(entry) => {
                entry.nickname = Some(nickname);
                true
            }
            None => {
                debug!(conn_id = %id, "nickname for unregistered connection ignored");
                false
            }
        }
    }

    /// The nickname bound to `id`, if any.
    pub fn lookup_nickname(&self, id: &ConnectionId) -> Option<Nickname> {
        self.entries
            .lock()
            .get(id)
            .and_then(|entry| entry.nickname.clone())
    }

    /// Remove `id` and return its last nickname in the same critical section.
    ///
    /// Returns `None` if `id` was not registered, so a second removal is
    /// visible to the caller.
    pub fn unregister(&self, id: &ConnectionId) -> Option<Departure> {
        let mut entries = self.entries.lock();
        let entry = entries.remove(id)?;
        gauge!(CONNECTIONS_ACTIVE).set(entries.len() as f64);
        Some(Departure {
            nickname: entry.nickname,
        })
    }

    /// Copy of the live set in accept order.
    pub fn snapshot(&self) -> Vec<ConnectionHandle> {
        self.entries
            .lock()
            .values()
            .map(|entry| entry.handle.clone())
            .collect()
    }

    /// Whether `id` is still registered.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.entries.lock().contains_key(id)
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no connection is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Maximum number of connections [`Self::register`] admits.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
