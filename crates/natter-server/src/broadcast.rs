//! Fan-out of one message to every registered connection but its origin.

use std::sync::Arc;

use metrics::counter;
use natter_core::OutboundMessage;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::metrics::BROADCAST_DROPS_TOTAL;
use crate::registry::ConnectionRegistry;

/// Outcome of one broadcast, per recipient.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Recipients whose queue accepted the message.
    pub delivered: usize,
    /// Recipients whose queue was full; the message was dropped for them.
    pub dropped: usize,
    /// Recipients already tearing down.
    pub closed: usize,
}

/// Delivers messages to the connections in a [`ConnectionRegistry`].
///
/// Delivery never waits on a recipient: each connection has a bounded queue
/// drained by its own writer, so a slow or dead peer only loses its own
/// messages.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl Broadcaster {
    /// Fan out to whatever `registry` holds at send time.
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// The shared registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Deliver `message` to every connection in the current snapshot except
    /// its origin.
    pub fn broadcast(&self, message: &OutboundMessage) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        for handle in self.registry.snapshot() {
            if !message.is_for(handle.id()) {
                continue;
            }
            match handle.try_send(Arc::clone(&message.text)) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    report.dropped += 1;
                    counter!(BROADCAST_DROPS_TOTAL).increment(1);
                    warn!(conn_id = %handle.id(), "outbound queue full, dropping message");
                }
                Err(TrySendError::Closed(_)) => {
                    report.closed += 1;
                    debug!(conn_id = %handle.id(), "recipient closed, skipping");
                }
            }
        }
        debug!(
            origin = message.origin.as_ref().map(natter_core::ConnectionId::as_str),
            delivered = report.delivered,
            dropped = report.dropped,
            closed = report.closed,
            "broadcast"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use natter_core::{ConnectionId, Nickname};

    use super::*;
    use crate::registry::{ConnectionHandle, Outbox};

    fn setup(n: usize, queue_len: usize) -> (Broadcaster, Vec<(ConnectionId, Outbox)>) {
        let registry = Arc::new(ConnectionRegistry::new(100));
        let peers = (0..n)
            .map(|_| {
                let (handle, rx) = ConnectionHandle::channel(queue_len);
                let id = handle.id().clone();
                registry.register(handle).unwrap();
                (id, rx)
            })
            .collect();
        (Broadcaster::new(registry), peers)
    }

    #[test]
    fn excludes_origin_and_reaches_everyone_else() {
        let (broadcaster, mut peers) = setup(3, 8);
        let origin = peers[0].0.clone();

        let report = broadcaster.broadcast(&OutboundMessage::chat(
            origin,
            Some(&Nickname::new("alice")),
            "hi",
        ));
        assert_eq!(report.delivered, 2);

        assert!(peers[0].1.try_recv().is_err());
        assert_eq!(&*peers[1].1.try_recv().unwrap(), "alice: hi");
        assert_eq!(&*peers[2].1.try_recv().unwrap(), "alice: hi");
    }

    #[test]
    fn announcement_reaches_everyone() {
        let (broadcaster, mut peers) = setup(3, 8);
        let report = broadcaster.broadcast(&OutboundMessage::joined(&Nickname::new("bob")));
        assert_eq!(report.delivered, 3);
        for (_, rx) in &mut peers {
            assert_eq!(&*rx.try_recv().unwrap(), "bob has joined the chat!");
        }
    }

    #[test]
    fn full_queue_does_not_block_others() {
        let (broadcaster, mut peers) = setup(3, 1);
        let first = OutboundMessage::announcement("one");
        let second = OutboundMessage::announcement("two");

        let _ = broadcaster.broadcast(&first);
        // Drain everyone except peer 1, whose queue stays full.
        let _ = peers[0].1.try_recv();
        let _ = peers[2].1.try_recv();

        let report = broadcaster.broadcast(&second);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.dropped, 1);

        assert_eq!(&*peers[0].1.try_recv().unwrap(), "two");
        assert_eq!(&*peers[1].1.try_recv().unwrap(), "one");
        assert!(peers[1].1.try_recv().is_err());
        assert_eq!(&*peers[2].1.try_recv().unwrap(), "two");
    }

    #[test]
    fn closed_recipient_is_skipped() {
        let (broadcaster, mut peers) = setup(2, 8);
        let (_, gone) = peers.remove(0);
        drop(gone);

        let report = broadcaster.broadcast(&OutboundMessage::announcement("still here?"));
        assert_eq!(report.closed, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(&*peers[0].1.try_recv().unwrap(), "still here?");
    }

    #[test]
    fn successive_broadcasts_keep_sender_order() {
        let (broadcaster, mut peers) = setup(2, 64);
        let origin = peers[0].0.clone();
        let alice = Nickname::new("alice");
        for i in 0..50 {
            let _ = broadcaster.broadcast(&OutboundMessage::chat(
                origin.clone(),
                Some(&alice),
                &format!("m{i}"),
            ));
        }
        for i in 0..50 {
            assert_eq!(*peers[1].1.try_recv().unwrap(), *format!("alice: m{i}"));
        }
    }

    #[test]
    fn empty_registry_delivers_nothing() {
        let broadcaster = Broadcaster::new(Arc::new(ConnectionRegistry::new(1)));
        let report = broadcaster.broadcast(&OutboundMessage::announcement("anyone?"));
        assert_eq!(report, BroadcastReport::default());
    }
}
