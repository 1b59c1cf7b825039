//! Point-to-point relay channel ends

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tracing::trace;

use crate::directory::TaskId;
use crate::error::RelayError;
use crate::message::{Envelope, RelayMessage};

/// Posting end. Never waits for room in the peer's inbox.
#[derive(Clone)]
pub struct RelaySender {
    from: TaskId,
    to: TaskId,
    inbox: mpsc::Sender<Envelope>,
    lost: Arc<AtomicU64>,
}

impl RelaySender {
    pub(crate) fn new(
        from: TaskId,
        to: TaskId,
        inbox: mpsc::Sender<Envelope>,
        lost: Arc<AtomicU64>,
    ) -> Self {
        Self {
            from,
            to,
            inbox,
            lost,
        }
    }

    pub fn peer(&self) -> TaskId {
        self.to
    }

    /// Post one payload. A full inbox counts the line as lost and returns
    /// [`RelayError::Busy`].
    pub fn try_send(&self, payload: &[u8]) -> Result<(), RelayError> {
        let message = RelayMessage::new(self.from, payload)?;
        match self.inbox.try_send(message.into()) {
            Ok(()) => {
                metrics::counter!("canspy_relay_submitted_total").increment(1);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.lost.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("canspy_relay_dropped_total").increment(1);
                trace!(to = %self.to, "relay inbox full, line dropped");
                Err(RelayError::Busy)
            }
            Err(TrySendError::Closed(_)) => Err(RelayError::Disconnected),
        }
    }

    /// Lines dropped so far because the inbox was full
    pub fn lost(&self) -> u64 {
        self.lost.load(Ordering::Relaxed)
    }
}

/// Receiving end, bound to a single peer
pub struct RelayReceiver {
    peer: TaskId,
    inbox: mpsc::Receiver<Envelope>,
    lost: Arc<AtomicU64>,
}

impl RelayReceiver {
    pub(crate) fn new(
        peer: TaskId,
        inbox: mpsc::Receiver<Envelope>,
        lost: Arc<AtomicU64>,
    ) -> Self {
        Self { peer, inbox, lost }
    }

    pub fn peer(&self) -> TaskId {
        self.peer
    }

    /// Take one message if one is pending. `Ok(None)` when the inbox is empty.
    pub fn try_recv(&mut self) -> Result<Option<RelayMessage>, RelayError> {
        match self.inbox.try_recv() {
            Ok(envelope) => self.accept(envelope).map(Some),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(RelayError::Disconnected),
        }
    }

    /// Wait, without time bound, for the next message
    pub async fn recv(&mut self) -> Result<RelayMessage, RelayError> {
        match self.inbox.recv().await {
            Some(envelope) => self.accept(envelope),
            None => Err(RelayError::Disconnected),
        }
    }

    /// Lines senders dropped on a full inbox so far
    pub fn lost(&self) -> u64 {
        self.lost.load(Ordering::Relaxed)
    }

    fn accept(&self, envelope: Envelope) -> Result<RelayMessage, RelayError> {
        if envelope.sender != self.peer {
            return Err(RelayError::Denied {
                from: envelope.sender,
                expected: self.peer,
            });
        }
        RelayMessage::from_raw(envelope.sender, envelope.payload, envelope.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::TaskDirectory;
    use crate::message::MAX_PAYLOAD;
    use crate::{FORWARDER_TASK, RELAY_TASK};

    fn pair(depth: usize) -> (TaskDirectory, RelaySender, RelayReceiver) {
        let directory = TaskDirectory::new();
        let spy = directory.register(FORWARDER_TASK, depth).unwrap();
        let snif = directory.register(RELAY_TASK, depth).unwrap();
        let tx = spy.connect(RELAY_TASK).unwrap();
        let rx = snif.listen(FORWARDER_TASK).unwrap();
        (directory, tx, rx)
    }

    #[test]
    fn test_send_then_try_recv() {
        let (_dir, tx, mut rx) = pair(4);
        assert!(rx.try_recv().unwrap().is_none());

        tx.try_send(b"t1232aabb\r").unwrap();
        let message = rx.try_recv().unwrap().unwrap();
        assert_eq!(message.payload(), b"t1232aabb\r");
        assert_eq!(message.sender(), rx.peer());
        assert!(rx.try_recv().unwrap().is_none());
    }

    #[test]
    fn test_full_inbox_counts_lost_lines() {
        let (_dir, tx, mut rx) = pair(2);
        tx.try_send(b"a").unwrap();
        tx.try_send(b"b").unwrap();
        assert!(matches!(tx.try_send(b"c"), Err(RelayError::Busy)));
        assert!(matches!(tx.try_send(b"d"), Err(RelayError::Busy)));

        assert_eq!(rx.lost(), 2);
        assert_eq!(rx.try_recv().unwrap().unwrap().payload(), b"a");
        assert_eq!(rx.try_recv().unwrap().unwrap().payload(), b"b");
    }

    #[test]
    fn test_message_from_other_task_denied() {
        let directory = TaskDirectory::new();
        let spy = directory.register(FORWARDER_TASK, 4).unwrap();
        let intruder = directory.register("OTHER", 4).unwrap();
        let snif = directory.register(RELAY_TASK, 4).unwrap();
        let mut rx = snif.listen(FORWARDER_TASK).unwrap();

        intruder.connect(RELAY_TASK).unwrap().try_send(b"x").unwrap();
        match rx.try_recv() {
            Err(RelayError::Denied { from, expected }) => {
                assert_eq!(from, intruder.id());
                assert_eq!(expected, spy.id());
            }
            other => panic!("expected denial, got {:?}", other),
        }

        // The channel stays usable
        spy.connect(RELAY_TASK).unwrap().try_send(b"ok").unwrap();
        assert_eq!(rx.try_recv().unwrap().unwrap().payload(), b"ok");
    }

    #[test]
    fn test_claimed_length_checked_on_receive() {
        let peer = TaskId(1);
        let (inbox, raw) = mpsc::channel(4);
        let mut rx = RelayReceiver::new(peer, raw, Arc::new(AtomicU64::new(0)));

        let oversized = Envelope {
            sender: peer,
            len: MAX_PAYLOAD + 72,
            payload: [b'x'; MAX_PAYLOAD],
        };
        assert!(inbox.try_send(oversized).is_ok());
        assert!(matches!(rx.try_recv(), Err(RelayError::InvalidLength(200))));

        let mut payload = [b'z'; MAX_PAYLOAD];
        payload[..4].copy_from_slice(b"t001");
        let valid = Envelope {
            sender: peer,
            len: 4,
            payload,
        };
        assert!(inbox.try_send(valid).is_ok());
        assert_eq!(rx.try_recv().unwrap().unwrap().payload(), b"t001");
    }

    #[tokio::test]
    async fn test_blocking_recv() {
        let (_dir, tx, mut rx) = pair(4);
        let producer = tokio::spawn(async move {
            tokio::task::yield_now().await;
            tx.try_send(b"r7ff3\r")
        });

        let message = rx.recv().await.unwrap();
        assert_eq!(message.payload(), b"r7ff3\r");
        producer.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_recv_reports_disconnect() {
        let (directory, tx, mut rx) = pair(4);
        drop(tx);
        drop(directory);
        assert!(matches!(rx.recv().await, Err(RelayError::Disconnected)));
    }
}
