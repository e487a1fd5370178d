//! Live Connection Handle
//!
//! The registry never touches a socket. It holds a [`ConnectionHandle`], a
//! non-owning reference to one live connection consisting of a bounded outbound
//! queue and a shutdown signal. The connection task owns the matching
//! [`Outbox`] and is the only writer to its socket.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use uuid::Uuid;

/// Identity of a single live connection.
pub type ConnectionId = Uuid;

/// Reason a frame could not be queued for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("outbound queue is full")]
    Full,

    #[error("connection is closed")]
    Closed,
}

/// Registry-side reference to a live connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    frames: mpsc::Sender<String>,
    shutdown: Arc<watch::Sender<bool>>,
}

/// Connection-side end of a [`ConnectionHandle`].
#[derive(Debug)]
pub struct Outbox {
    pub frames: mpsc::Receiver<String>,
    pub shutdown: watch::Receiver<bool>,
}

impl ConnectionHandle {
    /// Create a handle and its outbox with room for `capacity` pending frames.
    pub fn new(capacity: usize) -> (Self, Outbox) {
        let (frames_tx, frames_rx) = mpsc::channel(capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = Self {
            id: Uuid::new_v4(),
            frames: frames_tx,
            shutdown: Arc::new(shutdown_tx),
        };
        let outbox = Outbox {
            frames: frames_rx,
            shutdown: shutdown_rx,
        };

        (handle, outbox)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a text frame without waiting.
    pub fn try_send(&self, frame: String) -> Result<(), QueueError> {
        if self.is_closed() {
            return Err(QueueError::Closed);
        }

        self.frames.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Full,
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })
    }

    /// Ask the connection to shut down. Idempotent.
    pub fn close(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow() || self.frames.is_closed()
    }
}

impl Outbox {
    /// Whether the owning handle has requested shutdown.
    pub fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_have_distinct_ids() {
        let (a, _) = ConnectionHandle::new(1);
        let (b, _) = ConnectionHandle::new(1);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_try_send_delivers_to_outbox() {
        let (handle, mut outbox) = ConnectionHandle::new(4);

        handle.try_send("hello".into()).unwrap();

        assert_eq!(outbox.frames.try_recv().unwrap(), "hello");
    }

    #[test]
    fn test_try_send_reports_full_queue() {
        let (handle, _outbox) = ConnectionHandle::new(1);

        handle.try_send("one".into()).unwrap();

        assert_eq!(handle.try_send("two".into()), Err(QueueError::Full));
    }

    #[test]
    fn test_try_send_after_close_is_rejected() {
        let (handle, outbox) = ConnectionHandle::new(4);

        handle.close();

        assert!(outbox.is_shutdown());
        assert_eq!(handle.try_send("late".into()), Err(QueueError::Closed));
    }

    #[test]
    fn test_dropped_outbox_closes_handle() {
        let (handle, outbox) = ConnectionHandle::new(4);
        drop(outbox);

        assert!(handle.is_closed());
        assert_eq!(handle.try_send("x".into()), Err(QueueError::Closed));
    }

    #[tokio::test]
    async fn test_close_wakes_waiting_connection() {
        let (handle, mut outbox) = ConnectionHandle::new(4);

        let waiter = tokio::spawn(async move {
            outbox.shutdown.changed().await.is_ok() && *outbox.shutdown.borrow()
        });
        handle.close();

        assert!(waiter.await.unwrap());
    }
}
