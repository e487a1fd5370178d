//! Notification Router
//!
//! Services hand events to a [`Notifier`] after their writes have committed.
//! `send` never blocks: it pushes onto a bounded queue and returns. A single
//! dispatcher task drains the queue into [`PresenceRegistry::deliver_or_drop`].
//! When the queue is full the event is dropped and logged.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::events::{Envelope, Notification};
use super::registry::PresenceRegistry;
use crate::infrastructure::metrics;

struct Dispatch {
    target: i64,
    notification: Notification,
}

/// Cheap-to-clone producer side of the notification queue.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::Sender<Dispatch>,
}

/// Owner of the dispatcher task.
pub struct NotifierWorker {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl Notifier {
    /// Spawn the dispatcher and return the producer handle and its worker.
    pub fn start(registry: Arc<PresenceRegistry>, capacity: usize) -> (Self, NotifierWorker) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(dispatch_loop(registry, rx, shutdown_rx));

        (
            Self { tx },
            NotifierWorker {
                handle,
                shutdown: shutdown_tx,
            },
        )
    }

    /// Notifications waiting for the dispatcher.
    pub fn queued(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Queue `notification` for `target`. Returns immediately.
    pub fn send(&self, target: i64, notification: Notification) {
        let event = notification.event_name();

        match self.tx.try_send(Dispatch {
            target,
            notification,
        }) {
            Ok(()) => debug!(target_user = target, event, "Notification queued"),
            Err(mpsc::error::TrySendError::Full(_)) => {
                metrics::record_notification(event, "dropped");
                warn!(target_user = target, event, "Notification queue full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                metrics::record_notification(event, "dropped");
                debug!(target_user = target, event, "Notifier stopped, dropping event");
            }
        }
    }
}

impl NotifierWorker {
    /// Stop accepting new events and deliver the ones already queued.
    ///
    /// Gives up after `timeout`.
    pub async fn drain(self, timeout: Duration) {
        self.shutdown.send_replace(true);

        let mut handle = self.handle;
        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(())) => info!("Notification queue drained"),
            Ok(Err(e)) => warn!(error = %e, "Notification dispatcher failed"),
            Err(_) => {
                warn!("Timed out draining notification queue");
                handle.abort();
            }
        }
    }
}

async fn dispatch_loop(
    registry: Arc<PresenceRegistry>,
    mut rx: mpsc::Receiver<Dispatch>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;

            item = rx.recv() => match item {
                Some(dispatch) => deliver(&registry, dispatch),
                None => break,
            },
            _ = shutdown.changed() => {
                rx.close();
                while let Some(dispatch) = rx.recv().await {
                    deliver(&registry, dispatch);
                }
                break;
            }
        }
    }

    debug!("Notification dispatcher stopped");
}

fn deliver(registry: &PresenceRegistry, dispatch: Dispatch) {
    let envelope = Envelope::from(dispatch.notification);
    let outcome = registry.deliver_or_drop(dispatch.target, &envelope);
    metrics::record_notification(envelope.event_name(), outcome.as_str());
}
