//! Presence Registry
//!
//! Tracks which users hold a live connection and when each user was last seen.
//!
//! # Guarantees
//!
//! - At most one connection is registered per user. Registering a second one
//!   closes the first.
//! - A user's presence entry is created on first connect and only ever
//!   overwritten afterwards. Its timestamp never moves backwards.
//! - A status change is broadcast to every connected user except the subject.
//!
//! # Locking
//!
//! Both maps live behind a single `parking_lot::RwLock`. The lock is never held
//! while serializing or queueing frames: mutations snapshot the affected handles
//! under the write lock, drop it, and only then queue with `try_send`. A slow or
//! dead peer therefore costs one failed `try_send`, never a stalled broadcast.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use prometheus::IntGauge;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::connection::{ConnectionHandle, ConnectionId};
use super::events::{Envelope, StatusChange};
use crate::infrastructure::metrics;

/// Last known presence of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    pub is_online: bool,
    #[serde(rename = "lastSeen")]
    pub last_seen_at: DateTime<Utc>,
}

/// Result of a targeted delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Frame queued on the target's connection
    Delivered,
    /// Target has no live connection
    Offline,
    /// Target is connected but the frame could not be queued
    Failed,
}

impl DeliveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryOutcome::Delivered => "delivered",
            DeliveryOutcome::Offline => "offline",
            DeliveryOutcome::Failed => "failed",
        }
    }
}

#[derive(Default)]
struct RegistryState {
    clients: HashMap<i64, ConnectionHandle>,
    presence: HashMap<i64, PresenceEntry>,
}

impl RegistryState {
    /// Overwrite a user's presence, keeping `last_seen_at` monotonic.
    fn mark(&mut self, user_id: i64, is_online: bool) -> PresenceEntry {
        let now = Utc::now();
        let last_seen_at = match self.presence.get(&user_id) {
            Some(previous) if previous.last_seen_at > now => previous.last_seen_at,
            _ => now,
        };

        let entry = PresenceEntry {
            is_online,
            last_seen_at,
        };
        self.presence.insert(user_id, entry);
        entry
    }

    fn peers_of(&self, user_id: i64) -> Vec<(i64, ConnectionHandle)> {
        self.clients
            .iter()
            .filter(|(id, _)| **id != user_id)
            .map(|(id, handle)| (*id, handle.clone()))
            .collect()
    }
}

/// Outcome of a removal performed under the lock.
struct Removal {
    handle: ConnectionHandle,
    entry: PresenceEntry,
    peers: Vec<(i64, ConnectionHandle)>,
}

/// In-memory presence and connection registry.
///
/// Created once at startup and shared through `Arc`.
pub struct PresenceRegistry {
    state: RwLock<RegistryState>,
    /// Mirrors `clients.len()`; only written under the write lock.
    live_gauge: IntGauge,
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::with_gauge(metrics::LIVE_CONNECTIONS.clone())
    }
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry reporting its connection count to `live_gauge`.
    pub fn with_gauge(live_gauge: IntGauge) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            live_gauge,
        }
    }

    /// Install `handle` as the user's live connection and announce them online.
    ///
    /// A connection previously registered for the same user is closed.
    pub fn register(&self, user_id: i64, handle: ConnectionHandle) {
        let connection_id = handle.id();

        let (superseded, entry, peers) = {
            let mut state = self.state.write();
            let superseded = state.clients.insert(user_id, handle);
            self.live_gauge.set(state.clients.len() as i64);
            let entry = state.mark(user_id, true);
            let peers = state.peers_of(user_id);
            (superseded, entry, peers)
        };

        if let Some(old) = superseded {
            info!(
                user_id,
                old_connection_id = %old.id(),
                connection_id = %connection_id,
                "Superseding existing connection"
            );
            old.close();
        }

        info!(user_id, connection_id = %connection_id, "User connected");

        self.broadcast(&peers, user_id, entry);
    }

    /// Remove the user's connection, whichever it is, and announce them offline.
    ///
    /// Returns `false` when the user had no connection.
    pub fn deregister(&self, user_id: i64) -> bool {
        self.remove_if(user_id, |_| true)
    }

    /// Remove the user's connection only if it is still `connection_id`.
    ///
    /// A superseded connection calling this during its own cleanup leaves the
    /// replacement untouched.
    pub fn release(&self, user_id: i64, connection_id: ConnectionId) -> bool {
        self.remove_if(user_id, |handle| handle.id() == connection_id)
    }

    fn remove_if<F>(&self, user_id: i64, matches: F) -> bool
    where
        F: FnOnce(&ConnectionHandle) -> bool,
    {
        let removal = {
            let mut state = self.state.write();
            match state.clients.get(&user_id) {
                Some(current) if matches(current) => {}
                _ => return false,
            }

            state.clients.remove(&user_id).map(|handle| {
                self.live_gauge.set(state.clients.len() as i64);
                let entry = state.mark(user_id, false);
                Removal {
                    handle,
                    entry,
                    peers: state.peers_of(user_id),
                }
            })
        };

        let Some(removal) = removal else {
            return false;
        };

        removal.handle.close();

        info!(
            user_id,
            connection_id = %removal.handle.id(),
            "User disconnected"
        );

        self.broadcast(&removal.peers, user_id, removal.entry);
        true
    }

    /// Queue `envelope` on the user's connection if there is one.
    ///
    /// Never fails: serialization and queueing errors are logged and reported
    /// through the returned outcome only.
    pub fn deliver_or_drop(&self, user_id: i64, envelope: &Envelope) -> DeliveryOutcome {
        let handle = self.state.read().clients.get(&user_id).cloned();

        let Some(handle) = handle else {
            debug!(user_id, event = envelope.event_name(), "Recipient offline, dropping event");
            return DeliveryOutcome::Offline;
        };

        let frame = match envelope.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(user_id, event = envelope.event_name(), error = %e, "Failed to serialize event");
                return DeliveryOutcome::Failed;
            }
        };

        match handle.try_send(frame) {
            Ok(()) => {
                debug!(user_id, connection_id = %handle.id(), event = envelope.event_name(), "Event queued");
                DeliveryOutcome::Delivered
            }
            Err(e) => {
                warn!(
                    user_id,
                    connection_id = %handle.id(),
                    event = envelope.event_name(),
                    error = %e,
                    "Failed to queue event"
                );
                DeliveryOutcome::Failed
            }
        }
    }

    /// Last known presence, or `None` if the user was never seen.
    pub fn get_presence(&self, user_id: i64) -> Option<PresenceEntry> {
        self.state.read().presence.get(&user_id).copied()
    }

    pub fn is_online(&self, user_id: i64) -> bool {
        self.state.read().clients.contains_key(&user_id)
    }

    /// Ids of all users with a live connection, ascending.
    pub fn list_online(&self) -> Vec<i64> {
        let mut online: Vec<i64> = self.state.read().clients.keys().copied().collect();
        online.sort_unstable();
        online
    }

    pub fn connection_count(&self) -> usize {
        self.state.read().clients.len()
    }

    fn broadcast(&self, peers: &[(i64, ConnectionHandle)], user_id: i64, entry: PresenceEntry) {
        if peers.is_empty() {
            return;
        }

        let change = Envelope::from(StatusChange {
            user_id,
            is_online: entry.is_online,
            last_seen: entry.last_seen_at,
        });

        let frame = match change.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(user_id, error = %e, "Failed to serialize status change");
                return;
            }
        };

        for (peer_id, handle) in peers {
            if let Err(e) = handle.try_send(frame.clone()) {
                warn!(
                    user_id,
                    peer_id = *peer_id,
                    connection_id = %handle.id(),
                    error = %e,
                    "Failed to queue status change"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dto::response::MessageResponse;
    use crate::presentation::websocket::connection::Outbox;
    use crate::presentation::websocket::events::Notification;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    fn connect(registry: &PresenceRegistry, user_id: i64) -> (ConnectionId, Outbox) {
        let (handle, outbox) = ConnectionHandle::new(16);
        let id = handle.id();
        registry.register(user_id, handle);
        (id, outbox)
    }

    fn drain(outbox: &mut Outbox) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(frame) = outbox.frames.try_recv() {
            frames.push(serde_json::from_str(&frame).unwrap());
        }
        frames
    }

    fn message_event(id: i64) -> Envelope {
        let now = Utc::now();
        Notification::NewMessage(MessageResponse {
            id,
            chat_id: 1,
            sender_id: 1,
            recipient_id: 2,
            content: Some("hello".into()),
            parent_id: None,
            read_at: None,
            created_at: now,
            updated_at: now,
            attachments: Vec::new(),
        })
        .into()
    }

    // ==========================================================================
    // Registration
    // ==========================================================================

    #[test]
    fn test_register_marks_user_online() {
        let registry = PresenceRegistry::new();

        let before = Utc::now();
        let (_id, _outbox) = connect(&registry, 1);

        let entry = registry.get_presence(1).unwrap();
        assert!(entry.is_online);
        assert!(entry.last_seen_at >= before);
        assert!(registry.is_online(1));
        assert_eq!(registry.list_online(), vec![1]);
        assert_eq!(registry.connection_count(), 1);
    }

    #[test]
    fn test_second_registration_supersedes_first() {
        let registry = PresenceRegistry::new();

        let (_first, first_outbox) = connect(&registry, 1);
        let (second, second_outbox) = connect(&registry, 1);

        assert!(first_outbox.is_shutdown());
        assert!(!second_outbox.is_shutdown());
        assert_eq!(registry.connection_count(), 1);

        let mut second_outbox = second_outbox;
        registry.deliver_or_drop(1, &message_event(3));
        assert_eq!(drain(&mut second_outbox).len(), 1);

        assert!(registry.release(1, second));
    }

    #[test]
    fn test_register_broadcasts_to_others_only() {
        let registry = PresenceRegistry::new();

        let (_a, mut a_outbox) = connect(&registry, 1);
        let (_b, mut b_outbox) = connect(&registry, 2);

        let a_frames = drain(&mut a_outbox);
        assert_eq!(a_frames.len(), 1);
        assert_eq!(a_frames[0]["event"], "statusChange");
        assert_eq!(a_frames[0]["userId"], 2);
        assert_eq!(a_frames[0]["isOnline"], true);

        assert!(drain(&mut b_outbox).is_empty());
    }

    // ==========================================================================
    // Deregistration
    // ==========================================================================

    #[test]
    fn test_deregister_marks_offline_and_broadcasts() {
        let registry = PresenceRegistry::new();

        let (_a, mut a_outbox) = connect(&registry, 1);
        let (_b, b_outbox) = connect(&registry, 2);
        drain(&mut a_outbox);

        let online_at = registry.get_presence(2).unwrap().last_seen_at;
        assert!(registry.deregister(2));

        let entry = registry.get_presence(2).unwrap();
        assert!(!entry.is_online);
        assert!(entry.last_seen_at >= online_at);
        assert!(b_outbox.is_shutdown());
        assert_eq!(registry.list_online(), vec![1]);

        let frames = drain(&mut a_outbox);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["userId"], 2);
        assert_eq!(frames[0]["isOnline"], false);
    }

    #[test]
    fn test_deregister_is_idempotent() {
        let registry = PresenceRegistry::new();

        let (_a, mut a_outbox) = connect(&registry, 1);
        let (_b, _b_outbox) = connect(&registry, 2);
        drain(&mut a_outbox);

        assert!(registry.deregister(2));
        let after_first = registry.get_presence(2).unwrap();
        drain(&mut a_outbox);

        assert!(!registry.deregister(2));
        assert_eq!(registry.get_presence(2).unwrap(), after_first);
        assert!(drain(&mut a_outbox).is_empty());
    }

    #[test]
    fn test_deregister_unknown_user_is_noop() {
        let registry = PresenceRegistry::new();

        assert!(!registry.deregister(42));
        assert!(registry.get_presence(42).is_none());
    }

    #[test]
    fn test_stale_release_keeps_replacement() {
        let registry = PresenceRegistry::new();

        let (first, _first_outbox) = connect(&registry, 1);
        let (_second, second_outbox) = connect(&registry, 1);

        assert!(!registry.release(1, first));

        assert!(registry.is_online(1));
        assert!(!second_outbox.is_shutdown());
        assert!(registry.get_presence(1).unwrap().is_online);
    }

    // ==========================================================================
    // Delivery
    // ==========================================================================

    #[test]
    fn test_deliver_to_connected_user() {
        let registry = PresenceRegistry::new();
        let (_id, mut outbox) = connect(&registry, 2);

        let outcome = registry.deliver_or_drop(2, &message_event(11));

        assert_eq!(outcome, DeliveryOutcome::Delivered);
        let frames = drain(&mut outbox);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["event"], "newMessage");
        assert_eq!(frames[0]["message"]["id"], 11);
    }

    #[test]
    fn test_deliver_to_offline_user_has_no_effect() {
        let registry = PresenceRegistry::new();
        let (_id, mut outbox) = connect(&registry, 1);

        let outcome = registry.deliver_or_drop(2, &message_event(1));

        assert_eq!(outcome, DeliveryOutcome::Offline);
        assert!(drain(&mut outbox).is_empty());
        assert!(registry.get_presence(2).is_none());
        assert_eq!(registry.list_online(), vec![1]);
    }

    #[test]
    fn test_deliver_to_full_queue_is_swallowed() {
        let registry = PresenceRegistry::new();
        let (handle, _outbox) = ConnectionHandle::new(1);
        registry.register(2, handle);

        assert_eq!(registry.deliver_or_drop(2, &message_event(1)), DeliveryOutcome::Delivered);
        assert_eq!(registry.deliver_or_drop(2, &message_event(2)), DeliveryOutcome::Failed);
        assert!(registry.is_online(2));
    }

    #[test]
    fn test_broadcast_skips_dead_peer() {
        let registry = PresenceRegistry::new();

        let (_a, a_outbox) = connect(&registry, 1);
        let (_b, mut b_outbox) = connect(&registry, 2);
        drop(a_outbox);

        let (_c, _c_outbox) = connect(&registry, 3);

        let frames = drain(&mut b_outbox);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["userId"], 3);
    }

    // ==========================================================================
    // Scenarios
    // ==========================================================================

    #[test]
    fn test_two_users_connect_and_disconnect() {
        let registry = PresenceRegistry::new();

        let (_a, mut a_outbox) = connect(&registry, 1);
        let (_b, mut b_outbox) = connect(&registry, 2);

        let frames = drain(&mut a_outbox);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["userId"], 2);
        assert_eq!(frames[0]["isOnline"], true);

        assert!(registry.deregister(1));

        let frames = drain(&mut b_outbox);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["userId"], 1);
        assert_eq!(frames[0]["isOnline"], false);

        assert_eq!(registry.list_online(), vec![2]);
        assert!(!registry.get_presence(1).unwrap().is_online);
    }

    #[test]
    fn test_never_seen_user() {
        let registry = PresenceRegistry::new();
        let (_a, _outbox) = connect(&registry, 1);

        assert!(registry.get_presence(99).is_none());
        assert!(!registry.is_online(99));
        assert!(!registry.list_online().contains(&99));
    }

    #[test]
    fn test_concurrent_registrations_keep_one_connection_per_user() {
        use std::sync::Arc;

        let registry = Arc::new(PresenceRegistry::new());

        let threads: Vec<_> = (0..8)
            .map(|n| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    let mut outboxes = Vec::new();
                    for _ in 0..50 {
                        let (handle, outbox) = ConnectionHandle::new(256);
                        registry.register(n % 4, handle);
                        outboxes.push(outbox);
                    }
                    outboxes
                })
            })
            .collect();

        let outboxes: Vec<Outbox> = threads
            .into_iter()
            .flat_map(|t| t.join().unwrap())
            .collect();

        assert_eq!(registry.connection_count(), 4);
        let open = outboxes.iter().filter(|o| !o.is_shutdown()).count();
        assert_eq!(open, 4);
    }

    #[test]
    fn test_live_gauge_tracks_count_under_contention() {
        use std::sync::Arc;

        let gauge = IntGauge::new("test_live_connections", "live connections").unwrap();
        let registry = Arc::new(PresenceRegistry::with_gauge(gauge.clone()));

        let threads: Vec<_> = (0..8)
            .map(|n| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let user_id = n * 1000 + i % 10;
                        let (handle, _outbox) = ConnectionHandle::new(4);
                        registry.register(user_id, handle);
                        if i % 3 == 0 {
                            registry.deregister(user_id);
                        }
                    }
                })
            })
            .collect();

        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(gauge.get(), registry.connection_count() as i64);
    }
}
