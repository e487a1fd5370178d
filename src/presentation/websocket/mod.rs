//! Real-time Delivery
//!
//! Live connections, presence tracking and event routing.

pub mod connection;
pub mod events;
pub mod handler;
pub mod notifier;
pub mod registry;

pub use connection::{ConnectionHandle, ConnectionId, Outbox, QueueError};
pub use events::{DeletedMessage, Envelope, Notification, StatusChange};
pub use handler::{ws_handler, RealtimeState};
pub use notifier::{Notifier, NotifierWorker};
pub use registry::{DeliveryOutcome, PresenceEntry, PresenceRegistry};
