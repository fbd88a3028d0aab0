//! Queue module: configuration and the in-memory visibility-timeout queue.

mod config;
mod memory;

pub use config::{CommitPolicy, QueueConfig};
pub use memory::InMemoryQueue;

use serde_json::Value;

use crate::domain::{Message, MessageId};
use crate::error::CommitError;
use crate::observability::QueueCounts;

/// Queue port (interface).
///
/// Design intent:
/// - Every operation is synchronous and finishes quickly; implementations
///   never block waiting for messages.
/// - `receive` hides the selected message for the invisibility timeout.
///   Redelivery after the timeout is the only retry mechanism.
/// - Consumers depend on `Arc<dyn Mailbox>` so the in-memory engine can be
///   swapped for another implementation.
///
/// Over a transport the operations would map to `POST /messages`,
/// `GET /messages`, `POST /messages:receive` and `DELETE /messages/{id}`.
pub trait Mailbox: Send + Sync {
    /// Append a message. It is visible immediately.
    fn post(&self, body: Value) -> MessageId;

    /// Snapshot of every message in arrival order, in-flight ones included.
    fn list(&self) -> Vec<Message>;

    /// Take the oldest visible message and hide it, or `None` if nothing is
    /// visible right now.
    fn receive(&self) -> Option<Message>;

    /// Remove a message for good.
    fn commit(&self, id: &MessageId) -> Result<Message, CommitError>;

    fn counts(&self) -> QueueCounts;
}
