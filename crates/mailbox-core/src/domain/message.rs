//! Message record.

use chrono::{DateTime, TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{MessageId, MessageState};

/// A message held by the queue.
///
/// Values returned from the queue are snapshots; changing them has no
/// effect on the queue itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,

    /// Opaque payload. The queue never looks inside.
    pub body: Value,

    pub posted_at: DateTime<Utc>,

    /// The message must not be handed out before this instant.
    pub visible_after: DateTime<Utc>,

    /// How many times `receive` has selected this message.
    pub receive_count: u32,
}

impl Message {
    pub(crate) fn new(id: MessageId, body: Value, now: DateTime<Utc>) -> Self {
        Self {
            id,
            body,
            posted_at: now,
            visible_after: now,
            receive_count: 0,
        }
    }

    /// Eligible for receive at `now`? The boundary instant counts as visible.
    pub fn is_visible_at(&self, now: DateTime<Utc>) -> bool {
        self.visible_after <= now
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> MessageState {
        if self.is_visible_at(now) {
            MessageState::Visible
        } else {
            MessageState::InFlight
        }
    }

    /// Remaining hidden time, or `None` if the message is already visible.
    pub fn visible_in(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
        if self.is_visible_at(now) {
            None
        } else {
            Some(self.visible_after - now)
        }
    }

    /// Decode the body into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.body.clone())
    }

    /// Hide the message until `until` and count the delivery.
    pub(crate) fn mark_received(&mut self, until: DateTime<Utc>) {
        self.visible_after = until;
        self.receive_count = self.receive_count.saturating_add(1);
    }
}
