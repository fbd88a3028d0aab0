//! In-memory queue implementation.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::{CommitPolicy, Mailbox, QueueConfig};
use crate::domain::{Message, MessageId};
use crate::error::{CommitError, ConfigError, QueueError};
use crate::observability::QueueCounts;
use crate::ports::{Clock, IdGenerator, SystemClock, TimestampIdGenerator};

/// In-memory queue state.
struct InMemoryQueueState {
    /// Messages in arrival order (single source of truth).
    messages: VecDeque<Message>,
}

impl InMemoryQueueState {
    fn new() -> Self {
        Self {
            messages: VecDeque::new(),
        }
    }

    fn position(&self, id: &MessageId) -> Option<usize> {
        self.messages.iter().position(|m| &m.id == id)
    }

    fn counts_at(&self, now: DateTime<Utc>) -> QueueCounts {
        let visible = self
            .messages
            .iter()
            .filter(|m| m.is_visible_at(now))
            .count();
        QueueCounts {
            total: self.messages.len(),
            visible,
            in_flight: self.messages.len() - visible,
        }
    }
}

/// In-memory visibility-timeout queue.
///
/// Design:
/// - One mutex guards the message sequence. Each operation (scan + mutate)
///   runs entirely inside it, so two receivers can never pick the same
///   message within one invisibility window.
/// - No background timers. Eligibility (`visible_after <= now`) is
///   recomputed on every `receive`; an expired message simply becomes
///   selectable again.
/// - Time and ids come from the injected `Clock` and `IdGenerator`.
pub struct InMemoryQueue<C = SystemClock, G = TimestampIdGenerator> {
    state: Mutex<InMemoryQueueState>,
    config: QueueConfig,
    invisibility: TimeDelta,
    clock: C,
    id_generator: G,
}

impl InMemoryQueue {
    /// Queue on wall-clock time with `<timestamp>_<counter>` ids.
    pub fn with_config(config: QueueConfig) -> Result<Self, ConfigError> {
        Self::new(config, SystemClock, TimestampIdGenerator::new())
    }
}

impl<C: Clock, G: IdGenerator> InMemoryQueue<C, G> {
    pub fn new(config: QueueConfig, clock: C, id_generator: G) -> Result<Self, ConfigError> {
        let invisibility = config.invisibility_delta()?;
        Ok(Self {
            state: Mutex::new(InMemoryQueueState::new()),
            config,
            invisibility,
            clock,
            id_generator,
        })
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().messages.is_empty()
    }

    /// Serialize `body` and post it.
    pub fn post_json<T: Serialize>(&self, body: &T) -> Result<MessageId, QueueError> {
        let body = serde_json::to_value(body)?;
        Ok(self.post(body))
    }

    // Every mutation is a single push/assign/remove, so a panic elsewhere
    // while holding the lock cannot leave the sequence half-updated.
    fn lock(&self) -> MutexGuard<'_, InMemoryQueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Clock, G: IdGenerator> Mailbox for InMemoryQueue<C, G> {
    fn post(&self, body: Value) -> MessageId {
        let mut state = self.lock();
        let now = self.clock.now();

        // Generated under the lock, so id order matches arrival order.
        let id = self.id_generator.generate(now);
        state.messages.push_back(Message::new(id.clone(), body, now));

        debug!(message_id = %id, queue_len = state.messages.len(), "message posted");
        id
    }

    fn list(&self) -> Vec<Message> {
        self.lock().messages.iter().cloned().collect()
    }

    fn receive(&self) -> Option<Message> {
        let mut state = self.lock();
        let now = self.clock.now();

        let message = state.messages.iter_mut().find(|m| m.is_visible_at(now))?;

        let hidden_until = now
            .checked_add_signed(self.invisibility)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        message.mark_received(hidden_until);

        debug!(
            message_id = %message.id,
            receive_count = message.receive_count,
            visible_after = %message.visible_after,
            "message received"
        );
        Some(message.clone())
    }

    fn commit(&self, id: &MessageId) -> Result<Message, CommitError> {
        let mut state = self.lock();
        let now = self.clock.now();

        let Some(index) = state.position(id) else {
            debug!(message_id = %id, "commit rejected: not found");
            return Err(CommitError::NotFound(id.clone()));
        };

        if self.config.commit_policy == CommitPolicy::RequireInFlight
            && state.messages[index].is_visible_at(now)
        {
            debug!(message_id = %id, "commit rejected: visibility window lapsed");
            return Err(CommitError::NotInFlight(id.clone()));
        }

        let message = state
            .messages
            .remove(index)
            .ok_or_else(|| CommitError::NotFound(id.clone()))?;

        debug!(message_id = %id, queue_len = state.messages.len(), "message committed");
        Ok(message)
    }

    fn counts(&self) -> QueueCounts {
        let state = self.lock();
        state.counts_at(self.clock.now())
    }
}
