//! Message state (derived, never stored).

use serde::{Deserialize, Serialize};

/// Visibility of a message at a given instant.
///
/// State transitions:
/// - post -> Visible
/// - Visible -> InFlight (receive)
/// - InFlight -> Visible (invisibility timeout elapses, no code runs)
/// - Visible | InFlight -> removed (commit)
///
/// The queue only stores `visible_after`; the state is recomputed from the
/// clock whenever it is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageState {
    /// Eligible for the next `receive`.
    Visible,

    /// Handed to a consumer and hidden until its timeout elapses.
    InFlight,
}

impl MessageState {
    pub fn is_receivable(self) -> bool {
        matches!(self, MessageState::Visible)
    }
}
