use serde::{Deserialize, Serialize};

/// Point-in-time counts of the queue contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub total: usize,
    pub visible: usize,
    pub in_flight: usize,
}
