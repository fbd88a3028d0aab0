use thiserror::Error;

use crate::domain::MessageId;

/// Why a `commit` was rejected. The queue is left untouched in every case.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommitError {
    /// No live message has this id (never posted, or already committed).
    #[error("message not found: id={0}")]
    NotFound(MessageId),

    /// The message is still queued but its visibility window has lapsed,
    /// so another consumer may already hold it. Only raised under
    /// `CommitPolicy::RequireInFlight`.
    #[error("message is not in flight: id={0}")]
    NotInFlight(MessageId),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invisibility timeout must be greater than zero")]
    ZeroInvisibility,

    #[error("invisibility timeout is out of range: {0}ms")]
    OutOfRange(u64),

    #[error("unknown commit policy: {0} (expected `unconditional` or `require-in-flight`)")]
    UnknownCommitPolicy(String),
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Commit(#[from] CommitError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("message body codec: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Failure reported by a `MessageHandler`.
///
/// The consumer does not commit the message, so it becomes visible again
/// once its invisibility timeout elapses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HandlerError(String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        Self(format!("json decode: {e}"))
    }
}
