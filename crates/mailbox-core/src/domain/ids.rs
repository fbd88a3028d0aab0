//! Message identifiers.
//!
//! ID は `<timestamp>_<counter>` 形式の文字列（例: `20240101120000000_1`）。
//! 生成は `ports::IdGenerator` に任せ、ここでは型だけを定義します。
//!
//! String の newtype にしておくことで、body や他の文字列と取り違えない。

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a message, assigned by the queue at post time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for MessageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
