//! mailbox-core
//!
//! In-memory visibility-timeout message queue.
//!
//! Producers `post` messages; competing consumers `receive` the oldest
//! visible message, which is then hidden for the configured invisibility
//! timeout. A consumer `commit`s the message to delete it. If it does not,
//! the message becomes visible again and is redelivered.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（MessageId, Message, MessageState）
//! - **ports**: 抽象化レイヤー（Clock, IdGenerator）
//! - **queue**: Mailbox trait + InMemoryQueue + QueueConfig
//! - **consumer**: 複数コンシューマの実行ループ（ConsumerGroup）
//! - **observability**: QueueCounts
//! - **error**: エラー型
//!
//! ```ignore
//! use std::time::Duration;
//! use mailbox_core::{InMemoryQueue, Mailbox, QueueConfig};
//!
//! let queue = InMemoryQueue::with_config(QueueConfig::new(Duration::from_secs(5)))?;
//! let id = queue.post(serde_json::json!({ "body": "x" }));
//! let message = queue.receive().expect("visible");
//! queue.commit(&message.id)?;
//! ```

pub mod consumer;
pub mod domain;
pub mod error;
pub mod observability;
pub mod ports;
pub mod queue;

pub use consumer::{ConsumerGroup, ConsumerOptions, ConsumerStats, MessageHandler};
pub use domain::{Message, MessageId, MessageState};
pub use error::{CommitError, ConfigError, HandlerError, QueueError};
pub use observability::QueueCounts;
pub use ports::{Clock, FixedClock, IdGenerator, SystemClock, TimestampIdGenerator};
pub use queue::{CommitPolicy, InMemoryQueue, Mailbox, QueueConfig};
