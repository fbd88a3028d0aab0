//! Competing consumers over one shared mailbox.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, Span, debug, info, info_span, warn};

use crate::domain::Message;
use crate::error::HandlerError;
use crate::queue::Mailbox;

/// Processes one received message.
///
/// `Ok` commits the message. `Err` leaves it in flight; it is redelivered to
/// some consumer after the invisibility timeout.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &Message) -> Result<(), HandlerError>;
}

#[derive(Debug, Clone)]
pub struct ConsumerOptions {
    /// How long an idle consumer waits before calling `receive` again.
    pub poll_interval: Duration,
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Totals across every consumer in a group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConsumerStats {
    /// Messages passed to the handler (redeliveries counted again).
    pub handled: u64,
    pub committed: u64,
    /// Handler returned `Err`.
    pub failed: u64,
    /// Handler succeeded but the queue refused the commit.
    pub commit_rejected: u64,
}

#[derive(Debug, Default)]
struct Counters {
    handled: AtomicU64,
    committed: AtomicU64,
    failed: AtomicU64,
    commit_rejected: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> ConsumerStats {
        ConsumerStats {
            handled: self.handled.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            commit_rejected: self.commit_rejected.load(Ordering::Relaxed),
        }
    }
}

/// Consumer group handle.
/// - `request_shutdown()` で新しい receive を止める（実行中の handler は止めない）
/// - `shutdown_and_join()` で全コンシューマの終了を待てる
pub struct ConsumerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl ConsumerGroup {
    /// Spawn `n` consumers. Must be called from within a tokio runtime.
    pub fn spawn(
        n: usize,
        mailbox: Arc<dyn Mailbox>,
        handler: Arc<dyn MessageHandler>,
        options: ConsumerOptions,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let counters = Arc::new(Counters::default());

        let mut joins = Vec::with_capacity(n);
        for consumer_id in 0..n {
            let consumer = Consumer {
                consumer_id,
                mailbox: Arc::clone(&mailbox),
                handler: Arc::clone(&handler),
                poll_interval: options.poll_interval,
                counters: Arc::clone(&counters),
            };
            let rx = shutdown_rx.clone();
            joins.push(tokio::spawn(
                consumer.run(rx).instrument(consumer_span(consumer_id)),
            ));
        }

        info!(consumers = n, "consumer group started");
        Self {
            shutdown_tx,
            joins,
            counters,
        }
    }

    pub fn stats(&self) -> ConsumerStats {
        self.counters.snapshot()
    }

    pub fn request_shutdown(&self) {
        // ignore send error: consumers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown, wait for all consumers, and return the final stats.
    pub async fn shutdown_and_join(self) -> ConsumerStats {
        self.request_shutdown();
        for join in self.joins {
            if let Err(e) = join.await {
                warn!(error = %e, "consumer task ended abnormally");
            }
        }
        let stats = self.counters.snapshot();
        info!(?stats, "consumer group stopped");
        stats
    }
}

/// Every log line a consumer emits carries its `consumer_id`.
fn consumer_span(consumer_id: usize) -> Span {
    info_span!("consumer", consumer_id)
}

struct Consumer {
    consumer_id: usize,
    mailbox: Arc<dyn Mailbox>,
    handler: Arc<dyn MessageHandler>,
    poll_interval: Duration,
    counters: Arc<Counters>,
}

impl Consumer {
    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let consumer_id = self.consumer_id;
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            // receive はロックを取ってすぐ返る。await を跨いでロックを持たない
            let Some(message) = self.mailbox.receive() else {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
                continue;
            };

            self.process(message).await;
        }
        debug!(consumer_id, "consumer stopped");
    }

    async fn process(&self, message: Message) {
        let consumer_id = self.consumer_id;
        self.counters.handled.fetch_add(1, Ordering::Relaxed);

        match self.handler.handle(&message).await {
            Ok(()) => match self.mailbox.commit(&message.id) {
                Ok(_) => {
                    self.counters.committed.fetch_add(1, Ordering::Relaxed);
                    debug!(consumer_id, message_id = %message.id, "message handled and committed");
                }
                Err(e) => {
                    self.counters.commit_rejected.fetch_add(1, Ordering::Relaxed);
                    warn!(consumer_id, message_id = %message.id, error = %e, "commit rejected after handling");
                }
            },
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    consumer_id,
                    message_id = %message.id,
                    receive_count = message.receive_count,
                    error = %e,
                    "handler failed; message will be redelivered after its timeout"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::domain::MessageId;
    use crate::queue::{InMemoryQueue, QueueConfig};

    struct Recorder {
        seen: Mutex<Vec<(MessageId, u32)>>,
        fail_first_delivery: bool,
    }

    impl Recorder {
        fn new(fail_first_delivery: bool) -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
                fail_first_delivery,
            }
        }

        fn seen(&self) -> Vec<(MessageId, u32)> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessageHandler for Recorder {
        async fn handle(&self, message: &Message) -> Result<(), HandlerError> {
            self.seen
                .lock()
                .unwrap()
                .push((message.id.clone(), message.receive_count));
            if self.fail_first_delivery && message.receive_count == 1 {
                return Err(HandlerError::new("intentional failure"));
            }
            Ok(())
        }
    }

    fn mailbox(timeout: Duration) -> Arc<InMemoryQueue> {
        Arc::new(InMemoryQueue::with_config(QueueConfig::new(timeout)).unwrap())
    }

    fn fast() -> ConsumerOptions {
        ConsumerOptions {
            poll_interval: Duration::from_millis(5),
        }
    }

    async fn wait_until_empty(queue: &InMemoryQueue) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !queue.is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("queue should drain");
    }

    #[test]
    fn consumer_span_is_named_and_carries_consumer_id() {
        tracing::subscriber::with_default(tracing_subscriber::registry(), || {
            let span = consumer_span(3);
            let meta = span.metadata().expect("span should be enabled");
            assert_eq!(meta.name(), "consumer");
            assert!(meta.fields().field("consumer_id").is_some());
        });
    }

    #[tokio::test]
    async fn group_drains_queue_and_commits_each_message_once() {
        let queue = mailbox(Duration::from_secs(30));
        let mut posted: Vec<_> = (0..10).map(|i| queue.post(serde_json::json!(i))).collect();
        posted.sort();

        let handler = Arc::new(Recorder::new(false));
        let group = ConsumerGroup::spawn(2, queue.clone(), handler.clone(), fast());

        wait_until_empty(&queue).await;
        let stats = group.shutdown_and_join().await;

        assert_eq!(stats.handled, 10);
        assert_eq!(stats.committed, 10);
        assert_eq!(stats.failed, 0);

        let mut seen: Vec<_> = handler.seen().into_iter().map(|(id, _)| id).collect();
        seen.sort();
        assert_eq!(seen, posted);
    }

    #[tokio::test]
    async fn failed_message_is_redelivered_after_timeout() {
        let queue = mailbox(Duration::from_millis(50));
        let posted: Vec<_> = (0..3).map(|i| queue.post(serde_json::json!(i))).collect();

        let handler = Arc::new(Recorder::new(true));
        let group = ConsumerGroup::spawn(2, queue.clone(), handler.clone(), fast());

        wait_until_empty(&queue).await;
        let stats = group.shutdown_and_join().await;

        assert_eq!(stats.failed, 3);
        assert_eq!(stats.committed, 3);
        assert_eq!(stats.handled, 6);

        let mut deliveries: HashMap<MessageId, Vec<u32>> = HashMap::new();
        for (id, count) in handler.seen() {
            deliveries.entry(id).or_default().push(count);
        }
        for id in posted {
            assert_eq!(deliveries[&id], vec![1, 2]);
        }
    }

    #[tokio::test]
    async fn idle_group_shuts_down_promptly() {
        let queue = mailbox(Duration::from_secs(1));
        let group = ConsumerGroup::spawn(
            3,
            queue,
            Arc::new(Recorder::new(false)),
            ConsumerOptions {
                poll_interval: Duration::from_secs(60),
            },
        );

        let stats = tokio::time::timeout(Duration::from_secs(2), group.shutdown_and_join())
            .await
            .expect("shutdown should interrupt the idle wait");
        assert_eq!(stats, ConsumerStats::default());
    }
}
