mod settings;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, ensure};
use async_trait::async_trait;
use chrono::Utc;
use clap::Parser;
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use mailbox_core::{
    ConsumerGroup, ConsumerOptions, HandlerError, InMemoryQueue, Mailbox, Message,
    MessageHandler,
};

use crate::settings::{Args, load_queue_config};

#[derive(Debug, Deserialize)]
struct DemoBody {
    seq: usize,
    text: String,
}

/// Handler for the demo: "processes" a message and, to show redelivery,
/// fails the first delivery of every Nth one.
struct DemoHandler {
    fail_every: usize,
    work: Duration,
}

#[async_trait]
impl MessageHandler for DemoHandler {
    async fn handle(&self, message: &Message) -> Result<(), HandlerError> {
        let body: DemoBody = message.decode()?;

        if self.fail_every > 0 && body.seq % self.fail_every == 0 && message.receive_count == 1 {
            return Err(HandlerError::new(format!(
                "intentional failure (seq={})",
                body.seq
            )));
        }

        tokio::time::sleep(self.work).await;
        info!(
            message_id = %message.id,
            seq = body.seq,
            text = %body.text,
            receive_count = message.receive_count,
            "processed"
        );
        Ok(())
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// The queue as a table: id, post time, visibility.
fn print_listing(queue: &dyn Mailbox) {
    let now = Utc::now();
    let messages = queue.list();

    println!("{:<24} {:<10} {:<24}", "id", "posted", "visibility");
    if messages.is_empty() {
        println!("(no messages)");
    }
    for m in messages {
        let visibility = match m.visible_in(now) {
            Some(left) => format!("in flight, visible in {:.1}s", left.num_milliseconds() as f64 / 1000.0),
            None => "visible".to_string(),
        };
        println!(
            "{:<24} {:<10} {:<24}",
            m.id,
            m.posted_at.format("%H:%M:%S"),
            visibility
        );
    }
    println!();
}

/// Print the listing every `every` until the queue is empty or `interrupt`
/// resolves. Returns `true` when interrupted.
async fn watch_until_drained(
    queue: &dyn Mailbox,
    every: Duration,
    interrupt: impl Future<Output = ()>,
) -> bool {
    tokio::pin!(interrupt);
    let mut ticker = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut interrupt => return true,
        }
        print_listing(queue);
        if queue.counts().total == 0 {
            return false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();
    ensure!(args.consumers > 0, "--consumers must be at least 1");

    let queue_config = load_queue_config(&args)?;
    info!(
        invisibility_ms = queue_config.invisibility_timeout_ms,
        commit_policy = queue_config.commit_policy.as_str(),
        "configuration loaded"
    );

    let queue = Arc::new(InMemoryQueue::with_config(queue_config)?);

    // (A) producer
    for seq in 0..args.messages {
        let id = queue.post_json(&serde_json::json!({
            "seq": seq,
            "text": format!("message #{seq}"),
        }))?;
        info!(message_id = %id, seq, "posted");
    }

    // (B) competing consumers
    let handler = Arc::new(DemoHandler {
        fail_every: args.fail_every,
        work: Duration::from_millis(100),
    });
    let group = ConsumerGroup::spawn(
        args.consumers,
        queue.clone(),
        handler,
        ConsumerOptions {
            poll_interval: Duration::from_millis(args.poll_ms),
        },
    );

    // (C) watch the queue until every message is committed
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };
    if watch_until_drained(&*queue, Duration::from_secs(1), ctrl_c).await {
        warn!("interrupted; stopping consumers");
    }

    // (D) stop consumers and report
    let stats = group.shutdown_and_join().await;
    let counts = queue.counts();
    println!(
        "final: handled={} committed={} failed={} commit_rejected={} remaining={} (in flight {})",
        stats.handled,
        stats.committed,
        stats.failed,
        stats.commit_rejected,
        counts.total,
        counts.in_flight
    );
    Ok(())
}
