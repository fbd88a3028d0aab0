use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use mailbox_core::{CommitPolicy, QueueConfig};

/// One producer and N competing consumers sharing a visibility-timeout queue.
#[derive(Debug, Parser)]
#[command(name = "mailbox", version)]
pub struct Args {
    /// Queue config file (toml/json/yaml). Fields: invisibility_timeout_ms, commit_policy.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Invisibility timeout in seconds. Overrides file and environment.
    #[arg(long)]
    pub invisibility_secs: Option<u64>,

    /// `unconditional` or `require-in-flight`. Overrides file and environment.
    #[arg(long)]
    pub commit_policy: Option<CommitPolicy>,

    #[arg(long, default_value_t = 2)]
    pub consumers: usize,

    /// Messages the producer posts.
    #[arg(long, default_value_t = 6)]
    pub messages: usize,

    /// Idle consumer poll interval in milliseconds.
    #[arg(long, default_value_t = 250)]
    pub poll_ms: u64,

    /// Fail the first delivery of every Nth message (0 disables).
    #[arg(long, default_value_t = 3)]
    pub fail_every: usize,
}

/// Build the queue config: defaults, then the config file, then
/// `MAILBOX_*` environment variables, then command-line flags.
///
/// e.g. `MAILBOX_INVISIBILITY_TIMEOUT_MS=10000`, `MAILBOX_COMMIT_POLICY=require-in-flight`
pub fn load_queue_config(args: &Args) -> Result<QueueConfig, ConfigError> {
    load_queue_config_with_env(args, mailbox_env())
}

fn mailbox_env() -> Environment {
    Environment::with_prefix("MAILBOX").try_parsing(true)
}

fn load_queue_config_with_env(args: &Args, env: Environment) -> Result<QueueConfig, ConfigError> {
    let mut builder = Config::builder();
    if let Some(path) = &args.config {
        builder = builder.add_source(File::from(path.as_path()));
    }
    builder = builder.add_source(env);

    let mut queue_config: QueueConfig = builder.build()?.try_deserialize()?;

    if let Some(secs) = args.invisibility_secs {
        queue_config = queue_config.with_invisibility_timeout(Duration::from_secs(secs));
    }
    if let Some(policy) = args.commit_policy {
        queue_config = queue_config.with_commit_policy(policy);
    }
    Ok(queue_config)
}
