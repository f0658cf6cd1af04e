//! fifo2kinesis: tail a named pipe into a Kinesis stream.
//!
//! Reads newline-delimited text from an existing FIFO, batches it, and
//! publishes each batch to Kinesis with `PutRecords`. Failed batches can be
//! written to a directory and are replayed through the pipe every 30
//! seconds.
//!
//! ## Quick start
//!
//! ```bash
//! mkfifo /var/run/app.pipe
//! fifo2kinesis --fifo-name /var/run/app.pipe --stream-name my-stream
//!
//! # Debugging without touching the cloud:
//! fifo2kinesis -f /var/run/app.pipe --flush-handler logger -d
//! ```
//!
//! ## Configuration
//!
//! Every flag is also readable from the environment as
//! `FIFO2KINESIS_<FLAG>` with hyphens replaced by underscores, e.g.
//! `FIFO2KINESIS_STREAM_NAME`. Signing credentials come from the usual
//! `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` variables.
//!
//! The process exits 0 after a clean signal-driven shutdown and non-zero on
//! configuration errors or a fatal FIFO I/O error.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::debug;
use tracing_subscriber::FmtSubscriber;

use fifo2kinesis_pipeline::{FlushHandler, Pipeline, PipelineConfig};

#[derive(Parser, Debug)]
#[command(name = "fifo2kinesis")]
#[command(about = "Publish lines written to a named pipe to a Kinesis stream", version)]
struct Cli {
    /// The absolute path of the named pipe, e.g. /var/test.pipe
    #[arg(short = 'f', long, env = "FIFO2KINESIS_FIFO_NAME")]
    fifo_name: PathBuf,

    /// The name of the Kinesis stream
    #[arg(short = 's', long, env = "FIFO2KINESIS_STREAM_NAME", default_value = "")]
    stream_name: String,

    /// Where flushed buffers go; use "logger" for debugging
    #[arg(
        long,
        env = "FIFO2KINESIS_FLUSH_HANDLER",
        value_enum,
        default_value = "kinesis"
    )]
    flush_handler: FlushHandlerArg,

    /// The maximum number of items in the buffer before it is flushed
    #[arg(
        short = 'l',
        long,
        env = "FIFO2KINESIS_BUFFER_QUEUE_LIMIT",
        default_value_t = 500
    )]
    buffer_queue_limit: usize,

    /// The number of seconds before the buffer is flushed; 0 disables
    /// timed flushes
    #[arg(
        short = 'i',
        long,
        env = "FIFO2KINESIS_FLUSH_INTERVAL",
        default_value_t = 5
    )]
    flush_interval: u64,

    /// The partition key; defaults to a 12 character random string per
    /// record if omitted
    #[arg(short = 'p', long, env = "FIFO2KINESIS_PARTITION_KEY", default_value = "")]
    partition_key: String,

    /// The path to the directory where failed attempts are stored
    #[arg(short = 'D', long, env = "FIFO2KINESIS_FAILED_ATTEMPTS_DIR")]
    failed_attempts_dir: Option<PathBuf>,

    /// The AWS region hosting the stream
    #[arg(long, env = "FIFO2KINESIS_REGION", default_value = "us-east-1")]
    region: String,

    /// Kinesis endpoint override, e.g. http://localhost:4567
    #[arg(long, env = "FIFO2KINESIS_ENDPOINT")]
    endpoint: Option<String>,

    /// The ARN of the AWS role being assumed
    #[arg(short = 'r', long, env = "FIFO2KINESIS_ROLE_ARN")]
    role_arn: Option<String>,

    /// The session name used when assuming a role
    #[arg(short = 'S', long, env = "FIFO2KINESIS_ROLE_SESSION_NAME")]
    role_session_name: Option<String>,

    /// Show debug level log messages
    #[arg(short = 'd', long, env = "FIFO2KINESIS_DEBUG")]
    debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FlushHandlerArg {
    Kinesis,
    Logger,
}

impl From<FlushHandlerArg> for FlushHandler {
    fn from(arg: FlushHandlerArg) -> Self {
        match arg {
            FlushHandlerArg::Kinesis => FlushHandler::Kinesis,
            FlushHandlerArg::Logger => FlushHandler::Logger,
        }
    }
}

impl From<Cli> for PipelineConfig {
    fn from(cli: Cli) -> Self {
        PipelineConfig {
            fifo_name: cli.fifo_name,
            stream_name: cli.stream_name,
            flush_handler: cli.flush_handler.into(),
            queue_limit: cli.buffer_queue_limit,
            flush_interval: cli.flush_interval,
            partition_key: cli.partition_key,
            failed_attempts_dir: cli.failed_attempts_dir,
            region: cli.region,
            endpoint: cli.endpoint,
            role_arn: cli.role_arn,
            role_session_name: cli.role_session_name,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to initialize logging")?;

    debug!("configuration parsed");

    let pipeline = Pipeline::new(cli.into())?;
    pipeline.run().await?;

    Ok(())
}
