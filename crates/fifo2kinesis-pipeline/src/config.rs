//! Pipeline configuration and lifecycle state.

use std::path::PathBuf;

use crate::error::{PipelineError, Result};

/// Maximum records per batch accepted by the Kinesis `PutRecords` API.
pub const MAX_KINESIS_BATCH: usize = 500;

/// Which flusher the publisher stage uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushHandler {
    /// Batch-publish chunks to a Kinesis stream.
    Kinesis,
    /// Stream every line as an info-level log event; for debugging.
    Logger,
}

impl std::str::FromStr for FlushHandler {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "kinesis" => Ok(FlushHandler::Kinesis),
            "logger" => Ok(FlushHandler::Logger),
            other => Err(PipelineError::Config(format!(
                "flush handler not valid: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for FlushHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlushHandler::Kinesis => write!(f, "kinesis"),
            FlushHandler::Logger => write!(f, "logger"),
        }
    }
}

/// Lifecycle state of the pipeline. `Draining` is entered only through a
/// shutdown trigger; `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Starting,
    Running,
    Draining,
    Stopped,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineState::Starting => write!(f, "STARTING"),
            PipelineState::Running => write!(f, "RUNNING"),
            PipelineState::Draining => write!(f, "DRAINING"),
            PipelineState::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// Options for a pipeline run.
///
/// Mirrors the command-line surface one to one; `validate` enforces the
/// cross-field rules before any worker is started.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Absolute path to an existing FIFO node.
    pub fifo_name: PathBuf,
    /// Destination stream. Required when the handler is `Kinesis`.
    pub stream_name: String,
    pub flush_handler: FlushHandler,
    /// Maximum lines per chunk (Q).
    pub queue_limit: usize,
    /// Seconds between timed flushes (T); 0 disables the timer.
    pub flush_interval: u64,
    /// Fixed partition key; empty selects a random key per record.
    pub partition_key: String,
    /// Directory for failed-attempt files; `None` disables persistence.
    pub failed_attempts_dir: Option<PathBuf>,
    pub region: String,
    /// Kinesis endpoint override for local/compatible services.
    pub endpoint: Option<String>,
    pub role_arn: Option<String>,
    pub role_session_name: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fifo_name: PathBuf::new(),
            stream_name: String::new(),
            flush_handler: FlushHandler::Kinesis,
            queue_limit: MAX_KINESIS_BATCH,
            flush_interval: 5,
            partition_key: String::new(),
            failed_attempts_dir: None,
            region: "us-east-1".to_string(),
            endpoint: None,
            role_arn: None,
            role_session_name: None,
        }
    }
}

impl PipelineConfig {
    /// Check the configuration against the startup rules.
    pub fn validate(&self) -> Result<()> {
        if self.fifo_name.as_os_str().is_empty() {
            return Err(PipelineError::Config(
                "missing required option: fifo-name".to_string(),
            ));
        }

        if self.flush_handler == FlushHandler::Kinesis && self.stream_name.is_empty() {
            return Err(PipelineError::Config(
                "missing required option: stream-name".to_string(),
            ));
        }

        if self.queue_limit < 1 {
            return Err(PipelineError::Config(
                "buffer queue limit must be greater than 0".to_string(),
            ));
        }
        if self.flush_handler == FlushHandler::Kinesis && self.queue_limit > MAX_KINESIS_BATCH {
            return Err(PipelineError::Config(format!(
                "buffer queue limit cannot exceed {} items when using the kinesis handler",
                MAX_KINESIS_BATCH
            )));
        }

        if let Some(dir) = &self.failed_attempts_dir {
            let meta = std::fs::metadata(dir).map_err(|_| {
                PipelineError::Config("failed attempts directory does not exist".to_string())
            })?;
            if !meta.is_dir() {
                return Err(PipelineError::Config(
                    "failed attempts directory is not a directory".to_string(),
                ));
            }
            std::fs::read_dir(dir).map_err(|_| {
                PipelineError::Config("failed attempts directory is not readable".to_string())
            })?;
        }

        Ok(())
    }
}
