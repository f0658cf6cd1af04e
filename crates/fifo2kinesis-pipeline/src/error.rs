//! Error types for the ingest pipeline.
//!
//! Only `Config` and `FifoIo` are process-terminal; publish, persist, and
//! replay failures are recovered locally by the stage that hits them.

use thiserror::Error;

use fifo2kinesis_client::ClientError;

/// Errors that can occur while building or running the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid or missing configuration. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Open, read, or write on the FIFO failed. Fatal for the running
    /// pipeline; triggers shutdown.
    #[error("error reading from fifo: {0}")]
    FifoIo(#[source] std::io::Error),

    /// Persisting a failed chunk did not succeed. The chunk is dropped.
    #[error("error saving failed attempt: {0}")]
    Save(#[source] std::io::Error),

    /// Installing a signal handler failed.
    #[error("error installing signal handler: {0}")]
    Signal(#[source] std::io::Error),

    /// The Kinesis client could not be constructed.
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
