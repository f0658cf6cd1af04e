//! FIFO-to-Kinesis ingest pipeline.
//!
//! A long-running agent that tails a POSIX named pipe line by line, groups
//! lines into bounded chunks, batch-publishes each chunk to a Kinesis
//! stream, and persists failed chunks for later replay through the same
//! pipe.
//!
//! ## Architecture
//!
//! - **Endpoint**: [`Fifo`] scans and writes the named pipe; `.stop` and
//!   `.flush` control lines are consumed, never forwarded.
//! - **Batching**: [`BufferWriter`] emits chunks on size, interval, or
//!   drain.
//! - **Publication**: [`BufferFlusher`] implementations:
//!   [`KinesisBufferFlusher`] and [`LoggerBufferFlusher`].
//! - **Failure handling**: [`FailureStore`] implementations:
//!   [`FileFailureStore`] and [`NullFailureStore`].
//! - **Supervision**: [`Pipeline`] wires the stages and owns the
//!   signal-driven shutdown protocol.

pub mod buffer;
pub mod config;
pub mod error;
pub mod fifo;
pub mod flusher;
pub mod pipeline;
pub mod random;
pub mod store;

pub use buffer::BufferWriter;
pub use config::{FlushHandler, PipelineConfig, PipelineState, MAX_KINESIS_BATCH};
pub use error::{PipelineError, Result};
pub use fifo::Fifo;
pub use flusher::{BufferFlusher, KinesisBufferFlusher, LoggerBufferFlusher};
pub use pipeline::{Pipeline, REPLAY_INTERVAL};
pub use store::{FailureStore, FileFailureStore, NullFailureStore, DEFAULT_REPLAY_LIMIT};
