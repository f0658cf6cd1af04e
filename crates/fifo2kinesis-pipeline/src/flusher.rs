//! Chunk publication.
//!
//! A `BufferFlusher` takes one chunk and either publishes it or explains
//! which lines did not make it. The Kinesis implementation maps a chunk onto
//! one `PutRecords` call and classifies the three possible outcomes: whole
//! call failed, some records failed, everything landed.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, error, info};

use fifo2kinesis_client::{KinesisApi, PutRecordsEntry};

use crate::random::random_alphanumeric;

/// Length of the random partition key generated when none is configured.
const RANDOM_KEY_LEN: usize = 12;

/// Publishes one chunk per call; returns the failed subset, if any.
///
/// Implementations never re-order lines: a returned subset is a
/// sub-sequence of the input chunk.
#[async_trait]
pub trait BufferFlusher: Send + Sync {
    async fn flush(&self, chunk: Vec<Bytes>) -> Option<Vec<Bytes>>;
}

/// Batch-publishes chunks to a Kinesis stream.
///
/// With an empty configured partition key, every record gets a fresh
/// 12-character random alphanumeric key, spreading records across all open
/// shards; otherwise the fixed key is used for every record.
pub struct KinesisBufferFlusher {
    stream_name: String,
    partition_key: String,
    client: Arc<dyn KinesisApi>,
}

impl KinesisBufferFlusher {
    pub fn new(
        stream_name: impl Into<String>,
        partition_key: impl Into<String>,
        client: Arc<dyn KinesisApi>,
    ) -> Self {
        Self {
            stream_name: stream_name.into(),
            partition_key: partition_key.into(),
            client,
        }
    }

    fn format_partition_key(&self) -> String {
        if self.partition_key.is_empty() {
            random_alphanumeric(RANDOM_KEY_LEN)
        } else {
            self.partition_key.clone()
        }
    }
}

#[async_trait]
impl BufferFlusher for KinesisBufferFlusher {
    async fn flush(&self, chunk: Vec<Bytes>) -> Option<Vec<Bytes>> {
        let size = chunk.len();
        if size == 0 {
            return None;
        }

        let entries: Vec<PutRecordsEntry> = chunk
            .iter()
            .map(|line| PutRecordsEntry {
                data: line.clone(),
                partition_key: self.format_partition_key(),
            })
            .collect();

        let output = match self.client.put_records(&self.stream_name, &entries).await {
            Ok(output) => output,
            Err(e) => {
                error!(error = %e, "error publishing record(s) to kinesis");
                return Some(chunk);
            }
        };

        if output.failed_record_count > 0 {
            error!(
                failed = output.failed_record_count,
                "error publishing record(s) to kinesis"
            );
            let subset: Vec<Bytes> = output
                .records
                .iter()
                .zip(chunk.iter())
                .filter(|(result, _)| result.is_failed())
                .map(|(_, line)| line.clone())
                .collect();

            let published = size - output.failed_record_count;
            if published > 0 {
                debug!(records = published, "published record(s) to kinesis");
            }
            return Some(subset);
        }

        debug!(records = size, "published record(s) to kinesis");
        None
    }
}

/// Streams every line as an info-level log event. Useful for debugging the
/// producer side without touching the cloud; never fails.
pub struct LoggerBufferFlusher;

#[async_trait]
impl BufferFlusher for LoggerBufferFlusher {
    async fn flush(&self, chunk: Vec<Bytes>) -> Option<Vec<Bytes>> {
        for line in &chunk {
            info!("{}", String::from_utf8_lossy(line));
        }
        None
    }
}
