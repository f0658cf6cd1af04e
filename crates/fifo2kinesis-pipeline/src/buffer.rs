//! Size- and time-triggered batching of scanned lines.
//!
//! `BufferWriter` sits between the scanner and the flusher: it accumulates
//! lines into chunks and emits a chunk when the queue limit is reached, when
//! the flush interval elapses, or when the input stream closes (drain).
//!
//! The interval timer does two things on every tick: it raises an internal
//! force-flush signal, and it writes a `.flush` sentinel into the FIFO. The
//! sentinel exists to wake the scanner out of an idle read so external
//! observers of the pipe see forward progress; the scanner discards it. The
//! force-flush channel is what actually causes the writer to emit; a tick
//! with an empty buffer is a no-op, so idle periods never produce empty
//! chunks.

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::fifo::Fifo;

/// Groups lines into chunks of at most `queue_limit`, flushing early every
/// `flush_interval` seconds (0 disables the timer).
#[derive(Debug)]
pub struct BufferWriter {
    fifo: Fifo,
    queue_limit: usize,
    flush_interval: u64,
}

impl BufferWriter {
    pub fn new(fifo: Fifo, queue_limit: usize, flush_interval: u64) -> Self {
        Self {
            fifo,
            queue_limit,
            flush_interval,
        }
    }

    /// Consume `lines` until the channel closes, emitting chunks on
    /// `chunks`. The residual buffer is emitted as a final chunk on drain;
    /// empty chunks are never emitted.
    pub async fn write(&self, mut lines: mpsc::Receiver<Bytes>, chunks: mpsc::Sender<Vec<Bytes>>) {
        // Capacity 1 with drop-if-full: a pending flush signal already
        // covers any ticks that pile up behind it.
        let (force_tx, mut force_rx) = mpsc::channel::<()>(1);

        let timer = if self.flush_interval > 0 {
            let fifo = self.fifo.clone();
            let interval = Duration::from_secs(self.flush_interval);
            Some(tokio::spawn(async move {
                loop {
                    tokio::time::sleep(interval).await;
                    if force_tx.is_closed() {
                        break;
                    }
                    let _ = force_tx.try_send(());
                    // Wake the scanner in case the pipe has gone quiet. The
                    // sentinel is discarded on the read side; a failed write
                    // only delays this flush until the next tick.
                    if let Err(e) = fifo.send_command("flush").await {
                        warn!(error = %e, "error sending flush command");
                    }
                }
            }))
        } else {
            None
        };

        let mut chunk: Vec<Bytes> = Vec::with_capacity(self.queue_limit);
        loop {
            tokio::select! {
                maybe = lines.recv() => match maybe {
                    Some(line) => {
                        chunk.push(line);
                        if chunk.len() >= self.queue_limit
                            && !Self::emit(&chunks, &mut chunk, self.queue_limit).await
                        {
                            break;
                        }
                    }
                    None => break,
                },
                Some(_) = force_rx.recv() => {
                    debug!("force flush signal received");
                    if !chunk.is_empty()
                        && !Self::emit(&chunks, &mut chunk, self.queue_limit).await
                    {
                        break;
                    }
                }
            }
        }

        if let Some(timer) = timer {
            timer.abort();
        }

        // The input stream closed; flush anything left in the buffer.
        if !chunk.is_empty() {
            Self::emit(&chunks, &mut chunk, self.queue_limit).await;
        }
    }

    async fn emit(
        chunks: &mpsc::Sender<Vec<Bytes>>,
        chunk: &mut Vec<Bytes>,
        capacity: usize,
    ) -> bool {
        debug!(items = chunk.len(), "flush buffer");
        let full = std::mem::replace(chunk, Vec::with_capacity(capacity));
        chunks.send(full).await.is_ok()
    }
}
