//! Persistence and replay of failed chunks.
//!
//! A `FailureStore` keeps chunks the flusher could not publish and later
//! feeds them back into the FIFO so they travel the pipeline again like any
//! other lines. Replayed lines interleave with live producer traffic; that
//! is accepted.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::fifo::Fifo;
use crate::random::random_alphanumeric;

/// Retry files replayed per `retry` invocation. Bounds how much of a
/// backlog one cycle may push back into the pipeline.
pub const DEFAULT_REPLAY_LIMIT: usize = 3;

const FILE_PREFIX: &str = "fifo2kinesis";

/// Sink for failed chunks plus the replay operation the supervisor ticks.
#[async_trait]
pub trait FailureStore: Send + Sync {
    /// Persist one failed chunk.
    async fn save_attempt(&self, chunk: &[Bytes]) -> Result<()>;

    /// Replay a bounded number of previously saved chunks into the FIFO.
    async fn retry(&self);
}

/// Drops every failed chunk. Used when no failed-attempts directory is
/// configured.
pub struct NullFailureStore;

#[async_trait]
impl FailureStore for NullFailureStore {
    async fn save_attempt(&self, _chunk: &[Bytes]) -> Result<()> {
        Ok(())
    }

    async fn retry(&self) {}
}

/// Stores each failed chunk as one file in a configured directory.
///
/// File names are `fifo2kinesis-<UTC yyyymmddHHMMSS>-<8 random alnum>`, mode
/// 0600, content the chunk's lines joined with newlines. Files are
/// write-once: replay streams the lines back into the FIFO and deletes the
/// file. Lines that fail to write during replay are not re-tracked.
pub struct FileFailureStore {
    dir: PathBuf,
    fifo: Fifo,
    replay_limit: usize,
}

impl FileFailureStore {
    /// The directory must already exist; `PipelineConfig::validate` checks
    /// that before the pipeline is built.
    pub fn new(dir: impl Into<PathBuf>, fifo: Fifo) -> Self {
        Self {
            dir: dir.into(),
            fifo,
            replay_limit: DEFAULT_REPLAY_LIMIT,
        }
    }

    /// Override the per-cycle replay cap.
    pub fn with_replay_limit(mut self, limit: usize) -> Self {
        self.replay_limit = limit;
        self
    }

    /// Full path for a new retry file.
    fn file_path(&self) -> PathBuf {
        let date = Utc::now().format("%Y%m%d%H%M%S");
        self.dir
            .join(format!("{}-{}-{}", FILE_PREFIX, date, random_alphanumeric(8)))
    }

    /// Retry files currently in the directory, in name order (and therefore
    /// roughly in age order, given the timestamp prefix).
    async fn files(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "error listing failed attempts");
                return paths;
            }
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            paths.push(entry.path());
        }
        paths.sort();
        paths
    }

    /// Write the file's lines back into the FIFO, then delete it. A read
    /// error leaves the file in place for the next cycle.
    async fn replay_attempt(&self, path: &Path) -> std::io::Result<()> {
        let contents = tokio::fs::read(path).await?;

        let mut lines: Vec<&[u8]> = contents.split(|b| *b == b'\n').collect();
        // Saved files carry no trailing newline; tolerate one anyway.
        if lines.last() == Some(&&b""[..]) {
            lines.pop();
        }

        for line in lines {
            if let Err(e) = self.fifo.writeln(line).await {
                warn!(error = %e, "error replaying line");
            }
        }

        debug!(file = %path.display(), "replayed failed attempt");
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!(file = %path.display(), error = %e, "error removing retry file");
        }
        Ok(())
    }
}

#[async_trait]
impl FailureStore for FileFailureStore {
    async fn save_attempt(&self, chunk: &[Bytes]) -> Result<()> {
        let path = self.file_path();

        let mut contents = Vec::new();
        for (i, line) in chunk.iter().enumerate() {
            if i > 0 {
                contents.push(b'\n');
            }
            contents.extend_from_slice(line);
        }

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create_new(true).mode(0o600);

        let mut file = options.open(&path).await.map_err(PipelineError::Save)?;
        file.write_all(&contents).await.map_err(PipelineError::Save)?;
        file.flush().await.map_err(PipelineError::Save)?;

        debug!(file = %path.display(), lines = chunk.len(), "saved failed attempt");
        Ok(())
    }

    async fn retry(&self) {
        for path in self.files().await.into_iter().take(self.replay_limit) {
            if let Err(e) = self.replay_attempt(&path).await {
                warn!(file = %path.display(), error = %e, "error replaying failed attempt");
            }
        }
    }
}
