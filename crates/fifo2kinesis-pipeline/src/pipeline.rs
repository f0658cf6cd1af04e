//! Pipeline supervision: wiring, lifecycle, and the shutdown protocol.
//!
//! The supervisor owns five workers connected by bounded channels:
//!
//! ```text
//! Fifo --scan--> [lines] --Batcher--> [chunks] --Publisher--> [failed] --Recorder--> store
//!                                                                     store --Replayer--> Fifo
//! ```
//!
//! Shutdown is sentinel-driven. A terminate/interrupt signal (or a fatal
//! scan error) lands on a capacity-1 shutdown channel; the supervisor then
//! writes `.stop` into the FIFO, which wakes the reader and makes it return.
//! Closing the lines channel cascades down the pipeline: the batcher
//! flushes its residual chunk and closes chunks, the publisher drains and
//! closes failed, the recorder drains. The replayer is detached and simply
//! aborted; pending retry files survive on disk for the next run.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, RwLock};
use tracing::{error, info, warn};

use fifo2kinesis_client::{KinesisClient, KinesisConfig};

use crate::buffer::BufferWriter;
use crate::config::{FlushHandler, PipelineConfig, PipelineState};
use crate::error::{PipelineError, Result};
use crate::fifo::Fifo;
use crate::flusher::{BufferFlusher, KinesisBufferFlusher, LoggerBufferFlusher};
use crate::store::{FailureStore, FileFailureStore, NullFailureStore};

/// How often the replayer pushes saved attempts back into the pipeline.
pub const REPLAY_INTERVAL: Duration = Duration::from_secs(30);

/// Chunks allowed in flight between batcher and publisher.
const CHUNK_CHANNEL_CAPACITY: usize = 100;

/// The assembled pipeline. Construct with [`Pipeline::new`] (which builds
/// the flusher and store from configuration) or [`Pipeline::with_parts`]
/// for custom wiring, then drive it with [`Pipeline::run`].
pub struct Pipeline {
    config: PipelineConfig,
    fifo: Fifo,
    flusher: Arc<dyn BufferFlusher>,
    store: Arc<dyn FailureStore>,
    state: Arc<RwLock<PipelineState>>,
}

impl Pipeline {
    /// Validate `config` and assemble the pipeline from it.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let fifo = Fifo::new(&config.fifo_name);

        let flusher: Arc<dyn BufferFlusher> = match config.flush_handler {
            FlushHandler::Kinesis => {
                let client = KinesisClient::new(KinesisConfig {
                    region: config.region.clone(),
                    endpoint: config.endpoint.clone(),
                    role_arn: config.role_arn.clone(),
                    role_session_name: config.role_session_name.clone(),
                })?;
                Arc::new(KinesisBufferFlusher::new(
                    config.stream_name.clone(),
                    config.partition_key.clone(),
                    Arc::new(client),
                ))
            }
            FlushHandler::Logger => Arc::new(LoggerBufferFlusher),
        };

        let store: Arc<dyn FailureStore> = match &config.failed_attempts_dir {
            Some(dir) => Arc::new(FileFailureStore::new(dir, fifo.clone())),
            None => Arc::new(NullFailureStore),
        };

        Ok(Self::assemble(config, fifo, flusher, store))
    }

    /// Assemble a pipeline around an externally built flusher and store.
    pub fn with_parts(
        config: PipelineConfig,
        flusher: Arc<dyn BufferFlusher>,
        store: Arc<dyn FailureStore>,
    ) -> Result<Self> {
        config.validate()?;
        let fifo = Fifo::new(&config.fifo_name);
        Ok(Self::assemble(config, fifo, flusher, store))
    }

    fn assemble(
        config: PipelineConfig,
        fifo: Fifo,
        flusher: Arc<dyn BufferFlusher>,
        store: Arc<dyn FailureStore>,
    ) -> Self {
        Self {
            config,
            fifo,
            flusher,
            store,
            state: Arc::new(RwLock::new(PipelineState::Starting)),
        }
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> PipelineState {
        *self.state.read().await
    }

    /// Run until a terminate or interrupt signal arrives, then drain and
    /// stop. A fatal FIFO error also triggers shutdown and is returned
    /// after the drain completes.
    pub async fn run(&self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        Self::spawn_signal_listener(shutdown_tx.clone())?;
        self.run_with_shutdown(shutdown_tx, shutdown_rx).await
    }

    /// Install handlers for SIGTERM and SIGINT that fire `shutdown` once.
    fn spawn_signal_listener(shutdown: mpsc::Sender<()>) -> Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = signal(SignalKind::terminate()).map_err(PipelineError::Signal)?;
        let mut int = signal(SignalKind::interrupt()).map_err(PipelineError::Signal)?;

        tokio::spawn(async move {
            tokio::select! {
                _ = term.recv() => {}
                _ = int.recv() => {}
            }
            info!("shutdown signal received");
            let _ = shutdown.try_send(());
        });
        Ok(())
    }

    /// [`run`], but with the shutdown channel supplied by the caller. The
    /// sender is handed to the reader so a fatal scan error can raise the
    /// shutdown itself.
    pub async fn run_with_shutdown(
        &self,
        shutdown_tx: mpsc::Sender<()>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) -> Result<()> {
        info!("starting pipeline");
        self.set_state(PipelineState::Running).await;

        let (lines_tx, lines_rx) = mpsc::channel::<Bytes>(1);
        let (chunks_tx, mut chunks_rx) = mpsc::channel::<Vec<Bytes>>(CHUNK_CHANNEL_CAPACITY);
        let (failed_tx, mut failed_rx) = mpsc::channel::<Vec<Bytes>>(1);

        // Reader: the pipeline's source. Dropping lines_tx on return is
        // what starts the drain cascade.
        let fifo = self.fifo.clone();
        let reader = tokio::spawn(async move {
            let result = fifo.scan(&lines_tx).await;
            if let Err(e) = &result {
                error!(error = %e, "error reading from fifo");
                let _ = shutdown_tx.try_send(());
            }
            result
        });

        // Batcher: groups lines into chunks, flushes residual on close.
        let writer = BufferWriter::new(
            self.fifo.clone(),
            self.config.queue_limit,
            self.config.flush_interval,
        );
        let batcher = tokio::spawn(async move {
            writer.write(lines_rx, chunks_tx).await;
        });

        // Publisher: one batch publish per chunk; failed subsets move on.
        let flusher = Arc::clone(&self.flusher);
        let publisher = tokio::spawn(async move {
            while let Some(chunk) = chunks_rx.recv().await {
                if chunk.is_empty() {
                    continue;
                }
                if let Some(failed) = flusher.flush(chunk).await {
                    if !failed.is_empty() && failed_tx.send(failed).await.is_err() {
                        break;
                    }
                }
            }
        });

        // Recorder: the pipeline's sink for failures.
        let store = Arc::clone(&self.store);
        let recorder = tokio::spawn(async move {
            while let Some(chunk) = failed_rx.recv().await {
                if let Err(e) = store.save_attempt(&chunk).await {
                    error!(error = %e, "error saving failed attempt");
                }
            }
        });

        // Replayer: detached; killed at shutdown without draining.
        let store = Arc::clone(&self.store);
        let replayer = tokio::spawn(async move {
            loop {
                tokio::time::sleep(REPLAY_INTERVAL).await;
                store.retry().await;
            }
        });

        shutdown_rx.recv().await;
        info!("stopping pipeline");
        self.set_state(PipelineState::Draining).await;

        // Wake the reader out of its blocked read. If the reader already
        // returned (scan error or external .stop), the cascade is underway
        // and there is nobody left to wake.
        if !reader.is_finished() {
            if let Err(e) = self.fifo.send_command("stop").await {
                warn!(error = %e, "error sending stop command");
            }
        }

        let scan_result = match reader.await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "reader task failed");
                Ok(())
            }
        };
        let _ = batcher.await;
        let _ = publisher.await;
        let _ = recorder.await;
        replayer.abort();

        self.set_state(PipelineState::Stopped).await;
        info!("pipeline stopped");
        scan_result
    }

    async fn set_state(&self, state: PipelineState) {
        *self.state.write().await = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config_for(fifo: PathBuf) -> PipelineConfig {
        PipelineConfig {
            fifo_name: fifo,
            stream_name: "events".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = Pipeline::new(PipelineConfig::default());
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_new_builds_kinesis_pipeline() {
        let pipeline = Pipeline::new(config_for(PathBuf::from("/tmp/p.pipe"))).unwrap();
        assert_eq!(pipeline.config.queue_limit, 500);
    }

    #[test]
    fn test_new_builds_logger_pipeline_without_stream() {
        let config = PipelineConfig {
            fifo_name: PathBuf::from("/tmp/p.pipe"),
            flush_handler: FlushHandler::Logger,
            ..Default::default()
        };
        assert!(Pipeline::new(config).is_ok());
    }

    #[tokio::test]
    async fn test_initial_state_is_starting() {
        let pipeline = Pipeline::new(config_for(PathBuf::from("/tmp/p.pipe"))).unwrap();
        assert_eq!(pipeline.state().await, PipelineState::Starting);
    }
}
