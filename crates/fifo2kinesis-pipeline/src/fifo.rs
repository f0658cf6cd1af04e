//! The named-pipe endpoint.
//!
//! `Fifo` wraps the path to an existing FIFO node and knows how to scan it
//! line by line and how to write lines back into it. It never creates the
//! node; that is the producer's (or operator's) job.
//!
//! The FIFO is opened through `tokio::net::unix::pipe`, so reads are
//! poll-driven rather than parked in a blocking syscall. The scanner holds a
//! write end of its own pipe open for the duration of the scan; producers
//! can therefore close and re-open their end freely without the reader
//! observing end-of-stream. Termination is sentinel-driven: a `.stop` line
//! written into the pipe (normally by the supervisor during shutdown) tells
//! the scanner to drain what is already buffered and return.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::pipe;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{PipelineError, Result};

const STOP_SENTINEL: &[u8] = b".stop";
const FLUSH_SENTINEL: &[u8] = b".flush";

const READ_CHUNK: usize = 8192;

/// Delay before re-opening the read end after an unexpected end-of-stream.
const REOPEN_DELAY: Duration = Duration::from_millis(50);

/// Handle to the named pipe. Cheap to clone; every write opens its own file
/// handle and closes it before returning.
#[derive(Debug, Clone)]
pub struct Fifo {
    path: PathBuf,
}

impl Fifo {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read lines from the FIFO and send them to `out` until a `.stop`
    /// sentinel arrives or an I/O error occurs.
    ///
    /// After `.stop` is seen, data already buffered in the pipe is drained
    /// before returning, so lines written behind the sentinel are not lost.
    ///
    /// Sentinels are consumed here: `.stop` and `.flush` never reach `out`.
    /// Lines carrying an unrecognised `.` verb are forwarded as data. A
    /// trailing carriage return is stripped from every line. Each emitted
    /// `Bytes` owns its storage, since downstream stages run concurrently with
    /// the scan.
    pub async fn scan(&self, out: &mpsc::Sender<Bytes>) -> Result<()> {
        let mut receiver = pipe::OpenOptions::new()
            .open_receiver(&self.path)
            .map_err(PipelineError::FifoIo)?;
        // Our own write end keeps the pipe from reporting end-of-stream
        // whenever the producer closes its side.
        let _write_guard = pipe::OpenOptions::new()
            .open_sender(&self.path)
            .map_err(PipelineError::FifoIo)?;

        debug!(fifo = %self.path.display(), "reading data from fifo");

        let mut pending: Vec<u8> = Vec::with_capacity(READ_CHUNK);
        let mut chunk = vec![0u8; READ_CHUNK];
        let mut stop = false;

        loop {
            let n = receiver
                .read(&mut chunk)
                .await
                .map_err(PipelineError::FifoIo)?;
            if n == 0 {
                // Not reachable while the write guard is held; tolerate it
                // anyway by re-opening, as an external reader would.
                tokio::time::sleep(REOPEN_DELAY).await;
                receiver = pipe::OpenOptions::new()
                    .open_receiver(&self.path)
                    .map_err(PipelineError::FifoIo)?;
                continue;
            }
            pending.extend_from_slice(&chunk[..n]);

            if !self.forward_lines(&mut pending, out, &mut stop).await {
                return Ok(());
            }

            if stop {
                // Drain whatever the producer managed to write before the
                // sentinel was processed.
                loop {
                    match receiver.try_read(&mut chunk) {
                        Ok(0) => break,
                        Ok(n) => pending.extend_from_slice(&chunk[..n]),
                        Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                        Err(e) => return Err(PipelineError::FifoIo(e)),
                    }
                }
                if !self.forward_lines(&mut pending, out, &mut stop).await {
                    return Ok(());
                }
                if !pending.is_empty() {
                    // Final line without a trailing newline.
                    let line = std::mem::take(&mut pending);
                    self.handle_line(line, out, &mut stop).await;
                }
                return Ok(());
            }
        }
    }

    /// Process every complete line in `pending`. Returns `false` when the
    /// receiving side of `out` is gone.
    async fn forward_lines(
        &self,
        pending: &mut Vec<u8>,
        out: &mpsc::Sender<Bytes>,
        stop: &mut bool,
    ) -> bool {
        while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = pending.drain(..=pos).collect();
            line.pop();
            if !self.handle_line(line, out, stop).await {
                return false;
            }
        }
        true
    }

    async fn handle_line(
        &self,
        mut line: Vec<u8>,
        out: &mpsc::Sender<Bytes>,
        stop: &mut bool,
    ) -> bool {
        if line.last() == Some(&b'\r') {
            line.pop();
        }

        if line.as_slice() == STOP_SENTINEL {
            debug!("command received: stop");
            *stop = true;
        } else if line.as_slice() == FLUSH_SENTINEL {
            debug!("command received: flush");
        } else {
            if line.first() == Some(&b'.') {
                debug!(
                    line = %String::from_utf8_lossy(&line),
                    "unknown command forwarded as data"
                );
            }
            if out.send(Bytes::from(line)).await.is_err() {
                // Receiver gone; the pipeline is tearing down.
                return false;
            }
        }
        true
    }

    /// Append `line` plus a Unix newline to the FIFO.
    ///
    /// Fails immediately when nothing is reading the pipe. The line and
    /// newline go out together, so lines up to PIPE_BUF bytes are atomic
    /// with respect to other writers.
    pub async fn writeln(&self, line: &[u8]) -> Result<()> {
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line);
        buf.push(b'\n');

        let mut sender = pipe::OpenOptions::new()
            .open_sender(&self.path)
            .map_err(PipelineError::FifoIo)?;
        sender.write_all(&buf).await.map_err(PipelineError::FifoIo)?;
        Ok(())
    }

    /// Write a `.`-prefixed control line that the scanner interprets
    /// instead of forwarding.
    pub async fn send_command(&self, cmd: &str) -> Result<()> {
        self.writeln(format!(".{}", cmd).as_bytes()).await?;
        debug!(command = %cmd, "command sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::stat::Mode;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(3);

    fn temp_fifo() -> (Fifo, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.pipe");
        nix::unistd::mkfifo(&path, Mode::S_IRUSR | Mode::S_IWUSR).unwrap();
        (Fifo::new(path), dir)
    }

    #[tokio::test]
    async fn test_write_and_scan() {
        let (fifo, _dir) = temp_fifo();
        let (tx, mut rx) = mpsc::channel(1);

        let scanner = fifo.clone();
        tokio::spawn(async move {
            scanner.scan(&tx).await.unwrap();
        });

        fifo.writeln(b"test").await.unwrap();

        let line = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(line, Bytes::from("test"));
    }

    #[tokio::test]
    async fn test_stop_command_unblocks_scan() {
        let (fifo, _dir) = temp_fifo();
        let (tx, _rx) = mpsc::channel(1);

        let scanner = fifo.clone();
        let handle = tokio::spawn(async move { scanner.scan(&tx).await });

        fifo.send_command("stop").await.unwrap();

        let result = timeout(WAIT, handle).await.unwrap().unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_scan_drains_past_stop() {
        let (fifo, _dir) = temp_fifo();
        let (tx, mut rx) = mpsc::channel(8);

        let scanner = fifo.clone();
        let handle = tokio::spawn(async move { scanner.scan(&tx).await });

        // The stop sentinel sits in the middle; everything around it must
        // still come through, in order.
        fifo.writeln(b"zero\n.stop\none\ntwo").await.unwrap();

        let mut lines = Vec::new();
        while let Some(line) = timeout(WAIT, rx.recv()).await.unwrap() {
            lines.push(line);
        }
        assert_eq!(lines, vec!["zero", "one", "two"]);

        let result = timeout(WAIT, handle).await.unwrap().unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_flush_sentinel_suppressed() {
        let (fifo, _dir) = temp_fifo();
        let (tx, mut rx) = mpsc::channel(8);

        let scanner = fifo.clone();
        tokio::spawn(async move {
            let _ = scanner.scan(&tx).await;
        });

        fifo.writeln(b"before\n.flush\nafter\n.stop").await.unwrap();

        let mut lines = Vec::new();
        while let Some(line) = timeout(WAIT, rx.recv()).await.unwrap() {
            lines.push(line);
        }
        assert_eq!(lines, vec!["before", "after"]);
    }

    #[tokio::test]
    async fn test_unknown_command_forwarded() {
        let (fifo, _dir) = temp_fifo();
        let (tx, mut rx) = mpsc::channel(8);

        let scanner = fifo.clone();
        tokio::spawn(async move {
            let _ = scanner.scan(&tx).await;
        });

        fifo.writeln(b".pause\n.stop").await.unwrap();

        let line = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(line, Bytes::from(".pause"));
    }

    #[tokio::test]
    async fn test_carriage_return_stripped() {
        let (fifo, _dir) = temp_fifo();
        let (tx, mut rx) = mpsc::channel(8);

        let scanner = fifo.clone();
        tokio::spawn(async move {
            let _ = scanner.scan(&tx).await;
        });

        fifo.writeln(b"windows line\r\n.stop").await.unwrap();

        let line = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(line, Bytes::from("windows line"));
    }

    #[tokio::test]
    async fn test_scan_survives_writer_reopen() {
        let (fifo, _dir) = temp_fifo();
        let (tx, mut rx) = mpsc::channel(8);

        let scanner = fifo.clone();
        tokio::spawn(async move {
            let _ = scanner.scan(&tx).await;
        });

        // Two separate writes; each opens and closes its own write end.
        fifo.writeln(b"first").await.unwrap();
        let line = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(line, Bytes::from("first"));

        fifo.writeln(b"second").await.unwrap();
        let line = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(line, Bytes::from("second"));
    }

    #[tokio::test]
    async fn test_empty_line_is_data() {
        let (fifo, _dir) = temp_fifo();
        let (tx, mut rx) = mpsc::channel(8);

        let scanner = fifo.clone();
        tokio::spawn(async move {
            let _ = scanner.scan(&tx).await;
        });

        fifo.writeln(b"a\n\nb\n.stop").await.unwrap();

        let mut lines = Vec::new();
        while let Some(line) = timeout(WAIT, rx.recv()).await.unwrap() {
            lines.push(line);
        }
        assert_eq!(lines, vec!["a", "", "b"]);
    }

    #[tokio::test]
    async fn test_scan_missing_fifo_is_error() {
        let fifo = Fifo::new("/nonexistent/path.pipe");
        let (tx, _rx) = mpsc::channel(1);
        let result = fifo.scan(&tx).await;
        assert!(matches!(result, Err(PipelineError::FifoIo(_))));
    }

    #[tokio::test]
    async fn test_writeln_without_reader_fails() {
        let (fifo, _dir) = temp_fifo();
        let result = fifo.writeln(b"nobody listening").await;
        assert!(matches!(result, Err(PipelineError::FifoIo(_))));
    }
}
