//! Append-only sink backed by a writer task

use futures::future::{BoxFuture, FutureExt, Shared};
use logmend_core::{Error, Result};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

/// Settles once a sink's writer task has ended, however it ended
pub(crate) type Completion = Shared<BoxFuture<'static, ()>>;

/// Handle for writing to one generation of a managed log file.
///
/// Cloning is cheap. Once the stream recreates its sink, old handles report
/// [`Error::SinkClosed`], so fetch a fresh one from the stream per write.
#[derive(Debug, Clone)]
pub struct Sink {
    path: Arc<PathBuf>,
    generation: u64,
    tx: mpsc::Sender<Vec<u8>>,
}

impl Sink {
    /// Queue a chunk, waiting while the sink's buffer is full
    pub async fn write(&self, chunk: impl Into<Vec<u8>>) -> Result<()> {
        self.tx
            .send(chunk.into())
            .await
            .map_err(|_| Error::SinkClosed(self.path.to_path_buf()))
    }

    /// Queue a chunk without waiting. `Ok(false)` means the buffer is full.
    pub fn try_write(&self, chunk: impl Into<Vec<u8>>) -> Result<bool> {
        match self.tx.try_send(chunk.into()) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => Ok(false),
            Err(TrySendError::Closed(_)) => Err(Error::SinkClosed(self.path.to_path_buf())),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Owning side of a sink: controls how its writer task ends
pub(crate) struct SinkWriter {
    sink: Sink,
    finish_tx: Option<oneshot::Sender<()>>,
    abort: AbortHandle,
    done: Completion,
}

impl SinkWriter {
    /// Spawn a writer task for `file`.
    ///
    /// `on_failure` is called at most once, with the error that stopped the
    /// writer while it was accepting chunks.
    pub(crate) fn spawn<F>(
        path: PathBuf,
        generation: u64,
        file: std::fs::File,
        capacity: usize,
        on_failure: F,
    ) -> Self
    where
        F: FnOnce(io::Error) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity);
        let (finish_tx, finish_rx) = oneshot::channel();

        let label = path.display().to_string();
        let task = tokio::spawn(run_writer(File::from_std(file), rx, finish_rx, on_failure));
        let abort = task.abort_handle();

        let done = async move {
            match task.await {
                Ok(Ok(())) => debug!("Log sink finished: {}", label),
                Ok(Err(e)) => debug!("Log sink {} finished with error: {}", label, e),
                Err(e) if e.is_cancelled() => debug!("Log sink aborted: {}", label),
                Err(e) => warn!("Log sink task for {} failed: {}", label, e),
            }
        }
        .boxed()
        .shared();

        Self {
            sink: Sink {
                path: Arc::new(path),
                generation,
                tx,
            },
            finish_tx: Some(finish_tx),
            abort,
            done,
        }
    }

    pub(crate) fn handle(&self) -> Sink {
        self.sink.clone()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.sink.generation
    }

    /// Drain queued chunks, flush and end. The returned completion settles when done.
    pub(crate) fn finish(mut self) -> Completion {
        if let Some(tx) = self.finish_tx.take() {
            let _ = tx.send(());
        }
        self.done.clone()
    }

    /// Stop the writer without flushing
    pub(crate) fn abort(self) {
        self.abort.abort();
    }
}

async fn run_writer<F>(
    file: File,
    mut rx: mpsc::Receiver<Vec<u8>>,
    mut finish_rx: oneshot::Receiver<()>,
    on_failure: F,
) -> io::Result<()>
where
    F: FnOnce(io::Error),
{
    let mut out = BufWriter::new(file);

    loop {
        tokio::select! {
            biased;
            // a dropped SinkWriter also ends up here
            _ = &mut finish_rx => break,
            chunk = rx.recv() => match chunk {
                Some(chunk) => {
                    if let Err(e) = write_batch(&mut out, chunk, &mut rx).await {
                        on_failure(e);
                        return Ok(());
                    }
                }
                None => break,
            },
        }
    }

    rx.close();
    while let Some(chunk) = rx.recv().await {
        out.write_all(&chunk).await?;
    }
    out.flush().await?;
    out.shutdown().await
}

async fn write_batch(
    out: &mut BufWriter<File>,
    first: Vec<u8>,
    rx: &mut mpsc::Receiver<Vec<u8>>,
) -> io::Result<()> {
    out.write_all(&first).await?;
    while let Ok(chunk) = rx.try_recv() {
        out.write_all(&chunk).await?;
    }
    out.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn open(path: &Path) -> std::fs::File {
        OpenOptions::new().create(true).append(true).open(path).unwrap()
    }

    fn spawn(path: &Path, capacity: usize) -> SinkWriter {
        SinkWriter::spawn(path.to_path_buf(), 7, open(path), capacity, |_| {})
    }

    #[tokio::test]
    async fn test_write_then_finish_flushes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("access.log");
        let writer = spawn(&path, 16);
        let sink = writer.handle();
        assert_eq!(sink.generation(), 7);
        assert_eq!(sink.path(), path.as_path());

        sink.write("GET /\n").await.unwrap();
        sink.write(b"POST /login\n".to_vec()).await.unwrap();
        writer.finish().await;

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "GET /\nPOST /login\n");
        assert!(sink.is_closed());
        assert!(matches!(sink.write("late\n").await, Err(Error::SinkClosed(_))));
    }

    #[tokio::test]
    async fn test_try_write_reports_backpressure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("access.log");
        let writer = spawn(&path, 1);
        let sink = writer.handle();

        // the writer task has not run yet on this single-threaded runtime
        assert!(sink.try_write("one\n").unwrap());
        assert!(!sink.try_write("two\n").unwrap());

        writer.finish().await;
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\n");
        assert!(sink.try_write("three\n").is_err());
    }

    #[tokio::test]
    async fn test_finish_is_shared() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("access.log");
        let writer = spawn(&path, 16);
        writer.handle().write("x\n").await.unwrap();

        let done = writer.finish();
        let again = done.clone();
        futures::future::join(done, again).await;
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "x\n");
    }

    #[tokio::test]
    async fn test_abort_skips_flush() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("access.log");
        let writer = spawn(&path, 16);
        let sink = writer.handle();
        sink.try_write("dropped\n").unwrap();

        let done = writer.done.clone();
        writer.abort();
        done.await;

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
        assert!(sink.is_closed());
    }

    #[tokio::test]
    async fn test_dropping_writer_finishes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("access.log");
        let writer = spawn(&path, 16);
        let sink = writer.handle();
        sink.write("kept\n").await.unwrap();

        let done = writer.done.clone();
        drop(writer);
        done.await;

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "kept\n");
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_write_error_reaches_failure_hook() {
        let full = Path::new("/dev/full");
        if !full.exists() {
            return;
        }
        let file = OpenOptions::new().append(true).open(full).unwrap();
        let seen = Arc::new(Mutex::new(None));
        let hook_seen = Arc::clone(&seen);

        let writer = SinkWriter::spawn(full.to_path_buf(), 0, file, 16, move |e| {
            *hook_seen.lock().unwrap() = Some(e.kind());
        });
        let sink = writer.handle();
        sink.write("no space\n").await.unwrap();

        let done = writer.done.clone();
        done.await;

        let kind = seen.lock().unwrap().take();
        assert!(kind.is_some());
        assert!(!logmend_core::SinkFailure::classify(&io::Error::from(kind.unwrap())).is_transient());
    }
}
