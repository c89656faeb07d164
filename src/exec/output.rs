// src/exec/output.rs

//! Output sinks and the tasks that copy child output into them.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tracing::debug;

/// Any async byte consumer.
pub type BoxedSink = Box<dyn AsyncWrite + Send + Unpin>;

/// Where a run's stdout and stderr go. A missing sink discards that
/// stream.
#[derive(Default)]
pub struct OutputSinks {
    pub stdout: Option<BoxedSink>,
    pub stderr: Option<BoxedSink>,
}

impl OutputSinks {
    /// Discard both streams.
    pub fn discard() -> Self {
        Self::default()
    }

    pub fn new(
        stdout: impl AsyncWrite + Send + Unpin + 'static,
        stderr: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            stdout: Some(Box::new(stdout)),
            stderr: Some(Box::new(stderr)),
        }
    }

    /// Send both streams to the supervisor's own stdout / stderr.
    pub fn inherit() -> Self {
        Self::new(tokio::io::stdout(), tokio::io::stderr())
    }

    pub fn with_stdout(mut self, sink: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        self.stdout = Some(Box::new(sink));
        self
    }

    pub fn with_stderr(mut self, sink: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        self.stderr = Some(Box::new(sink));
        self
    }

    pub(crate) fn capture(&self) -> super::launch::Capture {
        super::launch::Capture {
            stdout: self.stdout.is_some(),
            stderr: self.stderr.is_some(),
        }
    }
}

/// In-memory sink; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct CaptureSink {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.buf.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn contents_lossy(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }
}

impl AsyncWrite for CaptureSink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.buf
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(data);
        Poll::Ready(Ok(data.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Start one copy task per captured stream.
///
/// The tasks own the sinks and finish when the child's end of the pipe is
/// closed.
pub(crate) fn spawn_copiers(child: &mut Child, sinks: OutputSinks) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::with_capacity(2);

    if let (Some(pipe), Some(sink)) = (child.stdout.take(), sinks.stdout) {
        handles.push(tokio::spawn(copy_stream("stdout", pipe, sink)));
    }
    if let (Some(pipe), Some(sink)) = (child.stderr.take(), sinks.stderr) {
        handles.push(tokio::spawn(copy_stream("stderr", pipe, sink)));
    }

    handles
}

async fn copy_stream<R>(stream: &'static str, mut pipe: R, mut sink: BoxedSink)
where
    R: AsyncRead + Unpin,
{
    match tokio::io::copy(&mut pipe, &mut sink).await {
        Ok(bytes) => debug!(stream, bytes, "output stream closed"),
        Err(e) => debug!(stream, error = %e, "output copy stopped"),
    }
    if let Err(e) = sink.flush().await {
        debug!(stream, error = %e, "flushing output sink failed");
    }
}
