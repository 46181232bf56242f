//! Sources of locally-produced outbound lines.

use crate::error::SourceError;
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::{broadcast, mpsc};
use tracing::warn;

/// Yields the lines the outbound loop sends to the peer.
#[async_trait]
pub trait LineSource: Send + 'static {
    /// Returns the next line, or `None` once the source is exhausted.
    ///
    /// Must be cancel-safe: the outbound loop races this against cancellation.
    async fn next_line(&mut self) -> Result<Option<String>, SourceError>;
}

/// Lines read from an async reader, without their terminators.
pub struct ReaderLines<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin + Send + 'static> ReaderLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

impl ReaderLines<BufReader<Stdin>> {
    /// Lines typed on the process's standard input.
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send + 'static> LineSource for ReaderLines<R> {
    async fn next_line(&mut self) -> Result<Option<String>, SourceError> {
        Ok(self.lines.next_line().await?)
    }
}

/// Lines pushed through an mpsc channel. Exhausted once every sender is gone.
pub struct ChannelLines {
    rx: mpsc::Receiver<String>,
}

impl ChannelLines {
    pub fn new(rx: mpsc::Receiver<String>) -> Self {
        Self { rx }
    }

    /// Creates a source together with the sender that feeds it.
    pub fn channel(capacity: usize) -> (mpsc::Sender<String>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl LineSource for ChannelLines {
    async fn next_line(&mut self) -> Result<Option<String>, SourceError> {
        Ok(self.rx.recv().await)
    }
}

/// One subscriber of a broadcast of lines.
///
/// A subscriber that falls behind skips what it missed and keeps going.
pub struct BroadcastLines {
    rx: broadcast::Receiver<String>,
}

impl BroadcastLines {
    pub fn new(rx: broadcast::Receiver<String>) -> Self {
        Self { rx }
    }
}

#[async_trait]
impl LineSource for BroadcastLines {
    async fn next_line(&mut self) -> Result<Option<String>, SourceError> {
        loop {
            match self.rx.recv().await {
                Ok(line) => return Ok(Some(line)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Line subscriber lagged; dropping missed lines.");
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(None),
            }
        }
    }
}
