//! Process-wide console input shared by every debug session.
//!
//! The server has a single stdin. Each line typed on it is broadcast to every
//! debug session connected at that moment.

use duplex_core::lines::{BroadcastLines, LineSource, ReaderLines};
use std::sync::{Arc, RwLock};
use tokio::io::AsyncBufRead;
use tokio::sync::broadcast;
use tracing::{info, warn};

#[derive(Clone)]
pub struct ConsoleHub {
    tx: Arc<RwLock<Option<broadcast::Sender<String>>>>,
}

impl ConsoleHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx: Arc::new(RwLock::new(Some(tx))),
        }
    }

    /// Sends `line` to every current subscriber. Returns how many there were.
    pub fn publish(&self, line: String) -> usize {
        let guard = self.tx.read().unwrap_or_else(|e| e.into_inner());
        match guard.as_ref() {
            Some(tx) => tx.send(line).unwrap_or(0),
            None => 0,
        }
    }

    /// A line source that sees every line published from now on.
    ///
    /// Once the hub is finished, new subscribers are exhausted immediately.
    pub fn subscribe(&self) -> BroadcastLines {
        let guard = self.tx.read().unwrap_or_else(|e| e.into_inner());
        match guard.as_ref() {
            Some(tx) => BroadcastLines::new(tx.subscribe()),
            None => {
                let (_, rx) = broadcast::channel(1);
                BroadcastLines::new(rx)
            }
        }
    }

    /// Ends the broadcast. Subscribers drain what is queued, then see exhaustion.
    pub fn finish(&self) {
        let mut guard = self.tx.write().unwrap_or_else(|e| e.into_inner());
        guard.take();
    }

    /// Publishes every line of `reader`, then finishes the hub.
    pub async fn pump<R>(&self, reader: R)
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let mut lines = ReaderLines::new(reader);
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let listeners = self.publish(line);
                    if listeners == 0 {
                        info!("Console line dropped: no debug session is connected.");
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to read console input.");
                    break;
                }
            }
        }
        info!("Console input closed.");
        self.finish();
    }
}
