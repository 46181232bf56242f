//! The transport seam: an already-upgraded duplex message connection.
//!
//! A [`Connection`] is split once, when the session starts, into a reader
//! half owned by the inbound loop and a writer half owned by the outbound
//! loop. Ownership of the writer is what keeps a single writer on the wire.

use crate::error::TransportError;
use async_trait::async_trait;
use bytes::Bytes;

/// The receiving half of a connection.
#[async_trait]
pub trait Inbound: Send + 'static {
    /// Receives the payload of the next message.
    ///
    /// Returns `None` once the peer has closed the stream. Implementations
    /// must be cancel-safe: dropping the future must not lose a message.
    async fn recv(&mut self) -> Option<Result<Bytes, TransportError>>;
}

/// The sending half of a connection.
#[async_trait]
pub trait Outbound: Send + 'static {
    /// Sends `text` as one complete text message.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Starts a graceful close of the connection.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// A duplex connection that can be split into its two halves.
pub trait Connection: Send + 'static {
    type Reader: Inbound;
    type Writer: Outbound;

    fn split(self) -> (Self::Reader, Self::Writer);
}

pub mod memory {
    //! An in-process connection backed by channels, with a [`MemoryPeer`]
    //! playing the remote side.

    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };
    use tokio::sync::mpsc;

    /// What the peer observed on the wire.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum PeerFrame {
        Text(String),
        Close,
    }

    /// Creates a connected pair.
    pub fn pair() -> (MemoryConnection, MemoryPeer) {
        let (to_local, from_peer) = mpsc::unbounded_channel();
        let (to_peer, from_local) = mpsc::unbounded_channel();
        let fail_sends = Arc::new(AtomicBool::new(false));
        (
            MemoryConnection {
                reader: MemoryReader { rx: from_peer },
                writer: MemoryWriter {
                    tx: to_peer,
                    fail_sends: fail_sends.clone(),
                },
            },
            MemoryPeer {
                tx: Some(to_local),
                rx: from_local,
                fail_sends,
            },
        )
    }

    pub struct MemoryConnection {
        reader: MemoryReader,
        writer: MemoryWriter,
    }

    impl Connection for MemoryConnection {
        type Reader = MemoryReader;
        type Writer = MemoryWriter;

        fn split(self) -> (MemoryReader, MemoryWriter) {
            (self.reader, self.writer)
        }
    }

    pub struct MemoryReader {
        rx: mpsc::UnboundedReceiver<Result<Bytes, TransportError>>,
    }

    #[async_trait]
    impl Inbound for MemoryReader {
        async fn recv(&mut self) -> Option<Result<Bytes, TransportError>> {
            self.rx.recv().await
        }
    }

    pub struct MemoryWriter {
        tx: mpsc::UnboundedSender<PeerFrame>,
        fail_sends: Arc<AtomicBool>,
    }

    impl MemoryWriter {
        fn push(&self, frame: PeerFrame) -> Result<(), TransportError> {
            if self.fail_sends.load(Ordering::SeqCst) {
                return Err(TransportError::other("injected send failure"));
            }
            self.tx.send(frame).map_err(|_| TransportError::Closed)
        }
    }

    #[async_trait]
    impl Outbound for MemoryWriter {
        async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
            self.push(PeerFrame::Text(text))
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            self.push(PeerFrame::Close)
        }
    }

    /// The remote end of a [`pair`].
    pub struct MemoryPeer {
        tx: Option<mpsc::UnboundedSender<Result<Bytes, TransportError>>>,
        rx: mpsc::UnboundedReceiver<PeerFrame>,
        fail_sends: Arc<AtomicBool>,
    }

    impl MemoryPeer {
        pub fn send_text(&self, text: &str) {
            self.send_bytes(Bytes::copy_from_slice(text.as_bytes()));
        }

        pub fn send_bytes(&self, payload: impl Into<Bytes>) {
            if let Some(tx) = &self.tx {
                let _ = tx.send(Ok(payload.into()));
            }
        }

        /// Makes the local reader fail with `err`.
        pub fn inject_error(&self, err: TransportError) {
            if let Some(tx) = &self.tx {
                let _ = tx.send(Err(err));
            }
        }

        /// Makes every further send from the local writer fail.
        pub fn fail_sends(&self) {
            self.fail_sends.store(true, Ordering::SeqCst);
        }

        /// Ends the stream seen by the local reader.
        pub fn close(&mut self) {
            self.tx = None;
        }

        pub async fn next_frame(&mut self) -> Option<PeerFrame> {
            self.rx.recv().await
        }

        pub fn try_next_frame(&mut self) -> Option<PeerFrame> {
            self.rx.try_recv().ok()
        }
    }
}
