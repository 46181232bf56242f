//! Error types shared by the session engine and its collaborators.

use std::str::Utf8Error;

/// Boxed error used to carry transport-specific failures across the seam.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// An inbound message that could not be decoded as UTF-8 text.
///
/// Never terminal: the offending message is skipped and the session carries on.
#[derive(Debug, Clone, thiserror::Error)]
#[error("inbound message of {len} bytes is not valid UTF-8: {source}")]
pub struct DecodeError {
    pub len: usize,
    #[source]
    pub source: Utf8Error,
}

/// A failure of the underlying connection. Always terminal for the session.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,
    #[error("transport failure: {0}")]
    Other(#[source] BoxError),
}

impl TransportError {
    pub fn other(err: impl Into<BoxError>) -> Self {
        Self::Other(err.into())
    }
}

/// A failure reading the local line source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read line: {0}")]
    Io(#[from] std::io::Error),
}

/// The terminal error attached to a finished session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("session task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
