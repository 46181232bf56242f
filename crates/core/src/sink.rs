//! Destinations for text received from the peer.

use crate::error::DecodeError;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Records what the inbound loop receives.
#[cfg_attr(test, mockall::automock)]
pub trait ObservationSink: Send + Sync + 'static {
    /// Called once per decoded inbound message, in receipt order.
    fn message(&self, text: &str);

    /// Called for an inbound message that was skipped because it was not text.
    fn decode_failed(&self, error: &DecodeError);
}

impl<T: ObservationSink + ?Sized> ObservationSink for Arc<T> {
    fn message(&self, text: &str) {
        (**self).message(text)
    }

    fn decode_failed(&self, error: &DecodeError) {
        (**self).decode_failed(error)
    }
}

/// Writes every message as a line on standard output.
///
/// Writes are blocking and hold the stdout lock for one line, on whichever
/// runtime worker runs the inbound loop. Use [`TracingSink`] for many sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl ObservationSink for ConsoleSink {
    fn message(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        if let Err(e) = writeln!(out, "{}", text).and_then(|_| out.flush()) {
            warn!(error = %e, "Failed to write received message to stdout.");
        }
    }

    fn decode_failed(&self, error: &DecodeError) {
        warn!(%error, "Skipping undecodable inbound message.");
    }
}

/// Emits every message as a tracing event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ObservationSink for TracingSink {
    fn message(&self, text: &str) {
        info!(target: "duplex::inbound", text, "Received message.");
    }

    fn decode_failed(&self, error: &DecodeError) {
        warn!(target: "duplex::inbound", %error, "Skipping undecodable inbound message.");
    }
}

/// An observation forwarded by [`ChannelSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Message(String),
    DecodeFailed(String),
}

/// Forwards observations to a channel, for embedding and tests.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Observation>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Observation>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ObservationSink for ChannelSink {
    fn message(&self, text: &str) {
        let _ = self.tx.send(Observation::Message(text.to_owned()));
    }

    fn decode_failed(&self, error: &DecodeError) {
        let _ = self.tx.send(Observation::DecodeFailed(error.to_string()));
    }
}
