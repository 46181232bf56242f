//! The duplex echo session.
//!
//! A session binds one [`Connection`] to two loops running concurrently under
//! a single supervising task:
//!
//! - the inbound loop receives messages, decodes them as UTF-8 and hands them
//!   to an [`ObservationSink`];
//! - the outbound loop takes lines from a [`LineSource`] and sends each as one
//!   text message.
//!
//! The lifecycle is linear, `Active -> Closing -> Closed`. Peer close, a
//! transport failure in either loop, or an external close request cancel the
//! session, and both loops stop at their next suspension point. Exhausting the
//! line source only closes our side: the peer is asked to close and the
//! inbound loop keeps forwarding until it does.

use crate::{
    connection::{Connection, Inbound, Outbound},
    error::{DecodeError, SessionError, TransportError},
    lines::LineSource,
    sink::ObservationSink,
};
use bytes::Bytes;
use std::{fmt, sync::Arc};
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Closing,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Active => write!(f, "active"),
            SessionState::Closing => write!(f, "closing"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

/// How the inbound loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundEnd {
    PeerClosed,
    Cancelled,
}

/// How the outbound loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundEnd {
    SourceExhausted,
    Cancelled,
}

/// Outcome of a session that ended without a transport failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    /// Messages sent to the peer.
    pub sent: u64,
    /// Messages decoded and handed to the sink.
    pub received: u64,
    /// Inbound messages skipped because they were not valid UTF-8.
    pub skipped: u64,
    pub inbound: InboundEnd,
    pub outbound: OutboundEnd,
}

/// The shared lifecycle flag plus the token both loops watch.
#[derive(Clone)]
struct Lifecycle {
    state: Arc<watch::Sender<SessionState>>,
    cancel: CancellationToken,
}

impl Lifecycle {
    fn new(cancel: CancellationToken) -> Self {
        let (state, _) = watch::channel(SessionState::Active);
        Self {
            state: Arc::new(state),
            cancel,
        }
    }

    fn current(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Moves `Active` to `Closing`. Returns whether this call did it.
    fn begin_closing(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == SessionState::Active {
                *state = SessionState::Closing;
                true
            } else {
                false
            }
        })
    }

    /// Moves to `Closing` and tells both loops to stop.
    fn shut_down(&self) {
        self.begin_closing();
        self.cancel.cancel();
    }

    fn finish(&self) {
        self.cancel.cancel();
        self.state.send_replace(SessionState::Closed);
    }
}

/// Publishes `Closed` when the supervisor ends, including by panic or abort.
struct CloseOnDrop<'a>(&'a Lifecycle);

impl Drop for CloseOnDrop<'_> {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// A connection that has not started its loops yet.
pub struct Session<C> {
    connection: C,
    lifecycle: Lifecycle,
}

impl<C: Connection> Session<C> {
    pub fn new(connection: C) -> Self {
        Self {
            connection,
            lifecycle: Lifecycle::new(CancellationToken::new()),
        }
    }

    /// Ties the session to `parent`: cancelling it closes the session.
    pub fn with_parent(mut self, parent: &CancellationToken) -> Self {
        self.lifecycle = Lifecycle::new(parent.child_token());
        self
    }

    pub fn state(&self) -> SessionState {
        self.lifecycle.current()
    }

    /// Spawns the session onto the current Tokio runtime.
    pub fn start<L, O>(self, lines: L, sink: O) -> SessionHandle
    where
        L: LineSource,
        O: ObservationSink,
    {
        let lifecycle = self.lifecycle;
        let (reader, writer) = self.connection.split();
        let handle_lifecycle = lifecycle.clone();
        let task = tokio::spawn(run(reader, writer, lines, sink, lifecycle).in_current_span());
        SessionHandle {
            lifecycle: handle_lifecycle,
            task,
        }
    }
}

/// Starts a session on `connection`.
pub fn start<C, L, O>(connection: C, lines: L, sink: O) -> SessionHandle
where
    C: Connection,
    L: LineSource,
    O: ObservationSink,
{
    Session::new(connection).start(lines, sink)
}

/// A running session.
pub struct SessionHandle {
    lifecycle: Lifecycle,
    task: JoinHandle<Result<SessionSummary, SessionError>>,
}

impl SessionHandle {
    pub fn state(&self) -> SessionState {
        self.lifecycle.current()
    }

    /// Returns a receiver that observes every lifecycle transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.lifecycle.state.subscribe()
    }

    /// Asks the session to close. Both loops stop at their next suspension
    /// point without issuing further transport operations.
    pub fn close(&self) {
        self.lifecycle.shut_down();
    }

    /// Waits for both loops to stop.
    pub async fn join(self) -> Result<SessionSummary, SessionError> {
        self.task.await?
    }
}

async fn run<R, W, L, O>(
    reader: R,
    writer: W,
    lines: L,
    sink: O,
    lifecycle: Lifecycle,
) -> Result<SessionSummary, SessionError>
where
    R: Inbound,
    W: Outbound,
    L: LineSource,
    O: ObservationSink,
{
    info!("Session started.");
    let closed = CloseOnDrop(&lifecycle);
    let (inbound, outbound) = tokio::join!(
        inbound_loop(reader, &sink, &lifecycle),
        outbound_loop(writer, lines, &lifecycle),
    );
    drop(closed);

    let (inbound_end, received, skipped) = match inbound {
        Ok(report) => report,
        Err(e) => {
            warn!(error = %e, "Session closed by inbound transport failure.");
            return Err(e.into());
        }
    };
    let (outbound_end, sent) = match outbound {
        Ok(report) => report,
        Err(e) => {
            warn!(error = %e, "Session closed by outbound transport failure.");
            return Err(e.into());
        }
    };
    let summary = SessionSummary {
        sent,
        received,
        skipped,
        inbound: inbound_end,
        outbound: outbound_end,
    };
    info!(?summary, "Session closed.");
    Ok(summary)
}

fn decode(payload: &Bytes) -> Result<&str, DecodeError> {
    std::str::from_utf8(payload).map_err(|source| DecodeError {
        len: payload.len(),
        source,
    })
}

async fn inbound_loop<R: Inbound, O: ObservationSink>(
    mut reader: R,
    sink: &O,
    lifecycle: &Lifecycle,
) -> Result<(InboundEnd, u64, u64), TransportError> {
    let mut received = 0;
    let mut skipped = 0;
    loop {
        let next = tokio::select! {
            biased;
            _ = lifecycle.cancel.cancelled() => {
                lifecycle.begin_closing();
                return Ok((InboundEnd::Cancelled, received, skipped));
            }
            next = reader.recv() => next,
        };
        match next {
            Some(Ok(payload)) => match decode(&payload) {
                Ok(text) => {
                    received += 1;
                    sink.message(text);
                }
                Err(e) => {
                    skipped += 1;
                    debug!(len = e.len, "Inbound message is not UTF-8.");
                    sink.decode_failed(&e);
                }
            },
            Some(Err(e)) => {
                lifecycle.shut_down();
                return Err(e);
            }
            None => {
                debug!("Peer closed the connection.");
                lifecycle.shut_down();
                return Ok((InboundEnd::PeerClosed, received, skipped));
            }
        }
    }
}

async fn outbound_loop<W: Outbound, L: LineSource>(
    mut writer: W,
    mut lines: L,
    lifecycle: &Lifecycle,
) -> Result<(OutboundEnd, u64), TransportError> {
    let mut sent = 0;
    loop {
        let next = tokio::select! {
            biased;
            _ = lifecycle.cancel.cancelled() => {
                lifecycle.begin_closing();
                return Ok((OutboundEnd::Cancelled, sent));
            }
            next = lines.next_line() => next,
        };
        let line = match next {
            Ok(Some(line)) => Some(line),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Line source failed; treating it as exhausted.");
                None
            }
        };
        let Some(line) = line else {
            debug!("Line source exhausted; closing our side.");
            lifecycle.begin_closing();
            if let Err(e) = writer.close().await {
                lifecycle.shut_down();
                return Err(e);
            }
            return Ok((OutboundEnd::SourceExhausted, sent));
        };
        if lifecycle.cancel.is_cancelled() {
            lifecycle.begin_closing();
            return Ok((OutboundEnd::Cancelled, sent));
        }
        if let Err(e) = writer.send_text(line).await {
            lifecycle.shut_down();
            return Err(e);
        }
        sent += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        connection::memory::{PeerFrame, pair},
        lines::ChannelLines,
        sink::{ChannelSink, MockObservationSink, Observation},
    };
    use crate::error::SourceError;
    use async_trait::async_trait;
    use mockall::{Sequence, predicate::eq};
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    struct PanickingSink;

    impl ObservationSink for PanickingSink {
        fn message(&self, _text: &str) {
            panic!("sink exploded");
        }

        fn decode_failed(&self, _error: &DecodeError) {}
    }

    struct BrokenLines;

    #[async_trait]
    impl LineSource for BrokenLines {
        async fn next_line(&mut self) -> Result<Option<String>, SourceError> {
            Err(std::io::Error::other("stdin gone").into())
        }
    }

    /// Yields one line, cancelling `token` while producing it.
    struct CancellingLines {
        token: CancellationToken,
    }

    #[async_trait]
    impl LineSource for CancellingLines {
        async fn next_line(&mut self) -> Result<Option<String>, SourceError> {
            self.token.cancel();
            Ok(Some("too late".to_string()))
        }
    }

    #[tokio::test]
    async fn test_sends_every_line_in_order() {
        let (conn, mut peer) = pair();
        let (lines_tx, lines) = ChannelLines::channel(16);
        let (sink, _observed) = ChannelSink::new();
        let handle = start(conn, lines, sink);

        let inputs = ["first", "", "ünïcödé ✓", "  padded  ", "last"];
        for line in inputs {
            lines_tx.send(line.to_string()).await.unwrap();
        }
        for line in inputs {
            let frame = timeout(WAIT, peer.next_frame()).await.unwrap();
            assert_eq!(frame, Some(PeerFrame::Text(line.to_string())));
        }

        drop(lines_tx);
        let frame = timeout(WAIT, peer.next_frame()).await.unwrap();
        assert_eq!(frame, Some(PeerFrame::Close));
        peer.close();

        let summary = timeout(WAIT, handle.join()).await.unwrap().unwrap();
        assert_eq!(summary.sent, inputs.len() as u64);
        assert_eq!(summary.outbound, OutboundEnd::SourceExhausted);
        assert_eq!(summary.inbound, InboundEnd::PeerClosed);
    }

    #[tokio::test]
    async fn test_forwards_every_message_in_order() {
        let (conn, mut peer) = pair();
        let (_lines_tx, lines) = ChannelLines::channel(1);
        let (sink, mut observed) = ChannelSink::new();
        let handle = start(conn, lines, sink);

        let inputs = ["one", "two", "", "три", "four"];
        for message in inputs {
            peer.send_text(message);
        }
        peer.close();

        let summary = timeout(WAIT, handle.join()).await.unwrap().unwrap();
        assert_eq!(summary.received, inputs.len() as u64);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.inbound, InboundEnd::PeerClosed);
        assert_eq!(summary.outbound, OutboundEnd::Cancelled);

        let got: Vec<Observation> = std::iter::from_fn(|| observed.try_recv().ok()).collect();
        let want: Vec<Observation> = inputs
            .iter()
            .map(|m| Observation::Message(m.to_string()))
            .collect();
        assert_eq!(got, want);
    }

    #[tokio::test]
    async fn test_inbound_transport_error_closes_session() {
        let (conn, mut peer) = pair();
        let (lines_tx, lines) = ChannelLines::channel(4);
        let (sink, _observed) = ChannelSink::new();
        let handle = start(conn, lines, sink);
        let state = handle.subscribe();

        peer.inject_error(TransportError::other("connection reset"));

        let result = timeout(WAIT, handle.join()).await.unwrap();
        assert!(matches!(result, Err(SessionError::Transport(_))));
        assert_eq!(*state.borrow(), SessionState::Closed);

        // The outbound loop is gone: its source is dropped and nothing was sent.
        assert!(lines_tx.send("late".to_string()).await.is_err());
        assert_eq!(peer.try_next_frame(), None);
    }

    #[tokio::test]
    async fn test_outbound_transport_error_closes_session() {
        let (conn, peer) = pair();
        let (lines_tx, lines) = ChannelLines::channel(4);
        let (sink, mut observed) = ChannelSink::new();
        let handle = start(conn, lines, sink);
        let state = handle.subscribe();

        peer.fail_sends();
        lines_tx.send("doomed".to_string()).await.unwrap();

        let result = timeout(WAIT, handle.join()).await.unwrap();
        assert!(matches!(
            result,
            Err(SessionError::Transport(TransportError::Other(_)))
        ));
        assert_eq!(*state.borrow(), SessionState::Closed);

        peer.send_text("unheard");
        assert!(observed.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_malformed_message_is_skipped() {
        let mut sink = MockObservationSink::new();
        let mut seq = Sequence::new();
        sink.expect_message()
            .with(eq("before"))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        sink.expect_decode_failed()
            .withf(|e: &DecodeError| e.len == 2)
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        sink.expect_message()
            .with(eq("after"))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());

        let (conn, mut peer) = pair();
        let (_lines_tx, lines) = ChannelLines::channel(1);
        let handle = start(conn, lines, sink);

        peer.send_text("before");
        peer.send_bytes(vec![0xc3u8, 0x28]);
        peer.send_text("after");
        peer.close();

        // A failed expectation panics the session task and surfaces as `Task`.
        let summary = timeout(WAIT, handle.join()).await.unwrap().unwrap();
        assert_eq!(summary.received, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.inbound, InboundEnd::PeerClosed);
    }

    #[tokio::test]
    async fn test_ping_pong_keeps_session_active() {
        let (conn, mut peer) = pair();
        let (lines_tx, lines) = ChannelLines::channel(4);
        let (sink, mut observed) = ChannelSink::new();
        let handle = start(conn, lines, sink);

        peer.send_text("ping");
        lines_tx.send("pong".to_string()).await.unwrap();

        let seen = timeout(WAIT, observed.recv()).await.unwrap();
        assert_eq!(seen, Some(Observation::Message("ping".to_string())));
        let frame = timeout(WAIT, peer.next_frame()).await.unwrap();
        assert_eq!(frame, Some(PeerFrame::Text("pong".to_string())));
        assert_eq!(peer.try_next_frame(), None);
        assert_eq!(handle.state(), SessionState::Active);

        handle.close();
        let summary = timeout(WAIT, handle.join()).await.unwrap().unwrap();
        assert_eq!(summary.sent, 1);
        assert_eq!(summary.received, 1);
    }

    #[tokio::test]
    async fn test_empty_source_closes_outbound_only() {
        let (conn, mut peer) = pair();
        let (lines_tx, lines) = ChannelLines::channel(1);
        drop(lines_tx);
        let (sink, mut observed) = ChannelSink::new();
        let handle = start(conn, lines, sink);
        let state = handle.subscribe();

        let frame = timeout(WAIT, peer.next_frame()).await.unwrap();
        assert_eq!(frame, Some(PeerFrame::Close));
        assert_eq!(handle.state(), SessionState::Closing);

        // The inbound loop keeps forwarding until the peer finishes closing.
        peer.send_text("still listening");
        let seen = timeout(WAIT, observed.recv()).await.unwrap();
        assert_eq!(seen, Some(Observation::Message("still listening".to_string())));
        peer.close();

        let summary = timeout(WAIT, handle.join()).await.unwrap().unwrap();
        assert_eq!(summary.sent, 0);
        assert_eq!(summary.received, 1);
        assert_eq!(summary.outbound, OutboundEnd::SourceExhausted);
        assert_eq!(summary.inbound, InboundEnd::PeerClosed);
        assert_eq!(*state.borrow(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_external_close_stops_both_loops() {
        let (conn, mut peer) = pair();
        let (lines_tx, lines) = ChannelLines::channel(4);
        let (sink, _observed) = ChannelSink::new();
        let session = Session::new(conn);
        assert_eq!(session.state(), SessionState::Active);
        let handle = session.start(lines, sink);

        handle.close();
        assert_eq!(handle.state(), SessionState::Closing);

        let summary = timeout(WAIT, handle.join()).await.unwrap().unwrap();
        assert_eq!(summary.inbound, InboundEnd::Cancelled);
        assert_eq!(summary.outbound, OutboundEnd::Cancelled);

        // No close frame or data went out after the close request.
        assert!(lines_tx.send("late".to_string()).await.is_err());
        assert_eq!(peer.try_next_frame(), None);
    }

    #[tokio::test]
    async fn test_parent_cancellation_closes_session() {
        let shutdown = CancellationToken::new();
        let (conn, mut peer) = pair();
        let (_lines_tx, lines) = ChannelLines::channel(4);
        let (sink, _observed) = ChannelSink::new();
        let handle = Session::new(conn).with_parent(&shutdown).start(lines, sink);
        let state = handle.subscribe();

        shutdown.cancel();

        let summary = timeout(WAIT, handle.join()).await.unwrap().unwrap();
        assert_eq!(summary.inbound, InboundEnd::Cancelled);
        assert_eq!(summary.outbound, OutboundEnd::Cancelled);
        assert_eq!(*state.borrow(), SessionState::Closed);
        assert_eq!(peer.try_next_frame(), None);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::Active.to_string(), "active");
        assert_eq!(SessionState::Closing.to_string(), "closing");
        assert_eq!(SessionState::Closed.to_string(), "closed");
    }

    #[tokio::test]
    async fn test_panicking_sink_still_reaches_closed() {
        let (conn, peer) = pair();
        let (_lines_tx, lines) = ChannelLines::channel(1);
        let handle = start(conn, lines, PanickingSink);
        let mut state = handle.subscribe();

        peer.send_text("hi");

        let result = timeout(WAIT, handle.join()).await.unwrap();
        assert!(matches!(result, Err(SessionError::Task(_))));
        timeout(WAIT, state.wait_for(|s| *s == SessionState::Closed))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_line_source_error_counts_as_exhaustion() {
        let (conn, mut peer) = pair();
        let (sink, _observed) = ChannelSink::new();
        let handle = start(conn, BrokenLines, sink);

        let frame = timeout(WAIT, peer.next_frame()).await.unwrap();
        assert_eq!(frame, Some(PeerFrame::Close));
        assert_eq!(handle.state(), SessionState::Closing);
        peer.close();

        let summary = timeout(WAIT, handle.join()).await.unwrap().unwrap();
        assert_eq!(summary.sent, 0);
        assert_eq!(summary.outbound, OutboundEnd::SourceExhausted);
        assert_eq!(summary.inbound, InboundEnd::PeerClosed);
    }

    #[tokio::test]
    async fn test_queued_line_not_sent_after_close() {
        let (conn, mut peer) = pair();
        let (lines_tx, lines) = ChannelLines::channel(4);
        lines_tx.send("queued".to_string()).await.unwrap();
        let (sink, _observed) = ChannelSink::new();

        // Single-threaded runtime: the session task has not run yet.
        let handle = start(conn, lines, sink);
        handle.close();

        let summary = timeout(WAIT, handle.join()).await.unwrap().unwrap();
        assert_eq!(summary.sent, 0);
        assert_eq!(summary.outbound, OutboundEnd::Cancelled);
        assert_eq!(peer.try_next_frame(), None);
    }

    #[tokio::test]
    async fn test_line_obtained_after_cancel_is_dropped() {
        let shutdown = CancellationToken::new();
        let (conn, mut peer) = pair();
        let (sink, _observed) = ChannelSink::new();
        let lines = CancellingLines {
            token: shutdown.clone(),
        };
        let handle = Session::new(conn).with_parent(&shutdown).start(lines, sink);

        let summary = timeout(WAIT, handle.join()).await.unwrap().unwrap();
        assert_eq!(summary.sent, 0);
        assert_eq!(summary.outbound, OutboundEnd::Cancelled);
        assert_eq!(peer.try_next_frame(), None);
    }
}
