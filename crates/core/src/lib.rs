//! Duplex session engine.
//!
//! Binds an already-upgraded, message oriented connection to two concurrent
//! loops: one forwarding received text to an observation sink, one sending
//! locally produced lines to the peer. Hosting, the upgrade handshake and the
//! origin of the lines are left to the caller.

pub mod connection;
pub mod error;
pub mod lines;
pub mod session;
pub mod sink;

pub use connection::{Connection, Inbound, Outbound};
pub use error::{DecodeError, SessionError, SourceError, TransportError};
pub use lines::LineSource;
pub use session::{Session, SessionHandle, SessionState, SessionSummary, start};
pub use sink::ObservationSink;
