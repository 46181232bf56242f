//! Debug WebSocket endpoint
//!
//! - `connection`: adapts an upgraded axum socket to the session engine.
//! - `session`: upgrades the request and runs one duplex session per socket.

pub mod connection;
pub mod session;

pub use session::ws_handler;
