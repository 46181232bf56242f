//! Duplex API Library Crate
//!
//! Everything the server binary wires together: configuration, shared state,
//! the console hub, the counter API, the debug WebSocket, and routing. The
//! `api` binary is a thin wrapper around this library.

pub mod config;
pub mod console;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod ws;
