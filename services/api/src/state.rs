//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources used by the handlers.

use crate::{
    config::{Config, SinkKind},
    console::ConsoleHub,
    models::Counter,
};
use duplex_core::{
    ObservationSink,
    sink::{ConsoleSink, TracingSink},
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// The shared application state, created once at startup and passed to all handlers.
/// All fields are public to be accessible from other modules.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub console: ConsoleHub,
    pub sink: Arc<dyn ObservationSink>,
    pub counter: Arc<Mutex<Counter>>,
    /// Cancelled when the server shuts down; every debug session is a child.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let sink: Arc<dyn ObservationSink> = match config.sink {
            SinkKind::Console => Arc::new(ConsoleSink),
            SinkKind::Log => Arc::new(TracingSink),
        };
        Self {
            console: ConsoleHub::new(config.console_buffer),
            config: Arc::new(config),
            sink,
            counter: Arc::new(Mutex::new(Counter::default())),
            shutdown: CancellationToken::new(),
        }
    }

    /// Replaces the observation sink, e.g. to capture what sessions receive.
    pub fn with_sink(mut self, sink: Arc<dyn ObservationSink>) -> Self {
        self.sink = sink;
        self
    }
}
