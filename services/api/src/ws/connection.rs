//! Adapts an upgraded axum WebSocket to the session engine's connection seam.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use duplex_core::{Connection, Inbound, Outbound, TransportError};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tracing::debug;

pub struct WsConnection {
    socket: WebSocket,
}

impl WsConnection {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

impl Connection for WsConnection {
    type Reader = WsReader;
    type Writer = WsWriter;

    fn split(self) -> (WsReader, WsWriter) {
        let (socket_tx, socket_rx) = self.socket.split();
        (WsReader { socket_rx }, WsWriter { socket_tx })
    }
}

pub struct WsReader {
    socket_rx: SplitStream<WebSocket>,
}

#[async_trait]
impl Inbound for WsReader {
    async fn recv(&mut self) -> Option<Result<Bytes, TransportError>> {
        loop {
            let msg = match self.socket_rx.next().await? {
                Ok(msg) => msg,
                Err(e) => return Some(Err(TransportError::other(e))),
            };
            match msg {
                Message::Text(text) => {
                    return Some(Ok(Bytes::copy_from_slice(text.as_str().as_bytes())));
                }
                // Binary frames are decoded like text; invalid UTF-8 is skipped downstream.
                Message::Binary(data) => return Some(Ok(data)),
                Message::Close(frame) => {
                    debug!(?frame, "Client sent close frame.");
                    return None;
                }
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
    }
}

pub struct WsWriter {
    socket_tx: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl Outbound for WsWriter {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.socket_tx
            .send(Message::Text(text.into()))
            .await
            .map_err(TransportError::other)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.socket_tx
            .send(Message::Close(None))
            .await
            .map_err(TransportError::other)
    }
}
