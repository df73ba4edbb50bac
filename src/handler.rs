//! WebSocket connection handler
//!
//! Performs the WebSocket handshake on an accepted TCP stream, wraps the
//! two halves of the socket as a `FrameSource`/`FrameSink` pair and hands
//! them to the hub, which runs the client session.

use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, trace};

use crate::error::AppError;
use crate::hub::RoomHub;
use crate::message::Message;
use crate::transport::{FrameSink, FrameSource, Inbound};

/// Handle a new TCP connection
///
/// Upgrades to WebSocket with the configured frame limit, then serves the
/// client session until it ends.
pub async fn handle_connection(stream: TcpStream, hub: Arc<RoomHub>) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    let max_frame_size = hub.config().max_frame_size;
    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(max_frame_size);
    ws_config.max_frame_size = Some(max_frame_size);

    // WebSocket handshake
    let ws_stream = tokio_tungstenite::accept_async_with_config(stream, Some(ws_config)).await?;
    let (ws_sender, ws_receiver) = ws_stream.split();

    let source = WsSource {
        stream: ws_receiver,
        max_frame_size,
    };
    let sink = WsSink { sink: ws_sender };

    let (session, task) = hub.accept(source, sink);
    info!(client_id = %session.id(), "Client connected from {}", peer_addr);

    if let Err(e) = task.await {
        error!(client_id = %session.id(), "Session task failed: {}", e);
    }

    info!(client_id = %session.id(), "Client {} disconnected", peer_addr);
    Ok(())
}

/// Receiving half of a WebSocket connection
pub struct WsSource {
    stream: SplitStream<WebSocketStream<TcpStream>>,
    max_frame_size: usize,
}

impl WsSource {
    fn decode(&self, payload: &[u8]) -> Result<Inbound, AppError> {
        if payload.len() > self.max_frame_size {
            return Err(AppError::FrameTooLarge {
                size: payload.len(),
                limit: self.max_frame_size,
            });
        }
        Ok(Inbound::Message(serde_json::from_slice(payload)?))
    }
}

impl FrameSource for WsSource {
    async fn recv(&mut self) -> Result<Inbound, AppError> {
        while let Some(frame) = self.stream.next().await {
            match frame? {
                WsMessage::Text(text) => return self.decode(text.as_bytes()),
                WsMessage::Binary(data) => return self.decode(&data),
                WsMessage::Pong(_) => return Ok(Inbound::Pong),
                WsMessage::Close(frame) => {
                    debug!("Close frame received: {:?}", frame);
                    return Ok(Inbound::Closed);
                }
                WsMessage::Ping(_) => {
                    // Pong is handled automatically by tungstenite
                    trace!("Ping from peer");
                }
                WsMessage::Frame(_) => {}
            }
        }
        Ok(Inbound::Closed)
    }
}

/// Sending half of a WebSocket connection
pub struct WsSink {
    sink: SplitSink<WebSocketStream<TcpStream>, WsMessage>,
}

impl FrameSink for WsSink {
    async fn send(&mut self, msg: &Message) -> Result<(), AppError> {
        let json = serde_json::to_string(msg)?;
        self.sink.send(WsMessage::Text(json.into())).await?;
        Ok(())
    }

    async fn ping(&mut self) -> Result<(), AppError> {
        self.sink.send(WsMessage::Ping(Default::default())).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), AppError> {
        self.sink.close().await?;
        Ok(())
    }
}
