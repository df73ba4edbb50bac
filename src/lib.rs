//! Room-based WebSocket Broadcast Server Library
//!
//! Clients connect over WebSocket, create or join named rooms, and every
//! message sent to a room is fanned out to all of its members.
//!
//! # Features
//! - Room creation, listing, joining and leaving
//! - Real-time broadcast to every room member
//! - Pluggable interceptor chain over inbound messages
//! - Heartbeat pings with read-idle and write deadlines
//! - Graceful room and hub shutdown with CLOSE notices
//!
//! # Architecture
//! Uses the Actor pattern around one mailbox primitive:
//! - `BlockingQueue` is a growable, closeable mailbox with blocking,
//!   non-blocking and async stream consumption
//! - Each `ClientSession` runs an inbound and an outbound loop sharing
//!   only its mailbox
//! - Each `Room` runs one loop that alone owns its membership
//! - `RoomHub` is the concurrent registry that routes control messages
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use chat_hub::{handle_connection, RoomHub, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     let hub = RoomHub::new(ServerConfig::default());
//!     hub.new_room("lobby").unwrap();
//!
//!     while let Ok((stream, _)) = listener.accept().await {
//!         tokio::spawn(handle_connection(stream, hub.clone()));
//!     }
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod hub;
pub mod message;
pub mod queue;
pub mod ring;
pub mod room;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use client::ClientSession;
pub use config::ServerConfig;
pub use error::{AppError, HandlerError, SendError};
pub use handler::handle_connection;
pub use hub::{Disposition, MessageHandler, RoomHub};
pub use message::{Message, MessageType, RoomInfo};
pub use queue::{BlockingQueue, QueueStream};
pub use ring::RingBuffer;
pub use room::Room;
pub use transport::{FrameSink, FrameSource, Inbound};
pub use types::{ClientId, RoomId};
