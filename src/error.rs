//! Error types for the chat hub
//!
//! Defines application-level errors, mailbox send errors and the failure
//! result of message interceptors. Uses thiserror for ergonomic error
//! definitions.

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

/// Application-level errors
///
/// Covers both fatal errors (session termination) and routing failures
/// (reported to the client in a reply payload).
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Inbound frame exceeds the configured limit (fatal)
    #[error("Frame too large: {size} bytes (limit {limit})")]
    FrameTooLarge { size: usize, limit: usize },

    /// Nothing received within the idle deadline (fatal)
    #[error("Read deadline exceeded")]
    ReadTimeout,

    /// A write did not complete within the write deadline (fatal)
    #[error("Write deadline exceeded")]
    WriteTimeout,

    /// No room registered under the given name
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// Room creation requested without a name
    #[error("Room name must not be empty")]
    EmptyRoomName,

    /// The room exists but its loop has stopped
    #[error("Room closed: {0}")]
    RoomClosed(String),

    /// The hub has been shut down
    #[error("Hub closed")]
    HubClosed,
}

impl AppError {
    /// Check if this error is a normal, peer-initiated connection close
    ///
    /// Expected closures are logged quietly; everything else is abnormal.
    /// Both end the session the same way.
    pub fn is_expected_close(&self) -> bool {
        matches!(
            self,
            AppError::WebSocket(WsError::ConnectionClosed | WsError::AlreadyClosed)
        )
    }
}

/// Message send errors
///
/// Occurs when pushing into a mailbox that has already been closed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The mailbox no longer accepts messages
    #[error("Mailbox closed")]
    MailboxClosed,
}

/// Failure reported by a message interceptor
///
/// Stops the interceptor chain and skips default dispatch for the message.
#[derive(Debug, Error)]
#[error("Handler error: {0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    /// Create a handler error with the given reason
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_close_classification() {
        assert!(AppError::WebSocket(WsError::ConnectionClosed).is_expected_close());
        assert!(AppError::WebSocket(WsError::AlreadyClosed).is_expected_close());
        assert!(!AppError::ReadTimeout.is_expected_close());
        assert!(!AppError::FrameTooLarge { size: 600, limit: 512 }.is_expected_close());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            AppError::RoomNotFound("lobby".to_string()).to_string(),
            "Room not found: lobby"
        );
        assert_eq!(HandlerError::new("boom").to_string(), "Handler error: boom");
    }
}
