//! Message protocol definitions
//!
//! One JSON object per WebSocket frame, shared by both directions. Empty
//! fields are omitted on output and defaulted on input.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::types::RoomId;

/// Message kind carried in the `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    /// Client → Server: join a room
    Join,
    /// Client → Server: leave a room
    Leave,
    /// Client → Server: create a room
    Create,
    /// Server → Client: room closed
    Close,
    /// Client → Server: list rooms
    Rooms,
    /// Both directions: chat payload
    Message,
    /// Anything this server does not understand
    #[default]
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MessageType::Join => "JOIN",
            MessageType::Leave => "LEAVE",
            MessageType::Create => "CREATE",
            MessageType::Close => "CLOSE",
            MessageType::Rooms => "ROOMS",
            MessageType::Message => "MESSAGE",
            MessageType::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Wire message
///
/// `discard` lives only inside the process: interceptors set it to stop
/// further handling and it is never serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    /// Message identifier, omitted when zero
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub id: u64,
    /// Message kind
    #[serde(rename = "type")]
    pub kind: MessageType,
    /// Sender identity
    #[serde(skip_serializing_if = "String::is_empty")]
    pub from: String,
    /// Target or source room name, empty for none
    #[serde(skip_serializing_if = "String::is_empty")]
    pub room: String,
    /// Epoch milliseconds
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub timestamp: i64,
    /// Free text or a JSON-encoded record
    #[serde(skip_serializing_if = "String::is_empty")]
    pub data: String,
    /// Set by an interceptor to drop the message
    #[serde(skip)]
    pub discard: bool,
}

impl Message {
    /// Create an empty message of the given kind, stamped with the current time
    pub fn new(kind: MessageType) -> Self {
        Self {
            kind,
            timestamp: now_millis(),
            ..Default::default()
        }
    }

    /// Create the notice a room sends to its members when it shuts down
    pub fn close(room: &str) -> Self {
        Self {
            room: room.to_string(),
            ..Self::new(MessageType::Close)
        }
    }

    /// Builder-style setter for `data`
    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = data.into();
        self
    }
}

/// Room metadata record, as returned by CREATE and ROOMS
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    /// Generated identity
    pub id: RoomId,
    /// Display name (registry key)
    pub name: String,
    /// Description
    pub description: String,
    /// Avatar URL
    #[serde(skip_serializing_if = "String::is_empty")]
    pub avatar: String,
    /// Whether the room is still running
    pub active: bool,
    /// Online client count
    pub client_count: usize,
    /// Messages broadcast so far
    pub msg_count: u64,
    /// Epoch milliseconds of the latest broadcast
    pub updated: i64,
}

/// Current wall-clock time in epoch milliseconds
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

fn is_zero_u64(value: &u64) -> bool {
    *value == 0
}

fn is_zero_i64(value: &i64) -> bool {
    *value == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_deserialize() {
        let json = r#"{"type": "JOIN", "room": "lobby", "from": "A"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.kind, MessageType::Join);
        assert_eq!(msg.room, "lobby");
        assert_eq!(msg.from, "A");
        assert_eq!(msg.id, 0);
        assert!(msg.data.is_empty());
        assert!(!msg.discard);
    }

    #[test]
    fn test_unknown_or_missing_type() {
        let msg: Message = serde_json::from_str(r#"{"type": "TYPING"}"#).unwrap();
        assert_eq!(msg.kind, MessageType::Unknown);

        let msg: Message = serde_json::from_str(r#"{"content": "1234"}"#).unwrap();
        assert_eq!(msg.kind, MessageType::Unknown);
    }

    #[test]
    fn test_message_serialize_omits_empty_fields() {
        let mut msg = Message::new(MessageType::Message).with_data("hi");
        msg.timestamp = 0;
        msg.discard = true;
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"MESSAGE","data":"hi"}"#);
    }

    #[test]
    fn test_message_serialize_full() {
        let msg = Message {
            id: 7,
            kind: MessageType::Message,
            from: "A".to_string(),
            room: "lobby".to_string(),
            timestamp: 1_700_000_000_000,
            data: "hi".to_string(),
            discard: false,
        };
        let value: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["type"], "MESSAGE");
        assert_eq!(value["from"], "A");
        assert_eq!(value["room"], "lobby");
        assert_eq!(value["timestamp"], 1_700_000_000_000_i64);
        assert_eq!(value["data"], "hi");
        assert!(value.get("discard").is_none());
    }

    #[test]
    fn test_close_notice() {
        let msg = Message::close("lobby");
        assert_eq!(msg.kind, MessageType::Close);
        assert_eq!(msg.room, "lobby");
        assert!(msg.timestamp > 0);
    }

    #[test]
    fn test_room_info_serialize() {
        let info = RoomInfo {
            id: RoomId("r1".to_string()),
            name: "lobby".to_string(),
            description: "lobby".to_string(),
            avatar: String::new(),
            active: true,
            client_count: 2,
            msg_count: 5,
            updated: 0,
        };
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"clientCount\":2"));
        assert!(json.contains("\"msgCount\":5"));
        assert!(!json.contains("avatar"));
    }
}
