//! Server configuration
//!
//! Operating constants for sessions, rooms and the listener.

use std::time::Duration;

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: String,

    /// Maximum inbound frame size in bytes
    pub max_frame_size: usize,

    /// Time allowed to write one frame to the peer
    pub write_wait: Duration,

    /// Time allowed between inbound frames or heartbeat acknowledgements
    pub pong_wait: Duration,

    /// Heartbeat interval, always shorter than `pong_wait`
    pub ping_period: Duration,

    /// Initial capacity of every mailbox (a sizing hint, not a cap)
    pub mailbox_capacity: usize,

    /// Buffer size of each room's join and leave channels
    pub room_channel_buffer: usize,

    /// Room created at startup, if any
    pub default_room: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let pong_wait = Duration::from_secs(60);
        Self {
            bind_addr: DEFAULT_ADDR.to_string(),
            max_frame_size: 512,
            write_wait: Duration::from_secs(10),
            pong_wait,
            ping_period: ping_period_for(pong_wait),
            mailbox_capacity: 1024,
            room_channel_buffer: 32,
            default_room: Some("lobby".to_string()),
        }
    }
}

impl ServerConfig {
    /// Set the bind address
    pub fn bind(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    /// Set the maximum inbound frame size
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Set the write deadline
    pub fn write_wait(mut self, timeout: Duration) -> Self {
        self.write_wait = timeout;
        self
    }

    /// Set the read-idle deadline
    ///
    /// Also resets the heartbeat interval to 9/10 of the deadline.
    pub fn pong_wait(mut self, timeout: Duration) -> Self {
        self.pong_wait = timeout;
        self.ping_period = ping_period_for(timeout);
        self
    }

    /// Set the initial mailbox capacity
    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }

    /// Set the depth of each room's join and leave channels
    pub fn room_channel_buffer(mut self, depth: usize) -> Self {
        self.room_channel_buffer = depth;
        self
    }

    /// Set or clear the room created at startup
    pub fn default_room(mut self, name: Option<String>) -> Self {
        self.default_room = name;
        self
    }
}

fn ping_period_for(pong_wait: Duration) -> Duration {
    pong_wait * 9 / 10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.max_frame_size, 512);
        assert_eq!(config.write_wait, Duration::from_secs(10));
        assert_eq!(config.pong_wait, Duration::from_secs(60));
        assert_eq!(config.ping_period, Duration::from_secs(54));
        assert_eq!(config.mailbox_capacity, 1024);
    }

    #[test]
    fn test_ping_period_tracks_pong_wait() {
        let config = ServerConfig::default().pong_wait(Duration::from_secs(10));
        assert_eq!(config.ping_period, Duration::from_secs(9));
        assert!(config.ping_period < config.pong_wait);
    }

    #[test]
    fn test_builder() {
        let config = ServerConfig::default()
            .bind("0.0.0.0:9000")
            .max_frame_size(1024)
            .room_channel_buffer(1)
            .default_room(None);
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.max_frame_size, 1024);
        assert_eq!(config.room_channel_buffer, 1);
        assert!(config.default_room.is_none());
    }
}
