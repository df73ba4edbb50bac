//! Connection abstraction consumed by client sessions
//!
//! A connection is split into a receiving half (`FrameSource`) and a
//! sending half (`FrameSink`) so the inbound and outbound loops can run as
//! independent tasks. Deadlines are applied by the session loops around
//! these calls, not by the transport.

use std::future::Future;

use crate::error::AppError;
use crate::message::Message;

/// One event read from the connection
#[derive(Debug)]
pub enum Inbound {
    /// A decoded message frame
    Message(Message),
    /// Heartbeat acknowledgement from the peer
    Pong,
    /// The peer closed the connection normally
    Closed,
}

/// Receiving half of a connection
pub trait FrameSource: Send + 'static {
    /// Read the next event, skipping frames that carry no message
    fn recv(&mut self) -> impl Future<Output = Result<Inbound, AppError>> + Send;
}

/// Sending half of a connection
pub trait FrameSink: Send + 'static {
    /// Serialize and send one message frame
    fn send(&mut self, msg: &Message) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Send a heartbeat ping frame
    fn ping(&mut self) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Close the connection
    fn close(&mut self) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// In-memory transport for driving sessions in tests
#[cfg(test)]
pub(crate) mod mock {
    use std::time::Duration;

    use tokio::sync::mpsc;
    use tokio_tungstenite::tungstenite::Error as WsError;

    use super::*;

    /// Frame observed on the sending half
    #[derive(Debug)]
    pub enum Sent {
        Message(Message),
        Ping,
        Close,
    }

    pub struct MockSource {
        rx: mpsc::UnboundedReceiver<Result<Inbound, AppError>>,
    }

    impl FrameSource for MockSource {
        async fn recv(&mut self) -> Result<Inbound, AppError> {
            self.rx.recv().await.unwrap_or(Ok(Inbound::Closed))
        }
    }

    pub struct MockSink {
        tx: mpsc::UnboundedSender<Sent>,
    }

    impl MockSink {
        fn emit(&self, frame: Sent) -> Result<(), AppError> {
            self.tx
                .send(frame)
                .map_err(|_| AppError::WebSocket(WsError::ConnectionClosed))
        }
    }

    impl FrameSink for MockSink {
        async fn send(&mut self, msg: &Message) -> Result<(), AppError> {
            self.emit(Sent::Message(msg.clone()))
        }

        async fn ping(&mut self) -> Result<(), AppError> {
            self.emit(Sent::Ping)
        }

        async fn close(&mut self) -> Result<(), AppError> {
            self.emit(Sent::Close)
        }
    }

    /// The remote end of a mock connection
    pub struct MockPeer {
        inbound: mpsc::UnboundedSender<Result<Inbound, AppError>>,
        outbound: mpsc::UnboundedReceiver<Sent>,
    }

    pub fn pair() -> (MockSource, MockSink, MockPeer) {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        (
            MockSource { rx: in_rx },
            MockSink { tx: out_tx },
            MockPeer {
                inbound: in_tx,
                outbound: out_rx,
            },
        )
    }

    impl MockPeer {
        pub fn send(&self, msg: Message) {
            let _ = self.inbound.send(Ok(Inbound::Message(msg)));
        }

        pub fn send_json(&self, json: &str) {
            let msg: Message = serde_json::from_str(json).unwrap();
            self.send(msg);
        }

        pub fn pong(&self) {
            let _ = self.inbound.send(Ok(Inbound::Pong));
        }

        pub fn fail(&self, err: AppError) {
            let _ = self.inbound.send(Err(err));
        }

        /// Next frame the session wrote, or None after two seconds
        pub async fn next_sent(&mut self) -> Option<Sent> {
            tokio::time::timeout(Duration::from_secs(2), self.outbound.recv())
                .await
                .ok()
                .flatten()
        }

        /// Next message frame, skipping heartbeats
        pub async fn next_message(&mut self) -> Option<Message> {
            loop {
                match self.next_sent().await? {
                    Sent::Message(msg) => return Some(msg),
                    Sent::Ping => continue,
                    Sent::Close => return None,
                }
            }
        }

        /// Check that no message frame arrives within `window`
        pub async fn quiet_for(&mut self, window: Duration) -> bool {
            loop {
                match tokio::time::timeout(window, self.outbound.recv()).await {
                    Err(_) | Ok(None) => return true,
                    Ok(Some(Sent::Message(_))) => return false,
                    Ok(Some(_)) => continue,
                }
            }
        }
    }
}
