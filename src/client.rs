//! Client session actor
//!
//! Each connection is served by one `ClientSession` running two loops:
//! - the inbound loop reads frames, runs the hub's interceptors and
//!   dispatches each message by type
//! - the outbound loop drains the session mailbox to the connection and
//!   keeps the peer alive with heartbeat pings
//!
//! The loops share only the mailbox and a termination token. Whichever
//! exits first closes both, which ends the other.

use std::sync::Arc;

use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::ServerConfig;
use crate::error::{AppError, SendError};
use crate::hub::{Disposition, RoomHub};
use crate::message::{now_millis, Message, MessageType};
use crate::queue::BlockingQueue;
use crate::transport::{FrameSink, FrameSource, Inbound};
use crate::types::ClientId;

/// Reply payload for a MESSAGE without a target room
pub const NO_ROOM_SPECIFIED: &str = "no room specified";

/// Connected client session
///
/// The mailbox is the only way other actors reach this session: rooms
/// push broadcasts into it and the session pushes its own replies.
#[derive(Debug)]
pub struct ClientSession {
    /// Unique identifier for this session
    id: ClientId,
    /// Outbound messages, drained by the outbound loop
    mailbox: BlockingQueue<Arc<Message>>,
    /// Fired when either loop exits
    quit: CancellationToken,
}

impl ClientSession {
    /// Create a session with an open mailbox and a fresh ID
    pub fn new(mailbox_capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            id: ClientId::next(),
            mailbox: BlockingQueue::new(mailbox_capacity),
            quit: CancellationToken::new(),
        })
    }

    /// Session identifier
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// The session's outbound mailbox
    pub fn mailbox(&self) -> &BlockingQueue<Arc<Message>> {
        &self.mailbox
    }

    /// Push a message to this client
    ///
    /// Returns an error if the mailbox is closed (client disconnected or
    /// removed from its room).
    pub fn push(&self, msg: Arc<Message>) -> Result<(), SendError> {
        if self.mailbox.add(msg) {
            Ok(())
        } else {
            Err(SendError::MailboxClosed)
        }
    }

    /// Close the mailbox, ending the outbound loop once it notices
    ///
    /// Messages still buffered are dropped.
    pub fn close(&self) {
        self.mailbox.close();
    }

    /// Check if the mailbox has been closed
    pub fn is_closed(&self) -> bool {
        self.mailbox.is_closed()
    }

    /// Stop both loops
    pub fn terminate(&self) {
        self.quit.cancel();
        self.mailbox.close();
    }

    fn reply(&self, msg: Message) {
        if self.push(Arc::new(msg)).is_err() {
            debug!(client_id = %self.id, "Reply dropped, mailbox closed");
        }
    }
}

/// Run a session until its connection ends
///
/// Spawns the inbound and outbound loops as separate tasks, waits for both
/// and finally drops the session from the hub's unassigned set.
pub async fn run<R, W>(session: Arc<ClientSession>, hub: Arc<RoomHub>, source: R, sink: W)
where
    R: FrameSource,
    W: FrameSink,
{
    let config = hub.config().clone();
    let client_id = session.id();
    debug!(client_id = %client_id, "Session started");

    let read_task = tokio::spawn(read_loop(
        Arc::clone(&session),
        Arc::clone(&hub),
        source,
        config.clone(),
    ));
    let write_task = tokio::spawn(write_loop(Arc::clone(&session), sink, config));

    let (read_result, write_result) = tokio::join!(read_task, write_task);
    for (direction, result) in [("read", read_result), ("write", write_result)] {
        match result {
            Ok(Ok(())) => debug!(client_id = %client_id, "{} loop ended", direction),
            Ok(Err(e)) if e.is_expected_close() => {
                debug!(client_id = %client_id, "{} loop closed: {}", direction, e)
            }
            Ok(Err(e)) => error!(client_id = %client_id, "{} loop error: {}", direction, e),
            Err(e) => error!(client_id = %client_id, "{} task failed: {}", direction, e),
        }
    }

    // Make sure nothing keeps the mailbox forwarder alive
    session.terminate();
    hub.remove_client(client_id);
    info!(client_id = %client_id, "Session ended");
}

async fn read_loop<R: FrameSource>(
    session: Arc<ClientSession>,
    hub: Arc<RoomHub>,
    mut source: R,
    config: ServerConfig,
) -> Result<(), AppError> {
    let result = read_frames(&session, &hub, &mut source, &config).await;
    session.terminate();
    result
}

async fn read_frames<R: FrameSource>(
    session: &Arc<ClientSession>,
    hub: &RoomHub,
    source: &mut R,
    config: &ServerConfig,
) -> Result<(), AppError> {
    let mut deadline = Instant::now() + config.pong_wait;

    loop {
        let inbound = tokio::select! {
            () = session.quit.cancelled() => return Ok(()),
            read = time::timeout_at(deadline, source.recv()) => {
                read.map_err(|_| AppError::ReadTimeout)??
            }
        };

        let mut msg = match inbound {
            Inbound::Message(msg) => msg,
            Inbound::Pong => {
                trace!(client_id = %session.id, "Pong received");
                deadline = Instant::now() + config.pong_wait;
                continue;
            }
            Inbound::Closed => {
                debug!(client_id = %session.id, "Peer closed connection");
                return Ok(());
            }
        };

        deadline = Instant::now() + config.pong_wait;
        msg.timestamp = now_millis();
        if msg.from.is_empty() {
            msg.from = session.id.to_string();
        }

        match hub.on_message(&mut msg) {
            Disposition::Deliver => dispatch(session, hub, msg).await,
            Disposition::Discarded => {
                debug!(client_id = %session.id, kind = %msg.kind, "Message discarded by handler");
            }
            Disposition::Faulted => {
                warn!(client_id = %session.id, kind = %msg.kind, "Message dropped after handler fault");
            }
        }
    }
}

/// Default handling for one inbound message
async fn dispatch(session: &Arc<ClientSession>, hub: &RoomHub, mut msg: Message) {
    let client_id = session.id;

    match msg.kind {
        MessageType::Message if msg.room.is_empty() => {
            trace!(client_id = %client_id, "Message without room");
            msg.data = NO_ROOM_SPECIFIED.to_string();
            session.reply(msg);
        }
        MessageType::Message => {
            trace!(client_id = %client_id, room = %msg.room, "Broadcasting message");
            if let Err(e) = hub.broadcast(Arc::new(msg)) {
                debug!(client_id = %client_id, "Broadcast dropped: {}", e);
            }
        }
        MessageType::Rooms => {
            let mut reply = Message::new(MessageType::Rooms);
            reply.from = msg.from;
            match serde_json::to_string(&hub.room_list()) {
                Ok(data) => reply.data = data,
                Err(e) => error!(client_id = %client_id, "Failed to serialize room list: {}", e),
            }
            session.reply(reply);
        }
        MessageType::Join => {
            let mut reply = Message::new(MessageType::Join);
            match hub.join_room(session, &msg.room).await {
                Ok(()) => reply.data = msg.room,
                Err(e) => debug!(client_id = %client_id, "Join failed: {}", e),
            }
            session.reply(reply);
        }
        MessageType::Leave => {
            let mut reply = Message::new(MessageType::Leave);
            match hub.leave_room(session, &msg.room).await {
                Ok(()) => reply.data = msg.room,
                Err(e) => debug!(client_id = %client_id, "Leave failed: {}", e),
            }
            session.reply(reply);
        }
        MessageType::Create => {
            let mut reply = Message::new(MessageType::Create);
            match hub.new_room(&msg.data) {
                Ok(info) => match serde_json::to_string(&info) {
                    Ok(data) => reply.data = data,
                    Err(e) => error!(client_id = %client_id, "Failed to serialize room: {}", e),
                },
                Err(e) => debug!(client_id = %client_id, "Create failed: {}", e),
            }
            session.reply(reply);
        }
        MessageType::Close | MessageType::Unknown => {
            debug!(client_id = %client_id, kind = %msg.kind, "Ignoring message type");
        }
    }
}

async fn write_loop<W: FrameSink>(
    session: Arc<ClientSession>,
    mut sink: W,
    config: ServerConfig,
) -> Result<(), AppError> {
    let result = write_frames(&session, &mut sink, &config).await;
    session.terminate();
    if let Err(e) = sink.close().await {
        trace!(client_id = %session.id, "Close after write loop failed: {}", e);
    }
    result
}

async fn write_frames<W: FrameSink>(
    session: &ClientSession,
    sink: &mut W,
    config: &ServerConfig,
) -> Result<(), AppError> {
    let outbox = session.mailbox.stream();
    let mut heartbeat = time::interval_at(Instant::now() + config.ping_period, config.ping_period);

    loop {
        tokio::select! {
            () = session.quit.cancelled() => return Ok(()),
            next = outbox.recv() => {
                let Some(msg) = next else {
                    debug!(client_id = %session.id, "Mailbox closed");
                    return Ok(());
                };
                time::timeout(config.write_wait, sink.send(&msg))
                    .await
                    .map_err(|_| AppError::WriteTimeout)??;
                trace!(client_id = %session.id, kind = %msg.kind, "Message sent");
                if msg.kind == MessageType::Close {
                    return Ok(());
                }
            }
            _ = heartbeat.tick() => {
                time::timeout(config.write_wait, sink.ping())
                    .await
                    .map_err(|_| AppError::WriteTimeout)??;
            }
        }
    }
}
