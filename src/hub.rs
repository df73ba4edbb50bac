//! RoomHub: process-wide room registry
//!
//! The hub owns the room registry (keyed by room name), the set of
//! sessions that have not joined a room yet, the interceptor chain run on
//! every inbound message, and the hub-wide termination token that every
//! room observes.
//!
//! Construct one hub per server with [`RoomHub::new`] and share it behind
//! an `Arc`; [`RoomHub::shutdown`] tears it down.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{self, ClientSession};
use crate::config::ServerConfig;
use crate::error::{AppError, HandlerError};
use crate::message::{Message, RoomInfo};
use crate::room::Room;
use crate::transport::{FrameSink, FrameSource};
use crate::types::ClientId;

/// Interceptor run on every inbound message before default dispatch
///
/// Set `msg.discard` to stop the chain and drop the message. Returning an
/// error also stops the chain and drops the message.
pub trait MessageHandler: Send + Sync {
    fn on_message(&self, msg: &mut Message, hub: &RoomHub) -> Result<(), HandlerError>;
}

impl<F> MessageHandler for F
where
    F: Fn(&mut Message, &RoomHub) -> Result<(), HandlerError> + Send + Sync,
{
    fn on_message(&self, msg: &mut Message, hub: &RoomHub) -> Result<(), HandlerError> {
        self(msg, hub)
    }
}

/// Outcome of running the interceptor chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Continue with default dispatch
    Deliver,
    /// A handler set `discard`
    Discarded,
    /// A handler failed; the message is dropped
    Faulted,
}

/// Room registry and message router
pub struct RoomHub {
    config: ServerConfig,
    /// All rooms: name -> Room
    rooms: DashMap<String, Arc<Room>>,
    /// Sessions not yet in a room: ClientId -> ClientSession
    clients: DashMap<ClientId, Arc<ClientSession>>,
    handlers: RwLock<Vec<Arc<dyn MessageHandler>>>,
    quit: CancellationToken,
}

impl RoomHub {
    /// Create an empty hub
    pub fn new(config: ServerConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            rooms: DashMap::new(),
            clients: DashMap::new(),
            handlers: RwLock::new(Vec::new()),
            quit: CancellationToken::new(),
        })
    }

    /// Hub configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Start a session for a new connection
    ///
    /// The session is tracked as unassigned until it joins a room. The
    /// returned task finishes when the session ends.
    pub fn accept<R, W>(self: &Arc<Self>, source: R, sink: W) -> (Arc<ClientSession>, JoinHandle<()>)
    where
        R: FrameSource,
        W: FrameSink,
    {
        let session = ClientSession::new(self.config.mailbox_capacity);
        self.clients.insert(session.id(), Arc::clone(&session));
        debug!(
            client_id = %session.id(),
            unassigned = self.clients.len(),
            "Session registered"
        );

        let task = tokio::spawn(client::run(
            Arc::clone(&session),
            Arc::clone(self),
            source,
            sink,
        ));
        (session, task)
    }

    /// Create a room, or return the existing one with the same name
    ///
    /// Must be called from within a tokio runtime: a new room's loop is
    /// started with `tokio::spawn`.
    pub fn new_room(&self, name: &str) -> Result<RoomInfo, AppError> {
        if name.is_empty() {
            return Err(AppError::EmptyRoomName);
        }
        if self.is_closed() {
            return Err(AppError::HubClosed);
        }

        let room = self
            .rooms
            .entry(name.to_string())
            .or_insert_with(|| {
                info!(room = %name, "Creating room");
                Room::spawn(name, &self.quit, &self.config)
            })
            .value()
            .clone();
        Ok(room.info())
    }

    /// Look up a room handle by name
    pub fn room(&self, name: &str) -> Option<Arc<Room>> {
        self.rooms.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Look up a room record by name
    pub fn get_room(&self, name: &str) -> Option<RoomInfo> {
        self.rooms.get(name).map(|entry| entry.value().info())
    }

    /// Close a room and remove it from the registry
    ///
    /// Members receive CLOSE before the record is removed. Returns the
    /// final record, or None if no such room exists.
    pub async fn delete_room(&self, name: &str) -> Option<RoomInfo> {
        let room = self.room(name)?;
        room.close();
        room.stopped().await;
        self.rooms.remove_if(name, |_, current| Arc::ptr_eq(current, &room));
        info!(room = %name, "Room deleted");
        Some(room.info())
    }

    /// Add a session to a room
    ///
    /// On success the session is no longer tracked as unassigned.
    pub async fn join_room(&self, session: &Arc<ClientSession>, name: &str) -> Result<(), AppError> {
        let room = self.live_room(name)?;
        self.deliver(room.join_sender(), Arc::clone(session), name)
            .await?;
        self.remove_client(session.id());
        info!(client_id = %session.id(), room = %name, "Client joined room");
        Ok(())
    }

    /// Remove a session from a room (which closes its mailbox)
    pub async fn leave_room(&self, session: &Arc<ClientSession>, name: &str) -> Result<(), AppError> {
        let room = self.live_room(name)?;
        self.deliver(room.leave_sender(), Arc::clone(session), name)
            .await?;
        info!(client_id = %session.id(), room = %name, "Client left room");
        Ok(())
    }

    /// Route a message to the room named in `msg.room`
    pub fn broadcast(&self, msg: Arc<Message>) -> Result<(), AppError> {
        let room = self
            .room(&msg.room)
            .ok_or_else(|| AppError::RoomNotFound(msg.room.clone()))?;
        room.broadcast(msg)
    }

    /// Snapshot of every room record, ordered by name
    pub fn room_list(&self) -> Vec<RoomInfo> {
        let mut rooms: Vec<RoomInfo> = self.rooms.iter().map(|entry| entry.value().info()).collect();
        rooms.sort_by(|a, b| a.name.cmp(&b.name));
        rooms
    }

    /// Number of registered rooms
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of sessions that have not joined a room
    pub fn unassigned_count(&self) -> usize {
        self.clients.len()
    }

    /// Drop a session from the unassigned set
    pub fn remove_client(&self, client_id: ClientId) {
        self.clients.remove(&client_id);
    }

    /// Append one interceptor to the chain
    pub fn add_handler<H: MessageHandler + 'static>(&self, handler: H) {
        self.handlers.write().push(Arc::new(handler));
    }

    /// Append several interceptors, keeping their order
    pub fn add_handlers<I>(&self, handlers: I)
    where
        I: IntoIterator<Item = Arc<dyn MessageHandler>>,
    {
        self.handlers.write().extend(handlers);
    }

    /// Run the interceptor chain over one inbound message
    ///
    /// Stops at the first handler that discards the message or fails.
    /// Failures are logged here and never propagate further.
    pub fn on_message(&self, msg: &mut Message) -> Disposition {
        let handlers = self.handlers.read().clone();
        for (index, handler) in handlers.iter().enumerate() {
            if let Err(e) = handler.on_message(msg, self) {
                warn!(handler = index, kind = %msg.kind, from = %msg.from, "{}", e);
                return Disposition::Faulted;
            }
            if msg.discard {
                return Disposition::Discarded;
            }
        }
        Disposition::Deliver
    }

    /// Fire the hub-wide termination signal
    ///
    /// Pending joins and leaves give up, and every room shuts down,
    /// notifying its members. Rooms stay in the registry.
    pub fn shutdown(&self) {
        if !self.quit.is_cancelled() {
            info!(rooms = self.rooms.len(), "Hub shutting down");
        }
        self.quit.cancel();
    }

    /// Shut down and wait for every room loop to finish
    pub async fn shutdown_and_wait(&self) {
        self.shutdown();
        let rooms: Vec<Arc<Room>> = self.rooms.iter().map(|entry| Arc::clone(entry.value())).collect();
        for room in rooms {
            room.stopped().await;
        }
    }

    /// Check if the hub has been shut down
    pub fn is_closed(&self) -> bool {
        self.quit.is_cancelled()
    }

    fn live_room(&self, name: &str) -> Result<Arc<Room>, AppError> {
        if self.is_closed() {
            return Err(AppError::HubClosed);
        }
        self.room(name)
            .ok_or_else(|| AppError::RoomNotFound(name.to_string()))
    }

    /// Hand a session to a room channel without blocking past hub shutdown
    async fn deliver(
        &self,
        tx: &mpsc::Sender<Arc<ClientSession>>,
        session: Arc<ClientSession>,
        name: &str,
    ) -> Result<(), AppError> {
        match tx.try_send(session) {
            Ok(()) => Ok(()),
            Err(TrySendError::Closed(_)) => Err(AppError::RoomClosed(name.to_string())),
            Err(TrySendError::Full(session)) => {
                tokio::select! {
                    sent = tx.send(session) => {
                        sent.map_err(|_| AppError::RoomClosed(name.to_string()))
                    }
                    () = self.quit.cancelled() => Err(AppError::HubClosed),
                }
            }
        }
    }
}

impl std::fmt::Debug for RoomHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomHub")
            .field("rooms", &self.rooms.len())
            .field("unassigned", &self.clients.len())
            .field("handlers", &self.handlers.read().len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
