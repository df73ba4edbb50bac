//! Room actor
//!
//! Each room runs one control loop that owns its membership map. Joins and
//! leaves arrive over channels, broadcasts over the room's own mailbox, so
//! membership is only ever touched by that loop and needs no lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::client::ClientSession;
use crate::config::ServerConfig;
use crate::error::AppError;
use crate::message::{now_millis, Message, RoomInfo};
use crate::queue::BlockingQueue;
use crate::types::{ClientId, RoomId};

/// Shared handle to a running room
///
/// Counters are atomics so the hub can snapshot them while the loop runs;
/// only the loop writes the online count.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    name: String,
    description: String,
    active: AtomicBool,
    online: AtomicUsize,
    messages: AtomicU64,
    updated: AtomicI64,
    join_tx: mpsc::Sender<Arc<ClientSession>>,
    leave_tx: mpsc::Sender<Arc<ClientSession>>,
    broadcast: BlockingQueue<Arc<Message>>,
    /// Fired by `close` or by hub shutdown (child token)
    quit: CancellationToken,
    /// Fired by the loop once it has exited
    stopped: CancellationToken,
}

impl Room {
    /// Create a room and start its control loop
    ///
    /// The room stops when it is closed or when `hub_quit` fires. Must be
    /// called from within a tokio runtime, since the loop is a spawned task.
    pub fn spawn(name: &str, hub_quit: &CancellationToken, config: &ServerConfig) -> Arc<Self> {
        let (room, actor) = Self::new(name, hub_quit, config);
        tokio::spawn(actor.run());
        room
    }

    /// Build a room and its loop without starting the loop
    pub(crate) fn new(
        name: &str,
        hub_quit: &CancellationToken,
        config: &ServerConfig,
    ) -> (Arc<Self>, RoomActor) {
        let buffer = config.room_channel_buffer.max(1);
        let (join_tx, join_rx) = mpsc::channel(buffer);
        let (leave_tx, leave_rx) = mpsc::channel(buffer);

        let room = Arc::new(Self {
            id: RoomId::generate(),
            name: name.to_string(),
            description: name.to_string(),
            active: AtomicBool::new(true),
            online: AtomicUsize::new(0),
            messages: AtomicU64::new(0),
            updated: AtomicI64::new(now_millis()),
            join_tx,
            leave_tx,
            broadcast: BlockingQueue::new(config.mailbox_capacity),
            quit: hub_quit.child_token(),
            stopped: CancellationToken::new(),
        });

        let actor = RoomActor {
            room: Arc::clone(&room),
            members: HashMap::new(),
            join_rx,
            leave_rx,
        };
        (room, actor)
    }

    /// Generated room identity
    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// Room name (registry key)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if the room loop is still running
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Number of current members
    pub fn online_count(&self) -> usize {
        self.online.load(Ordering::Acquire)
    }

    /// Number of messages broadcast so far
    pub fn message_count(&self) -> u64 {
        self.messages.load(Ordering::Relaxed)
    }

    /// Point-in-time metadata snapshot
    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            avatar: String::new(),
            active: self.is_active(),
            client_count: self.online_count(),
            msg_count: self.message_count(),
            updated: self.updated.load(Ordering::Relaxed),
        }
    }

    /// Queue a message for delivery to every member
    ///
    /// Only enqueues; fan-out happens in the room loop, in call order.
    /// A rejected message leaves the counters untouched.
    pub fn broadcast(&self, msg: Arc<Message>) -> Result<(), AppError> {
        if !self.broadcast.add(msg) {
            return Err(AppError::RoomClosed(self.name.clone()));
        }
        self.updated.store(now_millis(), Ordering::Relaxed);
        self.messages.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Ask the loop to shut down, notifying every member with CLOSE
    pub fn close(&self) {
        self.active.store(false, Ordering::Release);
        self.quit.cancel();
    }

    /// Wait until the room loop has exited
    pub async fn stopped(&self) {
        self.stopped.cancelled().await;
    }

    pub(crate) fn join_sender(&self) -> &mpsc::Sender<Arc<ClientSession>> {
        &self.join_tx
    }

    pub(crate) fn leave_sender(&self) -> &mpsc::Sender<Arc<ClientSession>> {
        &self.leave_tx
    }
}

/// The loop side of a room: sole owner of membership
pub(crate) struct RoomActor {
    room: Arc<Room>,
    members: HashMap<ClientId, Arc<ClientSession>>,
    join_rx: mpsc::Receiver<Arc<ClientSession>>,
    leave_rx: mpsc::Receiver<Arc<ClientSession>>,
}

impl RoomActor {
    pub(crate) async fn run(mut self) {
        info!(room = %self.room.name, id = %self.room.id, "Room started");
        let inbox = self.room.broadcast.stream();

        // Polled in order: shutdown, joins, leaves, broadcasts. A join that is
        // already queued when a broadcast is picked up receives that broadcast.
        loop {
            tokio::select! {
                biased;
                () = self.room.quit.cancelled() => {
                    self.shutdown();
                    break;
                }
                Some(session) = self.join_rx.recv() => self.join(session),
                Some(session) = self.leave_rx.recv() => self.leave(&session),
                next = inbox.recv() => match next {
                    Some(msg) => self.fan_out(&msg),
                    None => break,
                },
            }
        }

        self.room.active.store(false, Ordering::Release);
        self.room.broadcast.close();
        self.join_rx.close();
        self.leave_rx.close();
        info!(room = %self.room.name, members = self.members.len(), "Room closed");
        self.room.stopped.cancel();
    }

    fn join(&mut self, session: Arc<ClientSession>) {
        let client_id = session.id();
        if self.members.insert(client_id, session).is_none() {
            self.room.online.fetch_add(1, Ordering::AcqRel);
        }
        debug!(room = %self.room.name, client_id = %client_id, "Client joined room");
    }

    fn leave(&mut self, session: &ClientSession) {
        if let Some(member) = self.members.remove(&session.id()) {
            self.room.online.fetch_sub(1, Ordering::AcqRel);
            member.close();
            debug!(room = %self.room.name, client_id = %member.id(), "Client left room");
        }
    }

    fn fan_out(&self, msg: &Arc<Message>) {
        for member in self.members.values() {
            // Closed mailboxes stay in membership until a leave or shutdown
            if member.push(Arc::clone(msg)).is_err() {
                trace!(room = %self.room.name, client_id = %member.id(), "Skipping closed mailbox");
            }
        }
    }

    fn shutdown(&mut self) {
        // Refuse new sends first, then apply everything already accepted
        self.join_rx.close();
        self.leave_rx.close();
        while let Ok(session) = self.join_rx.try_recv() {
            self.join(session);
        }
        while let Ok(session) = self.leave_rx.try_recv() {
            self.leave(&session);
        }

        let notice = Arc::new(Message::close(&self.room.name));
        let room = &self.room;
        self.members.retain(|client_id, member| {
            if member.push(Arc::clone(&notice)).is_ok() {
                return true;
            }
            room.online.fetch_sub(1, Ordering::AcqRel);
            debug!(room = %room.name, client_id = %client_id, "Evicted closed member");
            false
        });
    }
}
