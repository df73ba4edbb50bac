//! Thread-safe mailbox queue
//!
//! `BlockingQueue` wraps a [`RingBuffer`] behind one lock and a condition
//! variable. It offers three ways to consume the same contents:
//!
//! - `remove`: non-blocking pop
//! - `wait`: blocking pop on the calling thread
//! - `stream`: an async receiver fed by a single forwarding thread
//!
//! Producers never block; the buffer grows to absorb bursts. Once closed,
//! a queue rejects all further adds and hides any remaining items from the
//! standard consumption paths (`close_remaining` hands them back instead).

use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex};
use tokio::sync::mpsc;
use tracing::{error, trace};

use crate::ring::RingBuffer;

/// Bounded buffer between the forwarding thread and stream consumers
const STREAM_BUFFER_SIZE: usize = 128;

/// Cloneable handle to a shared blocking queue
pub struct BlockingQueue<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    state: Mutex<State<T>>,
    available: Condvar,
}

struct State<T> {
    buf: RingBuffer<T>,
    closed: bool,
    stream: Option<QueueStream<T>>,
}

impl<T> Clone for BlockingQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for BlockingQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("BlockingQueue")
            .field("len", &state.buf.len())
            .field("capacity", &state.buf.capacity())
            .field("closed", &state.closed)
            .finish()
    }
}

impl<T> BlockingQueue<T> {
    /// Create an open queue with the given initial capacity hint
    pub fn new(initial_capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    buf: RingBuffer::new(initial_capacity),
                    closed: false,
                    stream: None,
                }),
                available: Condvar::new(),
            }),
        }
    }

    /// Enqueue an item without blocking
    ///
    /// Returns false (leaving the queue untouched) if the queue is closed.
    pub fn add(&self, item: T) -> bool {
        let mut state = self.inner.state.lock();
        if state.closed {
            return false;
        }
        state.buf.push(item);
        self.inner.available.notify_one();
        true
    }

    /// Dequeue the oldest item without blocking
    ///
    /// Returns None if the queue is empty or closed.
    pub fn remove(&self) -> Option<T> {
        let mut state = self.inner.state.lock();
        if state.closed {
            return None;
        }
        state.buf.pop()
    }

    /// Dequeue the oldest item, blocking the current thread until one arrives
    ///
    /// Returns None as soon as the queue is closed, even if items remain.
    /// Must not be called from an async task; use [`stream`](Self::stream).
    pub fn wait(&self) -> Option<T> {
        let mut state = self.inner.state.lock();
        loop {
            if state.closed {
                return None;
            }
            if let Some(item) = state.buf.pop() {
                return Some(item);
            }
            self.inner.available.wait(&mut state);
        }
    }

    /// Close the queue and wake every waiter (idempotent)
    ///
    /// The queue also lets go of its stream handle, so a forwarding thread
    /// stuck on a full channel is released once the consumers drop theirs.
    pub fn close(&self) {
        let mut state = self.inner.state.lock();
        state.closed = true;
        self.inner.available.notify_all();
        let stream = state.stream.take();
        drop(state);
        drop(stream);
    }

    /// Close the queue and return everything still buffered, oldest first
    pub fn close_remaining(&self) -> Vec<T> {
        let mut state = self.inner.state.lock();
        state.closed = true;
        self.inner.available.notify_all();
        let remaining = state.buf.drain();
        let stream = state.stream.take();
        drop(state);
        drop(stream);
        remaining
    }

    /// Check if the queue has been closed
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Number of buffered items
    pub fn len(&self) -> usize {
        self.inner.state.lock().buf.len()
    }

    /// Check if no items are buffered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current capacity of the underlying ring buffer
    pub fn capacity(&self) -> usize {
        self.inner.state.lock().buf.capacity()
    }
}

impl<T: Send + 'static> BlockingQueue<T> {
    /// Async view of the queue
    ///
    /// The first call starts one forwarding thread that repeatedly `wait`s
    /// and pushes items into a bounded channel; the channel ends when the
    /// queue closes. Every later call returns a handle to the same channel.
    /// On a closed queue the returned stream is already at its end.
    ///
    /// The forwarder stops when the queue closes or when every handle has
    /// been dropped, whichever it observes first.
    pub fn stream(&self) -> QueueStream<T> {
        let mut state = self.inner.state.lock();
        if let Some(stream) = &state.stream {
            return stream.clone();
        }

        let (tx, rx) = mpsc::channel(STREAM_BUFFER_SIZE);
        let stream = QueueStream {
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
        };
        if state.closed {
            return stream;
        }
        state.stream = Some(stream.clone());
        drop(state);

        let queue = self.clone();
        let spawned = thread::Builder::new()
            .name("mailbox-stream".to_string())
            .spawn(move || {
                while let Some(item) = queue.wait() {
                    if tx.blocking_send(item).is_err() {
                        trace!("Queue stream receiver dropped, stopping forwarder");
                        return;
                    }
                }
                trace!("Queue closed, stopping forwarder");
            });
        if let Err(e) = spawned {
            // tx was moved into the failed closure and dropped, so the stream reads as closed
            error!("Failed to spawn queue forwarding thread: {}", e);
        }

        stream
    }
}

/// Receiving end of a queue's forwarding channel
///
/// All handles obtained from the same queue share one channel, so each item
/// is observed by exactly one receiver.
pub struct QueueStream<T> {
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for QueueStream<T> {
    fn clone(&self) -> Self {
        Self {
            rx: Arc::clone(&self.rx),
        }
    }
}

impl<T> std::fmt::Debug for QueueStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueStream").finish_non_exhaustive()
    }
}

impl<T> QueueStream<T> {
    /// Receive the next item; None once the queue is closed and drained
    ///
    /// Cancel safe: dropping the future never loses an item.
    pub async fn recv(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }

    /// Check if two handles refer to the same underlying channel
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.rx, &other.rx)
    }
}
