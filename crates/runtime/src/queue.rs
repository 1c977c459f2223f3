//! Per-worker event queue.
//!
//! A plain FIFO guarded by one mutex and one condition variable. Enqueue
//! never blocks; dequeue blocks until an event arrives or the queue is
//! closed. Concurrent producers are serialized by the mutex, which is the
//! whole ordering story: per-queue FIFO, nothing more.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use switchboard_core::Event;
use thiserror::Error;

/// Default safety bound on queued events. The queue is conceptually
/// unbounded; the bound stands in for allocator exhaustion so a stuck
/// consumer surfaces as a loggable error instead of unbounded growth.
pub const DEFAULT_CAPACITY: usize = 65_536;

/// Errors from queue operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The queue was closed during teardown.
    #[error("queue is shutting down")]
    ShuttingDown,

    /// The safety bound was hit; the event was not enqueued.
    #[error("queue out of capacity")]
    OutOfCapacity,
}

#[derive(Debug)]
struct Inner {
    events: VecDeque<Event>,
    closed: bool,
}

/// FIFO of events for exactly one worker.
#[derive(Debug)]
pub struct EventQueue {
    inner: Mutex<Inner>,
    available: Condvar,
    capacity: usize,
}

impl EventQueue {
    /// Create a queue with the default capacity bound.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a queue with an explicit capacity bound.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                events: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
            capacity,
        }
    }

    /// Append one event and wake a blocked receiver. Never blocks.
    pub fn enqueue(&self, event: Event) -> Result<(), QueueError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(QueueError::ShuttingDown);
        }
        if inner.events.len() >= self.capacity {
            return Err(QueueError::OutOfCapacity);
        }
        inner.events.push_back(event);
        self.available.notify_one();
        Ok(())
    }

    /// Remove and return the oldest event, blocking until one is available.
    ///
    /// Returns [`QueueError::ShuttingDown`] once the queue is closed and
    /// drained; events enqueued before the close are still delivered.
    pub fn dequeue(&self) -> Result<Event, QueueError> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(event) = inner.events.pop_front() {
                return Ok(event);
            }
            if inner.closed {
                return Err(QueueError::ShuttingDown);
            }
            self.available.wait(&mut inner);
        }
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.inner.lock().events.len()
    }

    /// Whether the queue is currently empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close the queue and wake every blocked receiver. Teardown only.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        self.available.notify_all();
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
