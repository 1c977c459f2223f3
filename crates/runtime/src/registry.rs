//! Worker registry and broadcast.
//!
//! The registry is built in full before any worker thread spawns and never
//! mutated afterwards, so broadcast and lookup iterate it without a
//! registry-level lock. The only interior mutability is the per-worker
//! published state name (written by the owning worker, read by diagnostics)
//! and the thread id recorded once at worker startup.

use crate::queue::EventQueue;
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};
use std::thread::ThreadId;
use switchboard_core::Event;
use tracing::{trace, warn};

/// One registered worker, as seen from outside its thread.
#[derive(Debug)]
pub(crate) struct WorkerEntry {
    name: String,
    queue: Arc<EventQueue>,
    /// Current state name, published by the owning worker after each
    /// transition. The FSM cursor itself never leaves the worker thread.
    state: Mutex<&'static str>,
    /// Set once by the worker thread when it starts.
    thread_id: OnceLock<ThreadId>,
}

impl WorkerEntry {
    pub(crate) fn new(name: String, queue: Arc<EventQueue>) -> Self {
        Self {
            name,
            queue,
            state: Mutex::new("<not started>"),
            thread_id: OnceLock::new(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    pub(crate) fn publish_state(&self, state: &'static str) {
        *self.state.lock() = state;
    }

    pub(crate) fn record_thread_id(&self, id: ThreadId) {
        // A worker only records its own id, once.
        let _ = self.thread_id.set(id);
    }

    fn snapshot(&self) -> WorkerSnapshot {
        WorkerSnapshot {
            name: self.name.clone(),
            state: *self.state.lock(),
            queued: self.queue.len(),
        }
    }
}

/// Diagnostic snapshot of one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSnapshot {
    /// Worker name, stable for the process lifetime.
    pub name: String,
    /// Name of the state the worker's FSM was last seen in.
    pub state: &'static str,
    /// Events waiting in the worker's queue.
    pub queued: usize,
}

/// Ordered, frozen collection of workers.
#[derive(Debug)]
pub struct Registry {
    entries: Box<[WorkerEntry]>,
}

impl Registry {
    pub(crate) fn new(entries: Vec<WorkerEntry>) -> Self {
        Self {
            entries: entries.into_boxed_slice(),
        }
    }

    /// Enqueue `event` into every worker's queue, in registration order.
    ///
    /// A per-queue failure is logged and skipped; the remaining queues still
    /// receive the event. There is no rollback.
    pub fn broadcast(&self, event: Event) {
        // Trace lines carry the producing context: a worker's name when the
        // broadcast came from inside an action, "external" for the command
        // thread and the timer service.
        let origin = self.self_entry().map(|e| e.name.as_str()).unwrap_or("external");
        for entry in self.entries.iter() {
            match entry.queue.enqueue(event) {
                Ok(()) => {
                    trace!(origin, worker = entry.name(), evt = %event, "enqueued")
                }
                Err(err) => {
                    warn!(worker = entry.name(), evt = %event, %err, "enqueue failed")
                }
            }
        }
    }

    /// Number of registered workers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entry(&self, index: usize) -> &WorkerEntry {
        &self.entries[index]
    }

    pub(crate) fn find_by_name(&self, name: &str) -> Option<&WorkerEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// The entry whose worker thread is the calling thread, if any.
    pub(crate) fn self_entry(&self) -> Option<&WorkerEntry> {
        let id = std::thread::current().id();
        self.entries
            .iter()
            .find(|e| e.thread_id.get().copied() == Some(id))
    }

    /// Snapshot of every worker's name and last published state.
    pub fn snapshot(&self) -> Vec<WorkerSnapshot> {
        self.entries.iter().map(WorkerEntry::snapshot).collect()
    }

    /// Snapshot of the named worker, if registered.
    pub fn worker_named(&self, name: &str) -> Option<WorkerSnapshot> {
        self.find_by_name(name).map(WorkerEntry::snapshot)
    }

    /// Close every queue. Teardown only.
    pub(crate) fn close_all(&self) {
        for entry in self.entries.iter() {
            entry.queue.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_of(names: &[&str]) -> Registry {
        Registry::new(
            names
                .iter()
                .map(|n| WorkerEntry::new(n.to_string(), Arc::new(EventQueue::new())))
                .collect(),
        )
    }

    #[test]
    fn broadcast_reaches_every_queue_in_order() {
        let reg = registry_of(&["a", "b", "c"]);
        reg.broadcast(Event::Init);
        reg.broadcast(Event::Green);

        for i in 0..3 {
            let q = reg.entry(i).queue();
            assert_eq!(q.dequeue().unwrap(), Event::Init);
            assert_eq!(q.dequeue().unwrap(), Event::Green);
        }
    }

    #[test]
    fn broadcast_survives_one_closed_queue() {
        let reg = registry_of(&["a", "b"]);
        reg.entry(0).queue().close();
        reg.broadcast(Event::Button);

        assert_eq!(reg.entry(1).queue().len(), 1);
    }

    #[test]
    fn find_and_snapshot() {
        let reg = registry_of(&["stoplight", "crosswalk"]);
        reg.entry(0).publish_state("Green");
        reg.entry(0).queue().enqueue(Event::Button).unwrap();

        assert!(reg.worker_named("nobody").is_none());
        let light = reg.worker_named("stoplight").unwrap();
        assert_eq!(light.state, "Green");
        assert_eq!(light.queued, 1);

        let snap = reg.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].name, "stoplight");
        assert_eq!(snap[1].state, "<not started>");
    }

    #[test]
    fn self_entry_matches_recording_thread() {
        let reg = Arc::new(registry_of(&["w"]));
        assert!(reg.self_entry().is_none());

        let reg2 = reg.clone();
        std::thread::spawn(move || {
            reg2.entry(0).record_thread_id(std::thread::current().id());
            assert!(reg2.self_entry().is_some());
        })
        .join()
        .unwrap();

        // Still not the worker thread here.
        assert!(reg.self_entry().is_none());
    }
}
