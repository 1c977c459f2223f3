//! Worker threads: one FSM instance, one queue, one loop.

use crate::queue::QueueError;
use crate::registry::Registry;
use crate::timer::TimerService;
use std::cell::Cell;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use switchboard_core::{Event, FsmContext, FsmInstance, FsmTable, TimerId};
use tracing::{debug, trace, warn};

/// The capability implementation handed to actions and guards.
///
/// Owned by exactly one worker thread. The exit flag is a plain `Cell`
/// because nothing else ever sees this value; requesting exit from inside an
/// action is just a write the loop reads after `step` returns.
struct WorkerContext {
    registry: Arc<Registry>,
    timers: TimerService,
    index: usize,
    exit: Cell<bool>,
}

impl FsmContext for WorkerContext {
    fn broadcast(&self, event: Event) {
        self.registry.broadcast(event);
    }

    fn set_timer(&self, id: TimerId, period: Duration) {
        if let Err(err) = self.timers.set_timer(id, period) {
            warn!(worker = self.worker_name(), timer = %id, %err, "set_timer ignored");
        }
    }

    fn remaining(&self, id: TimerId) -> Duration {
        match self.timers.get_timer(id) {
            Ok(remaining) => remaining,
            Err(err) => {
                warn!(worker = self.worker_name(), timer = %id, %err, "remaining() on unknown timer");
                Duration::ZERO
            }
        }
    }

    fn exit_worker(&self) {
        self.exit.set(true);
    }

    fn worker_name(&self) -> &str {
        self.registry.entry(self.index).name()
    }
}

/// Spawn the worker thread for registry slot `index`.
///
/// The loop runs the initial state's entry action, then blocks in dequeue
/// until an action requests exit or the queue closes underneath it.
pub(crate) fn spawn(
    registry: Arc<Registry>,
    timers: TimerService,
    index: usize,
    table: Arc<FsmTable>,
) -> std::io::Result<JoinHandle<()>> {
    let name = registry.entry(index).name().to_string();
    thread::Builder::new()
        .name(name)
        .spawn(move || run(registry, timers, index, table))
}

fn run(registry: Arc<Registry>, timers: TimerService, index: usize, table: Arc<FsmTable>) {
    registry
        .entry(index)
        .record_thread_id(thread::current().id());

    let ctx = WorkerContext {
        registry: registry.clone(),
        timers,
        index,
        exit: Cell::new(false),
    };
    let entry = registry.entry(index);
    let mut fsm = FsmInstance::new(table);

    debug!(worker = entry.name(), state = fsm.current_state().name(), "worker started");
    entry.publish_state(fsm.current_state().name());
    fsm.initialize(&ctx);

    while !ctx.exit.get() {
        match entry.queue().dequeue() {
            Ok(event) => {
                trace!(worker = entry.name(), evt = %event, "dequeued");
                fsm.step(&ctx, event);
                entry.publish_state(fsm.current_state().name());
            }
            Err(QueueError::ShuttingDown) => {
                debug!(worker = entry.name(), "queue closed, exiting");
                break;
            }
            Err(err) => {
                warn!(worker = entry.name(), %err, "dequeue failed, exiting");
                break;
            }
        }
    }

    debug!(worker = entry.name(), state = fsm.current_state().name(), "worker exited");
}
