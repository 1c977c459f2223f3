//! Runtime assembly and the shutdown coordinator.

use crate::queue::{EventQueue, DEFAULT_CAPACITY};
use crate::registry::{Registry, WorkerEntry, WorkerSnapshot};
use crate::timer::{TimerService, TimerSnapshot};
use crate::worker;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use switchboard_core::{Event, FsmTable, TimerId};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors from [`RuntimeBuilder::start`]. All of these are setup failures:
/// nothing has begun running when they are returned.
#[derive(Debug, Error)]
pub enum StartError {
    /// Two workers were registered under the same name.
    #[error("duplicate worker name {0:?}")]
    DuplicateWorker(String),

    /// Two timers were registered under the same id.
    #[error(transparent)]
    Timer(#[from] crate::timer::TimerError),

    /// The OS refused a thread spawn.
    #[error("failed to spawn {thread}: {source}")]
    Spawn {
        thread: String,
        source: std::io::Error,
    },

    /// A runtime without workers has nothing to deliver events to.
    #[error("no workers registered")]
    NoWorkers,
}

/// Declarative setup for a [`Runtime`].
///
/// Workers and timers are declared up front; `start` freezes the registry,
/// spawns the timer service, then spawns every worker. Nothing is mutable
/// after that point except through the synchronized timer and queue doors.
pub struct RuntimeBuilder {
    workers: Vec<(String, Arc<FsmTable>)>,
    timers: Vec<(TimerId, Event)>,
    queue_capacity: usize,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            workers: Vec::new(),
            timers: Vec::new(),
            queue_capacity: DEFAULT_CAPACITY,
        }
    }

    /// Register a worker. Broadcast order follows registration order.
    pub fn worker(mut self, name: impl Into<String>, table: Arc<FsmTable>) -> Self {
        self.workers.push((name.into(), table));
        self
    }

    /// Register a timer that broadcasts `event` on expiry.
    pub fn timer(mut self, id: TimerId, event: Event) -> Self {
        self.timers.push((id, event));
        self
    }

    /// Override the per-queue capacity bound.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Freeze the registry and spawn every thread.
    ///
    /// A failed spawn unwinds the partial start: the timer service and any
    /// workers already running are stopped and joined before the error
    /// returns, so a setup failure never leaves a detached thread behind.
    pub fn start(self) -> Result<Runtime, StartError> {
        if self.workers.is_empty() {
            return Err(StartError::NoWorkers);
        }
        for (i, (name, _)) in self.workers.iter().enumerate() {
            if self.workers[..i].iter().any(|(other, _)| other == name) {
                return Err(StartError::DuplicateWorker(name.clone()));
            }
        }

        let timers = TimerService::new();
        for (id, event) in &self.timers {
            timers.create_timer(*id, *event)?;
        }

        let entries = self
            .workers
            .iter()
            .map(|(name, _)| {
                WorkerEntry::new(
                    name.clone(),
                    Arc::new(EventQueue::with_capacity(self.queue_capacity)),
                )
            })
            .collect();
        let registry = Arc::new(Registry::new(entries));

        let mut timer_thread = Some(timers.start(registry.clone()).map_err(|source| {
            StartError::Spawn {
                thread: "timer-service".into(),
                source,
            }
        })?);

        let mut worker_threads = Vec::with_capacity(self.workers.len());
        for (index, (name, table)) in self.workers.into_iter().enumerate() {
            match worker::spawn(registry.clone(), timers.clone(), index, table) {
                Ok(handle) => worker_threads.push(handle),
                Err(source) => {
                    warn!(worker = %name, %source, "worker spawn failed, unwinding partial start");
                    unwind_partial_start(
                        &registry,
                        &timers,
                        timer_thread.take(),
                        std::mem::take(&mut worker_threads),
                    );
                    return Err(StartError::Spawn {
                        thread: name,
                        source,
                    });
                }
            }
        }

        info!(
            workers = registry.len(),
            timers = timers.snapshot().len(),
            "runtime started"
        );
        Ok(Runtime {
            registry,
            timers,
            timer_thread,
            worker_threads,
            shutdown_flag: Arc::new(AtomicBool::new(false)),
            down: false,
        })
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Stop and join everything a failed `start` already launched. Closing the
/// queues knocks running workers out of their blocking dequeue, so the joins
/// do not depend on any table routing.
fn unwind_partial_start(
    registry: &Registry,
    timers: &TimerService,
    timer_thread: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
) {
    timers.stop();
    registry.close_all();
    for handle in workers {
        let _ = handle.join();
    }
    if let Some(handle) = timer_thread {
        let _ = handle.join();
    }
}

/// A running set of FSM workers plus the timer service.
///
/// All methods take `&self`; the runtime is freely shareable by reference
/// between the owning thread and anything it hands the registry to.
/// Teardown happens exactly once, in [`shutdown`](Self::shutdown) or on
/// drop.
#[derive(Debug)]
pub struct Runtime {
    registry: Arc<Registry>,
    timers: TimerService,
    timer_thread: Option<JoinHandle<()>>,
    worker_threads: Vec<JoinHandle<()>>,
    shutdown_flag: Arc<AtomicBool>,
    down: bool,
}

impl Runtime {
    /// Start declaring a runtime.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Enqueue `event` into every worker's queue in registration order.
    pub fn broadcast(&self, event: Event) {
        self.registry.broadcast(event);
    }

    /// The timer table door: set, get, toggle, snapshot.
    pub fn timers(&self) -> &TimerService {
        &self.timers
    }

    /// The worker registry, for lookups and snapshots.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Snapshot of workers and their last published states.
    pub fn worker_snapshot(&self) -> Vec<WorkerSnapshot> {
        self.registry.snapshot()
    }

    /// Snapshot of the timer table.
    pub fn timer_snapshot(&self) -> Vec<TimerSnapshot> {
        self.timers.snapshot()
    }

    /// Flag flipped by signal handlers to request an orderly shutdown.
    ///
    /// The runtime itself never reads it; the command loop polls it and
    /// calls [`shutdown`](Self::shutdown).
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutdown_flag.clone()
    }

    /// Whether the shutdown flag has been raised.
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_flag.load(Ordering::Relaxed)
    }

    /// Broadcast `Done`, join every worker, stop the timer service, close
    /// the queues.
    ///
    /// Every table is expected to route `Done` to a terminal state whose
    /// entry action calls `exit_worker`; a table that does not is a bug in
    /// the table, and shows up here as a join that never returns.
    pub fn shutdown(mut self) {
        self.shutdown_inner();
    }

    fn shutdown_inner(&mut self) {
        if self.down {
            return;
        }
        self.down = true;

        debug!("shutdown: broadcasting Done");
        self.registry.broadcast(Event::Done);

        for handle in self.worker_threads.drain(..) {
            let name = handle.thread().name().unwrap_or("<worker>").to_string();
            if handle.join().is_err() {
                warn!(worker = %name, "worker panicked before join");
            } else {
                debug!(worker = %name, "joined");
            }
        }

        self.timers.stop();
        if let Some(handle) = self.timer_thread.take() {
            if handle.join().is_err() {
                warn!("timer service panicked before join");
            }
        }

        self.registry.close_all();
        info!("runtime stopped");
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}
