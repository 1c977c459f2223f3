//! Timer service: deadline-driven event injection.
//!
//! One service thread multiplexes every timer. The table of timers lives
//! behind a single mutex; callers arm, disarm, and query through it, and the
//! service thread sleeps on the nearest deadline with a 200 ms cap so a
//! newly created timer or a stop request is noticed promptly. On expiry the
//! timer's event is broadcast through the registry like any other event, and
//! the deadline advances by one period (timers are periodic until disarmed).

use crate::registry::Registry;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use switchboard_core::{Event, TimerId};
use thiserror::Error;
use tracing::{debug, trace};

/// Upper bound on one multiplexed wait, for cooperative shutdown.
const MAX_WAIT: Duration = Duration::from_millis(200);

/// Errors from timer operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TimerError {
    /// `create_timer` was called with an id already in the table.
    #[error("timer {0} already exists")]
    Duplicate(TimerId),

    /// The id is not in the table.
    #[error("unknown timer {0}")]
    Unknown(TimerId),
}

/// Diagnostic snapshot of one timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerSnapshot {
    /// Timer id.
    pub id: TimerId,
    /// Event broadcast on expiry.
    pub event: Event,
    /// Configured period; zero when disarmed.
    pub period: Duration,
    /// Time until the next fire; zero when disarmed.
    pub remaining: Duration,
}

#[derive(Debug)]
struct TimerSlot {
    id: TimerId,
    event: Event,
    /// Current period; zero means disarmed.
    period: Duration,
    /// Last nonzero period, restored by toggle.
    previous_period: Duration,
    /// Next fire time; `None` while disarmed.
    deadline: Option<Instant>,
}

#[derive(Debug)]
struct Table {
    timers: Vec<TimerSlot>,
    stopping: bool,
}

impl Table {
    fn slot_mut(&mut self, id: TimerId) -> Result<&mut TimerSlot, TimerError> {
        self.timers
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(TimerError::Unknown(id))
    }

    fn slot(&self, id: TimerId) -> Result<&TimerSlot, TimerError> {
        self.timers
            .iter()
            .find(|t| t.id == id)
            .ok_or(TimerError::Unknown(id))
    }

    /// Collect every expired timer and advance its deadline by one period.
    ///
    /// A wake that arrives several periods late fires once, matching the
    /// one-broadcast-per-wake behavior of a readable periodic clock; the
    /// next deadline snaps forward past `now` so a stall does not produce a
    /// burst.
    fn collect_expired(&mut self, now: Instant) -> Vec<(TimerId, Event)> {
        let mut fired = Vec::new();
        for slot in &mut self.timers {
            let Some(deadline) = slot.deadline else {
                continue;
            };
            if deadline <= now {
                fired.push((slot.id, slot.event));
                let mut next = deadline + slot.period;
                if next <= now {
                    next = now + slot.period;
                }
                slot.deadline = Some(next);
            }
        }
        fired
    }

    /// Time until the nearest armed deadline, capped at [`MAX_WAIT`].
    fn next_wait(&self, now: Instant) -> Duration {
        self.timers
            .iter()
            .filter_map(|t| t.deadline)
            .map(|d| d.saturating_duration_since(now))
            .min()
            .unwrap_or(MAX_WAIT)
            .min(MAX_WAIT)
    }
}

#[derive(Debug)]
struct Shared {
    table: Mutex<Table>,
    wake: Condvar,
}

/// Handle to the timer table, cloneable across threads.
///
/// All operations lock the table mutex; nothing outside this module ever
/// holds a reference to timer state. The service thread itself is spawned by
/// [`TimerService::start`] and owned by the runtime.
#[derive(Debug, Clone)]
pub struct TimerService {
    shared: Arc<Shared>,
}

impl TimerService {
    /// Create an empty timer table. The service thread starts separately.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                table: Mutex::new(Table {
                    timers: Vec::new(),
                    stopping: false,
                }),
                wake: Condvar::new(),
            }),
        }
    }

    /// Register a new timer, disarmed. Fails if the id is already present.
    pub fn create_timer(&self, id: TimerId, event: Event) -> Result<(), TimerError> {
        let mut table = self.shared.table.lock();
        if table.timers.iter().any(|t| t.id == id) {
            return Err(TimerError::Duplicate(id));
        }
        table.timers.push(TimerSlot {
            id,
            event,
            period: Duration::ZERO,
            previous_period: Duration::ZERO,
            deadline: None,
        });
        self.shared.wake.notify_one();
        debug!(timer = %id, evt = %event, "timer created");
        Ok(())
    }

    /// Arm `id` to fire every `period`; a zero period disarms.
    ///
    /// The last nonzero period is remembered so
    /// [`toggle_timer`](Self::toggle_timer) can restore it. Re-arming a
    /// running timer resets its next deadline to one full period from now.
    pub fn set_timer(&self, id: TimerId, period: Duration) -> Result<(), TimerError> {
        let mut table = self.shared.table.lock();
        let slot = table.slot_mut(id)?;
        if !slot.period.is_zero() {
            slot.previous_period = slot.period;
        }
        slot.period = period;
        slot.deadline = if period.is_zero() {
            None
        } else {
            Some(Instant::now() + period)
        };
        debug!(timer = %id, evt = %slot.event, period_ms = period.as_millis() as u64, "timer set");
        self.shared.wake.notify_one();
        Ok(())
    }

    /// Time remaining before `id` next fires; zero when disarmed.
    pub fn get_timer(&self, id: TimerId) -> Result<Duration, TimerError> {
        let table = self.shared.table.lock();
        let slot = table.slot(id)?;
        Ok(slot
            .deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::ZERO))
    }

    /// Currently configured period; zero when disarmed.
    pub fn get_period(&self, id: TimerId) -> Result<Duration, TimerError> {
        let table = self.shared.table.lock();
        Ok(table.slot(id)?.period)
    }

    /// Disarm an armed timer, or restore the previous period of a disarmed
    /// one.
    pub fn toggle_timer(&self, id: TimerId) -> Result<(), TimerError> {
        let restore = {
            let table = self.shared.table.lock();
            let slot = table.slot(id)?;
            if slot.period.is_zero() {
                Some(slot.previous_period)
            } else {
                None
            }
        };
        match restore {
            Some(previous) => {
                debug!(timer = %id, "timer restore");
                self.set_timer(id, previous)
            }
            None => {
                debug!(timer = %id, "timer off");
                self.set_timer(id, Duration::ZERO)
            }
        }
    }

    /// Snapshot of every timer for diagnostics.
    pub fn snapshot(&self) -> Vec<TimerSnapshot> {
        let now = Instant::now();
        let table = self.shared.table.lock();
        table
            .timers
            .iter()
            .map(|t| TimerSnapshot {
                id: t.id,
                event: t.event,
                period: t.period,
                remaining: t
                    .deadline
                    .map(|d| d.saturating_duration_since(now))
                    .unwrap_or(Duration::ZERO),
            })
            .collect()
    }

    /// Spawn the service thread. Expired timers broadcast through `registry`.
    pub(crate) fn start(&self, registry: Arc<Registry>) -> std::io::Result<JoinHandle<()>> {
        let shared = self.shared.clone();
        thread::Builder::new()
            .name("timer-service".into())
            .spawn(move || run_service(shared, registry))
    }

    /// Ask the service thread to exit. Pending deadlines are discarded.
    pub(crate) fn stop(&self) {
        let mut table = self.shared.table.lock();
        table.stopping = true;
        self.shared.wake.notify_all();
    }
}

impl Default for TimerService {
    fn default() -> Self {
        Self::new()
    }
}

fn run_service(shared: Arc<Shared>, registry: Arc<Registry>) {
    let mut table = shared.table.lock();
    loop {
        if table.stopping {
            break;
        }

        let now = Instant::now();
        let fired = table.collect_expired(now);
        if !fired.is_empty() {
            // Broadcast without the table lock so entry actions arming
            // timers from worker threads are never blocked on the service.
            MutexGuard::unlocked(&mut table, || {
                for (id, event) in fired {
                    trace!(timer = %id, evt = %event, "timer expired");
                    registry.broadcast(event);
                }
            });
            continue;
        }

        let wait = table.next_wait(now);
        shared.wake.wait_for(&mut table, wait);
    }
    debug!("timer service stopped");
}
