//! Capability surface handed to actions and guards.

use crate::event::Event;
use crate::table::State;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Identifies one timer in the timer service.
///
/// Ids are plain numbers so the command surface can address timers
/// symbolically (`t1` toggles timer 1). Uniqueness is enforced by the timer
/// service when the timer is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u32);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Runtime capabilities visible from inside a state machine.
///
/// Actions and guards never hold references into the runtime; everything they
/// are allowed to do goes through this trait. The hosting worker supplies the
/// implementation, so the same table can run under the real runtime or under
/// a recording context in tests.
///
/// Actions may broadcast and arm timers but must not block indefinitely: the
/// worker thread runs them inline and dequeues nothing until they return.
pub trait FsmContext {
    /// Enqueue `event` into every worker's queue, this worker included.
    ///
    /// Returns once all enqueues have completed; the self-delivered copy is
    /// observed on the next loop iteration, never re-entrantly.
    fn broadcast(&self, event: Event);

    /// Arm timer `id` to fire periodically every `period`.
    ///
    /// A zero period disarms. Unknown ids are logged and ignored; a missing
    /// timer is a wiring bug, not a reason to kill the worker.
    fn set_timer(&self, id: TimerId, period: Duration);

    /// Time remaining before timer `id` next fires; zero when disarmed or
    /// unknown.
    fn remaining(&self, id: TimerId) -> Duration;

    /// End the worker loop after the current action returns.
    fn exit_worker(&self);

    /// Name of the worker running this machine, for diagnostics.
    fn worker_name(&self) -> &str;
}

/// Entry/exit action: runs with the runtime capabilities and the state being
/// entered or exited.
pub type ActionFn = Arc<dyn Fn(&dyn FsmContext, &State) + Send + Sync>;

/// Transition guard: pure predicate over externally observable state.
/// Returning `false` suppresses the transition and discards the event.
pub type GuardFn = Arc<dyn Fn(&dyn FsmContext) -> bool + Send + Sync>;
