//! The FSM interpreter: one cursor over one immutable table.

use crate::ctx::FsmContext;
use crate::event::Event;
use crate::table::{FsmTable, State, StateId};
use std::sync::Arc;
use tracing::{debug, trace};

/// Result of delivering one event to an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The transition fired; exit and entry actions have already run.
    Transitioned {
        from: &'static str,
        to: &'static str,
    },
    /// A matching transition exists but its guard returned false. The event
    /// is discarded and no action ran.
    Blocked,
    /// No transition matches `(current, event)`. The event is discarded.
    NoMatch,
}

/// A mutable current-state cursor over a shared immutable table.
///
/// An instance is exclusively owned by its worker thread; nothing here is
/// synchronized. The only mutation is the cursor write inside
/// [`step`](Self::step).
pub struct FsmInstance {
    table: Arc<FsmTable>,
    current: StateId,
}

impl FsmInstance {
    /// Create an instance with the cursor on the table's initial state.
    pub fn new(table: Arc<FsmTable>) -> Self {
        let current = table.initial();
        Self { table, current }
    }

    /// The state the cursor is on.
    pub fn current_state(&self) -> &State {
        self.table.state(self.current)
    }

    /// Run the entry action of the initial state.
    ///
    /// Called once per worker before the first dequeue; this is how the
    /// workload's timers are first armed.
    pub fn initialize(&self, ctx: &dyn FsmContext) {
        let state = self.table.state(self.current);
        trace!(
            worker = ctx.worker_name(),
            state = state.name(),
            "running initial entry action"
        );
        if let Some(entry) = state.entry_action() {
            entry(ctx, state);
        }
    }

    /// Deliver one event.
    ///
    /// Ordering on a fired transition is strict: guard, then the old state's
    /// exit action, then the cursor write, then the new state's entry action.
    /// A `Blocked` or `NoMatch` outcome leaves the cursor untouched and runs
    /// nothing.
    pub fn step(&mut self, ctx: &dyn FsmContext, event: Event) -> StepOutcome {
        let table = self.table.clone();
        let from = table.state(self.current);

        let Some(transition) = table.lookup(self.current, event) else {
            trace!(
                worker = ctx.worker_name(),
                evt = %event,
                state = from.name(),
                "no matching transition, event discarded"
            );
            return StepOutcome::NoMatch;
        };
        let to = table.state(transition.to);

        if let Some(guard) = &transition.guard {
            if !guard(ctx) {
                debug!(
                    worker = ctx.worker_name(),
                    evt = %event,
                    state = from.name(),
                    "transition blocked by guard"
                );
                return StepOutcome::Blocked;
            }
        }

        if let Some(exit) = from.exit_action() {
            exit(ctx, from);
        }
        self.current = transition.to;
        if let Some(entry) = to.entry_action() {
            entry(ctx, to);
        }

        debug!(
            worker = ctx.worker_name(),
            evt = %event,
            from = from.name(),
            to = to.name(),
            "transition"
        );
        StepOutcome::Transitioned {
            from: from.name(),
            to: to.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctx::TimerId;
    use crate::table::FsmTableBuilder;
    use crate::State;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records every capability call in order.
    #[derive(Default)]
    struct Recorder {
        log: Arc<Mutex<Vec<String>>>,
        remaining: Duration,
        exit: std::sync::atomic::AtomicBool,
    }

    impl Recorder {
        fn log_of(&self) -> Arc<Mutex<Vec<String>>> {
            self.log.clone()
        }
    }

    impl FsmContext for Recorder {
        fn broadcast(&self, event: Event) {
            self.log.lock().unwrap().push(format!("broadcast:{event}"));
        }
        fn set_timer(&self, id: TimerId, period: Duration) {
            self.log
                .lock()
                .unwrap()
                .push(format!("set_timer:{id}:{}", period.as_millis()));
        }
        fn remaining(&self, _id: TimerId) -> Duration {
            self.remaining
        }
        fn exit_worker(&self) {
            self.exit.store(true, std::sync::atomic::Ordering::SeqCst);
            self.log.lock().unwrap().push("exit_worker".into());
        }
        fn worker_name(&self) -> &str {
            "test"
        }
    }

    fn logging_state(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> State {
        let entry_log = log.clone();
        let exit_log = log;
        State::new(name)
            .on_entry(move |_, st| {
                entry_log
                    .lock()
                    .unwrap()
                    .push(format!("entry:{}", st.name()))
            })
            .on_exit(move |_, st| exit_log.lock().unwrap().push(format!("exit:{}", st.name())))
    }

    fn two_state_table(log: Arc<Mutex<Vec<String>>>) -> Arc<FsmTable> {
        let mut b = FsmTableBuilder::default();
        let a = b.state(logging_state("A", log.clone()));
        let c = b.state(logging_state("C", log));
        b.transition(a, Event::Init, c);
        b.transition(c, Event::Done, a);
        Arc::new(b.build().unwrap())
    }

    #[test]
    fn initialize_runs_initial_entry_only() {
        let ctx = Recorder::default();
        let log = ctx.log_of();
        let fsm = FsmInstance::new(two_state_table(log.clone()));

        fsm.initialize(&ctx);
        assert_eq!(*log.lock().unwrap(), vec!["entry:A".to_string()]);
        assert_eq!(fsm.current_state().name(), "A");
    }

    #[test]
    fn step_orders_exit_cursor_entry() {
        let ctx = Recorder::default();
        let log = ctx.log_of();
        let mut fsm = FsmInstance::new(two_state_table(log.clone()));

        let outcome = fsm.step(&ctx, Event::Init);
        assert_eq!(
            outcome,
            StepOutcome::Transitioned {
                from: "A",
                to: "C"
            }
        );
        assert_eq!(
            *log.lock().unwrap(),
            vec!["exit:A".to_string(), "entry:C".to_string()]
        );
        assert_eq!(fsm.current_state().name(), "C");
    }

    #[test]
    fn no_match_discards_silently() {
        let ctx = Recorder::default();
        let log = ctx.log_of();
        let mut fsm = FsmInstance::new(two_state_table(log.clone()));

        assert_eq!(fsm.step(&ctx, Event::Button), StepOutcome::NoMatch);
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(fsm.current_state().name(), "A");
    }

    #[test]
    fn guard_false_blocks_without_actions() {
        let ctx = Recorder {
            remaining: Duration::from_millis(50),
            ..Default::default()
        };
        let log = ctx.log_of();

        let mut b = FsmTableBuilder::default();
        let a = b.state(logging_state("A", log.clone()));
        let c = b.state(logging_state("C", log.clone()));
        b.guarded(a, Event::Button, c, |ctx| {
            ctx.remaining(TimerId(1)) > Duration::from_millis(100)
        });
        let mut fsm = FsmInstance::new(Arc::new(b.build().unwrap()));

        assert_eq!(fsm.step(&ctx, Event::Button), StepOutcome::Blocked);
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(fsm.current_state().name(), "A");
    }

    #[test]
    fn guard_true_lets_transition_fire() {
        let ctx = Recorder {
            remaining: Duration::from_millis(500),
            ..Default::default()
        };
        let log = ctx.log_of();

        let mut b = FsmTableBuilder::default();
        let a = b.state(logging_state("A", log.clone()));
        let c = b.state(logging_state("C", log.clone()));
        b.guarded(a, Event::Button, c, |ctx| {
            ctx.remaining(TimerId(1)) > Duration::from_millis(100)
        });
        let mut fsm = FsmInstance::new(Arc::new(b.build().unwrap()));

        assert!(matches!(
            fsm.step(&ctx, Event::Button),
            StepOutcome::Transitioned { .. }
        ));
        assert_eq!(fsm.current_state().name(), "C");
    }

    #[test]
    fn entry_action_may_broadcast_and_arm_timers() {
        let mut b = FsmTableBuilder::default();
        let a = b.state(State::new("A"));
        let c = b.state(State::new("C").on_entry(|ctx, _| {
            ctx.broadcast(Event::Green);
            ctx.set_timer(TimerId(1), Duration::from_millis(1000));
        }));
        b.transition(a, Event::Init, c);
        let mut fsm = FsmInstance::new(Arc::new(b.build().unwrap()));

        let ctx = Recorder::default();
        let log = ctx.log_of();
        fsm.step(&ctx, Event::Init);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["broadcast:Green".to_string(), "set_timer:1:1000".to_string()]
        );
    }

    #[test]
    fn terminal_entry_requests_exit() {
        let mut b = FsmTableBuilder::default();
        let a = b.state(State::new("A"));
        let done = b.state(State::new("Done").on_entry(|ctx, _| ctx.exit_worker()));
        b.transition(a, Event::Done, done);
        let mut fsm = FsmInstance::new(Arc::new(b.build().unwrap()));

        let ctx = Recorder::default();
        fsm.step(&ctx, Event::Done);
        assert!(ctx.exit.load(std::sync::atomic::Ordering::SeqCst));
    }
}
