//! State and transition tables.
//!
//! A table is immutable once built. [`FsmTableBuilder::build`] rejects any
//! table that is not a deterministic FSM, so the interpreter can assume at
//! most one matching row per `(state, event)` pair.

use crate::ctx::{ActionFn, FsmContext, GuardFn};
use crate::event::Event;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Index of a state within its own table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateId(pub(crate) usize);

impl StateId {
    /// Raw index, for diagnostics.
    pub fn index(self) -> usize {
        self.0
    }
}

/// One state: a name plus optional entry and exit actions.
#[derive(Clone)]
pub struct State {
    name: &'static str,
    entry: Option<ActionFn>,
    exit: Option<ActionFn>,
}

impl State {
    /// Create a state with no actions.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entry: None,
            exit: None,
        }
    }

    /// Attach an entry action, run after the cursor moves onto this state.
    pub fn on_entry(
        mut self,
        action: impl Fn(&dyn FsmContext, &State) + Send + Sync + 'static,
    ) -> Self {
        self.entry = Some(Arc::new(action));
        self
    }

    /// Attach an exit action, run before the cursor leaves this state.
    pub fn on_exit(
        mut self,
        action: impl Fn(&dyn FsmContext, &State) + Send + Sync + 'static,
    ) -> Self {
        self.exit = Some(Arc::new(action));
        self
    }

    /// State name, unique within its table.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn entry_action(&self) -> Option<&ActionFn> {
        self.entry.as_ref()
    }

    pub(crate) fn exit_action(&self) -> Option<&ActionFn> {
        self.exit.as_ref()
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("name", &self.name)
            .field("entry", &self.entry.is_some())
            .field("exit", &self.exit.is_some())
            .finish()
    }
}

/// One edge in the state graph.
pub struct Transition {
    pub(crate) from: StateId,
    pub(crate) event: Event,
    pub(crate) guard: Option<GuardFn>,
    pub(crate) to: StateId,
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("from", &self.from)
            .field("event", &self.event)
            .field("guarded", &self.guard.is_some())
            .field("to", &self.to)
            .finish()
    }
}

/// Errors detected while building a table.
#[derive(Debug, Error)]
pub enum TableError {
    /// A table with no transitions has no initial state.
    #[error("table has no transitions")]
    Empty,

    /// A transition names a state that is not in this table.
    #[error("transition references unknown state index {0}")]
    UnknownState(usize),

    /// Two transitions share a `(from, event)` pair.
    #[error("nondeterministic table: duplicate transition for ({state}, {event})")]
    NondeterministicTransition {
        state: &'static str,
        event: Event,
    },

    /// Two states share a name, which would make diagnostics ambiguous.
    #[error("duplicate state name {0:?}")]
    DuplicateStateName(&'static str),
}

/// An immutable, validated FSM definition.
///
/// The initial state is the `from` state of the first transition added.
pub struct FsmTable {
    states: Vec<State>,
    transitions: Vec<Transition>,
    initial: StateId,
}

impl FsmTable {
    /// Start building a table.
    pub fn builder() -> FsmTableBuilder {
        FsmTableBuilder::default()
    }

    /// The state the cursor starts on.
    pub fn initial(&self) -> StateId {
        self.initial
    }

    /// Look up a state by id. Ids handed out by the builder are always valid.
    pub fn state(&self, id: StateId) -> &State {
        &self.states[id.0]
    }

    /// Number of states.
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Iterate every state with its id, in declaration order.
    pub fn states(&self) -> impl Iterator<Item = (StateId, &State)> {
        self.states.iter().enumerate().map(|(i, s)| (StateId(i), s))
    }

    /// The unique transition out of `from` on `event`, if any.
    pub fn lookup(&self, from: StateId, event: Event) -> Option<&Transition> {
        self.transitions
            .iter()
            .find(|t| t.from == from && t.event == event)
    }
}

impl fmt::Debug for FsmTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsmTable")
            .field("states", &self.states.len())
            .field("transitions", &self.transitions.len())
            .field("initial", &self.state(self.initial).name())
            .finish()
    }
}

/// Builder for [`FsmTable`].
///
/// States are declared first; transitions reference them by the returned
/// [`StateId`]. All determinism checks run in [`build`](Self::build), so a
/// bad table is rejected before any worker spawns.
#[derive(Default)]
pub struct FsmTableBuilder {
    states: Vec<State>,
    transitions: Vec<Transition>,
}

impl FsmTableBuilder {
    /// Declare a state and get its id.
    pub fn state(&mut self, state: State) -> StateId {
        let id = StateId(self.states.len());
        self.states.push(state);
        id
    }

    /// Add an unguarded transition.
    pub fn transition(&mut self, from: StateId, event: Event, to: StateId) -> &mut Self {
        self.transitions.push(Transition {
            from,
            event,
            guard: None,
            to,
        });
        self
    }

    /// Add a guarded transition.
    pub fn guarded(
        &mut self,
        from: StateId,
        event: Event,
        to: StateId,
        guard: impl Fn(&dyn FsmContext) -> bool + Send + Sync + 'static,
    ) -> &mut Self {
        self.transitions.push(Transition {
            from,
            event,
            guard: Some(Arc::new(guard)),
            to,
        });
        self
    }

    /// Validate and freeze the table.
    pub fn build(self) -> Result<FsmTable, TableError> {
        let Some(first) = self.transitions.first() else {
            return Err(TableError::Empty);
        };
        let initial = first.from;

        for t in &self.transitions {
            for id in [t.from, t.to] {
                if id.0 >= self.states.len() {
                    return Err(TableError::UnknownState(id.0));
                }
            }
        }

        for (i, a) in self.transitions.iter().enumerate() {
            if self.transitions[..i]
                .iter()
                .any(|b| b.from == a.from && b.event == a.event)
            {
                return Err(TableError::NondeterministicTransition {
                    state: self.states[a.from.0].name(),
                    event: a.event,
                });
            }
        }

        for (i, s) in self.states.iter().enumerate() {
            if self.states[..i].iter().any(|other| other.name() == s.name()) {
                return Err(TableError::DuplicateStateName(s.name()));
            }
        }

        Ok(FsmTable {
            states: self.states,
            transitions: self.transitions,
            initial,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_is_first_transition_from() {
        let mut b = FsmTable::builder();
        let a = b.state(State::new("A"));
        let z = b.state(State::new("Z"));
        b.transition(z, Event::Init, a);
        b.transition(a, Event::Done, z);
        let table = b.build().unwrap();
        assert_eq!(table.initial(), z);
        assert_eq!(table.state(table.initial()).name(), "Z");
    }

    #[test]
    fn empty_table_rejected() {
        let b = FsmTable::builder();
        assert!(matches!(b.build(), Err(TableError::Empty)));
    }

    #[test]
    fn duplicate_pair_rejected() {
        let mut b = FsmTable::builder();
        let a = b.state(State::new("A"));
        let c = b.state(State::new("C"));
        b.transition(a, Event::Init, c);
        b.transition(a, Event::Init, a);
        match b.build() {
            Err(TableError::NondeterministicTransition { state, event }) => {
                assert_eq!(state, "A");
                assert_eq!(event, Event::Init);
            }
            other => panic!("expected nondeterminism error, got {other:?}"),
        }
    }

    #[test]
    fn guarded_duplicate_still_rejected() {
        // Guards do not make a duplicate pair deterministic; the table must
        // have at most one row per (state, event) regardless.
        let mut b = FsmTable::builder();
        let a = b.state(State::new("A"));
        let c = b.state(State::new("C"));
        b.guarded(a, Event::Button, c, |_| true);
        b.guarded(a, Event::Button, a, |_| false);
        assert!(matches!(
            b.build(),
            Err(TableError::NondeterministicTransition { .. })
        ));
    }

    #[test]
    fn out_of_range_state_id_rejected() {
        // An id smuggled in from another table's builder.
        let foreign = StateId(4);

        let mut b = FsmTable::builder();
        let a = b.state(State::new("A"));
        b.transition(a, Event::Init, foreign);
        assert!(matches!(b.build(), Err(TableError::UnknownState(4))));
    }

    #[test]
    fn duplicate_state_name_rejected() {
        let mut b = FsmTable::builder();
        let a = b.state(State::new("A"));
        let a2 = b.state(State::new("A"));
        b.transition(a, Event::Init, a2);
        assert!(matches!(
            b.build(),
            Err(TableError::DuplicateStateName("A"))
        ));
    }

    #[test]
    fn lookup_finds_unique_row() {
        let mut b = FsmTable::builder();
        let a = b.state(State::new("A"));
        let c = b.state(State::new("C"));
        b.transition(a, Event::Init, c);
        b.transition(c, Event::Done, a);
        let table = b.build().unwrap();

        let t = table.lookup(a, Event::Init).unwrap();
        assert_eq!(t.to, c);
        assert!(table.lookup(a, Event::Done).is_none());
    }
}
