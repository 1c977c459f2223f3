//! Core types for the switchboard FSM runtime.
//!
//! This crate provides the deterministic heart of the runtime:
//!
//! - [`Event`]: the closed set of discriminators dispatched to every machine
//! - [`FsmTable`]: an immutable table of states and guarded transitions
//! - [`FsmInstance`]: a current-state cursor stepped one event at a time
//! - [`FsmContext`]: the capability surface actions and guards may touch
//!
//! # Architecture
//!
//! The interpreter is built on a simple event-driven model:
//!
//! ```text
//! Event → FsmInstance::step() → StepOutcome (+ side effects via FsmContext)
//! ```
//!
//! The interpreter is:
//! - **Synchronous**: No async, no .await
//! - **Deterministic**: At most one transition per `(state, event)` pair,
//!   enforced when the table is built
//! - **I/O free**: All effects (broadcast, timers) flow through the
//!   [`FsmContext`] handed in by the hosting worker
//!
//! Queues, worker threads, and the timer service live in
//! `switchboard-runtime`, which drives instances of these types.

mod ctx;
mod event;
mod machine;
mod table;

pub use ctx::{ActionFn, FsmContext, GuardFn, TimerId};
pub use event::Event;
pub use machine::{FsmInstance, StepOutcome};
pub use table::{FsmTable, FsmTableBuilder, State, StateId, TableError, Transition};
