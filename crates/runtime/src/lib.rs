//! Blocking-thread runtime for switchboard FSMs.
//!
//! This crate wraps the deterministic core with real OS threads:
//!
//! - One worker thread per registered FSM, blocking on its own FIFO queue
//! - A registry that broadcasts every event to every queue in registration
//!   order
//! - A timer service thread that turns deadline expiries back into
//!   broadcast events
//! - A shutdown coordinator: broadcast `Done`, join every worker, stop the
//!   timers
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Runtime                              │
//! │                                                              │
//! │  producers (CLI thread, timer service, any entry action)     │
//! │        │ broadcast(E)                                        │
//! │        ▼                                                     │
//! │  Registry ──enqueue──► queue₀ ──dequeue──► worker₀: step()   │
//! │            ──enqueue──► queue₁ ──dequeue──► worker₁: step()  │
//! │                                                              │
//! │  TimerService: sleep-until-deadline ──► broadcast(evt)       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The registry is frozen before any thread starts, so broadcast iterates it
//! without a lock. Per-queue FIFO is the only cross-thread ordering
//! guarantee; each FSM is independent.

mod queue;
mod registry;
mod runtime;
mod timer;
mod worker;

pub use queue::{EventQueue, QueueError};
pub use registry::{Registry, WorkerSnapshot};
pub use runtime::{Runtime, RuntimeBuilder, StartError};
pub use timer::{TimerError, TimerService, TimerSnapshot};
