//! Reference workload for the switchboard runtime.
//!
//! Two cooperating machines: a stoplight cycling Green → Yellow → Red on a
//! light timer, and a crosswalk that follows the light's color broadcasts.
//! A pedestrian button shortens the green phase when enough time remains.
//!
//! The crate also carries the command console the binary and the end-to-end
//! tests drive: single-character commands (`g`, `b`, `s`, `x`, ...) fed from
//! stdin or a script file, all funneling into `Runtime::broadcast` and the
//! timer door.

pub mod command;
pub mod tables;
pub mod timing;

pub use command::{Commands, Outcome};
pub use tables::{crosswalk, stoplight, BLINK_TIMER, LIGHT_TIMER};
pub use timing::TimingProfile;
