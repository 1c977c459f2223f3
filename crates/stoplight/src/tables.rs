//! The stoplight and crosswalk transition tables.
//!
//! The stoplight drives everything: its entry actions broadcast the current
//! color and re-arm the light timer, and the crosswalk only ever reacts to
//! those color broadcasts. Both tables route `Done` from every state to a
//! terminal state that exits the worker.

use crate::timing::TimingProfile;
use std::sync::Arc;
use std::time::Duration;
use switchboard_core::{Event, FsmTable, State, TableError, TimerId};

/// Drives the light phases; broadcasts [`Event::LightTimer`].
pub const LIGHT_TIMER: TimerId = TimerId(1);

/// Drives the walk-sign blink warning; broadcasts [`Event::BlinkTimer`].
pub const BLINK_TIMER: TimerId = TimerId(2);

/// Build the stoplight table.
///
/// ```text
/// Init ──Init──► Green ──LightTimer──► Yellow ──LightTimer──► Red
///                  │  ▲                                        │
///            Button│  └────────────────LightTimer──────────────┘
///      [enough time│remaining]
///                  ▼
///          GreenWithButton ──LightTimer──► Yellow
/// ```
///
/// A button press is only honored while more than `t_but` remains on the
/// light timer; otherwise the green phase is already about to end and the
/// press is discarded by the guard.
pub fn stoplight(timing: &TimingProfile) -> Result<Arc<FsmTable>, TableError> {
    let t = *timing;
    let mut b = FsmTable::builder();

    let init = b.state(State::new("Init"));
    let green = b.state(State::new("Green").on_entry(move |ctx, _| {
        ctx.broadcast(Event::Green);
        ctx.set_timer(LIGHT_TIMER, t.t_norm());
    }));
    let yellow = b.state(State::new("Yellow").on_entry(move |ctx, _| {
        ctx.broadcast(Event::Yellow);
        ctx.set_timer(LIGHT_TIMER, t.t_fast());
    }));
    let red = b.state(State::new("Red").on_entry(move |ctx, _| {
        ctx.broadcast(Event::Red);
        ctx.set_timer(LIGHT_TIMER, t.t_norm());
    }));
    let green_btn = b.state(
        State::new("GreenWithButton")
            .on_entry(move |ctx, _| ctx.set_timer(LIGHT_TIMER, t.t_but())),
    );
    let done = b.state(State::new("Done").on_entry(|ctx, _| ctx.exit_worker()));

    b.transition(init, Event::Init, green);
    b.transition(green, Event::LightTimer, yellow);
    b.transition(yellow, Event::LightTimer, red);
    b.transition(red, Event::LightTimer, green);
    b.guarded(green, Event::Button, green_btn, move |ctx| {
        ctx.remaining(LIGHT_TIMER) > t.t_but()
    });
    b.transition(green_btn, Event::LightTimer, yellow);
    for s in [init, green, yellow, red, green_btn] {
        b.transition(s, Event::Done, done);
    }

    Ok(Arc::new(b.build()?))
}

/// Build the crosswalk table.
///
/// The crosswalk never reads the light timer; it follows the color
/// broadcasts. Walking time ends with a blink warning `t_walk` after the
/// walk sign lights, driven by the blink timer.
pub fn crosswalk(timing: &TimingProfile) -> Result<Arc<FsmTable>, TableError> {
    let t = *timing;
    let mut b = FsmTable::builder();

    let init = b.state(State::new("Init"));
    let dontwalk = b.state(
        State::new("DontWalk").on_entry(move |ctx, _| ctx.set_timer(BLINK_TIMER, Duration::ZERO)),
    );
    let walk = b.state(
        State::new("Walk").on_entry(move |ctx, _| ctx.set_timer(BLINK_TIMER, t.t_walk())),
    );
    let blink = b.state(
        State::new("BlinkingWalk")
            .on_entry(move |ctx, _| ctx.set_timer(BLINK_TIMER, Duration::ZERO)),
    );
    let done = b.state(State::new("Done").on_entry(|ctx, _| ctx.exit_worker()));

    b.transition(init, Event::Green, dontwalk);
    b.transition(init, Event::Red, walk);
    b.transition(dontwalk, Event::Red, walk);
    b.transition(walk, Event::BlinkTimer, blink);
    b.transition(walk, Event::Green, dontwalk);
    b.transition(blink, Event::Green, dontwalk);
    for s in [init, dontwalk, walk, blink] {
        b.transition(s, Event::Done, done);
    }

    Ok(Arc::new(b.build()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_build() {
        let timing = TimingProfile::from_millis(100);
        let light = stoplight(&timing).unwrap();
        let cross = crosswalk(&timing).unwrap();

        assert_eq!(light.state(light.initial()).name(), "Init");
        assert_eq!(cross.state(cross.initial()).name(), "Init");
    }

    #[test]
    fn both_tables_route_done_from_every_live_state() {
        let timing = TimingProfile::from_millis(100);

        // Every non-terminal state must route Done somewhere, or shutdown
        // would hang that worker.
        for table in [stoplight(&timing).unwrap(), crosswalk(&timing).unwrap()] {
            for (id, state) in table.states() {
                if state.name() == "Done" {
                    continue;
                }
                assert!(
                    table.lookup(id, Event::Done).is_some(),
                    "state {} lacks a Done route",
                    state.name()
                );
            }
        }
    }
}
