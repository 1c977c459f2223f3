//! End-to-end scenarios for the stoplight workload.
//!
//! Every test drives the system through the same command layer the binary
//! uses, with a 100 ms tick so the suite stays fast. Sleeps land mid-phase
//! (at least one tick away from any timer edge) to keep assertions off the
//! race windows.

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use switchboard_core::Event;
use switchboard_runtime::Runtime;
use switchboard_stoplight::{
    crosswalk, stoplight, Commands, Outcome, TimingProfile, BLINK_TIMER, LIGHT_TIMER,
};
use tracing_test::traced_test;

const TICK_MS: u64 = 100;

fn fixture() -> (Runtime, TimingProfile) {
    let timing = TimingProfile::from_millis(TICK_MS);
    let runtime = Runtime::builder()
        .worker("stoplight", stoplight(&timing).unwrap())
        .worker("crosswalk", crosswalk(&timing).unwrap())
        .timer(LIGHT_TIMER, Event::LightTimer)
        .timer(BLINK_TIMER, Event::BlinkTimer)
        .start()
        .unwrap();
    (runtime, timing)
}

fn state_of(rt: &Runtime, worker: &str) -> &'static str {
    rt.registry()
        .worker_named(worker)
        .map(|w| w.state)
        .unwrap_or("<missing>")
}

fn wait_for_state(rt: &Runtime, worker: &str, state: &str) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if state_of(rt, worker) == state {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn normal_light_cycle() {
    // Scenario A: start, wait mid-green, inspect.
    let (rt, timing) = fixture();
    let cmd = Commands::new(&rt, timing, None);

    cmd.run_line("g n5 s");
    assert_eq!(state_of(&rt, "stoplight"), "Green");
    assert_eq!(state_of(&rt, "crosswalk"), "DontWalk");

    let light = rt
        .timer_snapshot()
        .into_iter()
        .find(|t| t.id == LIGHT_TIMER)
        .unwrap();
    assert_eq!(light.period, timing.t_norm());
    assert!(light.remaining > Duration::ZERO && light.remaining <= timing.t_norm());

    rt.shutdown();
}

#[test]
fn button_press_honored_early_in_green() {
    // Scenario B: plenty of green left, the press shortens the phase.
    let (rt, timing) = fixture();
    let cmd = Commands::new(&rt, timing, None);

    cmd.run_line("g n1 b");
    assert!(wait_for_state(&rt, "stoplight", "GreenWithButton"));
    let light = rt
        .timer_snapshot()
        .into_iter()
        .find(|t| t.id == LIGHT_TIMER)
        .unwrap();
    assert_eq!(light.period, timing.t_but());

    cmd.run_line("n2");
    assert_eq!(state_of(&rt, "stoplight"), "Yellow");

    rt.shutdown();
}

#[test]
fn button_press_rejected_near_end_of_green() {
    // Scenario C: under t_but remains, the guard discards the press. The
    // extra half-tick sleep keeps the remaining time clearly below the
    // threshold instead of straddling it.
    let (rt, timing) = fixture();
    let cmd = Commands::new(&rt, timing, None);

    cmd.run_line("g n9");
    thread::sleep(timing.tick() / 2);
    cmd.run_line("b");

    thread::sleep(Duration::from_millis(20));
    assert_eq!(state_of(&rt, "stoplight"), "Green");
    let light = rt
        .timer_snapshot()
        .into_iter()
        .find(|t| t.id == LIGHT_TIMER)
        .unwrap();
    assert_eq!(light.period, timing.t_norm(), "guard must not re-arm the light");

    rt.shutdown();
}

#[test]
fn crosswalk_follows_the_light() {
    // Scenario D: walk only once the light is red.
    let (rt, timing) = fixture();
    let cmd = Commands::new(&rt, timing, None);

    cmd.run_line("g n11 s");
    assert_eq!(state_of(&rt, "stoplight"), "Yellow");
    assert_eq!(state_of(&rt, "crosswalk"), "DontWalk");

    cmd.run_line("n3 s");
    assert_eq!(state_of(&rt, "stoplight"), "Red");
    assert_eq!(state_of(&rt, "crosswalk"), "Walk");

    rt.shutdown();
}

#[test]
fn walk_sign_blinks_before_green_returns() {
    // Red starts at 13 ticks; blink warning t_walk = 7 ticks later; green
    // again at 23 ticks.
    let (rt, timing) = fixture();
    let cmd = Commands::new(&rt, timing, None);

    cmd.run_line("g n14");
    assert_eq!(state_of(&rt, "crosswalk"), "Walk");

    cmd.run_line("n7");
    assert_eq!(state_of(&rt, "crosswalk"), "BlinkingWalk");

    cmd.run_line("n3");
    assert_eq!(state_of(&rt, "crosswalk"), "DontWalk");
    assert_eq!(state_of(&rt, "stoplight"), "Green");

    rt.shutdown();
}

#[test]
fn clean_shutdown_joins_everything() {
    // Scenario E: 'x' broadcasts Done; shutdown must finish promptly.
    let (rt, timing) = fixture();
    {
        let cmd = Commands::new(&rt, timing, None);
        cmd.run_line("g n5");
        assert_eq!(cmd.run_line("x"), Outcome::Exit);
    }

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        rt.shutdown();
        tx.send(()).unwrap();
    });
    rx.recv_timeout(Duration::from_secs(5))
        .expect("shutdown did not complete after Done");
}

#[test]
#[traced_test]
fn unknown_event_id_is_discarded() {
    // Scenario F: e99 is outside the event set; nothing moves, one warning.
    let (rt, timing) = fixture();
    let cmd = Commands::new(&rt, timing, None);

    cmd.run_line("g");
    assert!(wait_for_state(&rt, "stoplight", "Green"));

    cmd.run_line("e99 s");
    thread::sleep(Duration::from_millis(30));
    assert_eq!(state_of(&rt, "stoplight"), "Green");
    assert_eq!(state_of(&rt, "crosswalk"), "DontWalk");
    assert!(logs_contain("unknown event id"));

    rt.shutdown();
}

#[test]
fn toggle_freezes_and_restores_the_light_timer() {
    let (rt, timing) = fixture();
    let cmd = Commands::new(&rt, timing, None);

    cmd.run_line("g n1 t1");
    assert_eq!(
        rt.timers().get_period(LIGHT_TIMER).unwrap(),
        Duration::ZERO
    );

    // Frozen: no light timer, no phase change.
    cmd.run_line("n2");
    assert_eq!(state_of(&rt, "stoplight"), "Green");

    cmd.run_line("t1");
    assert_eq!(rt.timers().get_period(LIGHT_TIMER).unwrap(), timing.t_norm());

    rt.shutdown();
}

#[test]
fn script_file_drives_the_same_interpreter() {
    let script = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data/demo.script");
    let (rt, timing) = fixture();
    {
        let cmd = Commands::new(&rt, timing, Some(script));
        let outcome = cmd.run_script().unwrap();
        assert_eq!(outcome, Outcome::Exit);
        assert!(wait_for_state(&rt, "stoplight", "Done"));
    }

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        rt.shutdown();
        tx.send(()).unwrap();
    });
    rx.recv_timeout(Duration::from_secs(5))
        .expect("shutdown did not complete after scripted exit");
}
