//! Stoplight demo binary.
//!
//! Hosts the stoplight and crosswalk FSMs under the switchboard runtime and
//! drives them from a small command console.
//!
//! # Usage
//!
//! ```bash
//! # Interactive, one-second tick
//! stoplight
//!
//! # Fast tick with FSM transition tracing
//! stoplight -t 100 -d 0x01
//!
//! # Regression run: feed a script, never touch stdin
//! stoplight -n -s demo.script
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use signal_hook::consts::{SIGINT, SIGTERM};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use switchboard_core::Event;
use switchboard_runtime::Runtime;
use switchboard_stoplight::{
    crosswalk, stoplight, Commands, Outcome, TimingProfile, BLINK_TIMER, LIGHT_TIMER,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Debug bitmask bits, kept compatible with the scripted diagnostics.
const DBG_TRANS: u32 = 0x01;
const DBG_EVENTS: u32 = 0x02;
const DBG_TIMERS: u32 = 0x04;
const DBG_WORKERS: u32 = 0x10;
const DBG_VERBOSE: u32 = 0x20;

/// Stoplight / crosswalk FSM demo.
#[derive(Parser, Debug)]
#[command(name = "stoplight", version, about, long_about = None)]
struct Cli {
    /// Base tick in milliseconds, multiplied into all workload timeouts
    #[arg(short = 't', long, default_value_t = 1000)]
    tick: u64,

    /// Script file with commands to run
    #[arg(short = 's', long)]
    script: Option<PathBuf>,

    /// Non-interactive: read commands only from the script file
    #[arg(short = 'n', long)]
    non_interactive: bool,

    /// Debug bitmask in hex: 0x01 transitions, 0x02 events, 0x04 timers,
    /// 0x10 worker lifecycle, 0x20 verbose
    #[arg(short = 'd', long)]
    debug: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let debug_bits = match &cli.debug {
        Some(raw) => parse_debug_bits(raw).with_context(|| format!("bad -d value {raw:?}"))?,
        None => 0,
    };
    init_tracing(debug_bits);

    if cli.tick == 0 {
        bail!("tick must be at least 1 ms");
    }
    if cli.non_interactive && cli.script.is_none() {
        bail!("-n requires a script file (-s)");
    }

    let timing = TimingProfile::from_millis(cli.tick);
    let runtime = Runtime::builder()
        .worker("stoplight", stoplight(&timing).context("stoplight table")?)
        .worker("crosswalk", crosswalk(&timing).context("crosswalk table")?)
        .timer(LIGHT_TIMER, Event::LightTimer)
        .timer(BLINK_TIMER, Event::BlinkTimer)
        .start()
        .context("starting runtime")?;

    // SIGINT/SIGTERM raise the flag; the input loop notices and turns it
    // into a Done broadcast, so teardown is always the orderly path.
    let flag = runtime.shutdown_flag();
    signal_hook::flag::register(SIGINT, flag.clone()).context("registering SIGINT")?;
    signal_hook::flag::register(SIGTERM, flag).context("registering SIGTERM")?;

    let commands = Commands::new(&runtime, timing, cli.script.clone());

    if cli.non_interactive {
        commands.run_script().context("running script")?;
    } else {
        interactive_loop(&runtime, &commands)?;
    }

    runtime.shutdown();
    Ok(())
}

fn interactive_loop(runtime: &Runtime, commands: &Commands<'_>) -> Result<()> {
    println!("Enter commands (g: start FSMs, h: help, x: exit)");
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        if runtime.shutdown_requested() {
            debug!("shutdown requested by signal");
            runtime.broadcast(Event::Done);
            break;
        }
        print!("> ");
        io::stdout().flush().ok();

        match lines.next() {
            Some(Ok(line)) => {
                if commands.run_line(&line) == Outcome::Exit {
                    break;
                }
            }
            Some(Err(err)) if err.kind() == io::ErrorKind::Interrupted => {
                // Signal arrived mid-read; loop around to check the flag.
                continue;
            }
            Some(Err(err)) => return Err(err).context("reading stdin"),
            None => {
                // EOF behaves like 'x'.
                runtime.broadcast(Event::Done);
                break;
            }
        }
    }
    Ok(())
}

fn parse_debug_bits(raw: &str) -> Result<u32> {
    let trimmed = raw.trim().trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(trimmed, 16).context("expected a hex bitmask, e.g. 0x05")
}

/// Map the debug bitmask onto tracing targets. `RUST_LOG` still wins when
/// set and no bits were requested.
fn init_tracing(bits: u32) {
    let filter = if bits == 0 {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    } else {
        let mut directives = vec!["info".to_string()];
        if bits & DBG_TRANS != 0 {
            directives.push("switchboard_core::machine=debug".into());
        }
        if bits & DBG_EVENTS != 0 {
            directives.push("switchboard_runtime::registry=trace".into());
            directives.push("switchboard_runtime::worker=trace".into());
        }
        if bits & DBG_TIMERS != 0 {
            directives.push("switchboard_runtime::timer=trace".into());
        }
        if bits & DBG_WORKERS != 0 {
            directives.push("switchboard_runtime::worker=debug".into());
            directives.push("switchboard_runtime::runtime=debug".into());
        }
        if bits & DBG_VERBOSE != 0 {
            directives.push("switchboard_core=trace".into());
            directives.push("switchboard_runtime=trace".into());
            directives.push("switchboard_stoplight=trace".into());
        }
        EnvFilter::new(directives.join(","))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
