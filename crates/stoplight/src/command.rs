//! The command console.
//!
//! A tiny character language, interpreted token by token from interactive
//! input or a script file. Every command funnels into the runtime's public
//! surface: `broadcast`, the timer door, and the diagnostic snapshots.

use crate::timing::TimingProfile;
use std::fs;
use std::path::PathBuf;
use std::thread;
use switchboard_core::{Event, TimerId};
use switchboard_runtime::Runtime;
use tracing::{debug, warn};

/// What the caller should do after a line has been interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Keep reading input.
    Continue,
    /// `x`/`q` was seen: `Done` is broadcast, stop reading and shut down.
    Exit,
}

/// Interprets command characters against a running [`Runtime`].
pub struct Commands<'rt> {
    runtime: &'rt Runtime,
    timing: TimingProfile,
    script: Option<PathBuf>,
}

impl<'rt> Commands<'rt> {
    pub fn new(runtime: &'rt Runtime, timing: TimingProfile, script: Option<PathBuf>) -> Self {
        Self {
            runtime,
            timing,
            script,
        }
    }

    /// Interpret one line of commands.
    pub fn run_line(&self, line: &str) -> Outcome {
        self.interpret(line, false)
    }

    /// Run the configured script file from the beginning.
    ///
    /// Comment lines are echoed, blank lines skipped, everything else is fed
    /// to the same interpreter as interactive input.
    pub fn run_script(&self) -> std::io::Result<Outcome> {
        let Some(path) = &self.script else {
            warn!("no script file configured");
            return Ok(Outcome::Continue);
        };
        debug!(script = %path.display(), "running script");
        let text = fs::read_to_string(path)?;
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(comment) = trimmed.strip_prefix('#') {
                println!("COMMENT:{}", comment.trim());
                continue;
            }
            if self.interpret(trimmed, true) == Outcome::Exit {
                return Ok(Outcome::Exit);
            }
        }
        Ok(Outcome::Continue)
    }

    fn interpret(&self, line: &str, in_script: bool) -> Outcome {
        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                'x' | 'q' => {
                    self.runtime.broadcast(Event::Done);
                    return Outcome::Exit;
                }
                'g' => self.runtime.broadcast(Event::Init),
                'b' => self.runtime.broadcast(Event::Button),
                'e' => match parse_number(&mut chars) {
                    Some(id) => match Event::from_id(id) {
                        Some(event) => self.runtime.broadcast(event),
                        None => warn!(id, "unknown event id, ignored"),
                    },
                    None => warn!("'e' needs a numeric event id"),
                },
                't' => match parse_number(&mut chars) {
                    Some(id) => {
                        if let Err(err) = self.runtime.timers().toggle_timer(TimerId(id)) {
                            warn!(%err, "toggle ignored");
                        }
                    }
                    None => warn!("'t' needs a numeric timer id"),
                },
                'n' => match parse_number(&mut chars) {
                    Some(ticks) => {
                        debug!(ticks, "napping");
                        thread::sleep(self.timing.tick() * ticks);
                    }
                    None => warn!("'n' needs a tick count"),
                },
                's' => self.show_status(),
                'w' => self.show_workers(),
                'r' => {
                    if in_script {
                        warn!("'r' inside a script is ignored");
                    } else if let Err(err) = self.run_script() {
                        warn!(%err, "script failed");
                    }
                }
                'h' => print_help(),
                c if c.is_whitespace() => {}
                other => warn!(cmd = %other, "unknown command, ignored"),
            }
        }
        Outcome::Continue
    }

    fn show_status(&self) {
        println!("*** status");
        println!("timers");
        println!("{:>3} {:<12} {:>9} {:>10}", "id", "event", "period", "remaining");
        for t in self.runtime.timer_snapshot() {
            println!(
                "{:>3} {:<12} {:>7}ms {:>8}ms",
                t.id,
                t.event.name(),
                t.period.as_millis(),
                t.remaining.as_millis()
            );
        }
        self.show_workers();
        println!("*** end status");
    }

    fn show_workers(&self) {
        println!("workers");
        println!("{:<12} {:>6} {}", "name", "queued", "state");
        for w in self.runtime.worker_snapshot() {
            println!("{:<12} {:>6} {}", w.name, w.queued, w.state);
        }
    }
}

fn parse_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<u32> {
    while chars.peek().is_some_and(|c| *c == ' ') {
        chars.next();
    }
    let mut digits = String::new();
    while chars.peek().is_some_and(|c| c.is_ascii_digit()) {
        digits.push(chars.next().unwrap());
    }
    digits.parse().ok()
}

fn print_help() {
    println!("commands:");
    println!("  x,q  broadcast Done and exit (workers join, process ends)");
    println!("  g    broadcast Init to start the FSMs");
    println!("  b    crosswalk button press");
    println!("  eN   broadcast the event with numeric id N");
    println!("  tN   toggle timer N");
    println!("  n N  nap N ticks (workers and timers keep running)");
    println!("  s    show timers and workers");
    println!("  w    show workers and current states");
    println!("  r    run the configured script file");
    println!("  h    this help");
}
