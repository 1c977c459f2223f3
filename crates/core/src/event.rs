//! Event types for the FSM runtime.

use std::fmt;

/// All events a worker can receive.
///
/// Events are **passive data**: a bare discriminator with no payload. The set
/// is closed at build time so tables can be validated against it, equality is
/// structural, and every event is `Copy`.
///
/// The runtime attaches no meaning to any variant. By convention `Init`
/// starts the machines and `Done` is routed by every table to a terminal
/// state whose entry action exits the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// Start signal, broadcast once after setup.
    Init,
    /// Shutdown signal; tables route this to their terminal state.
    Done,
    /// Pedestrian crossing button.
    Button,
    /// Stoplight turned red.
    Red,
    /// Stoplight turned green.
    Green,
    /// Stoplight turned yellow.
    Yellow,
    /// Light-phase timer expired.
    LightTimer,
    /// Walk-sign blink timer expired.
    BlinkTimer,
}

impl Event {
    /// Stable numeric id, used by the command surface to broadcast by number.
    pub fn id(self) -> u32 {
        match self {
            Event::Init => 0,
            Event::Done => 1,
            Event::Button => 2,
            Event::Red => 3,
            Event::Green => 4,
            Event::Yellow => 5,
            Event::LightTimer => 6,
            Event::BlinkTimer => 7,
        }
    }

    /// Inverse of [`Event::id`]. Returns `None` for ids outside the set.
    pub fn from_id(id: u32) -> Option<Event> {
        Some(match id {
            0 => Event::Init,
            1 => Event::Done,
            2 => Event::Button,
            3 => Event::Red,
            4 => Event::Green,
            5 => Event::Yellow,
            6 => Event::LightTimer,
            7 => Event::BlinkTimer,
            _ => return None,
        })
    }

    /// Event name for diagnostics and trace lines.
    pub fn name(self) -> &'static str {
        match self {
            Event::Init => "Init",
            Event::Done => "Done",
            Event::Button => "Button",
            Event::Red => "Red",
            Event::Green => "Green",
            Event::Yellow => "Yellow",
            Event::LightTimer => "LightTimer",
            Event::BlinkTimer => "BlinkTimer",
        }
    }

    /// Every event in id order.
    pub fn all() -> &'static [Event] {
        &[
            Event::Init,
            Event::Done,
            Event::Button,
            Event::Red,
            Event::Green,
            Event::Yellow,
            Event::LightTimer,
            Event::BlinkTimer,
        ]
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
