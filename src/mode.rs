//! Output modes selected by the trigger index.

use std::time::Duration;

/// Number of modes reachable by cycling the trigger index.
pub const KNOWN_MODES: usize = 3;

/// Active output behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    SteadyOn,
    Blink,
    Heartbeat,
    /// Any slot outside the known set. Renders as output off.
    Unknown,
}

/// One timed ON/OFF segment of a waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phase {
    pub active: bool,
    pub duration: Duration,
}

impl Phase {
    const fn new(active: bool, millis: u64) -> Self {
        Self {
            active,
            duration: Duration::from_millis(millis),
        }
    }
}

/// How a mode drives a plain output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    /// Hold one level until the mode changes.
    Steady(bool),
    /// Repeat the phases in order until the mode changes.
    Cycle(&'static [Phase]),
}

const BLINK: [Phase; 2] = [Phase::new(true, 500), Phase::new(false, 500)];

const HEARTBEAT: [Phase; 4] = [
    Phase::new(true, 200),
    Phase::new(false, 200),
    Phase::new(true, 200),
    Phase::new(false, 1000),
];

impl Mode {
    /// Derives the mode for an unbounded trigger index.
    pub fn from_index(index: usize) -> Self {
        Self::from_slot(index % KNOWN_MODES)
    }

    /// Maps an already-reduced slot to a mode.
    pub fn from_slot(slot: usize) -> Self {
        match slot {
            0 => Mode::SteadyOn,
            1 => Mode::Blink,
            2 => Mode::Heartbeat,
            _ => Mode::Unknown,
        }
    }

    /// Name of the kernel LED trigger that performs this mode.
    pub fn trigger_name(self) -> &'static str {
        match self {
            Mode::SteadyOn => "default-on",
            Mode::Blink => "timer",
            Mode::Heartbeat => "heartbeat",
            Mode::Unknown => "none",
        }
    }

    pub fn waveform(self) -> Waveform {
        match self {
            Mode::SteadyOn => Waveform::Steady(true),
            Mode::Blink => Waveform::Cycle(&BLINK),
            Mode::Heartbeat => Waveform::Cycle(&HEARTBEAT),
            Mode::Unknown => Waveform::Steady(false),
        }
    }
}
