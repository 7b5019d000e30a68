//! Shared application state read by every control loop.

use std::{
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::{Duration, Instant},
};

use event_listener::{Event, Listener};

/// Lock-free state shared between the supervisor and the control loops.
///
/// The two fields are independent atomics: nothing ever needs them to change
/// together. `running` goes from `true` to `false` exactly once and never
/// back. `trigger_index` only ever grows; consumers derive the active mode
/// with a modulo, so advancing the mode is a single `fetch_add` with no
/// read-modify-write window.
///
/// Every mutation also notifies `changed`, which lets waiting loops wake up
/// before their poll deadline.
pub struct AppState {
    running: AtomicBool,
    trigger_index: AtomicUsize,
    changed: Event,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            trigger_index: AtomicUsize::new(0),
            changed: Event::new(),
        }
    }

    /// Returns `true` until a stop has been requested.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Requests shutdown. Idempotent and safe from any thread.
    ///
    /// Returns `true` only for the call that actually flipped the flag.
    pub fn request_stop(&self) -> bool {
        let was_running = self.running.swap(false, Ordering::AcqRel);
        if was_running {
            self.changed.notify(usize::MAX);
        }
        was_running
    }

    /// Advances to the next trigger and returns the new index.
    pub fn advance_trigger(&self) -> usize {
        let next = self
            .trigger_index
            .fetch_add(1, Ordering::AcqRel)
            .wrapping_add(1);
        self.changed.notify(usize::MAX);
        next
    }

    pub fn current_trigger(&self) -> usize {
        self.trigger_index.load(Ordering::Acquire)
    }

    /// True once a stop was requested or the index moved past `observed`.
    pub fn changed_since(&self, observed: usize) -> bool {
        !self.is_running() || self.current_trigger() != observed
    }

    /// Blocks until the trigger index differs from `observed`, a stop is
    /// requested, or `timeout` elapses.
    ///
    /// Returns `true` if a change (or stop) was seen.
    pub fn wait_for_change(&self, observed: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.changed_since(observed) {
                return true;
            }
            // Register before re-checking so a notification between the two
            // checks is not lost.
            let listener = self.changed.listen();
            if self.changed_since(observed) {
                return true;
            }
            if listener.wait_deadline(deadline).is_none() {
                return self.changed_since(observed);
            }
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
