//! Mirrors the trigger index onto a kernel LED trigger.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use log::info;

use crate::{app_state::AppState, led::TriggerSink, mode::Mode, task_manager::ControlLoop};

/// Writes the trigger name of the current mode to the LED, once at start and
/// once for every observed index change. The kernel renders the waveform.
pub struct TriggerCoordinator {
    state: Arc<AppState>,
    sink: Box<dyn TriggerSink>,
    poll: Duration,
}

impl TriggerCoordinator {
    pub fn new(state: Arc<AppState>, sink: Box<dyn TriggerSink>, poll: Duration) -> Self {
        Self { state, sink, poll }
    }

    fn apply(&mut self, index: usize) -> Result<()> {
        let name = Mode::from_index(index).trigger_name();
        self.sink
            .set_trigger(name)
            .with_context(|| format!("Failed to set LED trigger '{name}'"))?;
        info!("LED trigger switched to '{name}' (index {index})");
        Ok(())
    }
}

impl ControlLoop for TriggerCoordinator {
    fn name(&self) -> &'static str {
        "TriggerCoordinator"
    }

    fn run(mut self: Box<Self>) -> Result<()> {
        let mut observed = self.state.current_trigger();
        self.apply(observed)?;

        loop {
            self.state.wait_for_change(observed, self.poll);
            if !self.state.is_running() {
                break;
            }
            let index = self.state.current_trigger();
            if index != observed {
                observed = index;
                self.apply(index)?;
            }
        }

        info!("Trigger coordinator stopped");
        Ok(())
    }
}
