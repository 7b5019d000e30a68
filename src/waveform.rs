//! Software waveform rendering of the active mode onto an output line.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use log::{debug, info};

use crate::{
    app_state::AppState,
    gpio::OutputLine,
    mode::{Mode, Waveform},
    task_manager::ControlLoop,
};

/// Drives an output line through the ON/OFF pattern of the current mode.
///
/// Whenever the trigger index moves, the current phase is abandoned and the
/// new mode starts from its first phase. On stop the line keeps whatever
/// level it had last.
pub struct WaveformDriver {
    state: Arc<AppState>,
    output: Box<dyn OutputLine>,
    idle_poll: Duration,
}

impl WaveformDriver {
    pub fn new(state: Arc<AppState>, output: Box<dyn OutputLine>, idle_poll: Duration) -> Self {
        Self {
            state,
            output,
            idle_poll,
        }
    }

    /// Renders `waveform` until the index leaves `index` or a stop arrives.
    fn render(&mut self, index: usize, waveform: Waveform) -> Result<()> {
        match waveform {
            Waveform::Steady(active) => {
                self.drive(active)?;
                while !self.state.wait_for_change(index, self.idle_poll) {}
            }
            Waveform::Cycle(phases) => {
                for phase in phases.iter().cycle() {
                    self.drive(phase.active)?;
                    if self.state.wait_for_change(index, phase.duration) {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn drive(&mut self, active: bool) -> Result<()> {
        self.output
            .set(active)
            .with_context(|| format!("Failed to drive output line {}", level_name(active)))
    }
}

impl ControlLoop for WaveformDriver {
    fn name(&self) -> &'static str {
        "WaveformDriver"
    }

    fn run(mut self: Box<Self>) -> Result<()> {
        while self.state.is_running() {
            let index = self.state.current_trigger();
            let mode = Mode::from_index(index);
            debug!("Rendering {mode:?} for trigger index {index}");
            self.render(index, mode.waveform())?;
        }
        info!("Waveform driver stopped");
        Ok(())
    }
}

fn level_name(active: bool) -> &'static str {
    if active { "active" } else { "inactive" }
}
