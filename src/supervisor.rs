//! Supervisor owning the shared state and the lifecycle of every loop.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use log::{error, info, warn};
use tokio::signal::unix::{Signal, SignalKind, signal};

use crate::{
    app_state::AppState,
    button::ButtonMonitor,
    config::Config,
    gpio::{GpioOutput, OutputLine},
    input::{EpollInputs, SourceOpener},
    led::{SysfsLed, TriggerSink},
    task_manager::{ControlLoop, TaskManager},
    trigger::TriggerCoordinator,
    waveform::WaveformDriver,
};

/// Device handles handed to the loops. Each one ends up owned by exactly one
/// loop.
pub struct Hardware {
    pub output: Box<dyn OutputLine>,
    pub led: Box<dyn TriggerSink>,
    /// Input devices are opened later, by the button loop itself.
    pub inputs: SourceOpener,
}

impl Hardware {
    /// Claims the output line and the LED described by `config`.
    ///
    /// Any failure here aborts startup before a single loop runs.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut output =
            GpioOutput::configure(&config.output).context("Failed to initialize output line")?;
        // Blank the line, then bring it to its configured level.
        output
            .set(false)
            .and_then(|()| output.set(config.output.initial_active))
            .context("Failed to set initial output level")?;
        info!("Output line ready, level active: {}", output.level());

        let led = SysfsLed::open(&config.led).context("Failed to initialize LED")?;
        match led.active_trigger() {
            Ok(Some(trigger)) => info!("LED '{}' currently runs trigger '{trigger}'", led.name()),
            Ok(None) => info!("LED '{}' reports no active trigger", led.name()),
            Err(e) => warn!("Cannot read current trigger of LED '{}': {e}", led.name()),
        }

        Ok(Self {
            output: Box::new(output),
            led: Box::new(led),
            inputs: EpollInputs::opener(config.input_devices.clone()),
        })
    }
}

/// Starts the control loops, waits for a stop request and joins them.
///
/// Loops are started and joined in a fixed order: ButtonMonitor,
/// WaveformDriver, TriggerCoordinator. Shutdown is cooperative: the
/// supervisor only flips the shared run flag and waits.
pub struct Supervisor {
    state: Arc<AppState>,
    loops: Vec<Box<dyn ControlLoop>>,
    task_manager: TaskManager,
    supervise_interval: Duration,
}

impl Supervisor {
    pub fn new(config: &Config, hardware: Hardware) -> Self {
        let state = Arc::new(AppState::new());
        let Hardware {
            output,
            led,
            inputs,
        } = hardware;

        let loops: Vec<Box<dyn ControlLoop>> = vec![
            Box::new(ButtonMonitor::new(
                state.clone(),
                config.long_press(),
                config.timing.input_wait(),
                inputs,
            )),
            Box::new(WaveformDriver::new(
                state.clone(),
                output,
                config.timing.idle_poll(),
            )),
            Box::new(TriggerCoordinator::new(
                state.clone(),
                led,
                config.timing.trigger_poll(),
            )),
        ];

        Self {
            state,
            loops,
            task_manager: TaskManager::new(),
            supervise_interval: config.timing.supervise(),
        }
    }

    /// Shared state driven by this supervisor.
    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    /// Runs the complete lifecycle: start loops, wait for stop, join loops.
    ///
    /// The interrupt handler is in place before the first loop starts.
    pub async fn run(mut self) -> Result<()> {
        let interrupt = match signal(SignalKind::interrupt()) {
            Ok(interrupt) => Some(interrupt),
            Err(e) => {
                error!("Failed to listen for shutdown signal: {e}");
                None
            }
        };
        self.start()?;
        self.wait_for_stop(interrupt).await;
        self.shutdown();
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        let loops = std::mem::take(&mut self.loops);
        info!("Starting {} loops", loops.len());
        for control_loop in loops {
            if let Err(e) = self.task_manager.spawn(control_loop) {
                // Never leave a partially started set of loops behind.
                self.state.request_stop();
                self.shutdown();
                return Err(e);
            }
        }
        Ok(())
    }

    /// Polls the run flag and treats Ctrl+C like a long press.
    async fn wait_for_stop(&self, mut interrupt: Option<Signal>) {
        let mut ticker = tokio::time::interval(self.supervise_interval);

        while self.state.is_running() {
            tokio::select! {
                Some(()) = next_interrupt(&mut interrupt) => {
                    info!("Received Ctrl+C, initiating graceful shutdown...");
                    self.state.request_stop();
                }
                _ = ticker.tick() => {}
            }
        }
        info!("Stop requested, waiting for loops to finish");
    }

    fn shutdown(&mut self) {
        if let Err(e) = self.task_manager.join_all() {
            warn!("{e:#}");
        }
        info!("Shutdown complete");
    }
}

/// Next SIGINT, or never when no handler could be installed.
async fn next_interrupt(interrupt: &mut Option<Signal>) -> Option<()> {
    match interrupt {
        Some(interrupt) => interrupt.recv().await,
        None => std::future::pending().await,
    }
}
