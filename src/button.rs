//! Button press classification and the loop that applies it.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use log::{debug, info};

use crate::{
    app_state::AppState,
    input::{EdgeSource, KeyEdge, KeyEvent, SourceOpener},
    task_manager::ControlLoop,
};

/// A completed press, with how long the button was held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Press {
    Short(Duration),
    Long(Duration),
}

/// Pairs down and up edges and classifies them by hold time.
///
/// A second down edge while pressed keeps the first timestamp; an up edge
/// without a preceding down is dropped.
#[derive(Debug, Clone)]
pub struct PressClassifier {
    threshold: Duration,
    pressed_at: Option<Instant>,
}

impl PressClassifier {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            pressed_at: None,
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed_at.is_some()
    }

    /// Feeds one edge; returns the press it completes, if any.
    pub fn on_edge(&mut self, event: &KeyEvent) -> Option<Press> {
        match event.edge {
            KeyEdge::Down => {
                self.pressed_at.get_or_insert(event.at);
                None
            }
            KeyEdge::Up => {
                let down = self.pressed_at.take()?;
                let held = event.at.saturating_duration_since(down);
                Some(if held < self.threshold {
                    Press::Short(held)
                } else {
                    Press::Long(held)
                })
            }
        }
    }
}

/// Applies classified presses to the shared state.
struct PressHandler {
    state: Arc<AppState>,
    classifier: PressClassifier,
}

impl PressHandler {
    /// Reads edges until the state stops running.
    fn watch(&mut self, source: &mut dyn EdgeSource, input_wait: Duration) -> Result<()> {
        while self.state.is_running() {
            let events = source
                .next_edges(input_wait)
                .context("Waiting for button input failed")?;
            for event in &events {
                // Edges queued behind a stop are not applied.
                if !self.state.is_running() {
                    break;
                }
                if let Some(press) = self.classifier.on_edge(event) {
                    self.apply(press);
                }
            }
        }
        Ok(())
    }

    fn apply(&self, press: Press) {
        match press {
            Press::Short(held) => {
                let index = self.state.advance_trigger();
                info!(
                    "Short press detected ({} ms), trigger index now {index}",
                    held.as_millis()
                );
            }
            Press::Long(held) => {
                info!("Long press detected ({} ms), stopping", held.as_millis());
                if !self.state.request_stop() {
                    debug!("Stop was already requested");
                }
            }
        }
    }
}

/// Turns button presses into state changes: a short press advances the
/// trigger, a long press stops the daemon.
///
/// The input devices are opened on the loop's own thread and closed when the
/// loop returns, whatever the exit path.
pub struct ButtonMonitor {
    handler: PressHandler,
    input_wait: Duration,
    open: SourceOpener,
}

impl ButtonMonitor {
    pub fn new(
        state: Arc<AppState>,
        threshold: Duration,
        input_wait: Duration,
        open: SourceOpener,
    ) -> Self {
        Self {
            handler: PressHandler {
                state,
                classifier: PressClassifier::new(threshold),
            },
            input_wait,
            open,
        }
    }
}

impl ControlLoop for ButtonMonitor {
    fn name(&self) -> &'static str {
        "ButtonMonitor"
    }

    fn run(self: Box<Self>) -> Result<()> {
        let ButtonMonitor {
            mut handler,
            input_wait,
            open,
        } = *self;
        let mut source = open().context("Failed to open input devices")?;

        let result = handler.watch(source.as_mut(), input_wait);
        drop(source);
        info!("Monitoring button events ended");
        result
    }
}
