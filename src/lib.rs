//! # ledtrigd
//!
//! A Linux daemon that turns a single push button into a mode selector for an
//! LED and a GPIO output line.
//!
//! ## Behavior
//!
//! - **Short press**: advance to the next mode (steady on, blink, heartbeat)
//! - **Long press**: stop the daemon, as does Ctrl+C
//! - **LED**: the mode is mirrored onto a kernel LED trigger in sysfs
//! - **GPIO**: the same mode is rendered in software on an output line
//!
//! ## Architecture
//!
//! Three control loops run on dedicated threads and share one
//! [`AppState`](app_state::AppState):
//! - [`ButtonMonitor`](button::ButtonMonitor) - reads key edges and updates the state
//! - [`WaveformDriver`](waveform::WaveformDriver) - renders the mode on the output line
//! - [`TriggerCoordinator`](trigger::TriggerCoordinator) - writes the LED trigger
//!
//! The [`Supervisor`](supervisor::Supervisor) starts them, waits for a stop
//! request and joins them in a fixed order.
//!
//! ## Example
//!
//! ```no_run
//! use ledtrigd::{application::Application, config::Config};
//!
//! fn main() -> anyhow::Result<()> {
//!     let app = Application::builder()
//!         .with_config(Config::load(None)?)
//!         .build()?;
//!     tokio::runtime::Builder::new_current_thread()
//!         .enable_all()
//!         .build()?
//!         .block_on(app.run())
//! }
//! ```

pub mod app_state;
pub mod application;
pub mod button;
pub mod config;
pub mod error;
pub mod gpio;
pub mod input;
pub mod led;
pub mod mode;
pub mod supervisor;
pub mod task_manager;
pub mod trigger;
pub mod waveform;
