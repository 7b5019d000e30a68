//! Application entry point and builder pattern implementation.

use crate::{
    config::Config,
    supervisor::{Hardware, Supervisor},
};
use anyhow::{Result, anyhow};
use log::info;

/// Main application structure tying configuration, hardware and the
/// supervisor together.
///
/// # Example
///
/// ```no_run
/// use ledtrigd::{application::Application, config::Config};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::load(None)?;
/// Application::builder()
///     .with_config(config)
///     .build()?
///     .run()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct Application {
    supervisor: Supervisor,
}

impl Application {
    /// Creates a new ApplicationBuilder for constructing Application instances.
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    /// Runs the daemon until a long press or Ctrl+C, then waits for every
    /// loop to finish.
    pub async fn run(self) -> Result<()> {
        info!("Starting ledtrigd");
        self.supervisor.run().await
    }
}

/// Builder pattern for creating Application instances.
pub struct ApplicationBuilder {
    config: Option<Config>,
    hardware: Option<Hardware>,
}

impl ApplicationBuilder {
    fn new() -> Self {
        Self {
            config: None,
            hardware: None,
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Uses already opened devices instead of the ones named in the config.
    pub fn with_hardware(mut self, hardware: Hardware) -> Self {
        self.hardware = Some(hardware);
        self
    }

    /// Claims the devices and prepares the supervisor.
    ///
    /// Fails before any loop is started if a device cannot be claimed.
    pub fn build(self) -> Result<Application> {
        let config = self
            .config
            .ok_or_else(|| anyhow!("Configuration is required"))?;
        let hardware = match self.hardware {
            Some(hardware) => hardware,
            None => Hardware::from_config(&config)?,
        };

        Ok(Application {
            supervisor: Supervisor::new(&config, hardware),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::DeviceError, gpio::OutputLine, led::TriggerSink};
    use std::{
        sync::{Arc, Mutex},
        thread,
        time::Duration,
    };

    struct NullLine;

    impl OutputLine for NullLine {
        fn set(&mut self, _active: bool) -> Result<(), DeviceError> {
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink(Arc<Mutex<Vec<String>>>);

    impl TriggerSink for RecordingSink {
        fn set_trigger(&mut self, name: &str) -> Result<(), DeviceError> {
            self.0.lock().unwrap().push(name.to_string());
            Ok(())
        }
    }

    #[test]
    fn build_requires_config() {
        let err = Application::builder().build().err().unwrap();
        assert!(err.to_string().contains("Configuration is required"));
    }

    #[test]
    fn build_fails_when_output_chip_is_missing() {
        let mut config = Config::default();
        config.output.chip = "/nonexistent/gpiochip7".to_string();

        let err = Application::builder()
            .with_config(config)
            .build()
            .err()
            .unwrap();

        assert!(format!("{err:#}").contains("/nonexistent/gpiochip7"));
        assert!(crate::error::is_configuration_failure(&err));
    }

    #[tokio::test]
    async fn runs_with_injected_hardware_until_stopped() {
        let sink = RecordingSink::default();
        let hardware = Hardware {
            output: Box::new(NullLine),
            led: Box::new(sink.clone()),
            inputs: Box::new(|| {
                Err(DeviceError::NotFound {
                    path: "/dev/input/event0".into(),
                })
            }),
        };
        let mut config = Config::default();
        config.timing.supervise_ms = 10;

        let app = Application::builder()
            .with_config(config)
            .with_hardware(hardware)
            .build()
            .unwrap();
        let state = app.supervisor.state();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            state.request_stop();
        });

        app.run().await.unwrap();
        stopper.join().unwrap();

        assert_eq!(sink.0.lock().unwrap().first().map(String::as_str), Some("default-on"));
    }
}
