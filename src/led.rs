//! Kernel LED class devices driven through their sysfs `trigger` attribute.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};

use log::debug;

use crate::{config::LedCfg, error::DeviceError};

/// Receives the name of the trigger the LED should run.
pub trait TriggerSink: Send {
    fn set_trigger(&mut self, name: &str) -> Result<(), DeviceError>;
}

/// LED under `/sys/class/leds/<name>`.
#[derive(Debug)]
pub struct SysfsLed {
    name: String,
    trigger_path: PathBuf,
}

impl SysfsLed {
    pub fn open(cfg: &LedCfg) -> Result<Self, DeviceError> {
        let dir = cfg.sysfs_root.join(&cfg.name);
        if !dir.is_dir() {
            return Err(DeviceError::NotFound { path: dir });
        }
        Ok(Self {
            name: cfg.name.clone(),
            trigger_path: dir.join("trigger"),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reads the trigger the kernel currently runs for this LED.
    pub fn active_trigger(&self) -> Result<Option<String>, DeviceError> {
        let list = fs::read_to_string(&self.trigger_path)?;
        Ok(parse_active_trigger(&list).map(str::to_owned))
    }
}

impl TriggerSink for SysfsLed {
    fn set_trigger(&mut self, name: &str) -> Result<(), DeviceError> {
        let mut file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.trigger_path)?;
        file.write_all(name.as_bytes())?;
        debug!("LED '{}' trigger set to '{}'", self.name, name);
        Ok(())
    }
}

/// Picks the bracketed entry out of a list like `none [timer] heartbeat`.
fn parse_active_trigger(list: &str) -> Option<&str> {
    list.split_whitespace()
        .find_map(|entry| entry.strip_prefix('[')?.strip_suffix(']'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn fake_led(trigger_list: &str) -> (TempDir, LedCfg) {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("lwsw-led");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("trigger"), trigger_list).unwrap();
        let cfg = LedCfg {
            name: "lwsw-led".to_string(),
            sysfs_root: root.path().to_path_buf(),
        };
        (root, cfg)
    }

    #[test]
    fn parses_bracketed_trigger() {
        assert_eq!(
            parse_active_trigger("none [timer] heartbeat default-on\n"),
            Some("timer")
        );
        assert_eq!(parse_active_trigger("[none] timer"), Some("none"));
        assert_eq!(parse_active_trigger("none timer"), None);
    }

    #[test]
    fn open_missing_led_is_configuration_error() {
        let root = TempDir::new().unwrap();
        let cfg = LedCfg {
            name: "absent".to_string(),
            sysfs_root: root.path().to_path_buf(),
        };
        let err = SysfsLed::open(&cfg).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn set_trigger_writes_name() {
        let (root, cfg) = fake_led("none [default-on] timer heartbeat");
        let mut led = SysfsLed::open(&cfg).unwrap();
        assert_eq!(led.name(), "lwsw-led");

        led.set_trigger("heartbeat").unwrap();

        let written = fs::read_to_string(root.path().join("lwsw-led/trigger")).unwrap();
        assert_eq!(written, "heartbeat");
    }

    #[test]
    fn active_trigger_reads_kernel_list() {
        let (_root, cfg) = fake_led("none default-on [timer] heartbeat\n");
        let led = SysfsLed::open(&cfg).unwrap();
        assert_eq!(led.active_trigger().unwrap(), Some("timer".to_string()));
    }

    #[test]
    fn write_to_vanished_led_is_io_error() {
        let (root, cfg) = fake_led("none");
        let mut led = SysfsLed::open(&cfg).unwrap();
        fs::remove_dir_all(root.path().join("lwsw-led")).unwrap();

        let err = led.set_trigger("timer").unwrap_err();
        assert!(!err.is_configuration());
    }
}
