//! Configuration management for the ledtrigd daemon.
//!
//! Handles loading, parsing, and validation of the YAML file describing the
//! input devices, the output line, the LED and loop timings.

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

/// Main configuration structure.
///
/// Every field has a default, so an empty document (apart from `version`)
/// describes the reference board.
///
/// # Example
///
/// ```yaml
/// version: 1
/// long_press_ms: 500
/// input_devices: ["/dev/input/event0"]
/// output:
///   chip: gpiochip0
///   line: 17
///   consumer: ex3-BL
///   active_low: false
///   initial_active: true
/// led:
///   name: lwsw-led
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Configuration version for compatibility checking.
    pub version: u8,

    /// Presses held at least this long stop the daemon.
    #[serde(default = "defaults::long_press_ms")]
    pub long_press_ms: u64,

    /// Input devices watched for button edges.
    #[serde(default = "defaults::input_devices")]
    pub input_devices: Vec<PathBuf>,

    /// GPIO line driven with the software waveform.
    #[serde(default)]
    pub output: OutputCfg,

    /// LED class device switched between kernel triggers.
    #[serde(default)]
    pub led: LedCfg,

    /// Poll and wait intervals of the control loops.
    #[serde(default)]
    pub timing: TimingCfg,
}

/// Output line selection and polarity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputCfg {
    /// Chip name (`gpiochip0`) or absolute device path.
    #[serde(default = "defaults::chip")]
    pub chip: String,

    /// Line offset on the chip.
    #[serde(default = "defaults::line")]
    pub line: u32,

    /// Consumer label shown by `gpioinfo`.
    #[serde(default = "defaults::consumer")]
    pub consumer: String,

    #[serde(default)]
    pub active_low: bool,

    /// Level driven once startup completes.
    #[serde(default = "defaults::initial_active")]
    pub initial_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedCfg {
    /// LED class device name.
    #[serde(default = "defaults::led_name")]
    pub name: String,

    #[serde(default = "defaults::sysfs_root")]
    pub sysfs_root: PathBuf,
}

/// Loop timings in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingCfg {
    /// Upper bound of one input readiness wait.
    #[serde(default = "defaults::input_wait_ms")]
    pub input_wait_ms: u64,

    /// Re-check period while a steady level is held.
    #[serde(default = "defaults::idle_poll_ms")]
    pub idle_poll_ms: u64,

    /// Re-check period of the LED trigger coordinator.
    #[serde(default = "defaults::trigger_poll_ms")]
    pub trigger_poll_ms: u64,

    /// Supervisor check period.
    #[serde(default = "defaults::supervise_ms")]
    pub supervise_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            long_press_ms: defaults::long_press_ms(),
            input_devices: defaults::input_devices(),
            output: OutputCfg::default(),
            led: LedCfg::default(),
            timing: TimingCfg::default(),
        }
    }
}

impl Default for OutputCfg {
    fn default() -> Self {
        Self {
            chip: defaults::chip(),
            line: defaults::line(),
            consumer: defaults::consumer(),
            active_low: false,
            initial_active: defaults::initial_active(),
        }
    }
}

impl Default for LedCfg {
    fn default() -> Self {
        Self {
            name: defaults::led_name(),
            sysfs_root: defaults::sysfs_root(),
        }
    }
}

impl Default for TimingCfg {
    fn default() -> Self {
        Self {
            input_wait_ms: defaults::input_wait_ms(),
            idle_poll_ms: defaults::idle_poll_ms(),
            trigger_poll_ms: defaults::trigger_poll_ms(),
            supervise_ms: defaults::supervise_ms(),
        }
    }
}

impl TimingCfg {
    pub fn input_wait(&self) -> Duration {
        Duration::from_millis(self.input_wait_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    pub fn trigger_poll(&self) -> Duration {
        Duration::from_millis(self.trigger_poll_ms)
    }

    pub fn supervise(&self) -> Duration {
        Duration::from_millis(self.supervise_ms)
    }
}

impl Config {
    /// Loads configuration from `path` or the standard locations.
    ///
    /// Searches in the following order:
    /// 1. Provided path parameter
    /// 2. LEDTRIGD_CONFIG environment variable
    /// 3. XDG_CONFIG_HOME/ledtrigd/config.yml or ~/.config/ledtrigd/config.yml
    /// 4. /etc/ledtrigd/config.yml
    ///
    /// Falls back to the built-in defaults when no file exists.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        match path.or_else(locate_config) {
            Some(config_path) => {
                info!("Loading config from: {}", config_path.display());
                Self::load_from_path(&config_path)
            }
            None => {
                warn!("No configuration file found, using built-in defaults");
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Parses and validates one configuration file.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML in: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Configuration validation failed for: {}", path.display()))?;

        Ok(config)
    }

    /// Checks values that would make a loop spin or never match.
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            anyhow::bail!("Unsupported config version {}", self.version);
        }
        if self.input_devices.is_empty() {
            anyhow::bail!("At least one input device is required");
        }
        if self.long_press_ms == 0 {
            anyhow::bail!("long_press_ms must be greater than zero");
        }
        if self.output.consumer.is_empty() {
            anyhow::bail!("Output consumer label cannot be empty");
        }
        if self.led.name.is_empty() {
            anyhow::bail!("LED name cannot be empty");
        }

        let timings = [
            ("input_wait_ms", self.timing.input_wait_ms),
            ("idle_poll_ms", self.timing.idle_poll_ms),
            ("trigger_poll_ms", self.timing.trigger_poll_ms),
            ("supervise_ms", self.timing.supervise_ms),
        ];
        if let Some((name, _)) = timings.iter().find(|(_, ms)| *ms == 0) {
            anyhow::bail!("Timing '{name}' must be greater than zero");
        }

        Ok(())
    }

    pub fn long_press(&self) -> Duration {
        Duration::from_millis(self.long_press_ms)
    }
}

mod defaults {
    use std::path::PathBuf;

    pub fn long_press_ms() -> u64 {
        500
    }

    pub fn input_devices() -> Vec<PathBuf> {
        vec![PathBuf::from("/dev/input/event0")]
    }

    pub fn chip() -> String {
        "gpiochip0".to_string()
    }

    pub fn line() -> u32 {
        17
    }

    pub fn consumer() -> String {
        "ex3-BL".to_string()
    }

    pub fn initial_active() -> bool {
        true
    }

    pub fn led_name() -> String {
        "lwsw-led".to_string()
    }

    pub fn sysfs_root() -> PathBuf {
        PathBuf::from("/sys/class/leds")
    }

    pub fn input_wait_ms() -> u64 {
        10
    }

    pub fn idle_poll_ms() -> u64 {
        500
    }

    pub fn trigger_poll_ms() -> u64 {
        100
    }

    pub fn supervise_ms() -> u64 {
        100
    }
}

fn locate_config() -> Option<PathBuf> {
    if let Ok(env_path) = env::var("LEDTRIGD_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    if let Some(mut cfg_dir) = env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|h| Path::new(&h).join(".config")))
    {
        cfg_dir.push("ledtrigd/config.yml");
        if cfg_dir.exists() {
            return Some(cfg_dir);
        }
    }

    let etc = Path::new("/etc/ledtrigd/config.yml");
    etc.exists().then(|| etc.to_path_buf())
}
