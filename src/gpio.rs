//! Digital output line on a GPIO character device.

use std::path::PathBuf;

use gpio_cdev::{Chip, LineHandle, LineRequestFlags};
use log::info;

use crate::{config::OutputCfg, error::DeviceError};

/// A single digital output driven by one control loop.
pub trait OutputLine: Send {
    /// Drives the line to its active (`true`) or inactive level.
    fn set(&mut self, active: bool) -> Result<(), DeviceError>;
}

/// Output line claimed through the GPIO character device.
///
/// Polarity is handled by the kernel: with `active_low` set, `set(true)`
/// pulls the pin low. The line is released when this value is dropped.
pub struct GpioOutput {
    handle: LineHandle,
    active: bool,
}

impl GpioOutput {
    /// Claims and configures the line described by `cfg`.
    ///
    /// Fails with [`DeviceError::LineBusy`] if another consumer holds it.
    pub fn configure(cfg: &OutputCfg) -> Result<Self, DeviceError> {
        let path = chip_path(&cfg.chip);
        if !path.exists() {
            return Err(DeviceError::NotFound { path });
        }
        let mut chip = Chip::new(&path)?;
        let line = chip.get_line(cfg.line)?;

        ensure_unclaimed(line.info()?.is_used(), cfg)?;

        let mut flags = LineRequestFlags::OUTPUT;
        if cfg.active_low {
            flags |= LineRequestFlags::ACTIVE_LOW;
        }
        let handle = line.request(flags, u8::from(cfg.initial_active), &cfg.consumer)?;

        info!(
            "Claimed GPIO line {} on {} as '{}' (active_low: {})",
            cfg.line, cfg.chip, cfg.consumer, cfg.active_low
        );
        Ok(Self {
            handle,
            active: cfg.initial_active,
        })
    }

    /// Last level written to the line.
    pub fn level(&self) -> bool {
        self.active
    }
}

impl OutputLine for GpioOutput {
    fn set(&mut self, active: bool) -> Result<(), DeviceError> {
        self.handle.set_value(u8::from(active))?;
        self.active = active;
        Ok(())
    }
}

/// Refuses a line that another consumer, or an earlier `configure`, holds.
fn ensure_unclaimed(in_use: bool, cfg: &OutputCfg) -> Result<(), DeviceError> {
    if in_use {
        return Err(DeviceError::LineBusy {
            chip: cfg.chip.clone(),
            line: cfg.line,
        });
    }
    Ok(())
}

/// Resolves a bare chip name such as `gpiochip0` under `/dev`.
fn chip_path(chip: &str) -> PathBuf {
    let path = PathBuf::from(chip);
    if path.is_absolute() {
        path
    } else {
        PathBuf::from("/dev").join(path)
    }
}
