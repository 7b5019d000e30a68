//! Errors raised by the hardware collaborators.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Failure reported by a GPIO line, LED sysfs entry or input device.
///
/// Variants split into configuration problems (the device cannot be claimed
/// at all) and I/O problems (a claimed device failed mid-operation). Both are
/// fatal to the loop that owns the device and to nothing else.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("GPIO line {line} on {chip} is already in use")]
    LineBusy { chip: String, line: u32 },

    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("device {} does not exist", path.display())]
    NotFound { path: PathBuf },

    #[error("device {} hung up or reported an error", path.display())]
    Hangup { path: PathBuf },

    #[error("GPIO request failed: {0}")]
    Gpio(#[from] gpio_cdev::Error),

    #[error("device I/O failed: {0}")]
    Io(#[from] io::Error),
}

impl DeviceError {
    /// True when the device could not be claimed, as opposed to failing
    /// after it was claimed.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DeviceError::LineBusy { .. } | DeviceError::Open { .. } | DeviceError::NotFound { .. }
        )
    }
}

/// True when any cause in `err` is a [`DeviceError`] that could not be
/// claimed.
pub fn is_configuration_failure(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<DeviceError>())
        .any(DeviceError::is_configuration)
}
