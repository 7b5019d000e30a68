//! Raw Linux input devices (`/dev/input/event*`) multiplexed with epoll.

use std::{
    fs::{File, OpenOptions},
    io::{self, Read},
    mem,
    os::{
        fd::{AsRawFd, FromRawFd, OwnedFd},
        unix::fs::OpenOptionsExt,
    },
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use log::{debug, info};

use crate::error::DeviceError;

/// `EV_KEY` from `linux/input-event-codes.h`.
pub const EV_KEY: u16 = 0x01;

const MAX_EVENTS: usize = 10;
const RECORD_SIZE: usize = mem::size_of::<libc::input_event>();

/// Direction of a key transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEdge {
    Down,
    Up,
}

/// A key edge stamped with the moment it was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub edge: KeyEdge,
    pub code: u16,
    pub at: Instant,
}

/// Source of key edges for the button monitor.
pub trait EdgeSource: Send {
    /// Waits up to `timeout` for input and returns the key edges read.
    ///
    /// An empty vector means the wait timed out.
    fn next_edges(&mut self, timeout: Duration) -> Result<Vec<KeyEvent>, DeviceError>;
}

/// Deferred open of an edge source, run on the thread that will own it.
pub type SourceOpener = Box<dyn FnOnce() -> Result<Box<dyn EdgeSource>, DeviceError> + Send>;

/// Decodes one kernel `input_event` record into a key edge.
///
/// The record is `timeval` followed by `u16 type`, `u16 code`, `i32 value`.
/// Reading from the tail keeps this independent of the `timeval` width.
/// Non-key events and autorepeat (`value == 2`) yield `None`.
pub fn decode_record(record: &[u8], at: Instant) -> Option<KeyEvent> {
    let tail = record.len().checked_sub(8).map(|start| &record[start..])?;
    let kind = u16::from_ne_bytes([tail[0], tail[1]]);
    let code = u16::from_ne_bytes([tail[2], tail[3]]);
    let value = i32::from_ne_bytes([tail[4], tail[5], tail[6], tail[7]]);

    if kind != EV_KEY {
        return None;
    }
    let edge = match value {
        1 => KeyEdge::Down,
        0 => KeyEdge::Up,
        _ => return None,
    };
    Some(KeyEvent { edge, code, at })
}

/// Input devices registered with an edge-triggered epoll instance.
///
/// Device files and the epoll descriptor are owned handles, so they are
/// closed on every exit path when this value is dropped.
pub struct EpollInputs {
    epoll: OwnedFd,
    devices: Vec<(PathBuf, File)>,
}

impl EpollInputs {
    pub fn open<P: AsRef<Path>>(paths: &[P]) -> Result<Self, DeviceError> {
        // SAFETY: epoll_create1 has no memory preconditions; the result is
        // checked before being wrapped.
        let raw = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if raw < 0 {
            return Err(io::Error::last_os_error().into());
        }
        // SAFETY: `raw` is a freshly created descriptor owned by nobody else.
        let epoll = unsafe { OwnedFd::from_raw_fd(raw) };

        let mut inputs = Self {
            epoll,
            devices: Vec::with_capacity(paths.len()),
        };
        for path in paths {
            inputs.register(path.as_ref())?;
        }

        info!(
            "Monitoring button events on {}",
            inputs
                .devices
                .iter()
                .map(|(path, _)| path.display().to_string())
                .collect::<Vec<_>>()
                .join(" ")
        );
        Ok(inputs)
    }

    /// Defers [`EpollInputs::open`] so the devices are claimed by the loop
    /// thread that reads them.
    pub fn opener(paths: Vec<PathBuf>) -> SourceOpener {
        Box::new(move || Ok(Box::new(Self::open(paths.as_slice())?) as Box<dyn EdgeSource>))
    }

    fn register(&mut self, path: &Path) -> Result<(), DeviceError> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .map_err(|source| DeviceError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        let mut event = libc::epoll_event {
            events: (libc::EPOLLIN | libc::EPOLLET) as u32,
            u64: self.devices.len() as u64,
        };
        // SAFETY: both descriptors are open and `event` outlives the call.
        let rc = unsafe {
            libc::epoll_ctl(
                self.epoll.as_raw_fd(),
                libc::EPOLL_CTL_ADD,
                file.as_raw_fd(),
                &mut event,
            )
        };
        if rc < 0 {
            return Err(DeviceError::Open {
                path: path.to_path_buf(),
                source: io::Error::last_os_error(),
            });
        }

        self.devices.push((path.to_path_buf(), file));
        Ok(())
    }

    /// Reads every pending record from one device until it would block.
    fn drain(&mut self, token: usize, out: &mut Vec<KeyEvent>) -> Result<(), DeviceError> {
        let Some((path, file)) = self.devices.get_mut(token) else {
            return Ok(());
        };
        let mut buf = [0u8; RECORD_SIZE * MAX_EVENTS];
        loop {
            match file.read(&mut buf) {
                Ok(0) => return Ok(()),
                Ok(n) => {
                    let now = Instant::now();
                    out.extend(
                        buf[..n]
                            .chunks_exact(RECORD_SIZE)
                            .filter_map(|record| decode_record(record, now)),
                    );
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("Read from {} failed: {e}", path.display());
                    return Err(e.into());
                }
            }
        }
    }

    /// Error for a device that was unplugged or revoked.
    fn hangup(&self, token: usize) -> DeviceError {
        let path = self
            .devices
            .get(token)
            .map(|(path, _)| path.clone())
            .unwrap_or_default();
        DeviceError::Hangup { path }
    }
}

impl EdgeSource for EpollInputs {
    fn next_edges(&mut self, timeout: Duration) -> Result<Vec<KeyEvent>, DeviceError> {
        let mut ready = [libc::epoll_event { events: 0, u64: 0 }; MAX_EVENTS];
        let timeout_ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);

        // SAFETY: `ready` is valid for MAX_EVENTS entries for the whole call.
        let count = unsafe {
            libc::epoll_wait(
                self.epoll.as_raw_fd(),
                ready.as_mut_ptr(),
                MAX_EVENTS as i32,
                timeout_ms,
            )
        };
        if count < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(Vec::new());
            }
            return Err(err.into());
        }

        let mut edges = Vec::new();
        for entry in &ready[..count as usize] {
            let (flags, token) = (entry.events, entry.u64);
            if flags & libc::EPOLLIN as u32 != 0 {
                self.drain(token as usize, &mut edges)?;
            }
            if flags & (libc::EPOLLHUP | libc::EPOLLERR) as u32 != 0 {
                return Err(self.hangup(token as usize));
            }
        }
        Ok(edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(kind: u16, code: u16, value: i32) -> Vec<u8> {
        let mut bytes = vec![0u8; RECORD_SIZE - 8];
        bytes.extend_from_slice(&kind.to_ne_bytes());
        bytes.extend_from_slice(&code.to_ne_bytes());
        bytes.extend_from_slice(&value.to_ne_bytes());
        bytes
    }

    #[test]
    fn decodes_key_down_and_up() {
        let now = Instant::now();
        let down = decode_record(&record(EV_KEY, 28, 1), now).unwrap();
        let up = decode_record(&record(EV_KEY, 28, 0), now).unwrap();
        assert_eq!(down.edge, KeyEdge::Down);
        assert_eq!(up.edge, KeyEdge::Up);
        assert_eq!(down.code, 28);
    }

    #[test]
    fn ignores_autorepeat_and_non_key_events() {
        let now = Instant::now();
        assert_eq!(decode_record(&record(EV_KEY, 28, 2), now), None);
        // EV_SYN
        assert_eq!(decode_record(&record(0x00, 0, 0), now), None);
        // EV_REL
        assert_eq!(decode_record(&record(0x02, 0, 1), now), None);
    }

    #[test]
    fn short_record_is_rejected() {
        assert_eq!(decode_record(&[0u8; 4], Instant::now()), None);
    }

    #[test]
    fn open_missing_device_is_configuration_error() {
        let err = EpollInputs::open(&["/nonexistent/input/event99"])
            .err()
            .unwrap();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("/nonexistent/input/event99"));
    }

    #[test]
    fn regular_file_cannot_be_registered() {
        // epoll refuses regular files with EPERM.
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = EpollInputs::open(&[file.path()]).err().unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn pipe_edges_are_decoded() {
        use std::io::Write;

        let mut fds = [0; 2];
        // SAFETY: `fds` has room for the two descriptors pipe writes.
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        // SAFETY: pipe just returned these descriptors to us.
        let (reader, mut writer) = unsafe {
            (
                OwnedFd::from_raw_fd(fds[0]),
                File::from_raw_fd(fds[1]),
            )
        };
        let path = PathBuf::from(format!("/proc/self/fd/{}", reader.as_raw_fd()));
        let mut inputs = EpollInputs::open(&[&path]).unwrap();

        writer.write_all(&record(EV_KEY, 28, 1)).unwrap();
        writer.write_all(&record(0x00, 0, 0)).unwrap();
        writer.write_all(&record(EV_KEY, 28, 0)).unwrap();

        let edges = inputs.next_edges(Duration::from_millis(500)).unwrap();
        let kinds: Vec<_> = edges.iter().map(|e| e.edge).collect();
        assert_eq!(kinds, vec![KeyEdge::Down, KeyEdge::Up]);

        assert!(inputs.next_edges(Duration::from_millis(10)).unwrap().is_empty());
    }

    #[test]
    fn closed_device_is_reported() {
        let mut fds = [0; 2];
        // SAFETY: `fds` has room for the two descriptors pipe writes.
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        // SAFETY: pipe just returned these descriptors to us.
        let (reader, writer) = unsafe {
            (
                OwnedFd::from_raw_fd(fds[0]),
                OwnedFd::from_raw_fd(fds[1]),
            )
        };
        let path = PathBuf::from(format!("/proc/self/fd/{}", reader.as_raw_fd()));
        let mut inputs = EpollInputs::open(&[&path]).unwrap();

        drop(writer);
        let err = inputs.next_edges(Duration::from_millis(500)).unwrap_err();

        assert!(!err.is_configuration());
        assert!(err.to_string().contains(&path.display().to_string()));
    }
}
