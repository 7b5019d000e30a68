//! Thread management for the control loops.

use std::thread::{self, JoinHandle};

use anyhow::{Context, Result, anyhow};
use log::{error, info, warn};

/// A long-running loop that owns its devices and watches the shared state.
///
/// `run` must return once the shared state stops running; it is never
/// interrupted from outside.
pub trait ControlLoop: Send + 'static {
    /// Returns loop name for logging and thread naming.
    fn name(&self) -> &'static str;

    /// Runs the loop to completion on the current thread.
    fn run(self: Box<Self>) -> Result<()>;
}

/// Runs each control loop on its own named thread.
///
/// Loops are joined in the order they were spawned. A loop that fails is
/// logged and otherwise left alone, so the remaining loops keep working.
pub struct TaskManager {
    tasks: Vec<TaskInfo>,
}

struct TaskInfo {
    name: &'static str,
    handle: JoinHandle<Result<()>>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Spawns `control_loop` on a dedicated thread.
    pub fn spawn(&mut self, control_loop: Box<dyn ControlLoop>) -> Result<()> {
        let name = control_loop.name();

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                info!("Starting loop: {name}");
                match control_loop.run() {
                    Ok(()) => {
                        info!("Loop '{name}' completed successfully");
                        Ok(())
                    }
                    Err(e) => {
                        error!("Loop '{name}' failed, its behavior is disabled: {e:#}");
                        Err(e)
                    }
                }
            })
            .with_context(|| format!("Failed to spawn thread for '{name}'"))?;

        self.tasks.push(TaskInfo { name, handle });
        info!("Loop '{name}' spawned");
        Ok(())
    }

    /// Joins every loop in spawn order, blocking until each has exited.
    ///
    /// Returns the first failure, if any.
    pub fn join_all(&mut self) -> Result<()> {
        info!("Waiting for {} loops to stop", self.tasks.len());

        let mut first_error = None;
        for TaskInfo { name, handle } in self.tasks.drain(..) {
            let outcome = match handle.join() {
                Ok(result) => result.with_context(|| format!("Loop '{name}' failed")),
                Err(_) => Err(anyhow!("Loop '{name}' panicked")),
            };
            if let Err(e) = outcome {
                warn!("{e:#}");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e).context("One or more loops failed"),
            None => {
                info!("All loops stopped");
                Ok(())
            }
        }
    }

    /// Returns the count of loops not yet joined.
    pub fn active_count(&self) -> usize {
        self.tasks.len()
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    struct RecordingLoop {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl ControlLoop for RecordingLoop {
        fn name(&self) -> &'static str {
            self.name
        }

        fn run(self: Box<Self>) -> Result<()> {
            let thread_name = thread::current().name().map(str::to_owned);
            self.log
                .lock()
                .unwrap()
                .push(thread_name.unwrap_or_default());
            if self.fail {
                anyhow::bail!("device vanished");
            }
            Ok(())
        }
    }

    struct PanickingLoop;

    impl ControlLoop for PanickingLoop {
        fn name(&self) -> &'static str {
            "panicky"
        }

        fn run(self: Box<Self>) -> Result<()> {
            panic!("boom");
        }
    }

    fn recording(name: &'static str, log: &Arc<Mutex<Vec<String>>>, fail: bool) -> Box<RecordingLoop> {
        Box::new(RecordingLoop {
            name,
            log: log.clone(),
            fail,
        })
    }

    #[test]
    fn loops_run_on_named_threads() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = TaskManager::new();
        manager.spawn(recording("alpha", &log, false)).unwrap();
        manager.spawn(recording("beta", &log, false)).unwrap();
        assert_eq!(manager.active_count(), 2);

        manager.join_all().unwrap();
        assert_eq!(manager.active_count(), 0);

        let mut names = log.lock().unwrap().clone();
        names.sort();
        assert_eq!(names, vec!["alpha".to_string(), "beta".to_string()]);
    }

    #[test]
    fn failing_loop_does_not_stop_the_others() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = TaskManager::new();
        manager.spawn(recording("broken", &log, true)).unwrap();
        manager.spawn(recording("healthy", &log, false)).unwrap();

        let err = manager.join_all().unwrap_err();
        assert!(format!("{err:#}").contains("device vanished"));
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn panicking_loop_is_reported() {
        let mut manager = TaskManager::new();
        manager.spawn(Box::new(PanickingLoop)).unwrap();
        let err = manager.join_all().unwrap_err();
        assert!(format!("{err:#}").contains("panicked"));
    }

    #[test]
    fn join_without_loops_is_ok() {
        assert!(TaskManager::default().join_all().is_ok());
    }
}
