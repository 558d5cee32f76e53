use crate::backend::{ProcessBackend, ProcessStatus};
use crate::RuntimeError;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const MOCK_PID_BASE: u32 = 40_000;

/// Calls observed by a [`MockBackend`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockCalls {
    pub query: u32,
    pub request_quit: u32,
    pub force_quit: u32,
    pub launch: u32,
}

#[derive(Debug)]
struct MockState {
    installed: bool,
    running: bool,
    pid: u32,
    honors_quit: bool,
    honors_force_quit: bool,
    /// Launches that are accepted but never produce a process.
    silent_launches: u32,
    /// Every launch is accepted but never produces a process.
    never_starts: bool,
    calls: MockCalls,
}

/// In-memory process backend with scriptable behavior.
///
/// Defaults to an installed, stopped application that quits and starts on
/// request.
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            state: Mutex::new(MockState {
                installed: true,
                running: false,
                pid: MOCK_PID_BASE,
                honors_quit: true,
                honors_force_quit: true,
                silent_launches: 0,
                never_starts: false,
                calls: MockCalls::default(),
            }),
        }
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MockState>, RuntimeError> {
        self.state
            .lock()
            .map_err(|e| RuntimeError::QueryFailed(format!("mutex poisoned: {e}")))
    }

    fn update(&self, f: impl FnOnce(&mut MockState)) {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
    }

    #[must_use]
    pub fn running(self) -> Self {
        self.update(|s| {
            s.running = true;
            s.pid += 1;
        });
        self
    }

    #[must_use]
    pub fn not_installed(self) -> Self {
        self.update(|s| s.installed = false);
        self
    }

    /// Graceful quit requests are accepted but ignored.
    #[must_use]
    pub fn ignoring_quit(self) -> Self {
        self.update(|s| s.honors_quit = false);
        self
    }

    /// Forced quits are accepted but ignored as well.
    #[must_use]
    pub fn unkillable(self) -> Self {
        self.update(|s| {
            s.honors_quit = false;
            s.honors_force_quit = false;
        });
        self
    }

    /// The first `n` launches never bring the process up.
    #[must_use]
    pub fn failing_launches(self, n: u32) -> Self {
        self.update(|s| s.silent_launches = n);
        self
    }

    /// No launch ever brings the process up.
    #[must_use]
    pub fn never_starting(self) -> Self {
        self.update(|s| s.never_starts = true);
        self
    }

    pub fn set_running(&self, running: bool) {
        self.update(|s| s.running = running);
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().map(|s| s.running).unwrap_or(false)
    }

    pub fn calls(&self) -> MockCalls {
        self.state.lock().map(|s| s.calls).unwrap_or_default()
    }
}

impl ProcessBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn is_installed(&self) -> bool {
        self.state.lock().map(|s| s.installed).unwrap_or(false)
    }

    fn query(&self, _limit: Duration) -> Result<ProcessStatus, RuntimeError> {
        let mut state = self.lock()?;
        state.calls.query += 1;
        Ok(if state.running {
            ProcessStatus {
                running: true,
                pid: Some(state.pid),
                name: Some("mock-app".to_owned()),
            }
        } else {
            ProcessStatus::not_running()
        })
    }

    fn request_quit(&self, _limit: Duration) -> Result<(), RuntimeError> {
        let mut state = self.lock()?;
        state.calls.request_quit += 1;
        if state.honors_quit {
            state.running = false;
        }
        Ok(())
    }

    fn force_quit(&self, _limit: Duration) -> Result<(), RuntimeError> {
        let mut state = self.lock()?;
        state.calls.force_quit += 1;
        if state.honors_force_quit {
            state.running = false;
        }
        Ok(())
    }

    fn launch(&self, _limit: Duration) -> Result<(), RuntimeError> {
        let mut state = self.lock()?;
        state.calls.launch += 1;
        if !state.installed {
            return Err(RuntimeError::LaunchFailed("mock app not installed".to_owned()));
        }
        if state.never_starts {
            return Ok(());
        }
        if state.silent_launches > 0 {
            state.silent_launches -= 1;
            return Ok(());
        }
        state.running = true;
        state.pid += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: Duration = Duration::from_secs(1);

    #[test]
    fn default_mock_is_installed_and_stopped() {
        let mock = MockBackend::new();
        assert!(mock.is_installed());
        assert!(!mock.query(LIMIT).unwrap().running);
    }

    #[test]
    fn launch_then_quit() {
        let mock = MockBackend::new();
        mock.launch(LIMIT).unwrap();
        let status = mock.query(LIMIT).unwrap();
        assert!(status.running);
        assert!(status.pid.is_some());
        mock.request_quit(LIMIT).unwrap();
        assert!(!mock.query(LIMIT).unwrap().running);
        assert_eq!(
            mock.calls(),
            MockCalls {
                query: 2,
                request_quit: 1,
                force_quit: 0,
                launch: 1
            }
        );
    }

    #[test]
    fn ignoring_quit_needs_force() {
        let mock = MockBackend::new().running().ignoring_quit();
        mock.request_quit(LIMIT).unwrap();
        assert!(mock.is_running());
        mock.force_quit(LIMIT).unwrap();
        assert!(!mock.is_running());
    }

    #[test]
    fn failing_launches_recover() {
        let mock = MockBackend::new().failing_launches(1);
        mock.launch(LIMIT).unwrap();
        assert!(!mock.is_running());
        mock.launch(LIMIT).unwrap();
        assert!(mock.is_running());
    }

    #[test]
    fn relaunch_changes_pid() {
        let mock = MockBackend::new();
        mock.launch(LIMIT).unwrap();
        let first = mock.query(LIMIT).unwrap().pid;
        mock.force_quit(LIMIT).unwrap();
        mock.launch(LIMIT).unwrap();
        assert_ne!(mock.query(LIMIT).unwrap().pid, first);
    }
}
