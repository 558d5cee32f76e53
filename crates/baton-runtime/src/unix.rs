use crate::backend::{live_processes, query_by_name, AppTarget, ProcessBackend, ProcessStatus};
use crate::RuntimeError;
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, warn};

/// Generic Unix backend: SIGTERM for the graceful quit, SIGKILL for the
/// forced one, and a detached spawn of the executable to launch.
pub struct UnixBackend {
    target: AppTarget,
}

impl UnixBackend {
    pub fn new(target: AppTarget) -> Self {
        Self { target }
    }

    /// Send `signal` to every live process with the target's name. Electron
    /// style apps run several processes under one name, and any survivor
    /// keeps the app reported as running.
    fn signal_all(
        &self,
        signal: libc::c_int,
        label: &str,
        limit: Duration,
    ) -> Result<(), RuntimeError> {
        let targets = live_processes(&self.target.name, limit)?;
        if targets.is_empty() {
            debug!("{} not running, no {label} needed", self.target.name);
            return Ok(());
        }
        let failures: Vec<String> = targets
            .iter()
            .filter_map(|entry| {
                debug!("sending {label} to pid {}", entry.pid);
                send_signal(entry.pid, signal)
                    .err()
                    .map(|e| format!("pid {}: {e}", entry.pid))
            })
            .collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(RuntimeError::SignalFailed(format!(
                "failed to send {label} to {} of {} process(es): {}",
                failures.len(),
                targets.len(),
                failures.join("; ")
            )))
        }
    }
}

/// kill(2) for one pid. A pid that is already gone counts as delivered.
fn send_signal(pid: u32, signal: libc::c_int) -> Result<(), std::io::Error> {
    let pid_i32 = i32::try_from(pid).map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("pid {pid} exceeds i32 range"),
        )
    })?;
    // SAFETY: kill() takes plain integers; the pid was range-checked above.
    #[allow(unsafe_code)]
    let ret = unsafe { libc::kill(pid_i32, signal) };
    if ret == 0 {
        return Ok(());
    }
    let errno = std::io::Error::last_os_error();
    if errno.raw_os_error() == Some(libc::ESRCH) {
        debug!("pid {pid} exited before the signal");
        return Ok(());
    }
    Err(errno)
}

impl ProcessBackend for UnixBackend {
    fn name(&self) -> &str {
        "unix"
    }

    fn is_installed(&self) -> bool {
        self.target.install_path.is_file()
    }

    fn query(&self, limit: Duration) -> Result<ProcessStatus, RuntimeError> {
        query_by_name(&self.target.name, limit)
    }

    fn request_quit(&self, limit: Duration) -> Result<(), RuntimeError> {
        self.signal_all(libc::SIGTERM, "SIGTERM", limit)
    }

    fn force_quit(&self, limit: Duration) -> Result<(), RuntimeError> {
        self.signal_all(libc::SIGKILL, "SIGKILL", limit)
    }

    /// Spawning does not block, so `limit` has nothing to bound here.
    fn launch(&self, _limit: Duration) -> Result<(), RuntimeError> {
        let mut child = Command::new(&self.target.install_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                RuntimeError::LaunchFailed(format!(
                    "failed to spawn {}: {e}",
                    self.target.install_path.display()
                ))
            })?;
        debug!("spawned {} as pid {}", self.target.name, child.id());
        // Reap the child when it exits so it never lingers as a zombie that
        // pgrep would still report.
        std::thread::spawn(move || {
            if let Err(e) = child.wait() {
                warn!("failed to reap launched process: {e}");
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use crate::{LifecycleTiming, ProcessController};
    use std::os::unix::process::ExitStatusExt;
    use std::process::Child;
    use std::sync::Arc;

    const LIMIT: Duration = Duration::from_secs(5);

    #[test]
    fn installed_requires_a_file() {
        let dir = std::env::temp_dir();
        let backend = UnixBackend::new(AppTarget::new("x", &dir));
        assert!(!backend.is_installed());
    }

    #[test]
    fn launching_missing_binary_fails() {
        let backend = UnixBackend::new(AppTarget::new(
            "baton-missing",
            "/nonexistent/baton-missing-binary",
        ));
        assert!(matches!(
            backend.launch(LIMIT),
            Err(RuntimeError::LaunchFailed(_))
        ));
    }

    /// A copy of `sleep` under a unique name, so `query()` and the signals
    /// only ever see the test's own children.
    fn sleepers(tag: &str, count: usize) -> (tempfile::TempDir, UnixBackend, Vec<Child>) {
        let dir = tempfile::tempdir().unwrap();
        let name = test_support::unique_name(tag);
        let children = test_support::spawn_named(dir.path(), &name, count);
        let backend = UnixBackend::new(AppTarget::new(&name, dir.path().join(&name)));
        (dir, backend, children)
    }

    #[test]
    fn quit_reaches_every_process_with_the_name() {
        if !test_support::have_pgrep() {
            return;
        }
        let (_dir, backend, children) = sleepers("all", 3);
        let controller = ProcessController::new(
            Arc::new(backend),
            "sleepers",
            LifecycleTiming {
                quit_timeout: Duration::from_secs(3),
                ..LifecycleTiming::fast()
            },
        );

        let report = controller.quit();
        // Survivors get SIGKILL here, which the assertions below tell apart.
        let statuses: Vec<_> = children
            .into_iter()
            .map(|mut child| {
                let _ = child.kill();
                child.wait().unwrap()
            })
            .collect();

        let report = report.unwrap();
        assert_eq!(report.message, "sleepers quit successfully");
        assert_eq!(statuses.len(), 3);
        for status in statuses {
            assert_eq!(status.signal(), Some(libc::SIGTERM));
        }
    }

    #[test]
    fn zombies_are_not_running() {
        if !test_support::have_pgrep() {
            return;
        }
        let (_dir, backend, mut children) = sleepers("zmb", 2);
        // Killed but not yet reaped: the first one lingers as a zombie.
        children[0].kill().unwrap();
        std::thread::sleep(Duration::from_millis(100));

        let status = backend.query(LIMIT).unwrap();
        assert!(status.running);
        assert_eq!(status.pid, Some(children[1].id()));

        backend.request_quit(LIMIT).unwrap();
        let exited = children[1].wait().unwrap();
        assert_eq!(exited.signal(), Some(libc::SIGTERM));
        assert!(!backend.query(LIMIT).unwrap().running);
        test_support::reap(children);
    }
}
