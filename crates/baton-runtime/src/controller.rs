use crate::backend::{ProcessBackend, ProcessStatus};
use crate::RuntimeError;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Every wait the controller performs is bounded by one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleTiming {
    pub poll_interval: Duration,
    pub quit_timeout: Duration,
    pub force_quit_timeout: Duration,
    pub start_timeout: Duration,
    /// Limit for one process table lookup.
    pub query_timeout: Duration,
    /// Pause between a completed quit and the relaunch.
    pub settle_delay: Duration,
    pub retry_attempts: u32,
    pub retry_base_delay: Duration,
}

impl Default for LifecycleTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            quit_timeout: Duration::from_secs(10),
            force_quit_timeout: Duration::from_secs(10),
            start_timeout: Duration::from_secs(15),
            query_timeout: Duration::from_secs(5),
            settle_delay: Duration::from_secs(2),
            retry_attempts: 3,
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

impl LifecycleTiming {
    /// Millisecond-scale timings for the mock backend.
    pub fn fast() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
            quit_timeout: Duration::from_millis(20),
            force_quit_timeout: Duration::from_millis(20),
            start_timeout: Duration::from_millis(20),
            query_timeout: Duration::from_secs(1),
            settle_delay: Duration::from_millis(1),
            retry_attempts: 3,
            retry_base_delay: Duration::from_millis(1),
        }
    }

    /// Delay before retry number `attempt + 1`: `base * 2^(attempt-1)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.retry_base_delay.saturating_mul(1 << exp)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub message: String,
    pub elapsed_ms: u64,
}

impl StepReport {
    fn new(message: String, started: Instant) -> Self {
        Self {
            message,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestartReport {
    pub quit: StepReport,
    pub start: StepReport,
    pub attempts: u32,
    pub elapsed_ms: u64,
}

impl RestartReport {
    /// Quit and start messages joined into one line.
    pub fn message(&self) -> String {
        format!("{}. {}", self.quit.message, self.start.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessInfo {
    pub backend: String,
    pub installed: bool,
    pub running: bool,
    pub pid: Option<u32>,
    pub name: Option<String>,
}

/// Drives the host application through quit, start and restart on top of a
/// [`ProcessBackend`], polling for each state change until a fixed deadline.
pub struct ProcessController {
    backend: Arc<dyn ProcessBackend>,
    app: String,
    timing: LifecycleTiming,
}

impl ProcessController {
    pub fn new(
        backend: Arc<dyn ProcessBackend>,
        app: impl Into<String>,
        timing: LifecycleTiming,
    ) -> Self {
        Self {
            backend,
            app: app.into(),
            timing,
        }
    }

    pub fn backend(&self) -> &dyn ProcessBackend {
        self.backend.as_ref()
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn timing(&self) -> &LifecycleTiming {
        &self.timing
    }

    pub fn is_installed(&self) -> bool {
        self.backend.is_installed()
    }

    pub fn is_running(&self) -> Result<ProcessStatus, RuntimeError> {
        self.query()
    }

    pub fn info(&self) -> Result<ProcessInfo, RuntimeError> {
        let status = self.query()?;
        Ok(ProcessInfo {
            backend: self.backend.name().to_owned(),
            installed: self.backend.is_installed(),
            running: status.running,
            pid: status.pid,
            name: status.name,
        })
    }

    fn query(&self) -> Result<ProcessStatus, RuntimeError> {
        self.backend.query(self.timing.query_timeout)
    }

    /// Re-check `done` every poll interval until it holds or `timeout`
    /// elapses. Returns whether it held.
    fn poll_until(
        &self,
        timeout: Duration,
        mut done: impl FnMut() -> Result<bool, RuntimeError>,
    ) -> Result<bool, RuntimeError> {
        let deadline = Instant::now() + timeout;
        loop {
            if done()? {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            std::thread::sleep(self.timing.poll_interval.min(deadline - now));
        }
    }

    fn wait_for_exit(&self, timeout: Duration) -> Result<bool, RuntimeError> {
        self.poll_until(timeout, || Ok(!self.query()?.running))
    }

    /// Graceful quit, escalating to a forced quit when the process outlives
    /// `quit_timeout`. An absent process is success.
    pub fn quit(&self) -> Result<StepReport, RuntimeError> {
        let started = Instant::now();
        if !self.query()?.running {
            return Ok(StepReport::new(
                format!("{} was not running", self.app),
                started,
            ));
        }

        info!("quitting {}", self.app);
        // The quit request and the wait for exit share one deadline, so a
        // hung request still leaves the forced phase its full budget.
        let deadline = Instant::now() + self.timing.quit_timeout;
        let graceful = match self.backend.request_quit(self.timing.quit_timeout) {
            Ok(()) => {
                if self.wait_for_exit(remaining(deadline))? {
                    return Ok(StepReport::new(
                        format!("{} quit successfully", self.app),
                        started,
                    ));
                }
                warn!(
                    "{} did not quit within {:?}, force quitting",
                    self.app, self.timing.quit_timeout
                );
                format!("{} did not quit within timeout", self.app)
            }
            Err(e) => {
                warn!("graceful quit request failed: {e}, force quitting");
                format!("graceful quit request failed ({e})")
            }
        };

        let deadline = Instant::now() + self.timing.force_quit_timeout;
        if let Err(e) = self.backend.force_quit(self.timing.force_quit_timeout) {
            warn!("force quit of {} failed: {e}", self.app);
        }
        if self.wait_for_exit(remaining(deadline))? {
            return Ok(StepReport::new(
                format!("{graceful}. {} force quit successfully", self.app),
                started,
            ));
        }

        Err(RuntimeError::QuitTimeout {
            app: self.app.clone(),
            waited: started.elapsed(),
        })
    }

    /// Launch and wait for the process to appear. A running process is
    /// success without a launch.
    pub fn start(&self) -> Result<StepReport, RuntimeError> {
        let started = Instant::now();
        if self.query()?.running {
            return Ok(StepReport::new(
                format!("{} was already running", self.app),
                started,
            ));
        }
        if !self.backend.is_installed() {
            return Err(RuntimeError::NotInstalled(self.app.clone()));
        }

        info!("starting {}", self.app);
        let deadline = Instant::now() + self.timing.start_timeout;
        self.backend.launch(self.timing.start_timeout)?;
        if self.poll_until(remaining(deadline), || Ok(self.query()?.running))? {
            return Ok(StepReport::new(
                format!("{} started successfully", self.app),
                started,
            ));
        }
        Err(RuntimeError::StartTimeout {
            app: self.app.clone(),
            waited: self.timing.start_timeout,
        })
    }

    /// Quit, settle, start. Either step failing aborts with its error.
    pub fn restart(&self) -> Result<RestartReport, RuntimeError> {
        let started = Instant::now();
        let quit = self.quit()?;
        debug!("waiting {:?} before relaunch", self.timing.settle_delay);
        std::thread::sleep(self.timing.settle_delay);
        let start = self.start()?;
        let report = RestartReport {
            quit,
            start,
            attempts: 1,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!("{} restarted in {}ms", self.app, report.elapsed_ms);
        Ok(report)
    }

    /// [`restart`](Self::restart) up to `retry_attempts` times with
    /// exponential backoff in between.
    pub fn restart_with_retry(&self) -> Result<RestartReport, RuntimeError> {
        let attempts = self.timing.retry_attempts.max(1);
        let mut last = None;
        for attempt in 1..=attempts {
            match self.restart() {
                Ok(mut report) => {
                    report.attempts = attempt;
                    return Ok(report);
                }
                Err(e) => {
                    if attempt < attempts {
                        let delay = self.timing.backoff(attempt);
                        warn!("restart attempt {attempt} failed, retrying in {delay:?}: {e}");
                        std::thread::sleep(delay);
                    } else {
                        warn!("restart attempt {attempt} failed: {e}");
                    }
                    last = Some(e);
                }
            }
        }
        Err(RuntimeError::RetriesExhausted {
            attempts,
            last: Box::new(
                last.unwrap_or_else(|| RuntimeError::QueryFailed("no attempt made".to_owned())),
            ),
        })
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}
