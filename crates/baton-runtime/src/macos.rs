use crate::backend::{query_by_name, AppTarget, ProcessBackend, ProcessStatus};
use crate::exec::{output_within, timed_out};
use crate::RuntimeError;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;
use tracing::debug;

/// macOS backend: AppleScript for the graceful quit, `pkill -KILL` for the
/// forced one, and `open` on the application bundle to launch.
pub struct MacBackend {
    target: AppTarget,
    tool_dir: Option<PathBuf>,
}

impl MacBackend {
    pub fn new(target: AppTarget) -> Self {
        Self {
            target,
            tool_dir: None,
        }
    }

    /// Prefer osascript, pkill and open from `dir` over the ones on `PATH`.
    #[must_use]
    pub fn with_tool_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tool_dir = Some(dir.into());
        self
    }

    fn tool(&self, name: &str) -> Command {
        match &self.tool_dir {
            Some(dir) if dir.join(name).is_file() => Command::new(dir.join(name)),
            _ => Command::new(name),
        }
    }

    fn quit_script(&self) -> String {
        let escaped = self.target.name.replace('\\', "\\\\").replace('"', "\\\"");
        format!("tell application \"{escaped}\" to quit")
    }
}

fn describe(tool: &str, e: &std::io::Error, limit: Duration) -> String {
    if timed_out(e) {
        format!("{tool} did not finish within {limit:?}")
    } else {
        format!("failed to run {tool}: {e}")
    }
}

impl ProcessBackend for MacBackend {
    fn name(&self) -> &str {
        "macos"
    }

    fn is_installed(&self) -> bool {
        self.target.install_path.exists()
    }

    fn query(&self, limit: Duration) -> Result<ProcessStatus, RuntimeError> {
        query_by_name(&self.target.name, limit)
    }

    fn request_quit(&self, limit: Duration) -> Result<(), RuntimeError> {
        debug!("asking {} to quit via osascript", self.target.name);
        let output = output_within(
            self.tool("osascript").args(["-e", &self.quit_script()]),
            limit,
        )
        .map_err(|e| RuntimeError::SignalFailed(describe("osascript", &e, limit)))?;
        if !output.status.success() {
            return Err(RuntimeError::SignalFailed(format!(
                "osascript quit request failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    fn force_quit(&self, limit: Duration) -> Result<(), RuntimeError> {
        debug!("force quitting {} via pkill", self.target.name);
        let output = output_within(
            self.tool("pkill").args(["-KILL", "-x", &self.target.name]),
            limit,
        )
        .map_err(|e| RuntimeError::SignalFailed(describe("pkill", &e, limit)))?;
        // Exit status 1 means nothing matched: already gone.
        match output.status.code() {
            Some(0 | 1) => Ok(()),
            _ => Err(RuntimeError::SignalFailed(format!(
                "pkill exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }

    fn launch(&self, limit: Duration) -> Result<(), RuntimeError> {
        debug!("launching {}", self.target.install_path.display());
        let output = output_within(self.tool("open").arg(&self.target.install_path), limit)
            .map_err(|e| RuntimeError::LaunchFailed(describe("open", &e, limit)))?;
        if !output.status.success() {
            return Err(RuntimeError::LaunchFailed(format!(
                "open {} failed: {}",
                self.target.install_path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}
