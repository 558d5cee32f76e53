use crate::exec::output_within;
use crate::RuntimeError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;
use tracing::debug;

/// The application whose process is being controlled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppTarget {
    /// Process name as reported by the OS process table.
    pub name: String,
    /// Application bundle or executable used to launch it.
    pub install_path: PathBuf,
}

impl AppTarget {
    pub fn new(name: impl Into<String>, install_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            install_path: install_path.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessStatus {
    pub running: bool,
    pub pid: Option<u32>,
    pub name: Option<String>,
}

impl ProcessStatus {
    pub fn not_running() -> Self {
        Self::default()
    }
}

/// OS-level primitives for one application. None of these wait for a state
/// change; waiting and escalation live in
/// [`ProcessController`](crate::ProcessController). Each external tool a
/// backend runs is killed once the `limit` it was given has passed.
pub trait ProcessBackend: Send + Sync {
    fn name(&self) -> &str;

    fn is_installed(&self) -> bool;

    /// Look the process up. Absence is `running: false`, not an error.
    fn query(&self, limit: Duration) -> Result<ProcessStatus, RuntimeError>;

    /// Ask the application to quit on its own terms.
    fn request_quit(&self, limit: Duration) -> Result<(), RuntimeError>;

    /// Terminate every matching process unconditionally.
    fn force_quit(&self, limit: Duration) -> Result<(), RuntimeError>;

    /// Issue the launch request and return without waiting for the process.
    fn launch(&self, limit: Duration) -> Result<(), RuntimeError>;
}

pub fn select_backend(
    name: &str,
    target: &AppTarget,
) -> Result<Box<dyn ProcessBackend>, RuntimeError> {
    match name {
        "macos" => Ok(Box::new(crate::macos::MacBackend::new(target.clone()))),
        #[cfg(unix)]
        "unix" => Ok(Box::new(crate::unix::UnixBackend::new(target.clone()))),
        "mock" => Ok(Box::new(crate::mock::MockBackend::new())),
        other => Err(RuntimeError::BackendUnavailable(other.to_owned())),
    }
}

/// One entry of the OS process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProcessEntry {
    pub pid: u32,
    pub name: Option<String>,
}

/// Every pid whose process name is exactly `name`, via `pgrep -x`.
///
/// pgrep exits 1 when nothing matches, which is an empty list.
pub(crate) fn pgrep(name: &str, limit: Duration) -> Result<Vec<u32>, RuntimeError> {
    let output = output_within(Command::new("pgrep").args(["-x", name]), limit)
        .map_err(|e| RuntimeError::QueryFailed(format!("pgrep: {e}")))?;
    match output.status.code() {
        Some(0) => Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(|l| l.trim().parse::<u32>().ok())
            .collect()),
        Some(1) => Ok(Vec::new()),
        _ => Err(RuntimeError::QueryFailed(format!(
            "pgrep exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ))),
    }
}

/// Matching processes that are still alive. pgrep also reports zombies,
/// which no signal can remove, so `ps` is asked for each pid's state.
/// When `ps` is unusable the unfiltered pgrep result is returned.
pub(crate) fn live_processes(
    name: &str,
    limit: Duration,
) -> Result<Vec<ProcessEntry>, RuntimeError> {
    let pids = pgrep(name, limit)?;
    if pids.is_empty() {
        return Ok(Vec::new());
    }
    let list = pids
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",");
    match output_within(
        Command::new("ps").args(["-o", "pid=,stat=,comm=", "-p", &list]),
        limit,
    ) {
        Ok(output) => Ok(parse_ps(&String::from_utf8_lossy(&output.stdout))),
        Err(e) => {
            debug!("ps unavailable ({e}), not filtering zombies");
            Ok(pids
                .into_iter()
                .map(|pid| ProcessEntry { pid, name: None })
                .collect())
        }
    }
}

/// Parse `pid stat comm` lines, dropping zombies (`Z` state).
fn parse_ps(stdout: &str) -> Vec<ProcessEntry> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let pid = fields.next()?.parse::<u32>().ok()?;
            let stat = fields.next()?;
            if stat.starts_with('Z') {
                return None;
            }
            let name = fields.collect::<Vec<_>>().join(" ");
            Some(ProcessEntry {
                pid,
                name: (!name.is_empty()).then_some(name),
            })
        })
        .collect()
}

/// `query()` for backends that find their process by name.
pub(crate) fn query_by_name(name: &str, limit: Duration) -> Result<ProcessStatus, RuntimeError> {
    Ok(match live_processes(name, limit)?.into_iter().next() {
        Some(entry) => ProcessStatus {
            running: true,
            pid: Some(entry.pid),
            name: entry.name,
        },
        None => ProcessStatus::not_running(),
    })
}
