//! Process lifecycle control for the host application.
//!
//! This crate implements the execution layer: a pluggable `ProcessBackend`
//! trait with macOS (pgrep/osascript/open), generic Unix (pgrep + signals) and
//! scriptable mock backends, a `ProcessController` that turns the backend's
//! primitives into bounded quit/start/restart operations with retry, and
//! prerequisite checking for the external tools each backend shells out to.

pub mod backend;
pub mod controller;
mod exec;
pub mod macos;
pub mod mock;
pub mod prereq;
#[cfg(all(test, unix))]
mod test_support;
#[cfg(unix)]
pub mod unix;

pub use backend::{select_backend, AppTarget, ProcessBackend, ProcessStatus};
pub use controller::{
    LifecycleTiming, ProcessController, ProcessInfo, RestartReport, StepReport,
};
pub use mock::MockBackend;
pub use prereq::{check_prereqs, format_missing, MissingPrereq};

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("backend '{0}' is not available on this system")]
    BackendUnavailable(String),
    #[error("{0} is not installed")]
    NotInstalled(String),
    #[error("{app} did not quit within {waited:?}")]
    QuitTimeout { app: String, waited: Duration },
    #[error("{app} did not start within {waited:?}")]
    StartTimeout { app: String, waited: Duration },
    #[error("process query failed: {0}")]
    QueryFailed(String),
    #[error("launch failed: {0}")]
    LaunchFailed(String),
    #[error("signal delivery failed: {0}")]
    SignalFailed(String),
    #[error("restart failed after {attempts} attempt(s), last error: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<RuntimeError>,
    },
}

impl RuntimeError {
    /// The innermost cause, unwrapping retry exhaustion.
    pub fn root(&self) -> &RuntimeError {
        match self {
            RuntimeError::RetriesExhausted { last, .. } => last.root(),
            other => other,
        }
    }
}
