//! Switch orchestration for Baton.
//!
//! This crate ties the validation engine, the configuration store and the
//! process controller together into the `Switcher`: the single entry point
//! that validates a profile, backs up and rewrites the host configuration,
//! updates the active-profile marker and restarts the host application,
//! rolling back when the restart fails. It also provides the TOML `Settings`,
//! the cross-process `SwitchLock`, deferred Ctrl-C handling, and the
//! caller-facing `OperationResult` envelope.

pub mod concurrency;
pub mod result;
pub mod settings;
pub mod switch;

pub use concurrency::{install_signal_handler, shutdown_requested, SwitchLock};
pub use result::OperationResult;
pub use settings::{Settings, TimingSettings};
pub use switch::{SwitchOptions, SwitchOutcome, SwitchStatus, Switcher};

use baton_runtime::RuntimeError;
use baton_schema::ValidationIssue;
use baton_store::StoreError;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
    #[error("schema error: {0}")]
    Schema(#[from] baton_schema::SchemaError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0} is not installed")]
    NotInstalled(String),
    #[error("profile not found: {0}")]
    ProfileNotFound(String),
    #[error("profile '{profile}' failed validation with {} error(s)", errors.len())]
    ValidationFailed {
        profile: String,
        errors: Vec<ValidationIssue>,
    },
    #[error("profile '{profile}' has {} warning(s) that must be acknowledged", warnings.len())]
    WarningsNotAcknowledged {
        profile: String,
        warnings: Vec<ValidationIssue>,
    },
    #[error("backup failed, configuration untouched: {0}")]
    BackupFailed(#[source] StoreError),
    #[error("writing configuration failed, live file untouched (backup at {}): {source}", backup_path.display())]
    WriteFailed {
        backup_path: PathBuf,
        #[source]
        source: StoreError,
    },
    #[error("restart failed, previous configuration restored from {}: {source}", backup_path.display())]
    RestartFailed {
        backup_path: PathBuf,
        #[source]
        source: RuntimeError,
    },
    #[error(
        "restart failed ({restart}) and restoring {} also failed ({restore}); manual recovery required",
        backup_path.display()
    )]
    RollbackFailed {
        backup_path: PathBuf,
        restart: RuntimeError,
        restore: StoreError,
    },
    #[error("another switch is in progress")]
    SwitchInProgress,
    #[error("cancelled before any change was made")]
    Cancelled,
    #[error("invalid settings: {0}")]
    Settings(String),
}

impl CoreError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Store(e) => store_code(e),
            CoreError::Runtime(e) => runtime_code(e),
            CoreError::Schema(_) => "MALFORMED_DOCUMENT",
            CoreError::Io(_) => "IO_ERROR",
            CoreError::NotInstalled(_) => "NOT_INSTALLED",
            CoreError::ProfileNotFound(_) => "PROFILE_NOT_FOUND",
            CoreError::ValidationFailed { .. } => "VALIDATION_FAILED",
            CoreError::WarningsNotAcknowledged { .. } => "WARNINGS_UNCONFIRMED",
            CoreError::BackupFailed(_) => "BACKUP_FAILED",
            CoreError::WriteFailed { .. } => "WRITE_FAILED",
            CoreError::RestartFailed { .. } => "RESTART_FAILED",
            CoreError::RollbackFailed { .. } => "ROLLBACK_FAILED",
            CoreError::SwitchInProgress => "SWITCH_IN_PROGRESS",
            CoreError::Cancelled => "CANCELLED",
            CoreError::Settings(_) => "INVALID_SETTINGS",
        }
    }

    /// True only when both the live configuration and the running process
    /// may be in an indeterminate state.
    pub fn is_critical(&self) -> bool {
        matches!(self, CoreError::RollbackFailed { .. })
    }

    /// Backup a user can recover from, when one was taken.
    pub fn backup_path(&self) -> Option<&Path> {
        match self {
            CoreError::WriteFailed { backup_path, .. }
            | CoreError::RestartFailed { backup_path, .. }
            | CoreError::RollbackFailed { backup_path, .. } => Some(backup_path),
            _ => None,
        }
    }

    /// Validation issues carried by the error, if any.
    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            CoreError::ValidationFailed { errors, .. } => errors,
            CoreError::WarningsNotAcknowledged { warnings, .. } => warnings,
            _ => &[],
        }
    }
}

fn store_code(e: &StoreError) -> &'static str {
    match e {
        StoreError::Unreadable { .. } => "CONFIG_UNREADABLE",
        StoreError::MalformedDocument { .. } => "MALFORMED_DOCUMENT",
        StoreError::BackupFailed(_) => "BACKUP_FAILED",
        StoreError::NoConfigToBackup(_) => "NO_CONFIG_TO_BACKUP",
        StoreError::BackupNotFound(_) => "BACKUP_NOT_FOUND",
        StoreError::CorruptBackup { .. } | StoreError::IntegrityFailure { .. } => "CORRUPT_BACKUP",
        StoreError::VerifyFailed { .. } => "WRITE_FAILED",
        StoreError::ProfileNotFound(_) => "PROFILE_NOT_FOUND",
        StoreError::InvalidName(_) => "INVALID_NAME",
        StoreError::NameConflict { .. } => "NAME_CONFLICT",
        StoreError::Io(_) | StoreError::Serialization(_) => "STORE_ERROR",
    }
}

fn runtime_code(e: &RuntimeError) -> &'static str {
    match e {
        RuntimeError::NotInstalled(_) => "NOT_INSTALLED",
        RuntimeError::QuitTimeout { .. } => "QUIT_TIMEOUT",
        RuntimeError::StartTimeout { .. } => "START_TIMEOUT",
        RuntimeError::RetriesExhausted { .. } => "RESTART_FAILED",
        RuntimeError::BackendUnavailable(_) => "BACKEND_UNAVAILABLE",
        RuntimeError::LaunchFailed(_) => "LAUNCH_FAILED",
        RuntimeError::Io(_) | RuntimeError::QueryFailed(_) | RuntimeError::SignalFailed(_) => {
            "PROCESS_ERROR"
        }
    }
}
