//! Host configuration access, backups, and profile persistence for Baton.
//!
//! This crate provides the storage layer: `ConfigStore` reads and atomically
//! rewrites the host application's configuration file and never writes without
//! a prior `BackupRecord`; the `backup` module names, lists and prunes the
//! timestamped copies; `ProfileRepository` abstracts the profile set and the
//! active-profile marker, with a JSON-file and an in-memory implementation.

pub mod atomic;
pub mod backup;
pub mod config;
pub mod layout;
pub mod profiles;

pub use atomic::{write_atomic, write_atomic_new};
pub use backup::{BackupRecord, REASON_MANUAL, REASON_PRE_RESTORE, REASON_PROFILE_SWITCH};
pub use config::{ConfigStatus, ConfigStore};
pub use layout::StoreLayout;
pub use profiles::{
    validate_profile_name, JsonProfileStore, MemoryProfileStore, ProfileRepository,
};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fsync a directory to ensure that a preceding `rename()` is durable.
///
/// POSIX does not guarantee a rename survives a crash until the parent
/// directory itself has been synced.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("configuration file '{}' is unreadable: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("configuration file '{}' is malformed: {reason}", path.display())]
    MalformedDocument { path: PathBuf, reason: String },
    #[error("backup failed: {0}")]
    BackupFailed(String),
    #[error("no configuration file to back up at '{}'", .0.display())]
    NoConfigToBackup(PathBuf),
    #[error("backup not found: {}", .0.display())]
    BackupNotFound(PathBuf),
    #[error("backup '{}' is corrupt: {reason}", path.display())]
    CorruptBackup { path: PathBuf, reason: String },
    #[error("integrity check failed for '{}': expected {expected}, got {actual}", path.display())]
    IntegrityFailure {
        path: PathBuf,
        expected: String,
        actual: String,
    },
    #[error("write verification failed for '{}' after {attempts} attempts", path.display())]
    VerifyFailed { path: PathBuf, attempts: u32 },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("profile not found: {0}")]
    ProfileNotFound(String),
    #[error("invalid profile name: {0}")]
    InvalidName(String),
    #[error("name '{name}' is already used by profile {existing_id}")]
    NameConflict { name: String, existing_id: String },
}
