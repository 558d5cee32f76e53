use crate::atomic::write_atomic;
use crate::backup::{
    compute_checksum, read_record, BackupRecord, BackupSet, REASON_PRE_RESTORE,
};
use crate::StoreError;
use baton_schema::validation::validate_document;
use baton_schema::HostConfiguration;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Placeholder content backed up when no live file exists yet.
const EMPTY_DOCUMENT: &[u8] = b"{}\n";

/// Diagnostics gathered without touching the configuration file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigStatus {
    pub path: PathBuf,
    pub exists: bool,
    pub readable: bool,
    pub writable: bool,
    pub directory_writable: bool,
    pub size: Option<u64>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Accessor for the host application's configuration file and its backups.
///
/// Writes require a [`BackupRecord`] for the same file, so there is no way to
/// replace the live document without a backup having been taken first.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    config_path: PathBuf,
    backups: BackupSet,
}

impl ConfigStore {
    pub fn new(config_path: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        let config_path = config_path.into();
        let backups = BackupSet::new(backup_dir, &config_path);
        Self {
            config_path,
            backups,
        }
    }

    /// Backups go to a `backups` directory next to the configuration file.
    pub fn with_default_backup_dir(config_path: impl Into<PathBuf>) -> Self {
        let config_path = config_path.into();
        let backup_dir = default_backup_dir(&config_path);
        Self::new(config_path, backup_dir)
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn backup_dir(&self) -> &Path {
        self.backups.dir()
    }

    pub fn exists(&self) -> bool {
        self.config_path.is_file()
    }

    /// Load the live document. A missing file reads as an empty document.
    pub fn read(&self) -> Result<HostConfiguration, StoreError> {
        let present = self
            .config_path
            .try_exists()
            .map_err(|source| StoreError::Unreadable {
                path: self.config_path.clone(),
                source,
            })?;
        if !present {
            debug!(
                "no configuration at {}, using empty document",
                self.config_path.display()
            );
            return Ok(HostConfiguration::empty());
        }
        let bytes = fs::read(&self.config_path).map_err(|source| StoreError::Unreadable {
            path: self.config_path.clone(),
            source,
        })?;
        self.parse(&bytes)
    }

    fn parse(&self, bytes: &[u8]) -> Result<HostConfiguration, StoreError> {
        let text = std::str::from_utf8(bytes).map_err(|e| StoreError::MalformedDocument {
            path: self.config_path.clone(),
            reason: format!("not valid UTF-8: {e}"),
        })?;
        HostConfiguration::parse(text).map_err(|e| StoreError::MalformedDocument {
            path: self.config_path.clone(),
            reason: e.to_string(),
        })
    }

    /// Explicit backup of the live file. Fails with `NoConfigToBackup` when
    /// there is nothing to copy.
    pub fn backup(&self, reason: &str) -> Result<BackupRecord, StoreError> {
        if !self.source_present()? {
            return Err(StoreError::NoConfigToBackup(self.config_path.clone()));
        }
        self.snapshot(reason)
    }

    /// Whether the live file exists. Only `NotFound` counts as absent; any
    /// other stat failure is an error so it is never recorded as missing.
    fn source_present(&self) -> Result<bool, StoreError> {
        self.config_path.try_exists().map_err(|e| {
            StoreError::BackupFailed(format!(
                "cannot stat {}: {e}",
                self.config_path.display()
            ))
        })
    }

    /// Backup taken ahead of a write. A missing live file is recorded as an
    /// empty document with `source_existed = false`.
    pub fn snapshot(&self, reason: &str) -> Result<BackupRecord, StoreError> {
        if self.source_present()? {
            let content = fs::read(&self.config_path).map_err(|e| {
                StoreError::BackupFailed(format!(
                    "cannot read {}: {e}",
                    self.config_path.display()
                ))
            })?;
            self.backups
                .create(&content, &self.config_path, reason, true)
        } else {
            self.backups
                .create(EMPTY_DOCUMENT, &self.config_path, reason, false)
        }
    }

    /// Replace the live document. `backup` must be a record of this file,
    /// normally the one returned by [`snapshot`](Self::snapshot).
    pub fn commit(
        &self,
        doc: &HostConfiguration,
        backup: &BackupRecord,
    ) -> Result<(), StoreError> {
        if backup.original_path != self.config_path {
            return Err(StoreError::BackupFailed(format!(
                "backup {} belongs to {}, not {}",
                backup.backup_path.display(),
                backup.original_path.display(),
                self.config_path.display()
            )));
        }
        if !backup.backup_path.try_exists()? {
            return Err(StoreError::BackupNotFound(backup.backup_path.clone()));
        }

        let report = validate_document(&doc.clone().into_value());
        if !report.valid {
            return Err(StoreError::MalformedDocument {
                path: self.config_path.clone(),
                reason: report.error_summary(),
            });
        }

        let content = doc.to_pretty_json().map_err(|e| StoreError::MalformedDocument {
            path: self.config_path.clone(),
            reason: e.to_string(),
        })?;
        write_atomic(&self.config_path, content.as_bytes())?;
        info!(
            "wrote {} (backup {})",
            self.config_path.display(),
            backup.backup_path.display()
        );
        Ok(())
    }

    /// Back up the live file, then replace it with `doc`.
    pub fn write(&self, doc: &HostConfiguration, reason: &str) -> Result<BackupRecord, StoreError> {
        let record = self.snapshot(reason)?;
        self.commit(doc, &record)?;
        Ok(record)
    }

    /// Put a backup's content back in place.
    ///
    /// The copy is checked against its recorded checksum and must parse as a
    /// valid document. Whatever is live is backed up as `pre_restore` first;
    /// that record is returned.
    pub fn restore(&self, backup_path: &Path) -> Result<BackupRecord, StoreError> {
        if !backup_path.is_file() {
            return Err(StoreError::BackupNotFound(backup_path.to_path_buf()));
        }
        let content = fs::read(backup_path)?;
        let record = read_record(backup_path)?;

        match &record {
            Some(record) => {
                let actual = compute_checksum(&content);
                if actual != record.checksum {
                    return Err(StoreError::IntegrityFailure {
                        path: backup_path.to_path_buf(),
                        expected: record.checksum.clone(),
                        actual,
                    });
                }
            }
            None => warn!(
                "backup {} has no metadata, skipping checksum verification",
                backup_path.display()
            ),
        }

        let source_existed = record.as_ref().map_or(true, |r| r.source_existed);
        if source_existed {
            self.parse(&content)
                .map_err(|e| StoreError::CorruptBackup {
                    path: backup_path.to_path_buf(),
                    reason: e.to_string(),
                })?;
        }

        let pre_restore = self.snapshot(REASON_PRE_RESTORE)?;

        if source_existed {
            write_atomic(&self.config_path, &content)?;
        } else {
            match fs::remove_file(&self.config_path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        info!(
            "restored {} from {}",
            self.config_path.display(),
            backup_path.display()
        );
        Ok(pre_restore)
    }

    pub fn list_backups(&self) -> Result<Vec<PathBuf>, StoreError> {
        self.backups.list()
    }

    pub fn backup_records(&self) -> Result<Vec<BackupRecord>, StoreError> {
        self.backups.records()
    }

    pub fn prune_backups(&self, keep: usize) -> Result<usize, StoreError> {
        self.backups.prune(keep)
    }

    pub fn status(&self) -> ConfigStatus {
        let path = self.config_path.clone();
        let meta = fs::metadata(&path).ok().filter(fs::Metadata::is_file);
        let exists = meta.is_some();
        let readable = exists && fs::File::open(&path).is_ok();
        let writable = exists && OpenOptions::new().append(true).open(&path).is_ok();
        let directory_writable = path
            .parent()
            .and_then(nearest_existing_dir)
            .is_some_and(|dir| NamedTempFile::new_in(dir).is_ok());
        ConfigStatus {
            exists,
            readable,
            writable,
            directory_writable,
            size: meta.as_ref().map(fs::Metadata::len),
            last_modified: meta
                .and_then(|m| m.modified().ok())
                .map(DateTime::<Utc>::from),
            path,
        }
    }
}

pub fn default_backup_dir(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("backups")
}

/// The directory itself if it exists, otherwise the closest existing ancestor,
/// which is where `create_dir_all` would have to start writing.
fn nearest_existing_dir(dir: &Path) -> Option<&Path> {
    dir.ancestors().find(|p| p.is_dir())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::{sidecar_for, REASON_MANUAL, REASON_PROFILE_SWITCH};
    use baton_schema::{ServerConfig, ServerMap};
    use serde_json::json;

    fn store(dir: &Path) -> ConfigStore {
        ConfigStore::with_default_backup_dir(dir.join("claude_desktop_config.json"))
    }

    fn git_servers() -> ServerMap {
        let mut servers = ServerMap::new();
        servers.insert(
            "git".to_owned(),
            ServerConfig::new("npx").with_args(["-y", "server-git"]),
        );
        servers
    }

    #[test]
    fn read_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(store(dir.path()).read().unwrap().is_empty());
    }

    #[test]
    fn read_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        fs::write(s.config_path(), b"{ nope").unwrap();
        assert!(matches!(s.read(), Err(StoreError::MalformedDocument { .. })));
    }

    #[test]
    fn read_structurally_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        fs::write(s.config_path(), br#"{"mcpServers": [1]}"#).unwrap();
        assert!(matches!(s.read(), Err(StoreError::MalformedDocument { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn read_directory_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        fs::create_dir(s.config_path()).unwrap();
        assert!(matches!(s.read(), Err(StoreError::Unreadable { .. })));
    }

    #[test]
    fn stat_failure_is_not_treated_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where a directory is expected makes stat fail with
        // ENOTDIR rather than ENOENT.
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"x").unwrap();
        let s = ConfigStore::new(blocker.join("cfg.json"), dir.path().join("backups"));

        assert!(matches!(s.read(), Err(StoreError::Unreadable { .. })));
        assert!(matches!(
            s.snapshot(REASON_MANUAL),
            Err(StoreError::BackupFailed(_))
        ));
        assert!(matches!(
            s.backup(REASON_MANUAL),
            Err(StoreError::BackupFailed(_))
        ));
        assert!(s.list_backups().unwrap().is_empty());
    }

    #[test]
    fn write_onto_empty_creates_document_and_backup() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        let doc = HostConfiguration::empty().with_servers(&git_servers()).unwrap();
        let record = s.write(&doc, REASON_PROFILE_SWITCH).unwrap();

        assert!(!record.source_existed);
        assert_eq!(record.reason, REASON_PROFILE_SWITCH);
        assert_eq!(s.list_backups().unwrap(), vec![record.backup_path.clone()]);
        let written: serde_json::Value =
            serde_json::from_slice(&fs::read(s.config_path()).unwrap()).unwrap();
        assert_eq!(
            written,
            json!({"mcpServers": {"git": {"command": "npx", "args": ["-y", "server-git"]}}})
        );
    }

    #[test]
    fn backup_precedes_write() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        fs::write(s.config_path(), b"{\"foo\": 1}").unwrap();
        let doc = s.read().unwrap().with_servers(&git_servers()).unwrap();
        let record = s.write(&doc, REASON_PROFILE_SWITCH).unwrap();

        assert!(record.source_existed);
        assert_eq!(fs::read(&record.backup_path).unwrap(), b"{\"foo\": 1}");
        assert!(record.timestamp <= Utc::now());
        let live: serde_json::Value =
            serde_json::from_slice(&fs::read(s.config_path()).unwrap()).unwrap();
        assert_eq!(live["foo"], json!(1));
    }

    #[test]
    fn commit_rejects_foreign_backup() {
        let dir = tempfile::tempdir().unwrap();
        let a = store(&dir.path().join("a"));
        let b = store(&dir.path().join("b"));
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::write(a.config_path(), b"{}").unwrap();
        let record = a.backup(REASON_MANUAL).unwrap();
        let err = b.commit(&HostConfiguration::empty(), &record).unwrap_err();
        assert!(matches!(err, StoreError::BackupFailed(_)));
        assert!(!b.config_path().exists());
    }

    #[test]
    fn write_fails_cleanly_when_backup_dir_is_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        fs::write(s.config_path(), b"{\"keep\": true}").unwrap();
        // A regular file where the backup directory should be.
        fs::write(s.backup_dir(), b"").unwrap();

        let err = s.write(&HostConfiguration::empty(), REASON_MANUAL).unwrap_err();
        assert!(matches!(err, StoreError::BackupFailed(_)));
        assert_eq!(fs::read(s.config_path()).unwrap(), b"{\"keep\": true}");
    }

    #[test]
    fn backup_of_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = store(dir.path()).backup(REASON_MANUAL).unwrap_err();
        assert!(matches!(err, StoreError::NoConfigToBackup(_)));
    }

    #[test]
    fn restore_round_trip_takes_pre_restore_backup() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        fs::write(s.config_path(), b"{\"v\": 1}").unwrap();
        let first = s.backup(REASON_MANUAL).unwrap();
        fs::write(s.config_path(), b"{\"v\": 2}").unwrap();

        let pre = s.restore(&first.backup_path).unwrap();
        assert_eq!(pre.reason, REASON_PRE_RESTORE);
        assert_eq!(fs::read(&pre.backup_path).unwrap(), b"{\"v\": 2}");
        assert_eq!(fs::read(s.config_path()).unwrap(), b"{\"v\": 1}");
    }

    #[test]
    fn restore_of_absent_source_removes_live_file() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        let record = s
            .write(&HostConfiguration::empty().with_servers(&git_servers()).unwrap(), REASON_PROFILE_SWITCH)
            .unwrap();
        assert!(s.exists());
        s.restore(&record.backup_path).unwrap();
        assert!(!s.exists());
    }

    #[test]
    fn restore_rejects_tampered_backup() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        fs::write(s.config_path(), b"{}").unwrap();
        let record = s.backup(REASON_MANUAL).unwrap();
        fs::write(&record.backup_path, b"{\"evil\": 1}").unwrap();
        fs::write(s.config_path(), b"{\"live\": 1}").unwrap();

        let err = s.restore(&record.backup_path).unwrap_err();
        assert!(matches!(err, StoreError::IntegrityFailure { .. }));
        assert_eq!(fs::read(s.config_path()).unwrap(), b"{\"live\": 1}");
    }

    #[test]
    fn restore_rejects_malformed_backup_without_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        let stray = dir.path().join("stray.json");
        fs::write(&stray, b"[]").unwrap();
        assert!(matches!(
            s.restore(&stray),
            Err(StoreError::CorruptBackup { .. })
        ));
    }

    #[test]
    fn restore_missing_backup() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        assert!(matches!(
            s.restore(&dir.path().join("nope.json")),
            Err(StoreError::BackupNotFound(_))
        ));
    }

    #[test]
    fn prune_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        fs::write(s.config_path(), b"{}").unwrap();
        for _ in 0..4 {
            s.backup(REASON_MANUAL).unwrap();
        }
        assert_eq!(s.prune_backups(1).unwrap(), 3);
        let left = s.list_backups().unwrap();
        assert_eq!(left.len(), 1);
        assert!(sidecar_for(&left[0]).exists());
        assert_eq!(s.backup_records().unwrap().len(), 1);
    }

    #[test]
    fn status_of_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let status = store(dir.path()).status();
        assert!(!status.exists);
        assert!(!status.readable);
        assert!(status.directory_writable);
        assert!(status.size.is_none());
    }

    #[test]
    fn status_of_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        fs::write(s.config_path(), b"{}").unwrap();
        let status = s.status();
        assert!(status.exists);
        assert!(status.readable);
        assert!(status.writable);
        assert_eq!(status.size, Some(2));
        assert!(status.last_modified.is_some());
    }
}
