//! Timestamped backup copies of the host configuration.
//!
//! Each backup is a byte-for-byte copy named `<stem>-<timestamp>.json` plus a
//! `<copy>.meta` JSON sidecar carrying the [`BackupRecord`]. Records are never
//! rewritten once created; the only removal path is [`BackupSet::prune`].

use crate::atomic::{write_atomic, write_atomic_new};
use crate::StoreError;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const REASON_MANUAL: &str = "manual";
pub const REASON_PROFILE_SWITCH: &str = "profile_switch";
pub const REASON_PRE_RESTORE: &str = "pre_restore";

const META_SUFFIX: &str = ".meta";
const BACKUP_EXTENSION: &str = ".json";
const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.3fZ";
const NAME_ATTEMPTS: u32 = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRecord {
    pub timestamp: DateTime<Utc>,
    pub original_path: PathBuf,
    pub backup_path: PathBuf,
    pub reason: String,
    /// blake3 of the backup copy.
    pub checksum: String,
    pub size: u64,
    /// False when no live file existed; restoring such a backup removes the
    /// live file instead of writing the (empty) copy.
    #[serde(default = "default_true")]
    pub source_existed: bool,
}

fn default_true() -> bool {
    true
}

impl BackupRecord {
    pub fn sidecar_path(&self) -> PathBuf {
        sidecar_for(&self.backup_path)
    }
}

pub fn sidecar_for(backup: &Path) -> PathBuf {
    let mut s = backup.as_os_str().to_owned();
    s.push(META_SUFFIX);
    PathBuf::from(s)
}

pub fn compute_checksum(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// The backups belonging to one configuration file.
#[derive(Debug, Clone)]
pub struct BackupSet {
    dir: PathBuf,
    stem: String,
}

impl BackupSet {
    pub fn new(dir: impl Into<PathBuf>, config_path: &Path) -> Self {
        let stem = config_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("config")
            .to_owned();
        Self {
            dir: dir.into(),
            stem,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy `content` into a new backup and write its sidecar.
    ///
    /// Every failure is reported as [`StoreError::BackupFailed`]; a copy whose
    /// sidecar could not be written is removed again.
    pub fn create(
        &self,
        content: &[u8],
        original_path: &Path,
        reason: &str,
        source_existed: bool,
    ) -> Result<BackupRecord, StoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            StoreError::BackupFailed(format!(
                "cannot create backup directory {}: {e}",
                self.dir.display()
            ))
        })?;

        let timestamp = Utc::now();
        let mut backup_path = self.unused_path(timestamp);
        let mut tries = 1;
        loop {
            match write_atomic_new(&backup_path, content) {
                Ok(()) => break,
                // Another writer took the name between the check and the rename.
                Err(StoreError::Io(e))
                    if e.kind() == io::ErrorKind::AlreadyExists && tries < NAME_ATTEMPTS =>
                {
                    debug!(
                        "{} appeared concurrently, picking another name",
                        backup_path.display()
                    );
                    tries += 1;
                    backup_path = self.unused_path(timestamp);
                }
                Err(e) => {
                    return Err(StoreError::BackupFailed(format!(
                        "cannot write {}: {e}",
                        backup_path.display()
                    )));
                }
            }
        }

        let record = BackupRecord {
            timestamp,
            original_path: original_path.to_path_buf(),
            backup_path: backup_path.clone(),
            reason: reason.to_owned(),
            checksum: compute_checksum(content),
            size: content.len() as u64,
            source_existed,
        };

        let sidecar = serde_json::to_string_pretty(&record)
            .map_err(StoreError::from)
            .and_then(|json| write_atomic(&record.sidecar_path(), json.as_bytes()));
        if let Err(e) = sidecar {
            if let Err(rm) = fs::remove_file(&backup_path) {
                warn!(
                    "failed to remove orphaned backup {}: {rm}",
                    backup_path.display()
                );
            }
            return Err(StoreError::BackupFailed(format!(
                "cannot write backup metadata for {}: {e}",
                backup_path.display()
            )));
        }

        info!(
            "backed up {} to {} ({reason})",
            original_path.display(),
            backup_path.display()
        );
        Ok(record)
    }

    fn unused_path(&self, timestamp: DateTime<Utc>) -> PathBuf {
        let ts = timestamp.format(TIMESTAMP_FORMAT);
        let base = self
            .dir
            .join(format!("{}-{ts}{BACKUP_EXTENSION}", self.stem));
        if !base.exists() {
            return base;
        }
        let mut n = 1u32;
        loop {
            let candidate = self
                .dir
                .join(format!("{}-{ts}-{n}{BACKUP_EXTENSION}", self.stem));
            if !candidate.exists() {
                return candidate;
            }
            n += 1;
        }
    }

    /// Sort key for a file name that belongs to this set.
    fn sort_key(&self, file_name: &str) -> Option<(String, u32)> {
        let rest = file_name
            .strip_prefix(self.stem.as_str())?
            .strip_prefix('-')?
            .strip_suffix(BACKUP_EXTENSION)?;
        let (ts, seq) = match rest.split_once('-') {
            Some((ts, n)) => (ts, n.parse().ok()?),
            None => (rest, 0),
        };
        NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).ok()?;
        Some((ts.to_owned(), seq))
    }

    /// Backup copies, newest first.
    pub fn list(&self) -> Result<Vec<PathBuf>, StoreError> {
        if !self.dir.try_exists()? {
            return Ok(Vec::new());
        }
        let mut found = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(key) = self.sort_key(name) {
                found.push((key, entry.path()));
            }
        }
        found.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(found.into_iter().map(|(_, path)| path).collect())
    }

    /// Records for every listed backup that has a readable sidecar, newest first.
    pub fn records(&self) -> Result<Vec<BackupRecord>, StoreError> {
        let mut records = Vec::new();
        for path in self.list()? {
            match read_record(&path) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => debug!("backup {} has no metadata", path.display()),
                Err(e) => warn!("skipping backup with unreadable metadata: {e}"),
            }
        }
        Ok(records)
    }

    /// Delete all but the newest `keep` backups. Best effort: individual
    /// failures are logged and skipped. Returns how many copies were removed.
    pub fn prune(&self, keep: usize) -> Result<usize, StoreError> {
        let mut removed = 0;
        for path in self.list()?.into_iter().skip(keep) {
            if let Err(e) = fs::remove_file(&path) {
                warn!("failed to prune backup {}: {e}", path.display());
                continue;
            }
            removed += 1;
            let sidecar = sidecar_for(&path);
            match fs::remove_file(&sidecar) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("failed to prune backup metadata {}: {e}", sidecar.display()),
            }
        }
        if removed > 0 {
            info!("pruned {removed} backup(s), keeping newest {keep}");
        }
        Ok(removed)
    }
}

/// Read the sidecar for a backup copy. `None` when there is no sidecar.
pub fn read_record(backup_path: &Path) -> Result<Option<BackupRecord>, StoreError> {
    let sidecar = sidecar_for(backup_path);
    if !sidecar.try_exists()? {
        return Ok(None);
    }
    let content = fs::read_to_string(&sidecar)?;
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| StoreError::CorruptBackup {
            path: backup_path.to_path_buf(),
            reason: format!("unreadable metadata: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(dir: &Path) -> BackupSet {
        BackupSet::new(dir.join("backups"), &dir.join("claude_desktop_config.json"))
    }

    #[test]
    fn create_writes_copy_and_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let backups = set(dir.path());
        let original = dir.path().join("claude_desktop_config.json");
        let record = backups
            .create(b"{\"a\":1}", &original, REASON_MANUAL, true)
            .unwrap();

        assert_eq!(fs::read(&record.backup_path).unwrap(), b"{\"a\":1}");
        assert_eq!(record.checksum, compute_checksum(b"{\"a\":1}"));
        assert_eq!(record.size, 7);
        let stored = read_record(&record.backup_path).unwrap().unwrap();
        assert_eq!(stored, record);
        let name = record.backup_path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("claude_desktop_config-"));
        assert!(name.ends_with(".json"));
    }

    #[test]
    fn same_instant_backups_get_distinct_names() {
        let dir = tempfile::tempdir().unwrap();
        let backups = set(dir.path());
        let original = dir.path().join("claude_desktop_config.json");
        let mut paths = Vec::new();
        for _ in 0..5 {
            paths.push(
                backups
                    .create(b"{}", &original, REASON_MANUAL, true)
                    .unwrap()
                    .backup_path,
            );
        }
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 5);
    }

    #[test]
    fn list_is_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let backups = set(dir.path());
        let original = dir.path().join("claude_desktop_config.json");
        let mut created = Vec::new();
        for i in 0..4 {
            created.push(
                backups
                    .create(format!("{{\"n\":{i}}}").as_bytes(), &original, REASON_MANUAL, true)
                    .unwrap()
                    .backup_path,
            );
        }
        created.reverse();
        assert_eq!(backups.list().unwrap(), created);
    }

    #[test]
    fn list_ignores_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let backups = set(dir.path());
        fs::create_dir_all(backups.dir()).unwrap();
        fs::write(backups.dir().join("notes.txt"), b"x").unwrap();
        fs::write(backups.dir().join("claude_desktop_config-garbage.json"), b"x").unwrap();
        assert!(backups.list().unwrap().is_empty());
    }

    #[test]
    fn list_of_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(set(dir.path()).list().unwrap().is_empty());
    }

    #[test]
    fn prune_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        let backups = set(dir.path());
        let original = dir.path().join("claude_desktop_config.json");
        for _ in 0..5 {
            backups.create(b"{}", &original, REASON_MANUAL, true).unwrap();
        }
        let before = backups.list().unwrap();
        assert_eq!(backups.prune(2).unwrap(), 3);
        let after = backups.list().unwrap();
        assert_eq!(after, before[..2].to_vec());
        for gone in &before[2..] {
            assert!(!sidecar_for(gone).exists());
        }
        assert_eq!(backups.prune(2).unwrap(), 0);
    }

    #[test]
    fn prune_skips_entries_it_cannot_delete() {
        let dir = tempfile::tempdir().unwrap();
        let backups = set(dir.path());
        let original = dir.path().join("claude_desktop_config.json");
        let oldest = backups.create(b"{}", &original, REASON_MANUAL, true).unwrap();
        for _ in 0..2 {
            backups.create(b"{}", &original, REASON_MANUAL, true).unwrap();
        }
        // A sidecar that is a non-empty directory cannot be removed as a file.
        let sidecar = oldest.sidecar_path();
        fs::remove_file(&sidecar).unwrap();
        fs::create_dir(&sidecar).unwrap();
        fs::write(sidecar.join("pinned"), b"x").unwrap();

        assert_eq!(backups.prune(1).unwrap(), 2);
        assert_eq!(backups.list().unwrap().len(), 1);
        assert!(!oldest.backup_path.exists());
        assert!(sidecar.join("pinned").exists());
    }

    #[test]
    fn concurrent_backups_never_share_a_name() {
        let dir = tempfile::tempdir().unwrap();
        let backups = set(dir.path());
        let original = dir.path().join("claude_desktop_config.json");
        let paths: Vec<PathBuf> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8u8)
                .map(|i| {
                    let backups = &backups;
                    let original = &original;
                    s.spawn(move || {
                        backups
                            .create(&[b'0' + i], original, REASON_MANUAL, true)
                            .unwrap()
                            .backup_path
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let mut unique = paths.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 8);
        assert_eq!(backups.list().unwrap().len(), 8);
        for (i, path) in paths.iter().enumerate() {
            assert_eq!(fs::read(path).unwrap(), vec![b'0' + i as u8]);
        }
    }

    #[test]
    fn records_skip_corrupt_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        let backups = set(dir.path());
        let original = dir.path().join("claude_desktop_config.json");
        let good = backups.create(b"{}", &original, REASON_MANUAL, true).unwrap();
        let bad = backups.create(b"{}", &original, REASON_MANUAL, true).unwrap();
        fs::write(bad.sidecar_path(), b"not json").unwrap();
        let records = backups.records().unwrap();
        assert_eq!(records, vec![good]);
    }

    #[test]
    fn legacy_sidecar_defaults_source_existed() {
        let json = r#"{
            "timestamp": "2025-01-01T00:00:00Z",
            "originalPath": "/c.json",
            "backupPath": "/b/c-20250101T000000.000Z.json",
            "reason": "manual",
            "checksum": "x",
            "size": 2
        }"#;
        let record: BackupRecord = serde_json::from_str(json).unwrap();
        assert!(record.source_existed);
    }
}
