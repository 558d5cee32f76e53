use crate::concurrency::{shutdown_requested, SwitchLock};
use crate::settings::Settings;
use crate::CoreError;
use baton_runtime::{select_backend, ProcessController, RestartReport};
use baton_schema::{ProfileId, ValidationResult, Validator};
use baton_store::{BackupRecord, ConfigStore, ProfileRepository, StoreError, REASON_PROFILE_SWITCH};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchOptions {
    /// The caller has shown the warnings to the user and they confirmed.
    pub accept_warnings: bool,
    /// Bounce the host process after writing. Off when something else
    /// manages the host.
    pub restart: bool,
}

impl Default for SwitchOptions {
    fn default() -> Self {
        Self {
            accept_warnings: false,
            restart: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchStatus {
    Switched,
    AlreadyActive,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchOutcome {
    pub status: SwitchStatus,
    pub profile_id: ProfileId,
    pub profile_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,
    pub validation: ValidationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<RestartReport>,
    pub marker_updated: bool,
    pub pruned: usize,
}

/// The one entry point that moves the host from one profile to another.
///
/// Each step's failure short-circuits the rest. Once the backup has been
/// taken the switch is not cancellable; a failed restart is compensated by
/// restoring that backup.
pub struct Switcher {
    store: ConfigStore,
    profiles: Arc<dyn ProfileRepository>,
    controller: ProcessController,
    validator: Validator,
    keep_backups: usize,
    lock_path: Option<PathBuf>,
}

impl Switcher {
    pub fn new(
        store: ConfigStore,
        profiles: Arc<dyn ProfileRepository>,
        controller: ProcessController,
    ) -> Self {
        Self {
            store,
            profiles,
            controller,
            validator: Validator::default(),
            keep_backups: 0,
            lock_path: None,
        }
    }

    /// Wire everything from settings: the host config at its resolved path,
    /// the selected process backend and timings, retention, and the lock in
    /// the data directory.
    pub fn from_settings(
        settings: &Settings,
        profiles: Arc<dyn ProfileRepository>,
    ) -> Result<Self, CoreError> {
        let store = ConfigStore::new(settings.config_path()?, settings.backup_dir()?);
        let target = settings.app_target()?;
        let backend = select_backend(&settings.backend, &target)?;
        let controller =
            ProcessController::new(Arc::from(backend), target.name, settings.timing());
        Ok(Self::new(store, profiles, controller)
            .with_keep_backups(settings.keep_backups)
            .with_lock(settings.data_dir()?.join(".lock")))
    }

    #[must_use]
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    /// Prune to the newest `keep` backups after each successful switch.
    #[must_use]
    pub fn with_keep_backups(mut self, keep: usize) -> Self {
        self.keep_backups = keep;
        self
    }

    #[must_use]
    pub fn with_lock(mut self, lock_path: impl Into<PathBuf>) -> Self {
        self.lock_path = Some(lock_path.into());
        self
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn controller(&self) -> &ProcessController {
        &self.controller
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    fn lock(&self) -> Result<Option<SwitchLock>, CoreError> {
        match &self.lock_path {
            None => Ok(None),
            Some(path) => SwitchLock::hold(path).map(Some),
        }
    }

    pub fn switch_to(
        &self,
        id: &ProfileId,
        options: SwitchOptions,
    ) -> Result<SwitchOutcome, CoreError> {
        let _lock = self.lock()?;

        if options.restart && !self.controller.is_installed() {
            return Err(CoreError::NotInstalled(self.controller.app().to_owned()));
        }

        let profile = self
            .profiles
            .get_profile(id)?
            .ok_or_else(|| CoreError::ProfileNotFound(id.to_string()))?;
        info!("switching to profile '{}' ({id})", profile.name);

        let validation = self.validator.validate_profile(&profile);
        if !validation.valid {
            return Err(CoreError::ValidationFailed {
                profile: profile.name.clone(),
                errors: validation.errors,
            });
        }
        if validation.has_warnings() && !options.accept_warnings {
            return Err(CoreError::WarningsNotAcknowledged {
                profile: profile.name.clone(),
                warnings: validation.warnings,
            });
        }

        let previous = match self.profiles.active_profile() {
            Ok(active) => active,
            Err(e) => {
                warn!("could not read active profile marker: {e}");
                None
            }
        };
        if previous.as_ref() == Some(id) {
            info!("profile '{}' is already active", profile.name);
            return Ok(SwitchOutcome {
                status: SwitchStatus::AlreadyActive,
                profile_id: profile.id,
                profile_name: profile.name,
                backup_path: None,
                validation,
                restart: None,
                marker_updated: false,
                pruned: 0,
            });
        }

        if shutdown_requested() {
            return Err(CoreError::Cancelled);
        }

        let backup = self
            .store
            .snapshot(REASON_PROFILE_SWITCH)
            .map_err(CoreError::BackupFailed)?;
        debug!("switch backup at {}", backup.backup_path.display());

        self.write_servers(&profile.servers, &backup)?;

        let marker_updated = match self.profiles.set_active_profile(Some(id)) {
            Ok(()) => true,
            Err(e) => {
                warn!("configuration written but active profile marker not updated: {e}");
                false
            }
        };

        let restart = if options.restart {
            match self.controller.restart_with_retry() {
                Ok(report) => Some(report),
                Err(e) => return Err(self.roll_back(e, &backup, previous.as_ref())),
            }
        } else {
            None
        };

        let pruned = self.prune();
        info!("switched to profile '{}'", profile.name);
        Ok(SwitchOutcome {
            status: SwitchStatus::Switched,
            profile_id: profile.id,
            profile_name: profile.name,
            backup_path: Some(backup.backup_path),
            validation,
            restart,
            marker_updated,
            pruned,
        })
    }

    fn write_servers(
        &self,
        servers: &baton_schema::ServerMap,
        backup: &BackupRecord,
    ) -> Result<(), CoreError> {
        let write_failed = |source: StoreError| CoreError::WriteFailed {
            backup_path: backup.backup_path.clone(),
            source,
        };
        let current = self.store.read().map_err(write_failed)?;
        let merged = current.with_servers(servers).map_err(|e| {
            write_failed(StoreError::MalformedDocument {
                path: self.store.config_path().to_path_buf(),
                reason: e.to_string(),
            })
        })?;
        self.store.commit(&merged, backup).map_err(write_failed)
    }

    fn roll_back(
        &self,
        restart: baton_runtime::RuntimeError,
        backup: &BackupRecord,
        previous: Option<&ProfileId>,
    ) -> CoreError {
        error!("restart failed: {restart}; restoring {}", backup.backup_path.display());
        match self.store.restore(&backup.backup_path) {
            Ok(_) => {
                if let Err(e) = self.profiles.set_active_profile(previous) {
                    warn!("configuration restored but active profile marker not reset: {e}");
                }
                CoreError::RestartFailed {
                    backup_path: backup.backup_path.clone(),
                    source: restart,
                }
            }
            Err(restore) => {
                error!("restoring {} failed: {restore}", backup.backup_path.display());
                CoreError::RollbackFailed {
                    backup_path: backup.backup_path.clone(),
                    restart,
                    restore,
                }
            }
        }
    }

    fn prune(&self) -> usize {
        if self.keep_backups == 0 {
            return 0;
        }
        match self.store.prune_backups(self.keep_backups) {
            Ok(n) => n,
            Err(e) => {
                warn!("backup pruning failed: {e}");
                0
            }
        }
    }

    /// Restore a backup under the switch lock. Returns the `pre_restore`
    /// record of what was live.
    pub fn restore(&self, backup_path: &Path) -> Result<BackupRecord, CoreError> {
        let _lock = self.lock()?;
        Ok(self.store.restore(backup_path)?)
    }

    /// Restart the host application under the switch lock.
    pub fn restart(&self) -> Result<RestartReport, CoreError> {
        let _lock = self.lock()?;
        if !self.controller.is_installed() {
            return Err(CoreError::NotInstalled(self.controller.app().to_owned()));
        }
        Ok(self.controller.restart_with_retry()?)
    }
}
