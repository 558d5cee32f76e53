use crate::CoreError;
use baton_runtime::{AppTarget, LifecycleTiming};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an alternative settings file.
pub const SETTINGS_ENV: &str = "BATON_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingSettings {
    pub poll_interval_ms: u64,
    pub quit_timeout_ms: u64,
    pub force_quit_timeout_ms: u64,
    pub start_timeout_ms: u64,
    /// Limit for one process table lookup (pgrep, ps).
    pub query_timeout_ms: u64,
    pub settle_delay_ms: u64,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            quit_timeout_ms: 10_000,
            force_quit_timeout_ms: 10_000,
            start_timeout_ms: 15_000,
            query_timeout_ms: 5_000,
            settle_delay_ms: 2_000,
            retry_attempts: 3,
            retry_base_delay_ms: 1_000,
        }
    }
}

impl From<&TimingSettings> for LifecycleTiming {
    fn from(t: &TimingSettings) -> Self {
        Self {
            poll_interval: Duration::from_millis(t.poll_interval_ms.max(1)),
            quit_timeout: Duration::from_millis(t.quit_timeout_ms),
            force_quit_timeout: Duration::from_millis(t.force_quit_timeout_ms),
            start_timeout: Duration::from_millis(t.start_timeout_ms),
            query_timeout: Duration::from_millis(t.query_timeout_ms.max(1)),
            settle_delay: Duration::from_millis(t.settle_delay_ms),
            retry_attempts: t.retry_attempts.max(1),
            retry_base_delay: Duration::from_millis(t.retry_base_delay_ms),
        }
    }
}

/// Tool settings, read from `config.toml`. Every field is optional in the
/// file; unset paths resolve to platform defaults under `$HOME`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Process name of the host application.
    pub app_name: String,
    pub install_path: Option<PathBuf>,
    /// Host configuration file.
    pub config_path: Option<PathBuf>,
    pub backup_dir: Option<PathBuf>,
    /// Profiles, active marker and lock.
    pub data_dir: Option<PathBuf>,
    pub backend: String,
    /// Backups kept after each switch; 0 disables pruning.
    pub keep_backups: usize,
    pub timing: TimingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: default_app_name().to_owned(),
            install_path: None,
            config_path: None,
            backup_dir: None,
            data_dir: None,
            backend: default_backend().to_owned(),
            keep_backups: 10,
            timing: TimingSettings::default(),
        }
    }
}

fn default_app_name() -> &'static str {
    if cfg!(target_os = "macos") {
        "Claude"
    } else {
        "claude-desktop"
    }
}

fn default_backend() -> &'static str {
    if cfg!(target_os = "macos") {
        "macos"
    } else {
        "unix"
    }
}

fn home_dir() -> Result<PathBuf, CoreError> {
    std::env::var("HOME")
        .map(PathBuf::from)
        .map_err(|_| CoreError::Settings("HOME not set".to_owned()))
}

/// Expand a leading `~/` against `$HOME`.
pub fn expand_tilde(path: &Path) -> Result<PathBuf, CoreError> {
    match path.strip_prefix("~") {
        Ok(rest) => Ok(home_dir()?.join(rest)),
        Err(_) => Ok(path.to_path_buf()),
    }
}

impl Settings {
    /// `$BATON_CONFIG` if set, otherwise `~/.config/baton/config.toml`.
    pub fn default_path() -> Result<PathBuf, CoreError> {
        match std::env::var_os(SETTINGS_ENV) {
            Some(p) if !p.is_empty() => Ok(PathBuf::from(p)),
            _ => Ok(home_dir()?.join(".config/baton/config.toml")),
        }
    }

    /// Load from `path`, or from the default location where a missing file
    /// simply means defaults. An explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, CoreError> {
        match path {
            Some(p) => Self::load_file(p),
            None => {
                let p = Self::default_path()?;
                if p.exists() {
                    Self::load_file(&p)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn load_file(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Settings(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::parse(&content)
            .map_err(|e| CoreError::Settings(format!("{}: {e}", path.display())))
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn to_toml(&self) -> Result<String, CoreError> {
        toml::to_string_pretty(self).map_err(|e| CoreError::Settings(e.to_string()))
    }

    /// Platform-conventional host configuration path unless overridden.
    pub fn config_path(&self) -> Result<PathBuf, CoreError> {
        if let Some(p) = &self.config_path {
            return expand_tilde(p);
        }
        let home = home_dir()?;
        Ok(if cfg!(target_os = "macos") {
            home.join("Library/Application Support/Claude/claude_desktop_config.json")
        } else {
            home.join(".config/Claude/claude_desktop_config.json")
        })
    }

    pub fn backup_dir(&self) -> Result<PathBuf, CoreError> {
        match &self.backup_dir {
            Some(p) => expand_tilde(p),
            None => Ok(baton_store::config::default_backup_dir(&self.config_path()?)),
        }
    }

    pub fn data_dir(&self) -> Result<PathBuf, CoreError> {
        match &self.data_dir {
            Some(p) => expand_tilde(p),
            None => Ok(home_dir()?.join(".local/share/baton")),
        }
    }

    pub fn install_path(&self) -> Result<PathBuf, CoreError> {
        match &self.install_path {
            Some(p) => expand_tilde(p),
            None if cfg!(target_os = "macos") => Ok(PathBuf::from("/Applications/Claude.app")),
            None => Ok(PathBuf::from("/usr/bin").join(&self.app_name)),
        }
    }

    pub fn app_target(&self) -> Result<AppTarget, CoreError> {
        Ok(AppTarget::new(self.app_name.clone(), self.install_path()?))
    }

    pub fn timing(&self) -> LifecycleTiming {
        LifecycleTiming::from(&self.timing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_means_defaults() {
        let settings = Settings::parse("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.keep_backups, 10);
        assert_eq!(settings.timing().quit_timeout, Duration::from_secs(10));
        assert_eq!(settings.timing().retry_attempts, 3);
        assert_eq!(settings.timing().query_timeout, Duration::from_secs(5));
    }

    #[test]
    fn partial_file_overrides() {
        let settings = Settings::parse(
            r#"
            backend = "mock"
            keep_backups = 3
            config_path = "/tmp/cfg.json"

            [timing]
            poll_interval_ms = 5
            settle_delay_ms = 0
            "#,
        )
        .unwrap();
        assert_eq!(settings.backend, "mock");
        assert_eq!(settings.keep_backups, 3);
        assert_eq!(settings.timing.poll_interval_ms, 5);
        assert_eq!(settings.timing.start_timeout_ms, 15_000);
        assert_eq!(settings.config_path().unwrap(), PathBuf::from("/tmp/cfg.json"));
        assert_eq!(
            settings.backup_dir().unwrap(),
            PathBuf::from("/tmp/backups")
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Settings::parse("colour = \"blue\"").is_err());
    }

    #[test]
    fn load_explicit_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load(Some(dir.path().join("nope.toml").as_path())).unwrap_err();
        assert!(matches!(err, CoreError::Settings(_)));
    }

    #[test]
    fn toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let settings = Settings {
            data_dir: Some(PathBuf::from("/var/lib/baton")),
            ..Settings::default()
        };
        std::fs::write(&path, settings.to_toml().unwrap()).unwrap();
        assert_eq!(Settings::load(Some(path.as_path())).unwrap(), settings);
    }

    #[test]
    fn zero_poll_interval_is_clamped() {
        let settings = Settings::parse("[timing]\npoll_interval_ms = 0").unwrap();
        assert_eq!(settings.timing().poll_interval, Duration::from_millis(1));
    }

    #[test]
    fn absolute_paths_are_not_expanded() {
        assert_eq!(
            expand_tilde(Path::new("/etc/x")).unwrap(),
            PathBuf::from("/etc/x")
        );
    }
}
