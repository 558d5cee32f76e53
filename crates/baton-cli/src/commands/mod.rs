pub mod backup;
pub mod backups;
pub mod capture;
pub mod completions;
pub mod doctor;
pub mod import;
pub mod list;
pub mod man_pages;
pub mod prune;
pub mod remove;
pub mod restart;
pub mod restore;
pub mod show;
pub mod status;
pub mod switch;
pub mod validate;

use baton_core::{CoreError, OperationResult, Settings, SwitchLock, Switcher};
use baton_schema::Severity;
use baton_store::{ConfigStore, JsonProfileStore, StoreError, StoreLayout};
use chrono::{DateTime, Local, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_VALIDATION_ERROR: u8 = 2;
pub const EXIT_STORE_ERROR: u8 = 3;
pub const EXIT_CRITICAL: u8 = 4;

/// Everything a command needs: resolved settings and the output mode.
pub struct Context {
    pub settings: Settings,
    pub json: bool,
}

impl Context {
    pub fn store(&self) -> Result<ConfigStore, CoreError> {
        Ok(ConfigStore::new(
            self.settings.config_path()?,
            self.settings.backup_dir()?,
        ))
    }

    pub fn profiles(&self) -> Result<JsonProfileStore, CoreError> {
        Ok(JsonProfileStore::new(StoreLayout::new(
            self.settings.data_dir()?,
        )))
    }

    /// The switch lock, for commands that touch backups outside a switch.
    pub fn lock(&self) -> Result<SwitchLock, CoreError> {
        SwitchLock::hold(&StoreLayout::new(self.settings.data_dir()?).lock_file())
    }

    pub fn switcher(&self) -> Result<Switcher, CoreError> {
        Switcher::from_settings(&self.settings, Arc::new(self.profiles()?))
    }

    /// Print `data` inside a success envelope in JSON mode, otherwise run
    /// `human`.
    pub fn emit<T: serde::Serialize>(
        &self,
        data: T,
        human: impl FnOnce(&T),
    ) -> Result<(), CoreError> {
        if self.json {
            println!("{}", json_pretty(&OperationResult::ok(data))?);
        } else {
            human(&data);
        }
        Ok(())
    }

    pub fn spinner(&self, msg: &str) -> Option<ProgressBar> {
        (!self.json).then(|| spinner(msg))
    }
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, CoreError> {
    serde_json::to_string_pretty(value).map_err(|e| CoreError::Io(e.into()))
}

pub fn exit_code(err: &CoreError) -> u8 {
    match err {
        CoreError::RollbackFailed { .. } => EXIT_CRITICAL,
        CoreError::ValidationFailed { .. } | CoreError::WarningsNotAcknowledged { .. } => {
            EXIT_VALIDATION_ERROR
        }
        CoreError::Store(StoreError::ProfileNotFound(_)) => EXIT_FAILURE,
        CoreError::Store(_) | CoreError::BackupFailed(_) | CoreError::WriteFailed { .. } => {
            EXIT_STORE_ERROR
        }
        _ => EXIT_FAILURE,
    }
}

/// Render a failure on stderr, or as an error envelope on stdout in JSON
/// mode.
pub fn report_error(err: &CoreError, json: bool) {
    if json {
        match json_pretty(&OperationResult::<()>::err(err)) {
            Ok(s) => println!("{s}"),
            Err(_) => eprintln!("error: {err}"),
        }
        return;
    }
    eprintln!("{} {err}", console::style("error:").red().bold());
    for issue in err.issues() {
        eprintln!("  {} {issue}", colorize_severity(issue.severity));
    }
    if let Some(path) = err.backup_path() {
        eprintln!("backup: {}", path.display());
    }
    if err.is_critical() {
        eprintln!(
            "{} the host configuration and the application may both be in an unknown state",
            console::style("critical:").red().bold()
        );
    }
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        pb.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn finish(pb: &ProgressBar, msg: String) {
    if let Ok(style) = ProgressStyle::with_template("{msg}") {
        pb.set_style(style);
    }
    pb.finish_with_message(msg);
}

pub fn spin_ok(pb: Option<&ProgressBar>, msg: &str) {
    if let Some(pb) = pb {
        finish(pb, format!("✓ {msg}"));
    }
}

pub fn spin_fail(pb: Option<&ProgressBar>, msg: &str) {
    if let Some(pb) = pb {
        finish(pb, format!("✗ {msg}"));
    }
}

/// Local wall-clock time, minute precision.
pub fn format_time(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

pub fn colorize_severity(severity: Severity) -> String {
    use console::Style;
    let label = severity.to_string();
    match severity {
        Severity::Error => Style::new().red().bold().apply_to(label).to_string(),
        Severity::Warning => Style::new().yellow().apply_to(label).to_string(),
        Severity::Info => Style::new().dim().apply_to(label).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use baton_runtime::RuntimeError;
    use std::path::PathBuf;

    #[test]
    fn json_pretty_serializes_object() {
        let val = serde_json::json!({"key": "value"});
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"key\""));
        assert!(result.contains("\"value\""));
    }

    #[test]
    fn colorize_keeps_label() {
        assert!(colorize_severity(Severity::Error).contains("error"));
        assert!(colorize_severity(Severity::Warning).contains("warning"));
        assert!(colorize_severity(Severity::Info).contains("info"));
    }

    #[test]
    fn exit_codes_follow_error_class() {
        let validation = CoreError::ValidationFailed {
            profile: "dev".to_owned(),
            errors: Vec::new(),
        };
        assert_eq!(exit_code(&validation), EXIT_VALIDATION_ERROR);

        let store = CoreError::BackupFailed(StoreError::BackupFailed("disk full".to_owned()));
        assert_eq!(exit_code(&store), EXIT_STORE_ERROR);

        let critical = CoreError::RollbackFailed {
            backup_path: PathBuf::from("/b.json"),
            restart: RuntimeError::NotInstalled("Claude".to_owned()),
            restore: StoreError::BackupNotFound(PathBuf::from("/b.json")),
        };
        assert_eq!(exit_code(&critical), EXIT_CRITICAL);

        assert_eq!(exit_code(&CoreError::SwitchInProgress), EXIT_FAILURE);
    }

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_FAILURE,
            EXIT_VALIDATION_ERROR,
            EXIT_STORE_ERROR,
            EXIT_CRITICAL,
        ];
        for (i, a) in codes.iter().enumerate() {
            assert!(codes[i + 1..].iter().all(|b| a != b));
        }
    }

    #[test]
    fn spinner_finishes_both_ways() {
        let pb = spinner("testing...");
        spin_ok(Some(&pb), "done");
        let pb = spinner("testing...");
        spin_fail(Some(&pb), "failed");
        spin_ok(None, "nothing to finish");
    }
}
