use super::{Context, EXIT_FAILURE, EXIT_SUCCESS};
use baton_core::{CoreError, SwitchLock};
use baton_store::{ProfileRepository, StoreLayout};
use serde::Serialize;

pub fn run(ctx: &Context) -> Result<u8, CoreError> {
    let mut checks: Vec<Check> = Vec::new();

    check_prereqs(ctx, &mut checks);
    check_app(ctx, &mut checks);
    check_config(ctx, &mut checks)?;
    check_data(ctx, &mut checks)?;

    let healthy = checks.iter().all(|c| c.status != Status::Fail);
    ctx.emit(DoctorReport { healthy, checks }, print_human)?;
    Ok(if healthy { EXIT_SUCCESS } else { EXIT_FAILURE })
}

fn check_prereqs(ctx: &Context, checks: &mut Vec<Check>) {
    let missing = baton_runtime::check_prereqs(&ctx.settings.backend);
    if missing.is_empty() {
        checks.push(Check::pass(
            "runtime_prereqs",
            format!("Tools for the '{}' backend are available", ctx.settings.backend),
        ));
    } else {
        checks.push(Check::fail(
            "runtime_prereqs",
            baton_runtime::format_missing(&missing),
        ));
    }
}

fn check_app(ctx: &Context, checks: &mut Vec<Check>) {
    let switcher = match ctx.switcher() {
        Ok(s) => s,
        Err(e) => {
            checks.push(Check::fail("app", format!("Cannot set up process control: {e}")));
            return;
        }
    };
    match switcher.controller().info() {
        Ok(info) if !info.installed => checks.push(Check::fail(
            "app",
            format!("{} is not installed", switcher.controller().app()),
        )),
        Ok(info) if info.running => checks.push(Check::pass(
            "app",
            format!("{} is installed and running", switcher.controller().app()),
        )),
        Ok(_) => checks.push(Check::pass(
            "app",
            format!("{} is installed (not running)", switcher.controller().app()),
        )),
        Err(e) => checks.push(Check::warn("app", format!("Cannot query process: {e}"))),
    }
}

fn check_config(ctx: &Context, checks: &mut Vec<Check>) -> Result<(), CoreError> {
    let store = ctx.store()?;
    let status = store.status();
    let path = status.path.display();

    if !status.exists {
        checks.push(Check::info(
            "config_file",
            format!("{path} does not exist yet (created on first switch)"),
        ));
    } else if !status.readable {
        checks.push(Check::fail("config_file", format!("{path} is not readable")));
    } else if !status.writable {
        checks.push(Check::fail("config_file", format!("{path} is not writable")));
    } else {
        checks.push(Check::pass("config_file", format!("{path} is readable and writable")));
    }

    if !status.directory_writable {
        checks.push(Check::fail(
            "config_dir",
            "Configuration directory does not accept new files (atomic writes will fail)",
        ));
    }

    if status.exists && status.readable {
        match store.read() {
            Ok(doc) => checks.push(Check::pass(
                "config_valid",
                format!(
                    "Configuration parses ({} server(s))",
                    doc.servers().map_or(0, |s| s.len())
                ),
            )),
            Err(e) => checks.push(Check::fail("config_valid", e.to_string())),
        }
    }

    match store.backup_records() {
        Ok(records) => checks.push(Check::info(
            "backups",
            format!(
                "{} backup(s) in {}",
                records.len(),
                store.backup_dir().display()
            ),
        )),
        Err(e) => checks.push(Check::warn("backups", format!("Cannot list backups: {e}"))),
    }
    Ok(())
}

fn check_data(ctx: &Context, checks: &mut Vec<Check>) -> Result<(), CoreError> {
    let layout = StoreLayout::new(ctx.settings.data_dir()?);

    match SwitchLock::try_acquire(&layout.lock_file()) {
        Ok(Some(_)) => checks.push(Check::pass("switch_lock", "No switch in progress")),
        Ok(None) => checks.push(Check::warn(
            "switch_lock",
            "A switch is in progress in another process",
        )),
        Err(e) => checks.push(Check::fail(
            "switch_lock",
            format!("Cannot check switch lock: {e}"),
        )),
    }

    let profiles = ctx.profiles()?;
    match profiles.list() {
        Ok(list) => checks.push(Check::info(
            "profiles",
            format!("{} profile(s) in {}", list.len(), layout.root().display()),
        )),
        Err(e) => checks.push(Check::fail("profiles", format!("Cannot read profiles: {e}"))),
    }

    match profiles.active_profile() {
        Ok(Some(id)) => match profiles.get_profile(&id) {
            Ok(Some(p)) => checks.push(Check::pass(
                "active_profile",
                format!("Active profile: {}", p.name),
            )),
            _ => checks.push(Check::warn(
                "active_profile",
                format!("Active profile marker points at missing profile {id}"),
            )),
        },
        Ok(None) => checks.push(Check::info("active_profile", "No active profile")),
        Err(e) => checks.push(Check::warn(
            "active_profile",
            format!("Cannot read active profile marker: {e}"),
        )),
    }
    Ok(())
}

#[derive(Serialize)]
struct DoctorReport {
    healthy: bool,
    checks: Vec<Check>,
}

fn print_human(report: &DoctorReport) {
    println!("Baton Doctor\n");
    for check in &report.checks {
        let icon = match check.status {
            Status::Pass => "✓",
            Status::Fail => "✗",
            Status::Warn => "⚠",
            Status::Info => "ℹ",
        };
        println!("  {icon} {}", check.message);
    }
    println!();
    if report.healthy {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. See above for details.");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum Status {
    Pass,
    Fail,
    Warn,
    Info,
}

#[derive(Serialize)]
struct Check {
    name: &'static str,
    status: Status,
    message: String,
}

impl Check {
    fn new(name: &'static str, status: Status, message: impl Into<String>) -> Self {
        Self {
            name,
            status,
            message: message.into(),
        }
    }

    fn pass(name: &'static str, message: impl Into<String>) -> Self {
        Self::new(name, Status::Pass, message)
    }

    fn fail(name: &'static str, message: impl Into<String>) -> Self {
        Self::new(name, Status::Fail, message)
    }

    fn warn(name: &'static str, message: impl Into<String>) -> Self {
        Self::new(name, Status::Warn, message)
    }

    fn info(name: &'static str, message: impl Into<String>) -> Self {
        Self::new(name, Status::Info, message)
    }
}
