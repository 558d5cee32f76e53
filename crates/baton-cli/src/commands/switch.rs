use super::{colorize_severity, spin_fail, spin_ok, Context, EXIT_SUCCESS};
use baton_core::{CoreError, SwitchOptions, SwitchStatus};
use baton_schema::Profile;
use dialoguer::Confirm;
use std::io::{stderr, stdin, IsTerminal};

/// Show the profile's warnings and ask whether to go ahead. Without a
/// terminal there is nobody to ask, so the answer is no and the switch
/// reports the warnings as unconfirmed.
fn confirm_warnings(ctx: &Context, profile: &Profile) -> Result<bool, CoreError> {
    let report = ctx.switcher()?.validator().validate_profile(profile);
    if !report.valid || !report.has_warnings() {
        return Ok(false);
    }
    if ctx.json || !(stdin().is_terminal() && stderr().is_terminal()) {
        return Ok(false);
    }
    eprintln!("profile '{}' has warnings:", profile.name);
    for issue in &report.warnings {
        eprintln!("  {} {issue}", colorize_severity(issue.severity));
    }
    Confirm::new()
        .with_prompt("switch anyway?")
        .default(false)
        .interact()
        .map_err(|e| CoreError::Io(std::io::Error::other(e)))
}

pub fn run(ctx: &Context, key: &str, yes: bool, restart: bool) -> Result<u8, CoreError> {
    let profile = ctx.profiles()?.find(key)?;
    let accept_warnings = yes || confirm_warnings(ctx, &profile)?;
    let switcher = ctx.switcher()?;

    let pb = ctx.spinner(&format!("switching to '{}'...", profile.name));
    let outcome = match switcher.switch_to(
        &profile.id,
        SwitchOptions {
            accept_warnings,
            restart,
        },
    ) {
        Ok(outcome) => {
            let msg = match outcome.status {
                SwitchStatus::AlreadyActive => format!("'{}' is already active", profile.name),
                SwitchStatus::Switched => format!("switched to '{}'", profile.name),
            };
            spin_ok(pb.as_ref(), &msg);
            outcome
        }
        Err(e) => {
            spin_fail(pb.as_ref(), "switch failed");
            return Err(e);
        }
    };

    ctx.emit(outcome, |o| {
        if let Some(path) = &o.backup_path {
            println!("backup: {}", path.display());
        }
        if let Some(report) = &o.restart {
            println!("{}", report.message());
        }
        if !o.marker_updated && o.status == SwitchStatus::Switched {
            println!(
                "{} configuration written, but the active profile could not be recorded",
                console::style("warning:").yellow()
            );
        }
        if o.pruned > 0 {
            println!("pruned {} old backup(s)", o.pruned);
        }
    })?;
    Ok(EXIT_SUCCESS)
}
