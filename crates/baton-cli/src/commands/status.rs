use super::{format_time, Context, EXIT_SUCCESS};
use baton_core::CoreError;
use baton_runtime::ProcessInfo;
use baton_store::{ConfigStatus, ProfileRepository};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ActiveProfile {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport {
    config: ConfigStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    process: Option<ProcessInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    process_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    active_profile: Option<ActiveProfile>,
    backups: usize,
}

pub fn run(ctx: &Context) -> Result<u8, CoreError> {
    let store = ctx.store()?;
    let profiles = ctx.profiles()?;
    let switcher = ctx.switcher()?;

    let (process, process_error) = match switcher.controller().info() {
        Ok(info) => (Some(info), None),
        Err(e) => (None, Some(e.to_string())),
    };
    let active_profile = profiles.active_profile()?.map(|id| ActiveProfile {
        name: profiles.get_profile(&id).ok().flatten().map(|p| p.name),
        id: id.to_string(),
    });
    let report = StatusReport {
        config: store.status(),
        process,
        process_error,
        active_profile,
        backups: store.list_backups()?.len(),
    };

    ctx.emit(report, |r| {
        let c = &r.config;
        println!("config:  {}", c.path.display());
        if c.exists {
            let access = match (c.readable, c.writable) {
                (true, true) => "read/write",
                (true, false) => "read-only",
                _ => "unreadable",
            };
            print!("         {access}, {} bytes", c.size.unwrap_or(0));
            match &c.last_modified {
                Some(t) => println!(", modified {}", format_time(t)),
                None => println!(),
            }
        } else {
            println!("         does not exist yet");
        }
        match (&r.process, &r.process_error) {
            (Some(p), _) if !p.installed => println!("app:     not installed ({})", p.backend),
            (Some(p), _) if p.running => println!(
                "app:     running (pid {}, {})",
                p.pid.map_or_else(|| "?".to_owned(), |pid| pid.to_string()),
                p.backend
            ),
            (Some(p), _) => println!("app:     not running ({})", p.backend),
            (None, Some(e)) => println!("app:     unknown ({e})"),
            (None, None) => println!("app:     unknown"),
        }
        match &r.active_profile {
            Some(ActiveProfile { name: Some(n), id }) => println!("profile: {n} ({id})"),
            Some(ActiveProfile { name: None, id }) => println!("profile: {id} (deleted)"),
            None => println!("profile: none"),
        }
        println!("backups: {}", r.backups);
    })?;
    Ok(EXIT_SUCCESS)
}
