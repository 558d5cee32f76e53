use super::{format_time, Context, EXIT_SUCCESS};
use baton_core::CoreError;
use baton_schema::Profile;
use baton_store::ProfileRepository;
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileView {
    #[serde(flatten)]
    profile: Profile,
    active: bool,
}

pub fn run(ctx: &Context, key: &str) -> Result<u8, CoreError> {
    let store = ctx.profiles()?;
    let profile = store.find(key)?;
    let active = store.active_profile()?.as_ref() == Some(&profile.id);

    ctx.emit(ProfileView { profile, active }, |view| {
        let p = &view.profile;
        let suffix = if view.active { " (active)" } else { "" };
        println!("{}{suffix}", console::style(&p.name).bold());
        println!("  id:        {}", p.id);
        if let Some(d) = &p.description {
            println!("  about:     {d}");
        }
        println!("  created:   {}", format_time(&p.created_at));
        if let Some(used) = &p.last_used {
            println!("  last used: {}", format_time(used));
        }
        if p.servers.is_empty() {
            println!("  no servers");
            return;
        }
        println!("  servers:");
        for (name, server) in &p.servers {
            let mut line = server.command.clone();
            for arg in &server.args {
                line.push(' ');
                line.push_str(arg);
            }
            println!("    {name}: {line}");
            if let Some(env) = &server.env {
                let keys: Vec<&str> = env.keys().map(String::as_str).collect();
                println!("      env: {}", keys.join(", "));
            }
        }
    })?;
    Ok(EXIT_SUCCESS)
}
