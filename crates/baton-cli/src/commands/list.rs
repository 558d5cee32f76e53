use super::{format_time, Context, EXIT_SUCCESS};
use baton_core::CoreError;
use baton_schema::ProfileId;
use baton_store::ProfileRepository;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileRow {
    id: ProfileId,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    servers: usize,
    active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_used: Option<DateTime<Utc>>,
}

pub fn run(ctx: &Context) -> Result<u8, CoreError> {
    let store = ctx.profiles()?;
    let active = store.active_profile()?;
    let rows: Vec<ProfileRow> = store
        .list()?
        .into_iter()
        .map(|p| ProfileRow {
            active: active.as_ref() == Some(&p.id),
            servers: p.servers.len(),
            last_used: p.last_used,
            id: p.id,
            name: p.name,
            description: p.description,
        })
        .collect();

    ctx.emit(rows, |rows| {
        if rows.is_empty() {
            println!("no profiles found");
            return;
        }
        println!("  {:<18} {:<24} {:<8} LAST_USED", "ID", "NAME", "SERVERS");
        for row in rows {
            let marker = if row.active {
                console::style("*").green().bold().to_string()
            } else {
                " ".to_owned()
            };
            println!(
                "{marker} {:<18} {:<24} {:<8} {}",
                row.id,
                row.name,
                row.servers,
                row.last_used
                    .as_ref()
                    .map_or_else(|| "-".to_owned(), format_time)
            );
        }
    })?;
    Ok(EXIT_SUCCESS)
}
