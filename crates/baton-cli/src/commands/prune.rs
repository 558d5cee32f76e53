use super::{Context, EXIT_SUCCESS};
use baton_core::CoreError;
use serde::Serialize;

#[derive(Serialize)]
struct PruneReport {
    kept: usize,
    removed: usize,
}

pub fn run(ctx: &Context, keep: Option<usize>) -> Result<u8, CoreError> {
    let keep = keep.unwrap_or(ctx.settings.keep_backups);
    let _lock = ctx.lock()?;
    let removed = ctx.store()?.prune_backups(keep)?;
    ctx.emit(PruneReport { kept: keep, removed }, |r| {
        println!("removed {} backup(s), keeping the newest {}", r.removed, r.kept);
    })?;
    Ok(EXIT_SUCCESS)
}
