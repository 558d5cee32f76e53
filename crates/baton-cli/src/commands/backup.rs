use super::{Context, EXIT_SUCCESS};
use baton_core::CoreError;
use baton_store::REASON_MANUAL;

pub fn run(ctx: &Context) -> Result<u8, CoreError> {
    let _lock = ctx.lock()?;
    let record = ctx.store()?.backup(REASON_MANUAL)?;
    ctx.emit(record, |r| {
        println!("backed up {} to {}", r.original_path.display(), r.backup_path.display());
    })?;
    Ok(EXIT_SUCCESS)
}
