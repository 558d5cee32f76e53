use super::{Context, EXIT_SUCCESS};
use baton_core::CoreError;

pub fn run(ctx: &Context, key: &str) -> Result<u8, CoreError> {
    let removed = ctx.profiles()?.remove(key)?;
    ctx.emit(removed, |p| println!("removed profile '{}' ({})", p.name, p.id))?;
    Ok(EXIT_SUCCESS)
}
